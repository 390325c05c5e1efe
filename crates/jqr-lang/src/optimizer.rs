use crate::Shared;
use crate::ast::Program;
use crate::ast::node::{Expr, Literal, Node};
use crate::eval::ops;
use crate::value::Value;

/// Rewrites a parsed program into an equivalent, cheaper one.
///
/// Folds operators whose operands are all literals, and drops identity
/// stages from pipes. Operations that would fail are left in place so the
/// error is still raised, with its location, when the program runs.
#[derive(Debug, Default)]
pub struct Optimizer;

impl Optimizer {
    pub fn new() -> Self {
        Self
    }

    pub fn optimize(&self, program: &Program) -> Program {
        Self::optimize_node(program)
    }

    fn optimize_node(node: &Shared<Node>) -> Shared<Node> {
        let expr = match &node.expr {
            Expr::Identity | Expr::Recurse | Expr::Literal(_) | Expr::Variable(_) => {
                return Shared::clone(node);
            }
            Expr::Index(target, key) => {
                Expr::Index(Self::optimize_node(target), Self::optimize_node(key))
            }
            Expr::Slice(target, from, to) => Expr::Slice(
                Self::optimize_node(target),
                from.as_ref().map(Self::optimize_node),
                to.as_ref().map(Self::optimize_node),
            ),
            Expr::Iterate(target) => Expr::Iterate(Self::optimize_node(target)),
            Expr::Pipe(lhs, rhs) => {
                let (lhs, rhs) = (Self::optimize_node(lhs), Self::optimize_node(rhs));
                match (&lhs.expr, &rhs.expr) {
                    (Expr::Identity, _) => return rhs,
                    (_, Expr::Identity) => return lhs,
                    _ => Expr::Pipe(lhs, rhs),
                }
            }
            Expr::Comma(lhs, rhs) => Expr::Comma(Self::optimize_node(lhs), Self::optimize_node(rhs)),
            Expr::Alternative(lhs, rhs) => {
                Expr::Alternative(Self::optimize_node(lhs), Self::optimize_node(rhs))
            }
            Expr::And(lhs, rhs) => Expr::And(Self::optimize_node(lhs), Self::optimize_node(rhs)),
            Expr::Or(lhs, rhs) => Expr::Or(Self::optimize_node(lhs), Self::optimize_node(rhs)),
            Expr::BinaryOp(op, lhs, rhs) => {
                let (lhs, rhs) = (Self::optimize_node(lhs), Self::optimize_node(rhs));
                match (&lhs.expr, &rhs.expr) {
                    (Expr::Literal(a), Expr::Literal(b)) => {
                        match ops::binary(&node.token, *op, a.into(), b.into()) {
                            Ok(value) => match Self::to_literal(value) {
                                Some(literal) => Expr::Literal(literal),
                                None => Expr::BinaryOp(*op, lhs, rhs),
                            },
                            Err(_) => Expr::BinaryOp(*op, lhs, rhs),
                        }
                    }
                    _ => Expr::BinaryOp(*op, lhs, rhs),
                }
            }
            Expr::Negate(operand) => {
                let operand = Self::optimize_node(operand);
                match &operand.expr {
                    Expr::Literal(Literal::Number(n)) => Expr::Literal(Literal::Number(-*n)),
                    _ => Expr::Negate(operand),
                }
            }
            Expr::Array(body) => Expr::Array(body.as_ref().map(Self::optimize_node)),
            Expr::Object(entries) => Expr::Object(
                entries
                    .iter()
                    .map(|(k, v)| (Self::optimize_node(k), Self::optimize_node(v)))
                    .collect(),
            ),
            Expr::If(branches, else_) => Expr::If(
                branches
                    .iter()
                    .map(|(cond, body)| (Self::optimize_node(cond), Self::optimize_node(body)))
                    .collect(),
                else_.as_ref().map(Self::optimize_node),
            ),
            Expr::Try(body, handler) => Expr::Try(
                Self::optimize_node(body),
                handler.as_ref().map(Self::optimize_node),
            ),
            Expr::Bind(source, name, body) => Expr::Bind(
                Self::optimize_node(source),
                name.clone(),
                Self::optimize_node(body),
            ),
            Expr::Call(name, args) => {
                Expr::Call(name.clone(), args.iter().map(Self::optimize_node).collect())
            }
        };

        Node::new(Shared::clone(&node.token), expr)
    }

    fn to_literal(value: Value) -> Option<Literal> {
        match value {
            Value::Null => Some(Literal::Null),
            Value::Bool(b) => Some(Literal::Bool(b)),
            Value::Number(n) => Some(Literal::Number(n)),
            Value::String(s) => Some(Literal::String(s)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}
