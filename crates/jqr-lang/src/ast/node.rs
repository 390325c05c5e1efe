use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use smallvec::SmallVec;

use crate::{Shared, Value, lexer::token::Token, number::Number};

use super::IdentName;

pub type Args = SmallVec<[Shared<Node>; 2]>;
pub type Branches = SmallVec<[(Shared<Node>, Shared<Node>); 2]>;

#[derive(PartialEq, Debug, Clone)]
pub struct Node {
    /// The token that introduced this node, kept for diagnostics.
    pub token: Shared<Token>,
    pub expr: Expr,
}

impl Node {
    pub fn new(token: Shared<Token>, expr: Expr) -> Shared<Self> {
        Shared::new(Self { token, expr })
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::String(s.clone()),
        }
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::from(self))
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
        };
        write!(f, "{}", op)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Expr {
    /// `.`
    Identity,
    /// `..`
    Recurse,
    Literal(Literal),
    Variable(IdentName),
    /// `target[key]`, `target.key`
    Index(Shared<Node>, Shared<Node>),
    /// `target[from:to]`
    Slice(Shared<Node>, Option<Shared<Node>>, Option<Shared<Node>>),
    /// `target[]`
    Iterate(Shared<Node>),
    Pipe(Shared<Node>, Shared<Node>),
    Comma(Shared<Node>, Shared<Node>),
    /// `lhs // rhs`
    Alternative(Shared<Node>, Shared<Node>),
    And(Shared<Node>, Shared<Node>),
    Or(Shared<Node>, Shared<Node>),
    BinaryOp(BinaryOp, Shared<Node>, Shared<Node>),
    Negate(Shared<Node>),
    /// `[body]`, `[]` when the body is absent.
    Array(Option<Shared<Node>>),
    /// `{key: value, ...}`
    Object(Vec<(Shared<Node>, Shared<Node>)>),
    /// `if c then a elif c then b else d end`
    If(Branches, Option<Shared<Node>>),
    /// `try body catch handler`, and the postfix `?`.
    Try(Shared<Node>, Option<Shared<Node>>),
    /// `source as $name | body`
    Bind(Shared<Node>, IdentName, Shared<Node>),
    Call(IdentName, Args),
}

/// Renders the expression back to fully parenthesized filter source.
impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.expr {
            Expr::Identity => write!(f, "."),
            Expr::Recurse => write!(f, ".."),
            Expr::Literal(literal) => write!(f, "{}", literal),
            Expr::Variable(name) => write!(f, "${}", name),
            Expr::Index(target, key) => write!(f, "{}[{}]", target, key),
            Expr::Slice(target, from, to) => {
                let from = from.as_ref().map(|n| n.to_string()).unwrap_or_default();
                let to = to.as_ref().map(|n| n.to_string()).unwrap_or_default();
                write!(f, "{}[{}:{}]", target, from, to)
            }
            Expr::Iterate(target) => write!(f, "{}[]", target),
            Expr::Pipe(lhs, rhs) => write!(f, "({} | {})", lhs, rhs),
            Expr::Comma(lhs, rhs) => write!(f, "({}, {})", lhs, rhs),
            Expr::Alternative(lhs, rhs) => write!(f, "({} // {})", lhs, rhs),
            Expr::And(lhs, rhs) => write!(f, "({} and {})", lhs, rhs),
            Expr::Or(lhs, rhs) => write!(f, "({} or {})", lhs, rhs),
            Expr::BinaryOp(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op, rhs),
            Expr::Negate(node) => write!(f, "(-{})", node),
            Expr::Array(None) => write!(f, "[]"),
            Expr::Array(Some(body)) => write!(f, "[{}]", body),
            Expr::Object(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .join(", ")
            ),
            Expr::If(branches, else_) => {
                for (i, (cond, body)) in branches.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { " elif" };
                    write!(f, "{} {} then {}", keyword, cond, body)?;
                }
                if let Some(else_) = else_ {
                    write!(f, " else {}", else_)?;
                }
                write!(f, " end")
            }
            Expr::Try(body, None) => write!(f, "try {}", body),
            Expr::Try(body, Some(handler)) => write!(f, "try {} catch {}", body, handler),
            Expr::Bind(source, name, body) => write!(f, "({} as ${} | {})", source, name, body),
            Expr::Call(name, args) if args.is_empty() => write!(f, "{}", name),
            Expr::Call(name, args) => write!(f, "{}({})", name, args.iter().join("; ")),
        }
    }
}
