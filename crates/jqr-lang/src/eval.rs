pub mod builtin;
pub mod env;
pub mod error;
pub(crate) mod ops;

use std::cell::Cell;
use std::iter::{once, once_with};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::node::{Expr, Node};
use crate::ast::{IdentName, Program};
use crate::value::Map;
use crate::{Shared, Value};

use env::Env;
use error::RuntimeError;

/// The lazily produced outputs of one filter applied to one input.
pub type Outputs = Box<dyn Iterator<Item = Result<Value, RuntimeError>>>;

type Entries = Rc<[(Shared<Node>, Shared<Node>)]>;

/// Interpreter state for a single execution of a compiled program.
///
/// Created per execution, so bindings never leak between runs of the same
/// program.
#[derive(Debug, Clone)]
pub struct Evaluator {
    /// The compiled filter, shared with the program it came from.
    program: Program,
    /// Bindings visible at the top level, such as `$ENV` and named arguments.
    env: Env,
}

impl Evaluator {
    pub fn new(program: Program, globals: &[(IdentName, Value)]) -> Self {
        Self {
            program,
            env: globals.iter().cloned().collect(),
        }
    }

    /// Applies the program to `input`. Nothing is computed until the
    /// returned iterator is pulled.
    pub fn eval(&self, input: Value) -> Outputs {
        trace!(input_type = input.type_name(), "evaluating program");
        eval(&self.program, input, &self.env)
    }
}

#[inline(always)]
pub(crate) fn single(result: Result<Value, RuntimeError>) -> Outputs {
    Box::new(once(result))
}

/// Defers building the outputs until the first pull.
#[inline(always)]
pub(crate) fn lazy(f: impl FnOnce() -> Outputs + 'static) -> Outputs {
    Box::new(once_with(f).flatten())
}

/// Feeds every value of `outputs` through `f`, passing errors along unchanged.
pub(crate) fn then(outputs: Outputs, mut f: impl FnMut(Value) -> Outputs + 'static) -> Outputs {
    Box::new(outputs.flat_map(move |result| match result {
        Ok(value) => f(value),
        Err(err) => single(Err(err)),
    }))
}

pub(crate) fn eval(node: &Shared<Node>, input: Value, env: &Env) -> Outputs {
    match &node.expr {
        Expr::Identity => single(Ok(input)),
        Expr::Recurse => Box::new(recurse(input).map(Ok)),
        Expr::Literal(literal) => single(Ok(literal.into())),
        Expr::Variable(name) => single(Ok(env.get(name).cloned().unwrap_or_default())),
        Expr::Index(target, key) => {
            let (key, token, key_env, key_input) =
                (Shared::clone(key), Shared::clone(&node.token), env.clone(), input.clone());

            then(eval(target, input, env), move |target| {
                let token = Shared::clone(&token);
                Box::new(
                    eval(&key, key_input.clone(), &key_env)
                        .map(move |key| key.and_then(|key| ops::index(&token, &target, &key))),
                )
            })
        }
        Expr::Slice(target, from, to) => {
            let (from, to, token, env_, input_) = (
                from.clone(),
                to.clone(),
                Shared::clone(&node.token),
                env.clone(),
                input.clone(),
            );

            then(eval(target, input, env), move |target| {
                let (to, token, env, input) =
                    (to.clone(), Shared::clone(&token), env_.clone(), input_.clone());

                then(eval_or_null(&from, input.clone(), &env), move |from| {
                    let (target, token) = (target.clone(), Shared::clone(&token));
                    Box::new(eval_or_null(&to, input.clone(), &env).map(move |to| {
                        to.and_then(|to| ops::slice(&token, &target, &from, &to))
                    }))
                })
            })
        }
        Expr::Iterate(target) => {
            let token = Shared::clone(&node.token);
            then(eval(target, input, env), move |value| {
                match ops::iterate(&token, value) {
                    Ok(values) => Box::new(values.into_iter().map(Ok)),
                    Err(err) => single(Err(err)),
                }
            })
        }
        Expr::Pipe(lhs, rhs) => {
            let (rhs, env_) = (Shared::clone(rhs), env.clone());
            then(eval(lhs, input, env), move |value| eval(&rhs, value, &env_))
        }
        Expr::Comma(lhs, rhs) => {
            let (rhs, env_, input_) = (Shared::clone(rhs), env.clone(), input.clone());
            Box::new(eval(lhs, input, env).chain(lazy(move || eval(&rhs, input_, &env_))))
        }
        Expr::Alternative(lhs, rhs) => {
            let found = Rc::new(Cell::new(false));
            let seen = Rc::clone(&found);
            let (rhs, env_, input_) = (Shared::clone(rhs), env.clone(), input.clone());

            let truthy = eval(lhs, input, env).filter_map(move |result| match result {
                Ok(value) if value.is_truthy() => {
                    seen.set(true);
                    Some(Ok(value))
                }
                _ => None,
            });

            Box::new(truthy.chain(lazy(move || {
                if found.get() {
                    Box::new(std::iter::empty())
                } else {
                    eval(&rhs, input_, &env_)
                }
            })))
        }
        Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
            let is_and = matches!(node.expr, Expr::And(..));
            let (rhs, env_, input_) = (Shared::clone(rhs), env.clone(), input.clone());

            then(eval(lhs, input, env), move |value| {
                // `false and _` and `true or _` never evaluate the right side.
                if value.is_truthy() != is_and {
                    single(Ok(Value::Bool(!is_and)))
                } else {
                    Box::new(
                        eval(&rhs, input_.clone(), &env_)
                            .map(|result| result.map(|value| Value::Bool(value.is_truthy()))),
                    )
                }
            })
        }
        Expr::BinaryOp(op, lhs, rhs) => {
            let (op, lhs, token, env_, input_) = (
                *op,
                Shared::clone(lhs),
                Shared::clone(&node.token),
                env.clone(),
                input.clone(),
            );

            // The right operand drives the outer loop.
            then(eval(rhs, input, env), move |rhs| {
                let token = Shared::clone(&token);
                Box::new(eval(&lhs, input_.clone(), &env_).map(move |lhs| {
                    lhs.and_then(|lhs| ops::binary(&token, op, lhs, rhs.clone()))
                }))
            })
        }
        Expr::Negate(operand) => {
            let token = Shared::clone(&node.token);
            Box::new(
                eval(operand, input, env)
                    .map(move |result| result.and_then(|value| ops::negate(&token, value))),
            )
        }
        Expr::Array(None) => single(Ok(Value::Array(Vec::new()))),
        Expr::Array(Some(body)) => {
            let (body, env) = (Shared::clone(body), env.clone());
            Box::new(once_with(move || {
                eval(&body, input, &env)
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }))
        }
        Expr::Object(entries) => {
            let entries: Entries = entries.iter().cloned().collect();
            eval_object(entries, 0, Map::new(), input, env.clone())
        }
        Expr::If(branches, else_) => {
            let branches: Entries = branches.iter().cloned().collect();
            eval_if(branches, 0, else_.clone(), input, env.clone())
        }
        Expr::Try(body, handler) => eval_try(body, handler.clone(), input, env),
        Expr::Bind(source, name, body) => {
            let (name, body, env_, input_) =
                (name.clone(), Shared::clone(body), env.clone(), input.clone());

            then(eval(source, input, env), move |value| {
                eval(&body, input_.clone(), &env_.bind(name.clone(), value))
            })
        }
        Expr::Call(name, args) => builtin::call(&node.token, name, args, input, env),
    }
}

#[inline(always)]
fn eval_or_null(node: &Option<Shared<Node>>, input: Value, env: &Env) -> Outputs {
    match node {
        Some(node) => eval(node, input, env),
        None => single(Ok(Value::Null)),
    }
}

/// Builds objects entry by entry; every key and value output multiplies the results.
fn eval_object(entries: Entries, index: usize, object: Map, input: Value, env: Env) -> Outputs {
    let Some((key, value)) = entries.get(index).cloned() else {
        return single(Ok(Value::Object(object)));
    };
    let (input_, env_) = (input.clone(), env.clone());

    then(eval(&key, input, &env), move |k| {
        let k = match k {
            Value::String(k) => k,
            other => {
                return single(Err(RuntimeError::InvalidObjectKey(
                    Shared::clone(&key.token),
                    other.describe(),
                )));
            }
        };
        let (entries, object, input, env) =
            (Rc::clone(&entries), object.clone(), input_.clone(), env_.clone());

        then(eval(&value, input.clone(), &env), move |v| {
            let mut object = object.clone();
            object.insert(k.clone(), v);
            eval_object(Rc::clone(&entries), index + 1, object, input.clone(), env.clone())
        })
    })
}

fn eval_if(branches: Entries, index: usize, else_: Option<Shared<Node>>, input: Value, env: Env) -> Outputs {
    let Some((cond, body)) = branches.get(index).cloned() else {
        return match else_ {
            Some(else_) => eval(&else_, input, &env),
            None => single(Ok(input)),
        };
    };
    let input_ = input.clone();

    then(eval(&cond, input, &env), move |cond| {
        if cond.is_truthy() {
            eval(&body, input_.clone(), &env)
        } else {
            eval_if(Rc::clone(&branches), index + 1, else_.clone(), input_.clone(), env.clone())
        }
    })
}

enum TryState {
    Body(Outputs),
    Handler(Outputs),
    Done,
}

/// Yields the body's outputs up to its first error, then hands that error to the handler.
fn eval_try(body: &Shared<Node>, handler: Option<Shared<Node>>, input: Value, env: &Env) -> Outputs {
    let env = env.clone();
    let mut state = TryState::Body(eval(body, input, &env));

    Box::new(std::iter::from_fn(move || {
        loop {
            let next = match &mut state {
                TryState::Body(outputs) => outputs.next(),
                TryState::Handler(outputs) => return outputs.next(),
                TryState::Done => return None,
            };

            match next {
                Some(Ok(value)) => return Some(Ok(value)),
                Some(Err(err)) => {
                    debug!(error = %err, "error caught by try");
                    state = match &handler {
                        Some(handler) => TryState::Handler(eval(handler, err.value(), &env)),
                        None => TryState::Done,
                    };
                }
                None => state = TryState::Done,
            }
        }
    }))
}

/// Pre-order walk over `value` and everything nested in it.
pub(crate) fn recurse(value: Value) -> impl Iterator<Item = Value> {
    let mut stack = vec![value];

    std::iter::from_fn(move || {
        let value = stack.pop()?;
        match &value {
            Value::Array(values) => stack.extend(values.iter().rev().cloned()),
            Value::Object(map) => stack.extend(map.values().rev().cloned()),
            _ => {}
        }
        Some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parser::Parser;
    use crate::lexer::Lexer;
    use rstest::rstest;
    use smol_str::SmolStr;

    fn run(source: &str, input: &str) -> Vec<Result<Value, String>> {
        let tokens: Vec<Shared<crate::lexer::token::Token>> = Lexer::new()
            .tokenize(source)
            .unwrap()
            .into_iter()
            .map(Shared::new)
            .collect();
        let program = Parser::new(tokens.iter(), [SmolStr::new("ENV")]).parse().unwrap();
        let globals = [(SmolStr::new("ENV"), Value::Object(Map::new()))];

        Evaluator::new(program, &globals)
            .eval(serde_json::from_str(input).unwrap())
            .map(|result| result.map_err(|err| err.to_string()))
            .collect()
    }

    fn ok(values: &[&str]) -> Vec<Result<Value, String>> {
        values
            .iter()
            .map(|v| Ok(serde_json::from_str(v).unwrap()))
            .collect()
    }

    #[rstest]
    #[case::identity(".", "{\"a\":1}", &["{\"a\":1}"])]
    #[case::field(".a", "{\"a\":1}", &["1"])]
    #[case::nested_field(".a.b", "{\"a\":{\"b\":2}}", &["2"])]
    #[case::iterate_map(".[] + 1", "[1,2,3]", &["2", "3", "4"])]
    #[case::collect("[.[] + 1]", "[1,2,3]", &["[2,3,4]"])]
    #[case::iterate_object(".[]", "{\"b\":1,\"a\":2}", &["1", "2"])]
    #[case::comma("1, 2, 3", "null", &["1", "2", "3"])]
    #[case::pipe(".a | . * 2", "{\"a\":3}", &["6"])]
    #[case::rhs_outer("(1, 2) + (10, 20)", "null", &["11", "12", "21", "22"])]
    #[case::recurse("[..]", "[[1]]", &["[[[1]],[1],1]"])]
    #[case::alternative(".a // \"default\"", "{}", &["\"default\""])]
    #[case::alternative_keeps_truthy("(false, 1, null, 2) // 3", "null", &["1", "2"])]
    #[case::alternative_suppresses_errors("(.a.b // 1)", "{\"a\":5}", &["1"])]
    #[case::and_or("(true, false) and (true, false)", "null", &["true", "false", "false"])]
    #[case::or_short_circuit("true or error(\"x\")", "null", &["true"])]
    #[case::object_product("{a: (1, 2), b: (3, 4)}", "null", &[
        "{\"a\":1,\"b\":3}", "{\"a\":1,\"b\":4}", "{\"a\":2,\"b\":3}", "{\"a\":2,\"b\":4}"
    ])]
    #[case::object_key_expr("{(.k): .v}", "{\"k\":\"x\",\"v\":1}", &["{\"x\":1}"])]
    #[case::if_elif("if . == 1 then \"one\" elif . == 2 then \"two\" else \"many\" end", "2", &["\"two\""])]
    #[case::if_without_else("if . then 1 end", "false", &["false"])]
    #[case::if_multiple_conditions("if (true, false) then 1 else 2 end", "null", &["1", "2"])]
    #[case::try_stops_at_error("[.[] | try (if . == 2 then error(\"x\") else . end)]", "[1,2,3]", &["[1,3]"])]
    #[case::try_catch("try error(\"boom\") catch .", "null", &["\"boom\""])]
    #[case::try_catch_payload("try error({a: 1}) catch .a", "null", &["1"])]
    #[case::optional("[.[] | .a?]", "[1, {\"a\": 2}]", &["[2]"])]
    #[case::bind(".a as $x | .b + $x", "{\"a\":1,\"b\":2}", &["3"])]
    #[case::bind_each(".[] as $x | $x * 2", "[1,2]", &["2", "4"])]
    #[case::slice(".[1:]", "[1,2,3]", &["[2,3]"])]
    #[case::negate("-.a", "{\"a\":1}", &["-1"])]
    #[case::empty_array("[]", "null", &["[]"])]
    fn test_eval(#[case] source: &str, #[case] input: &str, #[case] expected: &[&str]) {
        assert_eq!(run(source, input), ok(expected));
    }

    #[rstest]
    #[case::index_number(".x", "1", "Cannot index number with string \"x\"")]
    #[case::iterate_number(".[]", "1", "Cannot iterate over number (1)")]
    #[case::add_mismatch(". + 1", "\"a\"", "string (\"a\") and number (1) cannot be added")]
    #[case::object_key("{(1): 2}", "null", "Object keys must be strings, got number (1)")]
    fn test_eval_error(#[case] source: &str, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(run(source, input), vec![Err(expected.to_string())]);
    }

    #[test]
    fn test_outputs_before_error_are_kept() {
        let outputs = run(".[] | .a", "[{\"a\":1}, 2, {\"a\":3}]");
        assert_eq!(outputs[0], Ok(Value::from(1)));
        assert_eq!(outputs[1], Err("Cannot index number with string \"a\"".to_string()));
    }

    #[test]
    fn test_laziness() {
        let tokens: Vec<Shared<crate::lexer::token::Token>> = Lexer::new()
            .tokenize("1, error(\"late\")")
            .unwrap()
            .into_iter()
            .map(Shared::new)
            .collect();
        let program = Parser::new(tokens.iter(), []).parse().unwrap();
        let mut outputs = Evaluator::new(program, &[]).eval(Value::Null);

        assert_eq!(outputs.next(), Some(Ok(Value::from(1))));
        assert!(matches!(outputs.next(), Some(Err(RuntimeError::UserDefined(..)))));
    }

    #[test]
    fn test_recurse_order() {
        let value: Value = serde_json::from_str("{\"a\":[1,2],\"b\":3}").unwrap();
        let visited = recurse(value).skip(1).collect::<Vec<_>>();
        assert_eq!(
            visited,
            vec![
                serde_json::from_str::<Value>("[1,2]").unwrap(),
                Value::from(1),
                Value::from(2),
                Value::from(3),
            ]
        );
    }
}
