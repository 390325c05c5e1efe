use std::iter::{empty, successors};
use std::rc::Rc;
use std::sync::{LazyLock, Mutex};

use itertools::Itertools;
use regex_lite::Regex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::ast::node::Node;
use crate::lexer::token::Token;
use crate::number::Number;
use crate::value::Map;
use crate::{Shared, Value};

use super::env::Env;
use super::error::RuntimeError;
use super::{Outputs, eval, ops, recurse, single, then};

/// Patterns may come from input data, so the cache starts over once full.
const REGEX_CACHE_CAPACITY: usize = 512;

static REGEX_CACHE: LazyLock<Mutex<FxHashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

type ErrorToken = Shared<Token>;
type ArgValues = SmallVec<[Value; 2]>;

/// A builtin computed from the input and the values of its arguments.
/// Multi-valued arguments run it once per combination.
pub type ValueFn = fn(&ErrorToken, Value, &[Value]) -> Result<Value, RuntimeError>;

/// A builtin that receives its arguments unevaluated, as filters.
pub type FilterFn = fn(&ErrorToken, &[Shared<Node>], Value, &Env) -> Outputs;

#[derive(Clone, Copy, Debug)]
pub enum Func {
    Value(ValueFn),
    Filter(FilterFn),
}

#[derive(Clone, Debug)]
pub struct BuiltinFunction {
    pub num_params: ParamNum,
    pub func: Func,
}

#[derive(Clone, Debug)]
pub enum ParamNum {
    None,
    Fixed(u8),
    Range(u8, u8),
}

impl ParamNum {
    #[inline(always)]
    pub fn is_valid(&self, num_args: u8) -> bool {
        match self {
            ParamNum::None => num_args == 0,
            ParamNum::Fixed(n) => num_args == *n,
            ParamNum::Range(min, max) => num_args >= *min && num_args <= *max,
        }
    }
}

pub static BUILTIN_FUNCTIONS: LazyLock<FxHashMap<&'static str, BuiltinFunction>> =
    LazyLock::new(|| {
        let mut map = FxHashMap::default();

        let mut value_fn = |name, num_params, func: ValueFn| {
            map.insert(
                name,
                BuiltinFunction {
                    num_params,
                    func: Func::Value(func),
                },
            );
        };

        value_fn("error", ParamNum::Range(0, 1), error);
        value_fn("not", ParamNum::None, |_, input, _| Ok(Value::Bool(!input.is_truthy())));
        value_fn("length", ParamNum::None, length);
        value_fn("utf8bytelength", ParamNum::None, utf8bytelength);
        value_fn("keys", ParamNum::None, keys);
        value_fn("has", ParamNum::Fixed(1), has);
        value_fn("add", ParamNum::None, add);
        value_fn("any", ParamNum::None, |token, input, _| {
            Ok(Value::Bool(values(token, input)?.iter().any(Value::is_truthy)))
        });
        value_fn("all", ParamNum::None, |token, input, _| {
            Ok(Value::Bool(values(token, input)?.iter().all(Value::is_truthy)))
        });
        value_fn("type", ParamNum::None, |_, input, _| Ok(Value::from(input.type_name())));
        value_fn("tostring", ParamNum::None, |_, input, _| match input {
            Value::String(s) => Ok(Value::String(s)),
            other => Ok(Value::String(other.to_string())),
        });
        value_fn("tonumber", ParamNum::None, tonumber);
        value_fn("tojson", ParamNum::None, |_, input, _| Ok(Value::String(input.to_string())));
        value_fn("fromjson", ParamNum::None, fromjson);
        value_fn("ascii_downcase", ParamNum::None, |token, input, _| match input {
            Value::String(s) => Ok(Value::String(s.to_ascii_lowercase())),
            _ => Err(invalid(token, "ascii_downcase input must be a string")),
        });
        value_fn("ascii_upcase", ParamNum::None, |token, input, _| match input {
            Value::String(s) => Ok(Value::String(s.to_ascii_uppercase())),
            _ => Err(invalid(token, "ascii_upcase input must be a string")),
        });
        value_fn("reverse", ParamNum::None, reverse);
        value_fn("sort", ParamNum::None, |token, input, _| match input {
            Value::Array(mut values) => {
                values.sort();
                Ok(Value::Array(values))
            }
            other => Err(invalid(
                token,
                &format!("{} cannot be sorted, as it is not an array", other.describe()),
            )),
        });
        value_fn("join", ParamNum::Fixed(1), join);
        value_fn("split", ParamNum::Fixed(1), |token, input, args| match (&input, args) {
            (Value::String(s), [Value::String(sep)]) => Ok(ops::split(s, sep)),
            _ => Err(invalid(token, "split input and separator must be strings")),
        });
        value_fn("startswith", ParamNum::Fixed(1), |token, input, args| match (&input, args) {
            (Value::String(s), [Value::String(prefix)]) => Ok(Value::Bool(s.starts_with(prefix.as_str()))),
            _ => Err(invalid(token, "startswith() requires string inputs")),
        });
        value_fn("endswith", ParamNum::Fixed(1), |token, input, args| match (&input, args) {
            (Value::String(s), [Value::String(suffix)]) => Ok(Value::Bool(s.ends_with(suffix.as_str()))),
            _ => Err(invalid(token, "endswith() requires string inputs")),
        });
        value_fn("test", ParamNum::Range(1, 2), test);

        let mut filter_fn = |name, num_params, func: FilterFn| {
            map.insert(
                name,
                BuiltinFunction {
                    num_params,
                    func: Func::Filter(func),
                },
            );
        };

        filter_fn("empty", ParamNum::None, |_, _, _, _| Box::new(empty()));
        filter_fn("map", ParamNum::Fixed(1), map_);
        filter_fn("select", ParamNum::Fixed(1), select);
        filter_fn("recurse", ParamNum::None, |_, _, input, _| Box::new(recurse(input).map(Ok)));
        filter_fn("first", ParamNum::Fixed(1), |token, args, input, env| match args {
            [f] => Box::new(eval(f, input, env).take(1)),
            _ => single(Err(arity(token, "first", args))),
        });
        filter_fn("limit", ParamNum::Fixed(2), limit);
        filter_fn("range", ParamNum::Range(1, 2), range);
        filter_fn("env", ParamNum::None, |_, _, _, env| {
            single(Ok(env.get("ENV").cloned().unwrap_or_else(|| Value::Object(Map::new()))))
        });

        map
    });

/// Whether `name/arity` names a builtin.
pub fn is_defined(name: &str, arity: usize) -> bool {
    BUILTIN_FUNCTIONS.get(name).is_some_and(|f| {
        u8::try_from(arity).is_ok_and(|arity| f.num_params.is_valid(arity))
    })
}

pub fn call(token: &ErrorToken, name: &str, args: &[Shared<Node>], input: Value, env: &Env) -> Outputs {
    match BUILTIN_FUNCTIONS.get(name).map(|f| f.func) {
        Some(Func::Filter(func)) => func(token, args, input, env),
        Some(Func::Value(func)) => {
            let token = Shared::clone(token);
            let args: Rc<[Shared<Node>]> = args.iter().cloned().collect();
            let input_ = input.clone();

            Box::new(eval_args(args, 0, ArgValues::new(), input, env.clone()).map(move |bound| {
                bound.and_then(|bound| func(&token, input_.clone(), &bound))
            }))
        }
        None => single(Err(arity(token, name, args))),
    }
}

/// Every combination of argument values, the first argument varying slowest.
fn eval_args(
    args: Rc<[Shared<Node>]>,
    index: usize,
    bound: ArgValues,
    input: Value,
    env: Env,
) -> Box<dyn Iterator<Item = Result<ArgValues, RuntimeError>>> {
    let Some(arg) = args.get(index).cloned() else {
        return Box::new(std::iter::once(Ok(bound)));
    };
    let (input_, env_) = (input.clone(), env.clone());

    Box::new(eval(&arg, input, &env).flat_map(move |value| match value {
        Ok(value) => {
            let mut bound = bound.clone();
            bound.push(value);
            eval_args(Rc::clone(&args), index + 1, bound, input_.clone(), env_.clone())
        }
        Err(err) => Box::new(std::iter::once(Err(err))),
    }))
}

#[cold]
fn invalid(token: &ErrorToken, message: &str) -> RuntimeError {
    RuntimeError::InvalidArgument(Shared::clone(token), message.to_string())
}

#[cold]
fn arity<T>(token: &ErrorToken, name: &str, args: &[T]) -> RuntimeError {
    invalid(token, &format!("{}/{} is not defined", name, args.len()))
}

fn values(token: &ErrorToken, input: Value) -> Result<Vec<Value>, RuntimeError> {
    match input {
        Value::Null => Ok(Vec::new()),
        other => ops::iterate(token, other),
    }
}

fn error(token: &ErrorToken, input: Value, args: &[Value]) -> Result<Value, RuntimeError> {
    let payload = args.first().cloned().unwrap_or(input);
    Err(RuntimeError::UserDefined(Shared::clone(token), payload))
}

fn length(token: &ErrorToken, input: Value, _: &[Value]) -> Result<Value, RuntimeError> {
    match input {
        Value::Null => Ok(Value::from(0)),
        Value::Number(n) => Ok(Value::Number(n.abs())),
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(values) => Ok(Value::from(values.len())),
        Value::Object(map) => Ok(Value::from(map.len())),
        other => Err(invalid(token, &format!("{} has no length", other.describe()))),
    }
}

fn utf8bytelength(token: &ErrorToken, input: Value, _: &[Value]) -> Result<Value, RuntimeError> {
    match input {
        Value::String(s) => Ok(Value::from(s.len())),
        other => Err(invalid(
            token,
            &format!("{} only strings have UTF-8 byte length", other.describe()),
        )),
    }
}

fn keys(token: &ErrorToken, input: Value, _: &[Value]) -> Result<Value, RuntimeError> {
    match input {
        Value::Object(map) => Ok(map.keys().sorted().map(|k| Value::from(k.as_str())).collect()),
        Value::Array(values) => Ok((0..values.len()).map(Value::from).collect()),
        other => Err(invalid(token, &format!("{} has no keys", other.describe()))),
    }
}

fn has(token: &ErrorToken, input: Value, args: &[Value]) -> Result<Value, RuntimeError> {
    match (&input, args) {
        (Value::Object(map), [Value::String(key)]) => Ok(Value::Bool(map.contains_key(key))),
        (Value::Array(values), [Value::Number(n)]) => {
            Ok(Value::Bool(n.value() >= 0.0 && n.value() < values.len() as f64))
        }
        (_, [key]) => Err(invalid(
            token,
            &format!(
                "Cannot check whether {} has a {} key",
                input.type_name(),
                key.type_name()
            ),
        )),
        _ => Err(arity(token, "has", args)),
    }
}

fn add(token: &ErrorToken, input: Value, _: &[Value]) -> Result<Value, RuntimeError> {
    values(token, input)?
        .into_iter()
        .try_fold(Value::Null, |acc, value| ops::add(token, acc, value))
}

fn tonumber(token: &ErrorToken, input: Value, _: &[Value]) -> Result<Value, RuntimeError> {
    match input {
        Value::Number(n) => Ok(Value::Number(n)),
        Value::String(s) => serde_json::from_str::<f64>(&s)
            .map(|n| Value::Number(Number::from(n)))
            .map_err(|_| {
                invalid(
                    token,
                    &format!("{} cannot be parsed as a number", Value::String(s).describe()),
                )
            }),
        other => Err(invalid(
            token,
            &format!("{} cannot be parsed as a number", other.describe()),
        )),
    }
}

fn fromjson(token: &ErrorToken, input: Value, _: &[Value]) -> Result<Value, RuntimeError> {
    match input {
        Value::String(s) => serde_json::from_str::<Value>(&s)
            .map_err(|err| invalid(token, &format!("{} (while parsing '{}')", err, s))),
        other => Err(invalid(
            token,
            &format!("{} cannot be parsed as JSON", other.describe()),
        )),
    }
}

fn reverse(token: &ErrorToken, input: Value, _: &[Value]) -> Result<Value, RuntimeError> {
    match input {
        Value::Null => Ok(Value::Array(Vec::new())),
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        Value::Array(mut values) => {
            values.reverse();
            Ok(Value::Array(values))
        }
        other => Err(invalid(token, &format!("Cannot reverse {}", other.describe()))),
    }
}

fn join(token: &ErrorToken, input: Value, args: &[Value]) -> Result<Value, RuntimeError> {
    let [Value::String(sep)] = args else {
        return Err(invalid(token, "join separator must be a string"));
    };

    let parts = values(token, input)?
        .into_iter()
        .map(|value| match value {
            Value::Null => Ok(String::new()),
            Value::String(s) => Ok(s),
            Value::Bool(_) | Value::Number(_) => Ok(value.to_string()),
            other => Err(invalid(token, &format!("Cannot join with {}", other.type_name()))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Value::String(parts.join(sep.as_str())))
}

fn test(token: &ErrorToken, input: Value, args: &[Value]) -> Result<Value, RuntimeError> {
    let (pattern, flags) = match args {
        [pattern] => (pattern, &Value::Null),
        [pattern, flags] => (pattern, flags),
        _ => return Err(arity(token, "test", args)),
    };

    let (Value::String(s), Value::String(pattern)) = (&input, pattern) else {
        let culprit = if input.as_str().is_some() { pattern } else { &input };
        return Err(invalid(
            token,
            &format!("{} cannot be matched, as it is not a string", culprit.describe()),
        ));
    };

    let flags = match flags {
        Value::Null => "",
        Value::String(flags) => flags.as_str(),
        other => return Err(invalid(token, &format!("{} is not a string", other.describe()))),
    };

    let regex = compile_regex(token, pattern, flags)?;
    Ok(Value::Bool(regex.is_match(s)))
}

/// Compiles `pattern` with jq-style `flags`, reusing earlier compilations.
fn compile_regex(token: &ErrorToken, pattern: &str, flags: &str) -> Result<Regex, RuntimeError> {
    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            'i' => inline.push('i'),
            'x' => inline.push('x'),
            's' => inline.push('s'),
            'g' | 'n' => {}
            _ => {
                return Err(invalid(
                    token,
                    &format!("{} is not a valid modifier string", Value::from(flags)),
                ));
            }
        }
    }

    let source = if inline.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", inline, pattern)
    };

    let mut cache = REGEX_CACHE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(regex) = cache.get(&source) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&source).map_err(|err| {
        RuntimeError::InvalidRegularExpression(
            Shared::clone(token),
            Value::from(pattern).to_string(),
            err.to_string(),
        )
    })?;

    if cache.len() >= REGEX_CACHE_CAPACITY {
        trace!(capacity = REGEX_CACHE_CAPACITY, "clearing regex cache");
        cache.clear();
    }
    cache.insert(source, regex.clone());
    Ok(regex)
}

/// `map(f)` is `[.[] | f]`.
fn map_(token: &ErrorToken, args: &[Shared<Node>], input: Value, env: &Env) -> Outputs {
    let [f] = args else {
        return single(Err(arity(token, "map", args)));
    };
    let (token, f, env) = (Shared::clone(token), Shared::clone(f), env.clone());

    Box::new(std::iter::once_with(move || {
        ops::iterate(&token, input)?
            .into_iter()
            .flat_map(|value| eval(&f, value, &env))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }))
}

fn select(token: &ErrorToken, args: &[Shared<Node>], input: Value, env: &Env) -> Outputs {
    let [f] = args else {
        return single(Err(arity(token, "select", args)));
    };
    let input_ = input.clone();

    Box::new(eval(f, input, env).filter_map(move |result| match result {
        Ok(value) if value.is_truthy() => Some(Ok(input_.clone())),
        Ok(_) => None,
        Err(err) => Some(Err(err)),
    }))
}

fn limit(token: &ErrorToken, args: &[Shared<Node>], input: Value, env: &Env) -> Outputs {
    let [n, f] = args else {
        return single(Err(arity(token, "limit", args)));
    };
    let (token, f, env_, input_) = (Shared::clone(token), Shared::clone(f), env.clone(), input.clone());

    then(eval(n, input, env), move |n| match n {
        Value::Number(n) if n.to_int() > 0 => {
            Box::new(eval(&f, input_.clone(), &env_).take(n.to_int() as usize))
        }
        Value::Number(_) => Box::new(empty()),
        other => single(Err(invalid(
            &token,
            &format!("Invalid limit {}, expected a number", other.describe()),
        ))),
    })
}

/// `range(upto)` and `range(from; upto)`, counting up by one.
fn range(token: &ErrorToken, args: &[Shared<Node>], input: Value, env: &Env) -> Outputs {
    let token = Shared::clone(token);
    let args: Rc<[Shared<Node>]> = args.iter().cloned().collect();

    Box::new(
        eval_args(args, 0, ArgValues::new(), input, env.clone()).flat_map(move |bound| {
            match bound.as_ref().map(|bound| bound.as_slice()) {
                Ok([Value::Number(upto)]) => count(Number::from(0), *upto),
                Ok([Value::Number(from), Value::Number(upto)]) => count(*from, *upto),
                Ok(_) => single(Err(invalid(&token, "Range bounds must be numeric"))),
                Err(err) => single(Err(err.clone())),
            }
        }),
    )
}

fn count(from: Number, upto: Number) -> Outputs {
    if from.is_nan() || upto.is_nan() {
        return Box::new(empty());
    }

    Box::new(
        successors(Some(from), |n| Some(*n + Number::from(1)))
            .take_while(move |n| *n < upto)
            .map(|n| Ok(Value::Number(n))),
    )
}
