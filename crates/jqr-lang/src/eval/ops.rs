use crate::ast::node::BinaryOp;
use crate::lexer::token::Token;
use crate::number::Number;
use crate::value::Map;
use crate::{Shared, Value};

use super::error::RuntimeError;

#[inline(always)]
fn invalid_operands(token: &Shared<Token>, lhs: &Value, rhs: &Value, verb: &'static str) -> RuntimeError {
    RuntimeError::InvalidOperands(Shared::clone(token), lhs.describe(), rhs.describe(), verb)
}

pub fn binary(token: &Shared<Token>, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Add => add(token, lhs, rhs),
        BinaryOp::Sub => sub(token, lhs, rhs),
        BinaryOp::Mul => mul(token, lhs, rhs),
        BinaryOp::Div => div(token, lhs, rhs),
        BinaryOp::Mod => rem(token, lhs, rhs),
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt => Ok(Value::Bool(lhs < rhs)),
        BinaryOp::Lte => Ok(Value::Bool(lhs <= rhs)),
        BinaryOp::Gt => Ok(Value::Bool(lhs > rhs)),
        BinaryOp::Gte => Ok(Value::Bool(lhs >= rhs)),
    }
}

pub fn add(token: &Shared<Token>, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Null, rhs) => Ok(rhs),
        (lhs, Value::Null) => Ok(lhs),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
        (Value::String(mut a), Value::String(b)) => {
            a.push_str(&b);
            Ok(Value::String(a))
        }
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Ok(Value::Array(a))
        }
        (Value::Object(mut a), Value::Object(b)) => {
            a.extend(b);
            Ok(Value::Object(a))
        }
        (lhs, rhs) => Err(invalid_operands(token, &lhs, &rhs, "added")),
    }
}

fn sub(token: &Shared<Token>, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),
        (Value::Array(a), Value::Array(b)) => Ok(Value::Array(
            a.into_iter().filter(|v| !b.contains(v)).collect(),
        )),
        (lhs, rhs) => Err(invalid_operands(token, &lhs, &rhs, "subtracted")),
    }
}

fn mul(token: &Shared<Token>, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            repeat(token, &s, n)
        }
        (Value::Object(a), Value::Object(b)) => Ok(Value::Object(deep_merge(a, b))),
        (lhs, rhs) => Err(invalid_operands(token, &lhs, &rhs, "multiplied")),
    }
}

fn div(token: &Shared<Token>, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) if b.is_zero() => Err(RuntimeError::ZeroDivision(
            Shared::clone(token),
            Value::Number(a).describe(),
            Value::Number(b).describe(),
        )),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a / b)),
        (Value::String(s), Value::String(sep)) => Ok(split(&s, &sep)),
        (lhs, rhs) => Err(invalid_operands(token, &lhs, &rhs, "divided")),
    }
}

fn rem(token: &Shared<Token>, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) if b.to_int() == 0 => Err(RuntimeError::ZeroDivision(
            Shared::clone(token),
            Value::Number(a).describe(),
            Value::Number(b).describe(),
        )),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a % b)),
        (lhs, rhs) => Err(invalid_operands(token, &lhs, &rhs, "divided")),
    }
}

pub fn negate(token: &Shared<Token>, value: Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Number(n) => Ok(Value::Number(-n)),
        other => Err(RuntimeError::CannotNegate(Shared::clone(token), other.describe())),
    }
}

/// Repeats `s`; a non-positive count yields `null`.
/// Longest string, in bytes, that `string * number` may build.
const MAX_REPEAT_LEN: usize = 1 << 26;

fn repeat(token: &Shared<Token>, s: &str, n: Number) -> Result<Value, RuntimeError> {
    let count = n.to_int();
    if count <= 0 {
        return Ok(Value::Null);
    }

    match s.len().checked_mul(count as usize) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(Value::String(s.repeat(count as usize))),
        _ => Err(RuntimeError::InvalidArgument(
            Shared::clone(token),
            "Repeat string result too long".to_string(),
        )),
    }
}

pub fn split(s: &str, sep: &str) -> Value {
    if s.is_empty() {
        return Value::Array(Vec::new());
    }

    if sep.is_empty() {
        return s.chars().map(|c| Value::String(c.to_string())).collect();
    }

    s.split(sep).map(Value::from).collect()
}

fn deep_merge(mut lhs: Map, rhs: Map) -> Map {
    for (key, value) in rhs {
        let merged = match (lhs.get_mut(&key), value) {
            (Some(Value::Object(a)), Value::Object(b)) => {
                Value::Object(deep_merge(std::mem::take(a), b))
            }
            (_, value) => value,
        };
        lhs.insert(key, merged);
    }
    lhs
}

pub fn index(token: &Shared<Token>, target: &Value, key: &Value) -> Result<Value, RuntimeError> {
    match (target, key) {
        (Value::Object(map), Value::String(key)) => Ok(map.get(key).cloned().unwrap_or_default()),
        (Value::Array(values), Value::Number(n)) => Ok(array_index(values, *n)
            .and_then(|i| values.get(i))
            .cloned()
            .unwrap_or_default()),
        (Value::Null, Value::String(_) | Value::Number(_) | Value::Null) => Ok(Value::Null),
        (target, key) => {
            let key = match key {
                Value::String(_) => format!("string {}", key),
                other => other.type_name().to_string(),
            };
            Err(RuntimeError::CannotIndex(Shared::clone(token), target.type_name(), key))
        }
    }
}

/// Resolves a possibly negative, possibly fractional index against `values`.
fn array_index(values: &[Value], n: Number) -> Option<usize> {
    let i = n.value().floor();
    let i = if i < 0.0 { i + values.len() as f64 } else { i };
    if i < 0.0 { None } else { Some(i as usize) }
}

pub fn slice(token: &Shared<Token>, target: &Value, from: &Value, to: &Value) -> Result<Value, RuntimeError> {
    let bound = |value: &Value| match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(Some(n.value())),
        _ => Err(RuntimeError::InvalidArgument(
            Shared::clone(token),
            "Start and end indices of an array slice must be numbers".to_string(),
        )),
    };
    let (from, to) = (bound(from)?, bound(to)?);

    match target {
        Value::Null => Ok(Value::Null),
        Value::Array(values) => {
            let (start, end) = slice_bounds(values.len(), from, to);
            Ok(Value::Array(values[start..end].to_vec()))
        }
        Value::String(s) => {
            let (start, end) = slice_bounds(s.chars().count(), from, to);
            Ok(Value::String(s.chars().skip(start).take(end - start).collect()))
        }
        other => Err(RuntimeError::CannotIndex(
            Shared::clone(token),
            other.type_name(),
            "object".to_string(),
        )),
    }
}

/// Clamps slice bounds into `0..=len`, with `start <= end`.
fn slice_bounds(len: usize, from: Option<f64>, to: Option<f64>) -> (usize, usize) {
    let len_f = len as f64;
    let clamp = |i: f64| {
        let i = if i < 0.0 { i + len_f } else { i };
        i.clamp(0.0, len_f) as usize
    };

    let start = from.map(|i| clamp(i.floor())).unwrap_or(0);
    let end = to.map(|i| clamp(i.ceil())).unwrap_or(len);
    (start, end.max(start))
}

pub fn iterate(token: &Shared<Token>, value: Value) -> Result<Vec<Value>, RuntimeError> {
    match value {
        Value::Array(values) => Ok(values),
        Value::Object(map) => Ok(map.into_values().collect()),
        other => Err(RuntimeError::CannotIterate(Shared::clone(token), other.describe())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token::TokenKind;
    use crate::range::Range;
    use rstest::{fixture, rstest};

    #[fixture]
    fn token() -> Shared<Token> {
        Shared::new(Token {
            range: Range::default(),
            kind: TokenKind::Plus,
        })
    }

    fn json(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[rstest]
    #[case::numbers(BinaryOp::Add, "1", "2", "3")]
    #[case::null_identity(BinaryOp::Add, "null", "\"a\"", "\"a\"")]
    #[case::strings(BinaryOp::Add, "\"Dragon\"", "\"‽\"", "\"Dragon‽\"")]
    #[case::arrays(BinaryOp::Add, "[1]", "[2]", "[1,2]")]
    #[case::objects(BinaryOp::Add, "{\"a\":1,\"b\":1}", "{\"b\":2}", "{\"a\":1,\"b\":2}")]
    #[case::array_difference(BinaryOp::Sub, "[1,2,3,2]", "[2]", "[1,3]")]
    #[case::string_repeat(BinaryOp::Mul, "\"ab\"", "2", "\"abab\"")]
    #[case::string_repeat_zero(BinaryOp::Mul, "\"ab\"", "0", "null")]
    #[case::deep_merge(BinaryOp::Mul, "{\"a\":{\"b\":1}}", "{\"a\":{\"c\":2}}", "{\"a\":{\"b\":1,\"c\":2}}")]
    #[case::division(BinaryOp::Div, "1", "4", "0.25")]
    #[case::string_split(BinaryOp::Div, "\"a,b\"", "\",\"", "[\"a\",\"b\"]")]
    #[case::remainder(BinaryOp::Mod, "7", "3", "1")]
    #[case::equal_objects(BinaryOp::Eq, "{\"a\":1,\"b\":2}", "{\"b\":2,\"a\":1}", "true")]
    #[case::ordering(BinaryOp::Lt, "null", "false", "true")]
    #[case::string_ordering(BinaryOp::Gte, "\"b\"", "\"a\"", "true")]
    fn test_binary(#[case] op: BinaryOp, #[case] lhs: &str, #[case] rhs: &str, #[case] expected: &str, token: Shared<Token>) {
        assert_eq!(binary(&token, op, json(lhs), json(rhs)), Ok(json(expected)));
    }

    #[rstest]
    #[case::add(BinaryOp::Add, "1", "\"a\"", "number (1) and string (\"a\") cannot be added")]
    #[case::sub(BinaryOp::Sub, "{}", "1", "object ({}) and number (1) cannot be subtracted")]
    #[case::zero_division(BinaryOp::Div, "1", "0", "number (1) and number (0) cannot be divided because the divisor is zero")]
    #[case::repeat_too_long(BinaryOp::Mul, "\"ab\"", "1e12", "Repeat string result too long")]
    #[case::zero_remainder(BinaryOp::Mod, "1", "0.5", "number (1) and number (0.5) cannot be divided because the divisor is zero")]
    fn test_binary_error(#[case] op: BinaryOp, #[case] lhs: &str, #[case] rhs: &str, #[case] expected: &str, token: Shared<Token>) {
        assert_eq!(binary(&token, op, json(lhs), json(rhs)).unwrap_err().to_string(), expected);
    }

    #[rstest]
    #[case::field("{\"x\":1}", "\"x\"", Ok("1"))]
    #[case::missing_field("{}", "\"x\"", Ok("null"))]
    #[case::null("null", "\"x\"", Ok("null"))]
    #[case::element("[1,2,3]", "1", Ok("2"))]
    #[case::negative("[1,2,3]", "-1", Ok("3"))]
    #[case::out_of_range("[1,2,3]", "5", Ok("null"))]
    #[case::fractional("[1,2,3]", "1.7", Ok("2"))]
    #[case::number_with_string("1", "\"x\"", Err("Cannot index number with string \"x\""))]
    #[case::object_with_number("{}", "0", Err("Cannot index object with number"))]
    fn test_index(#[case] target: &str, #[case] key: &str, #[case] expected: Result<&str, &str>, token: Shared<Token>) {
        let actual = index(&token, &json(target), &json(key)).map_err(|e| e.to_string());
        assert_eq!(actual, expected.map(json).map_err(String::from));
    }

    #[rstest]
    #[case::array("[1,2,3,4]", "1", "3", "[2,3]")]
    #[case::open_end("[1,2,3,4]", "2", "null", "[3,4]")]
    #[case::negative("[1,2,3,4]", "-2", "null", "[3,4]")]
    #[case::reversed("[1,2,3,4]", "3", "1", "[]")]
    #[case::string("\"abcdef\"", "1", "3", "\"bc\"")]
    #[case::unicode("\"a‽c\"", "1", "2", "\"‽\"")]
    #[case::null("null", "1", "2", "null")]
    fn test_slice(#[case] target: &str, #[case] from: &str, #[case] to: &str, #[case] expected: &str, token: Shared<Token>) {
        assert_eq!(slice(&token, &json(target), &json(from), &json(to)), Ok(json(expected)));
    }

    #[rstest]
    #[case::array("[1,2]", Ok(vec![Value::from(1), Value::from(2)]))]
    #[case::object("{\"b\":1,\"a\":2}", Ok(vec![Value::from(1), Value::from(2)]))]
    #[case::number("1", Err("Cannot iterate over number (1)".to_string()))]
    fn test_iterate(#[case] value: &str, #[case] expected: Result<Vec<Value>, String>, token: Shared<Token>) {
        assert_eq!(iterate(&token, json(value)).map_err(|e| e.to_string()), expected);
    }

    #[rstest]
    #[case("a,b,c", ",", vec!["a", "b", "c"])]
    #[case("abc", "", vec!["a", "b", "c"])]
    #[case("", ",", vec![])]
    fn test_split(#[case] s: &str, #[case] sep: &str, #[case] expected: Vec<&str>) {
        assert_eq!(split(s, sep), expected.into_iter().map(Value::from).collect());
    }
}
