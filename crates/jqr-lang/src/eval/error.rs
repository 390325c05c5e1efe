use thiserror::Error;

use crate::{Shared, Value, lexer::token::Token};

type ErrorToken = Shared<Token>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("{}", user_message(.1))]
    UserDefined(ErrorToken, Value),
    #[error("Cannot index {1} with {2}")]
    CannotIndex(ErrorToken, &'static str, String),
    #[error("Cannot iterate over {1}")]
    CannotIterate(ErrorToken, String),
    #[error("{1} and {2} cannot be {3}")]
    InvalidOperands(ErrorToken, String, String, &'static str),
    #[error("{1} and {2} cannot be divided because the divisor is zero")]
    ZeroDivision(ErrorToken, String, String),
    #[error("{1} cannot be negated")]
    CannotNegate(ErrorToken, String),
    #[error("Object keys must be strings, got {1}")]
    InvalidObjectKey(ErrorToken, String),
    #[error("{1} is not a valid regex: {2}")]
    InvalidRegularExpression(ErrorToken, String, String),
    #[error("{1}")]
    InvalidArgument(ErrorToken, String),
    #[error("No output produced")]
    NoOutput,
    #[error("Cannot render output as JSON: {0}")]
    CannotSerialize(String),
}

fn user_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => format!("{} (not a string)", other),
    }
}

impl RuntimeError {
    #[cold]
    pub fn token(&self) -> Option<&Token> {
        match self {
            RuntimeError::UserDefined(token, _) => Some(token),
            RuntimeError::CannotIndex(token, _, _) => Some(token),
            RuntimeError::CannotIterate(token, _) => Some(token),
            RuntimeError::InvalidOperands(token, _, _, _) => Some(token),
            RuntimeError::ZeroDivision(token, _, _) => Some(token),
            RuntimeError::CannotNegate(token, _) => Some(token),
            RuntimeError::InvalidObjectKey(token, _) => Some(token),
            RuntimeError::InvalidRegularExpression(token, _, _) => Some(token),
            RuntimeError::InvalidArgument(token, _) => Some(token),
            RuntimeError::NoOutput | RuntimeError::CannotSerialize(_) => None,
        }
    }

    /// The value a `catch` handler receives: the `error(v)` payload or the message.
    pub fn value(&self) -> Value {
        match self {
            RuntimeError::UserDefined(_, value) => value.clone(),
            other => Value::String(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use rstest::rstest;

    fn token() -> ErrorToken {
        Shared::new(Token {
            range: Range::default(),
            kind: crate::lexer::token::TokenKind::Eof,
        })
    }

    #[rstest]
    #[case::string_payload(RuntimeError::UserDefined(token(), Value::from("boom")), "boom")]
    #[case::object_payload(
        RuntimeError::UserDefined(token(), Value::from(vec![Value::from(1)])),
        "[1] (not a string)"
    )]
    #[case::index(
        RuntimeError::CannotIndex(token(), "number", "string \"x\"".to_string()),
        "Cannot index number with string \"x\""
    )]
    #[case::no_output(RuntimeError::NoOutput, "No output produced")]
    fn test_display(#[case] err: RuntimeError, #[case] expected: &str) {
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_value() {
        let payload = Value::from(vec![Value::from(1)]);
        assert_eq!(RuntimeError::UserDefined(token(), payload.clone()).value(), payload);
        assert_eq!(RuntimeError::NoOutput.value(), Value::from("No output produced"));
    }
}
