use thiserror::Error;
use tracing::{debug, trace};

use crate::range::Position;
use crate::{Shared, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("{1}")]
    InvalidJson(Position, String),
}

impl InputError {
    #[cold]
    pub fn position(&self) -> Position {
        match self {
            InputError::InvalidJson(position, _) => *position,
        }
    }

    /// Converts a decoding error for the document starting at `offset`
    /// into one positioned within the whole `text`.
    fn from_json(text: &str, offset: usize, err: &serde_json::Error) -> Self {
        let message = err.to_string();
        let suffix = format!(" at line {} column {}", err.line(), err.column());
        let message = message
            .strip_suffix(&suffix)
            .unwrap_or(&message)
            .to_string();

        InputError::InvalidJson(position_at(text, offset, err.line(), err.column()), message)
    }
}

/// Where the inputs of one execution come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// A single, already decoded value.
    Value(Value),
    /// Raw text holding any number of whitespace separated JSON documents.
    Text(String),
}

impl Input {
    pub fn mode(&self) -> &'static str {
        match self {
            Input::Value(_) => "value",
            Input::Text(_) => "text",
        }
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Value(value)
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

/// Lazily decodes whitespace separated JSON documents, stopping after the first
/// malformed one.
#[derive(Debug)]
pub struct Documents {
    text: Shared<str>,
    offset: usize,
    failed: bool,
}

impl Documents {
    pub fn new(text: impl Into<Shared<str>>) -> Self {
        Self {
            text: text.into(),
            offset: 0,
            failed: false,
        }
    }
}

impl Iterator for Documents {
    type Item = Result<Value, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let rest = &self.text[self.offset..];
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
        let document = stream.next()?;
        let consumed = stream.byte_offset();

        match document {
            Ok(value) => {
                trace!(offset = self.offset, value_type = value.type_name(), "decoded input document");
                self.offset += consumed;
                Some(Ok(value))
            }
            Err(err) => {
                self.failed = true;
                let err = InputError::from_json(&self.text, self.offset, &err);
                debug!(error = %err, position = %err.position(), "failed to decode input document");
                Some(Err(err))
            }
        }
    }
}

/// Maps the 1-based `line`/`column` reported for `text[offset..]` onto `text`.
/// Reported columns count bytes, the returned ones count characters.
fn position_at(text: &str, offset: usize, line: usize, column: usize) -> Position {
    let line_start = text[offset..]
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum::<usize>();
    let mut at = (offset + line_start + column.saturating_sub(1)).min(text.len());
    while !text.is_char_boundary(at) {
        at -= 1;
    }

    let before = &text[..at];
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;

    Position::new(line as u32, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn decode(text: &str) -> Vec<Result<Value, InputError>> {
        Documents::new(text).collect()
    }

    #[rstest]
    #[case::single("42", vec![Value::from(42)])]
    #[case::newlines("1\n2\n3", vec![Value::from(1), Value::from(2), Value::from(3)])]
    #[case::spaces(" \"a\"  [1] ", vec![Value::from("a"), Value::from(vec![Value::from(1)])])]
    #[case::adjacent_containers("[1][2]", vec![Value::from(vec![Value::from(1)]), Value::from(vec![Value::from(2)])])]
    #[case::unicode("\"‽\"", vec![Value::from("‽")])]
    #[case::empty("", vec![])]
    #[case::whitespace_only(" \n ", vec![])]
    fn test_documents(#[case] text: &str, #[case] expected: Vec<Value>) {
        assert_eq!(decode(text), expected.into_iter().map(Ok).collect::<Vec<_>>());
    }

    #[rstest]
    #[case::invalid_token("!!", 1, 1)]
    #[case::third_document("1\n2\n!", 3, 1)]
    #[case::same_line("1 2 !", 1, 5)]
    #[case::inside_document("[1,\n  !]", 2, 3)]
    #[case::non_ascii("[\"‽‽\", !]", 1, 8)]
    #[case::non_ascii_earlier_document("\"‽‽\" !", 1, 6)]
    #[case::non_ascii_earlier_line("\"‽\"\n[\"日本\", !]", 2, 8)]
    fn test_invalid_document(#[case] text: &str, #[case] line: u32, #[case] column: usize) {
        let err = decode(text).into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.position(), Position::new(line, column));
    }

    #[rstest]
    #[case::shortest_round_trip("-1.8444444444444446", -1.8444444444444446)]
    #[case::many_digits("0.30000000000000004", 0.30000000000000004)]
    #[case::exponent("1.7976931348623157e308", f64::MAX)]
    fn test_numbers_decode_exactly(#[case] text: &str, #[case] expected: f64) {
        assert_eq!(decode(text), vec![Ok(Value::from(expected))]);
    }

    #[test]
    fn test_stops_after_error() {
        let mut documents = Documents::new("1 ! 2");

        assert_eq!(documents.next(), Some(Ok(Value::from(1))));
        assert!(matches!(documents.next(), Some(Err(InputError::InvalidJson(..)))));
        assert_eq!(documents.next(), None);
    }

    #[test]
    fn test_number_out_of_range() {
        let err = decode("1e1000").into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.to_string(), "number out of range");
    }

    #[test]
    fn test_error_message_has_no_location_suffix() {
        let err = decode("!!").into_iter().find_map(Result::err).unwrap();
        assert_eq!(err.to_string(), "expected value");
    }

    #[rstest]
    #[case::value(Input::from(Value::from("42")), "value")]
    #[case::text(Input::from("42".to_string()), "text")]
    fn test_mode(#[case] input: Input, #[case] expected: &str) {
        assert_eq!(input.mode(), expected);
    }
}
