use std::fmt::{self, Display, Formatter};

use miette::{Diagnostic, LabeledSpan, SourceOffset, SourceSpan};

use crate::{
    ast::error::ParseError,
    eval::error::RuntimeError,
    input::InputError,
    lexer::error::LexerError,
    range::{Position, Range},
};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] RuntimeError),
    #[error(transparent)]
    Input(#[from] InputError),
}

/// The three categories every failure falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The filter source is not a valid program.
    Compile,
    /// Evaluation failed, or produced no output where one was required.
    Runtime,
    /// A document of the text input is not valid JSON.
    InputParse,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Compile => write!(f, "compile error"),
            ErrorKind::Runtime => write!(f, "runtime error"),
            ErrorKind::InputParse => write!(f, "input parse error"),
        }
    }
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Debug)]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The filter source, or the input text for input errors.
    pub source_code: String,
    /// The location in `source_code` for diagnostics.
    pub location: SourceSpan,
    position: Option<Position>,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: InnerError) -> Self {
        let source_code = source_code.into();
        let range = match &cause {
            InnerError::Lexer(err) => Some(err.token().range),
            InnerError::Parse(err) => Some(err.token().range),
            InnerError::Eval(err) => err.token().map(|token| token.range),
            InnerError::Input(err) => {
                let position = err.position();
                Some(Range::new(position, position))
            }
        };

        let location = match range {
            Some(range) => {
                let start = SourceOffset::from_location(
                    &source_code,
                    range.start.line as usize,
                    range.start.column,
                );
                let end = SourceOffset::from_location(
                    &source_code,
                    range.end.line as usize,
                    range.end.column,
                );

                SourceSpan::new(
                    start,
                    std::cmp::max(end.offset().saturating_sub(start.offset()), 1),
                )
            }
            None => SourceSpan::new(SourceOffset::from(0), 0),
        };

        Self {
            cause,
            source_code,
            location,
            position: range.map(|range| range.start),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.cause {
            InnerError::Lexer(_) | InnerError::Parse(_) => ErrorKind::Compile,
            InnerError::Eval(_) => ErrorKind::Runtime,
            InnerError::Input(_) => ErrorKind::InputParse,
        }
    }

    /// 1-based location of the failure, when it has one.
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// The message without location.
    pub fn message(&self) -> String {
        self.cause.to_string()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.kind(), self.position) {
            (ErrorKind::Runtime, _) | (_, None) => write!(f, "{}", self.cause),
            (_, Some(position)) => write!(f, "{} at {}", self.cause, position),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let c = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedToken(_)) => "LexerError::UnexpectedToken",
            InnerError::Lexer(LexerError::InvalidStringLiteral(_)) => {
                "LexerError::InvalidStringLiteral"
            }
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => {
                "ParseError::UnexpectedEOFDetected"
            }
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => {
                "ParseError::ExpectedClosingParen"
            }
            InnerError::Parse(ParseError::ExpectedClosingBracket(_)) => {
                "ParseError::ExpectedClosingBracket"
            }
            InnerError::Parse(ParseError::ExpectedClosingBrace(_)) => {
                "ParseError::ExpectedClosingBrace"
            }
            InnerError::Parse(ParseError::ExpectedKeyword(_, _)) => "ParseError::ExpectedKeyword",
            InnerError::Parse(ParseError::ExpectedVariable(_)) => "ParseError::ExpectedVariable",
            InnerError::Parse(ParseError::NotDefined(_, _)) => "ParseError::NotDefined",
            InnerError::Parse(ParseError::UndefinedVariable(_, _)) => {
                "ParseError::UndefinedVariable"
            }
            InnerError::Parse(ParseError::NestingTooDeep(_)) => "ParseError::NestingTooDeep",
            InnerError::Eval(RuntimeError::UserDefined(_, _)) => "RuntimeError::UserDefined",
            InnerError::Eval(RuntimeError::CannotIndex(_, _, _)) => "RuntimeError::CannotIndex",
            InnerError::Eval(RuntimeError::CannotIterate(_, _)) => "RuntimeError::CannotIterate",
            InnerError::Eval(RuntimeError::InvalidOperands(_, _, _, _)) => {
                "RuntimeError::InvalidOperands"
            }
            InnerError::Eval(RuntimeError::ZeroDivision(_, _, _)) => "RuntimeError::ZeroDivision",
            InnerError::Eval(RuntimeError::CannotNegate(_, _)) => "RuntimeError::CannotNegate",
            InnerError::Eval(RuntimeError::InvalidObjectKey(_, _)) => {
                "RuntimeError::InvalidObjectKey"
            }
            InnerError::Eval(RuntimeError::InvalidRegularExpression(_, _, _)) => {
                "RuntimeError::InvalidRegularExpression"
            }
            InnerError::Eval(RuntimeError::InvalidArgument(_, _)) => {
                "RuntimeError::InvalidArgument"
            }
            InnerError::Eval(RuntimeError::NoOutput) => "RuntimeError::NoOutput",
            InnerError::Eval(RuntimeError::CannotSerialize(_)) => "RuntimeError::CannotSerialize",
            InnerError::Input(InputError::InvalidJson(_, _)) => "InputError::InvalidJson",
        };

        Some(Box::new(c))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Lexer(LexerError::UnexpectedToken(_)) => {
                Some("Check for unexpected or misplaced characters in the filter.".to_string())
            }
            InnerError::Lexer(LexerError::InvalidStringLiteral(_)) => Some(
                "Strings must be closed with `\"` and may only contain valid escapes.".to_string(),
            ),
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => Some(
                "The filter ended unexpectedly. Check for incomplete expressions.".to_string(),
            ),
            InnerError::Parse(
                ParseError::ExpectedClosingParen(_)
                | ParseError::ExpectedClosingBracket(_)
                | ParseError::ExpectedClosingBrace(_),
            ) => Some("Check that every opening delimiter has a matching closing one.".to_string()),
            InnerError::Parse(ParseError::NotDefined(_, name)) => {
                Some(format!("`{name}` is not a builtin. Check its name and number of arguments."))
            }
            InnerError::Parse(ParseError::UndefinedVariable(_, name)) => Some(format!(
                "Bind `${name}` with `... as ${name} | ...` or pass it as a named argument."
            )),
            InnerError::Parse(ParseError::NestingTooDeep(_)) => Some(
                "Split the filter into smaller pieces or bind intermediate results to variables."
                    .to_string(),
            ),
            InnerError::Parse(_) => Some("Check for syntax errors or misplaced tokens.".to_string()),
            InnerError::Eval(RuntimeError::CannotIndex(_, _, _)) => Some(
                "Objects are indexed with strings, arrays with numbers. Use `?` to ignore the error."
                    .to_string(),
            ),
            InnerError::Eval(RuntimeError::CannotIterate(_, _)) => {
                Some("Only arrays and objects can be iterated with `.[]`.".to_string())
            }
            InnerError::Eval(RuntimeError::ZeroDivision(_, _, _)) => {
                Some("Check the divisor before dividing.".to_string())
            }
            InnerError::Eval(RuntimeError::InvalidRegularExpression(_, _, _)) => {
                Some("Check the regular expression syntax and flags.".to_string())
            }
            InnerError::Eval(RuntimeError::NoOutput) => {
                Some("The filter produced no output for the input.".to_string())
            }
            InnerError::Eval(_) => None,
            InnerError::Input(_) => {
                Some("Input must be whitespace separated JSON documents.".to_string())
            }
        };

        msg.map(|m| Box::new(m) as Box<dyn Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        self.position?;

        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.cause.to_string()),
            self.location,
        ))))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Shared, Value,
        lexer::token::{Token, TokenKind},
    };
    use rstest::rstest;

    fn token(line: u32, start: usize, end: usize) -> Token {
        Token {
            range: Range::new(Position::new(line, start), Position::new(line, end)),
            kind: TokenKind::Invalid('!'),
        }
    }

    #[rstest]
    #[case::lexer(
        InnerError::Lexer(LexerError::UnexpectedToken(token(1, 3, 4))),
        ErrorKind::Compile,
        Some(Position::new(1, 3)),
        "Unexpected token `!` at line 1, column 3"
    )]
    #[case::runtime(
        InnerError::Eval(RuntimeError::CannotIndex(
            Shared::new(token(1, 1, 3)),
            "number",
            "string \"x\"".to_string()
        )),
        ErrorKind::Runtime,
        Some(Position::new(1, 1)),
        "Cannot index number with string \"x\""
    )]
    #[case::no_output(
        InnerError::Eval(RuntimeError::NoOutput),
        ErrorKind::Runtime,
        None,
        "No output produced"
    )]
    #[case::input(
        InnerError::Input(InputError::InvalidJson(Position::new(2, 1), "expected value".to_string())),
        ErrorKind::InputParse,
        Some(Position::new(2, 1)),
        "expected value at line 2, column 1"
    )]
    fn test_from_error(
        #[case] cause: InnerError,
        #[case] kind: ErrorKind,
        #[case] position: Option<Position>,
        #[case] expected: &str,
    ) {
        let err = Error::from_error("1 !\n!", cause);

        assert_eq!(err.kind(), kind);
        assert_eq!(err.position(), position);
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_location_covers_token() {
        let err = Error::from_error(
            ".foo | bar",
            InnerError::Parse(ParseError::NotDefined(token(1, 8, 11), "bar/0".to_string())),
        );

        assert_eq!(err.location, SourceSpan::new(SourceOffset::from(7), 3));
    }

    #[test]
    fn test_diagnostic() {
        let err = Error::from_error(
            "error(1)",
            InnerError::Eval(RuntimeError::UserDefined(
                Shared::new(token(1, 1, 6)),
                Value::from(1),
            )),
        );

        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("RuntimeError::UserDefined".to_string())
        );
        assert_eq!(err.labels().map(|labels| labels.count()), Some(1));
        assert!(err.source_code().is_some());
    }

    #[test]
    fn test_no_label_without_position() {
        let err = Error::from_error(".[]", InnerError::Eval(RuntimeError::NoOutput));
        assert!(err.labels().is_none());
        assert!(err.help().is_some());
    }
}
