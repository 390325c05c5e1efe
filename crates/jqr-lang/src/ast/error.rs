use smol_str::SmolStr;
use thiserror::Error;

use crate::lexer::token::Token;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token `{0}`")]
    UnexpectedToken(Token),
    #[error("Unexpected EOF detected")]
    UnexpectedEOFDetected(Token),
    #[error("Expected a closing parenthesis `)` but got `{}` delimiter", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedClosingParen(Token),
    #[error("Expected a closing bracket `]` but got `{}` delimiter", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedClosingBracket(Token),
    #[error("Expected a closing brace `}}` but got `{}` delimiter", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedClosingBrace(Token),
    #[error("Expected `{}` but got `{}`", .1, if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedKeyword(Token, &'static str),
    #[error("Expected a variable name after `as` but got `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    ExpectedVariable(Token),
    #[error("{1} is not defined")]
    NotDefined(Token, String),
    #[error("${1} is not defined")]
    UndefinedVariable(Token, SmolStr),
    #[error("Expression is nested too deeply at `{}`", if .0.is_eof() { "EOF".to_string() } else { .0.to_string() })]
    NestingTooDeep(Token),
}

impl ParseError {
    #[cold]
    pub fn token(&self) -> &Token {
        match self {
            ParseError::UnexpectedToken(token) => token,
            ParseError::UnexpectedEOFDetected(token) => token,
            ParseError::ExpectedClosingParen(token) => token,
            ParseError::ExpectedClosingBracket(token) => token,
            ParseError::ExpectedClosingBrace(token) => token,
            ParseError::ExpectedKeyword(token, _) => token,
            ParseError::ExpectedVariable(token) => token,
            ParseError::NotDefined(token, _) => token,
            ParseError::UndefinedVariable(token, _) => token,
            ParseError::NestingTooDeep(token) => token,
        }
    }
}
