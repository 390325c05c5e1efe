use thiserror::Error;

use super::token::Token;

#[derive(Error, Debug, PartialEq)]
pub enum LexerError {
    #[error("Unexpected token `{0}`")]
    UnexpectedToken(Token),
    #[error("Invalid string literal")]
    InvalidStringLiteral(Token),
}

impl LexerError {
    #[cold]
    pub fn token(&self) -> &Token {
        match self {
            LexerError::UnexpectedToken(token) => token,
            LexerError::InvalidStringLiteral(token) => token,
        }
    }
}
