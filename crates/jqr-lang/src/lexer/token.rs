use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::{number::Number, range::Range};

#[derive(PartialEq, Debug, Clone)]
pub struct Token {
    pub range: Range,
    pub kind: TokenKind,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum TokenKind {
    Alternative,
    And,
    As,
    Asterisk,
    BoolLiteral(bool),
    Catch,
    Colon,
    Comma,
    Dot,
    DotDot,
    Elif,
    Else,
    End,
    Eof,
    EqEq,
    Field(SmolStr),
    Gt,
    Gte,
    Ident(SmolStr),
    If,
    /// A character no token starts with.
    Invalid(char),
    LBrace,
    LBracket,
    LParen,
    Lt,
    Lte,
    Minus,
    NeEq,
    Null,
    NumberLiteral(Number),
    Or,
    Percent,
    Pipe,
    Plus,
    Question,
    RBrace,
    RBracket,
    RParen,
    SemiColon,
    Slash,
    StringLiteral(String),
    Then,
    Try,
    Variable(SmolStr),
}

impl TokenKind {
    /// Maps a bare word to its keyword kind, falling back to an identifier.
    pub fn from_word(word: &str) -> TokenKind {
        match word {
            "and" => TokenKind::And,
            "as" => TokenKind::As,
            "catch" => TokenKind::Catch,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "end" => TokenKind::End,
            "false" => TokenKind::BoolLiteral(false),
            "if" => TokenKind::If,
            "null" => TokenKind::Null,
            "or" => TokenKind::Or,
            "then" => TokenKind::Then,
            "true" => TokenKind::BoolLiteral(true),
            "try" => TokenKind::Try,
            _ => TokenKind::Ident(SmolStr::new(word)),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            TokenKind::Alternative => write!(f, "//"),
            TokenKind::And => write!(f, "and"),
            TokenKind::As => write!(f, "as"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::BoolLiteral(b) => write!(f, "{}", b),
            TokenKind::Catch => write!(f, "catch"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::DotDot => write!(f, ".."),
            TokenKind::Elif => write!(f, "elif"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::End => write!(f, "end"),
            TokenKind::Eof => write!(f, ""),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::Field(name) => write!(f, ".{}", name),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Gte => write!(f, ">="),
            TokenKind::Ident(ident) => write!(f, "{}", ident),
            TokenKind::If => write!(f, "if"),
            TokenKind::Invalid(c) => write!(f, "{}", c),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::LParen => write!(f, "("),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Lte => write!(f, "<="),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::NeEq => write!(f, "!="),
            TokenKind::Null => write!(f, "null"),
            TokenKind::NumberLiteral(n) => write!(f, "{}", n),
            TokenKind::Or => write!(f, "or"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::SemiColon => write!(f, ";"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::StringLiteral(s) => write!(f, "{:?}", s),
            TokenKind::Then => write!(f, "then"),
            TokenKind::Try => write!(f, "try"),
            TokenKind::Variable(name) => write!(f, "${}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("if", TokenKind::If)]
    #[case("true", TokenKind::BoolLiteral(true))]
    #[case("null", TokenKind::Null)]
    #[case("iffy", TokenKind::Ident(SmolStr::new("iffy")))]
    #[case("test", TokenKind::Ident(SmolStr::new("test")))]
    fn test_from_word(#[case] word: &str, #[case] expected: TokenKind) {
        assert_eq!(TokenKind::from_word(word), expected);
    }

    #[rstest]
    #[case(TokenKind::Field(SmolStr::new("foo")), ".foo")]
    #[case(TokenKind::Variable(SmolStr::new("x")), "$x")]
    #[case(TokenKind::StringLiteral("a\"b".to_string()), "\"a\\\"b\"")]
    #[case(TokenKind::Invalid('!'), "!")]
    fn test_display(#[case] kind: TokenKind, #[case] expected: &str) {
        assert_eq!(kind.to_string(), expected);
    }
}
