pub mod error;
pub mod token;

use error::LexerError;
use nom::Parser;
use nom::bytes::complete::{is_not, take_while_m_n};
use nom::character::complete::{digit0, digit1, multispace1, one_of};
use nom::combinator::opt;
use nom::error::ErrorKind;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, none_of},
    combinator::{map, map_res, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};
use nom_locate::position;
use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::number::Number;
use crate::range::{Position, Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

#[derive(Debug, Default)]
pub struct Lexer;

impl Lexer {
    pub fn new() -> Self {
        Self
    }

    /// Splits `input` into tokens, always terminated by an `Eof` token.
    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, LexerError> {
        match tokens(Span::new(input)) {
            Ok((rest, mut tokens)) if rest.fragment().is_empty() => {
                tokens.push(Token {
                    range: rest.into(),
                    kind: TokenKind::Eof,
                });
                Ok(tokens)
            }
            Ok((rest, _)) => Err(unexpected(rest)),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(unexpected(e.input)),
            Err(nom::Err::Incomplete(_)) => Err(unexpected(Span::new(input))),
        }
    }
}

fn unexpected(rest: Span) -> LexerError {
    let c = rest.fragment().chars().next().unwrap_or_default();
    let start: Position = rest.into();
    let token = Token {
        range: Range::new(start, Position::new(start.line, start.column + 1)),
        kind: TokenKind::Invalid(c),
    };

    if c == '"' {
        LexerError::InvalidStringLiteral(token)
    } else {
        LexerError::UnexpectedToken(token)
    }
}

fn hex4(input: Span) -> IResult<Span, u32> {
    map_res(
        take_while_m_n(4, 4, |c: char| c.is_ascii_hexdigit()),
        |span: Span| u32::from_str_radix(span.fragment(), 16),
    )
    .parse(input)
}

/// `uXXXX`, combining UTF-16 surrogate pairs written as `\ud83d\ude00`.
fn unicode(input: Span) -> IResult<Span, char> {
    let (span, high) = preceded(char('u'), hex4).parse(input)?;
    let (span, code) = if (0xD800..0xDC00).contains(&high) {
        let (span, low) = preceded(tag("\\u"), hex4).parse(span)?;
        if !(0xDC00..0xE000).contains(&low) {
            return Err(nom::Err::Error(nom::error::Error::new(input, ErrorKind::Char)));
        }
        (span, 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
    } else {
        (span, high)
    };

    char::from_u32(code)
        .map(|c| (span, c))
        .ok_or(nom::Err::Error(nom::error::Error::new(input, ErrorKind::Char)))
}

fn comment(input: Span) -> IResult<Span, Span> {
    recognize(pair(char('#'), opt(is_not("\r\n")))).parse(input)
}

fn trivia(input: Span) -> IResult<Span, Vec<Span>> {
    many0(alt((multispace1, comment))).parse(input)
}

define_token_parser!(alternative, "//", TokenKind::Alternative);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(ne_eq, "!=", TokenKind::NeEq);
define_token_parser!(lte, "<=", TokenKind::Lte);
define_token_parser!(gte, ">=", TokenKind::Gte);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(asterisk, "*", TokenKind::Asterisk);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(pipe, "|", TokenKind::Pipe);
define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(colon, ":", TokenKind::Colon);
define_token_parser!(semi_colon, ";", TokenKind::SemiColon);
define_token_parser!(question, "?", TokenKind::Question);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_bracket, "[", TokenKind::LBracket);
define_token_parser!(r_bracket, "]", TokenKind::RBracket);
define_token_parser!(l_brace, "{", TokenKind::LBrace);
define_token_parser!(r_brace, "}", TokenKind::RBrace);
define_token_parser!(dot_dot, "..", TokenKind::DotDot);
define_token_parser!(dot, ".", TokenKind::Dot);

fn operators(input: Span) -> IResult<Span, Token> {
    alt((
        alternative,
        eq_eq,
        ne_eq,
        lte,
        gte,
        lt,
        gt,
        plus,
        minus,
        asterisk,
        slash,
        percent,
    ))
    .parse(input)
}

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((
        pipe, comma, colon, semi_colon, question, l_paren, r_paren, l_bracket, r_bracket, l_brace,
        r_brace,
    ))
    .parse(input)
}

fn word(input: Span) -> IResult<Span, Span> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(word, |span: Span| Token {
        range: span.into(),
        kind: TokenKind::from_word(span.fragment()),
    })
    .parse(input)
}

fn field(input: Span) -> IResult<Span, Token> {
    map(recognize(preceded(char('.'), word)), |span: Span| Token {
        range: span.into(),
        kind: TokenKind::Field(SmolStr::new(&span.fragment()[1..])),
    })
    .parse(input)
}

fn variable(input: Span) -> IResult<Span, Token> {
    map(recognize(preceded(char('$'), word)), |span: Span| Token {
        range: span.into(),
        kind: TokenKind::Variable(SmolStr::new(&span.fragment()[1..])),
    })
    .parse(input)
}

fn dots(input: Span) -> IResult<Span, Token> {
    alt((dot_dot, field, dot)).parse(input)
}

fn number_literal(input: Span) -> IResult<Span, Token> {
    map_res(
        recognize((
            digit1,
            opt((char('.'), digit0)),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        |span: Span| {
            span.fragment().parse::<f64>().map(|n| Token {
                range: span.into(),
                kind: TokenKind::NumberLiteral(Number::new(n)),
            })
        },
    )
    .parse(input)
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, s) = delimited(
        char('"'),
        opt(escaped_transform(
            none_of("\"\\"),
            '\\',
            alt((
                value('\\', char('\\')),
                value('"', char('"')),
                value('/', char('/')),
                value('\u{08}', char('b')),
                value('\u{0C}', char('f')),
                value('\n', char('n')),
                value('\r', char('r')),
                value('\t', char('t')),
                unicode,
            )),
        )),
        char('"'),
    )
    .parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::StringLiteral(s.unwrap_or_default()),
        },
    ))
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((
        operators,
        punctuations,
        dots,
        variable,
        number_literal,
        string_literal,
        ident,
    ))
    .parse(input)
}

fn tokens(input: Span) -> IResult<Span, Vec<Token>> {
    terminated(many0(preceded(trivia, token)), trivia).parse(input)
}
