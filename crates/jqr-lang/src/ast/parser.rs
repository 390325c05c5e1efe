use crate::Shared;
use crate::eval::builtin;
use crate::lexer::token::{Token, TokenKind};
use smallvec::SmallVec;
use smol_str::SmolStr;
use std::iter::Peekable;

use super::error::ParseError;
use super::node::{Args, BinaryOp, Branches, Expr, Literal, Node};
use super::{IdentName, Program};

const COMPARISON_PRECEDENCE: u8 = 3;
/// Evaluation recurses once per level of the tree, so the parser bounds it.
pub const MAX_DEPTH: usize = 256;

pub struct Parser<'a> {
    tokens: Peekable<core::slice::Iter<'a, Shared<Token>>>,
    eof: Shared<Token>,
    /// Variables visible at the current position, innermost last.
    scope: Vec<IdentName>,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(
        tokens: core::slice::Iter<'a, Shared<Token>>,
        globals: impl IntoIterator<Item = IdentName>,
    ) -> Self {
        let eof = tokens
            .as_slice()
            .last()
            .filter(|token| token.is_eof())
            .map(Shared::clone)
            .unwrap_or_else(|| {
                Shared::new(Token {
                    range: Default::default(),
                    kind: TokenKind::Eof,
                })
            });

        Self {
            tokens: tokens.peekable(),
            eof,
            scope: globals.into_iter().collect(),
            depth: 0,
        }
    }

    /// Parses the whole token stream. An empty filter is the identity.
    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let first = self.peek();
        if first.is_eof() {
            return Ok(Node::new(first, Expr::Identity));
        }

        let program = self.parse_pipe()?;
        let token = self.next_token();

        if token.is_eof() {
            Ok(program)
        } else {
            Err(ParseError::UnexpectedToken((*token).clone()))
        }
    }

    #[inline(always)]
    fn next_token(&mut self) -> Shared<Token> {
        self.tokens
            .next()
            .map(Shared::clone)
            .unwrap_or_else(|| Shared::clone(&self.eof))
    }

    #[inline(always)]
    fn peek(&mut self) -> Shared<Token> {
        self.tokens
            .peek()
            .map(|token| Shared::clone(token))
            .unwrap_or_else(|| Shared::clone(&self.eof))
    }

    #[inline(always)]
    fn peek_is(&mut self, kind: &TokenKind) -> bool {
        self.tokens.peek().is_some_and(|token| &token.kind == kind)
    }

    fn expect(&mut self, kind: TokenKind, keyword: &'static str) -> Result<Shared<Token>, ParseError> {
        let token = self.next_token();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(ParseError::ExpectedKeyword((*token).clone(), keyword))
        }
    }

    /// Takes one more level of nesting, failing once [`MAX_DEPTH`] is reached.
    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::NestingTooDeep((*self.peek()).clone()));
        }

        self.depth += 1;
        Ok(())
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, ParseError>) -> Result<T, ParseError> {
        self.descend()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn expect_closing_bracket(&mut self) -> Result<(), ParseError> {
        let token = self.next_token();
        match token.kind {
            TokenKind::RBracket => Ok(()),
            _ => Err(ParseError::ExpectedClosingBracket((*token).clone())),
        }
    }

    fn expect_closing_paren(&mut self) -> Result<(), ParseError> {
        let token = self.next_token();
        match token.kind {
            TokenKind::RParen => Ok(()),
            _ => Err(ParseError::ExpectedClosingParen((*token).clone())),
        }
    }

    fn parse_pipe(&mut self) -> Result<Shared<Node>, ParseError> {
        self.nested(|parser| {
            let lhs = parser.parse_comma()?;

            if parser.peek_is(&TokenKind::Pipe) {
                let token = parser.next_token();
                let rhs = parser.parse_pipe()?;
                return Ok(Node::new(token, Expr::Pipe(lhs, rhs)));
            }

            Ok(lhs)
        })
    }

    fn parse_comma(&mut self) -> Result<Shared<Node>, ParseError> {
        let depth = self.depth;
        let mut lhs = self.parse_alternative()?;

        while self.peek_is(&TokenKind::Comma) {
            let token = self.next_token();
            self.descend()?;
            let rhs = self.parse_alternative()?;
            lhs = Node::new(token, Expr::Comma(lhs, rhs));
        }

        self.depth = depth;
        Ok(lhs)
    }

    fn parse_alternative(&mut self) -> Result<Shared<Node>, ParseError> {
        let lhs = self.parse_unary().and_then(|lhs| self.parse_binary_op(1, lhs))?;

        if self.peek_is(&TokenKind::Alternative) {
            let token = self.next_token();
            let rhs = self.nested(Self::parse_alternative)?;
            return Ok(Node::new(token, Expr::Alternative(lhs, rhs)));
        }

        Ok(lhs)
    }

    #[inline(always)]
    fn binary_op_precedence(kind: &TokenKind) -> u8 {
        match kind {
            TokenKind::Or => 1,
            TokenKind::And => 2,
            TokenKind::EqEq
            | TokenKind::NeEq
            | TokenKind::Gt
            | TokenKind::Gte
            | TokenKind::Lt
            | TokenKind::Lte => COMPARISON_PRECEDENCE,
            TokenKind::Plus | TokenKind::Minus => 4,
            TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => 5,
            _ => 0,
        }
    }

    #[inline(always)]
    fn binary_op(kind: &TokenKind) -> BinaryOp {
        match kind {
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Asterisk => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Mod,
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NeEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Lte => BinaryOp::Lte,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Gte => BinaryOp::Gte,
            _ => unreachable!(),
        }
    }

    fn binary_node(token: Shared<Token>, lhs: Shared<Node>, rhs: Shared<Node>) -> Shared<Node> {
        let expr = match &token.kind {
            TokenKind::Or => Expr::Or(lhs, rhs),
            TokenKind::And => Expr::And(lhs, rhs),
            kind => Expr::BinaryOp(Self::binary_op(kind), lhs, rhs),
        };

        Node::new(token, expr)
    }

    /// Precedence climbing over the binary operators. Comparisons do not chain.
    fn parse_binary_op(&mut self, min_prec: u8, mut lhs: Shared<Node>) -> Result<Shared<Node>, ParseError> {
        let depth = self.depth;
        let mut compared = false;

        loop {
            let operator = self.peek();
            let prec = Self::binary_op_precedence(&operator.kind);

            if prec == 0 || prec < min_prec {
                break;
            }

            if prec == COMPARISON_PRECEDENCE && compared {
                return Err(ParseError::UnexpectedToken((*operator).clone()));
            }

            self.next_token();
            self.descend()?;
            let mut rhs = self.parse_unary()?;

            loop {
                let next_prec = Self::binary_op_precedence(&self.peek().kind);
                if next_prec > prec {
                    rhs = self.parse_binary_op(next_prec, rhs)?;
                } else {
                    break;
                }
            }

            compared = prec == COMPARISON_PRECEDENCE;
            lhs = Self::binary_node(operator, lhs, rhs);
        }

        self.depth = depth;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Shared<Node>, ParseError> {
        if self.peek_is(&TokenKind::Minus) {
            let token = self.next_token();
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Node::new(token, Expr::Negate(operand)));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Shared<Node>, ParseError> {
        let depth = self.depth;
        let mut term = self.parse_primary()?;

        loop {
            let token = self.peek();
            if Self::is_postfix(&token.kind) {
                self.descend()?;
            }

            term = match &token.kind {
                TokenKind::Field(name) => {
                    self.next_token();
                    let key = Self::string_node(&token, name);
                    Node::new(token, Expr::Index(term, key))
                }
                TokenKind::Dot => {
                    self.next_token();
                    let next = self.peek();
                    match &next.kind {
                        TokenKind::StringLiteral(s) => {
                            self.next_token();
                            let key = Self::string_node(&next, s);
                            Node::new(token, Expr::Index(term, key))
                        }
                        TokenKind::LBracket => {
                            self.next_token();
                            self.parse_bracket_suffix(term, next)?
                        }
                        _ => return Err(ParseError::UnexpectedToken((*next).clone())),
                    }
                }
                TokenKind::LBracket => {
                    self.next_token();
                    self.parse_bracket_suffix(term, token)?
                }
                TokenKind::Question => {
                    self.next_token();
                    Node::new(token, Expr::Try(term, None))
                }
                TokenKind::As => {
                    self.depth = depth;
                    return self.parse_bind(term);
                }
                _ => break,
            };
        }

        self.depth = depth;
        Ok(term)
    }

    #[inline(always)]
    fn is_postfix(kind: &TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Field(_) | TokenKind::Dot | TokenKind::LBracket | TokenKind::Question
        )
    }

    /// Parses what follows `[` after a term: `[]`, `[E]`, `[E:]`, `[:E]` or `[E:E]`.
    fn parse_bracket_suffix(&mut self, term: Shared<Node>, bracket: Shared<Token>) -> Result<Shared<Node>, ParseError> {
        if self.peek_is(&TokenKind::RBracket) {
            self.next_token();
            return Ok(Node::new(bracket, Expr::Iterate(term)));
        }

        if self.peek_is(&TokenKind::Colon) {
            self.next_token();
            let to = self.parse_pipe()?;
            self.expect_closing_bracket()?;
            return Ok(Node::new(bracket, Expr::Slice(term, None, Some(to))));
        }

        let index = self.parse_pipe()?;

        if self.peek_is(&TokenKind::Colon) {
            self.next_token();
            if self.peek_is(&TokenKind::RBracket) {
                self.next_token();
                return Ok(Node::new(bracket, Expr::Slice(term, Some(index), None)));
            }

            let to = self.parse_pipe()?;
            self.expect_closing_bracket()?;
            return Ok(Node::new(bracket, Expr::Slice(term, Some(index), Some(to))));
        }

        self.expect_closing_bracket()?;
        Ok(Node::new(bracket, Expr::Index(term, index)))
    }

    fn parse_bind(&mut self, source: Shared<Node>) -> Result<Shared<Node>, ParseError> {
        let as_token = self.next_token();
        let variable = self.next_token();
        let name = match &variable.kind {
            TokenKind::Variable(name) => name.clone(),
            _ => return Err(ParseError::ExpectedVariable((*variable).clone())),
        };

        self.expect(TokenKind::Pipe, "|")?;

        self.scope.push(name.clone());
        let body = self.parse_pipe();
        self.scope.pop();

        Ok(Node::new(as_token, Expr::Bind(source, name, body?)))
    }

    fn parse_primary(&mut self) -> Result<Shared<Node>, ParseError> {
        let token = self.next_token();

        match &token.kind {
            TokenKind::Dot => {
                let identity = Node::new(Shared::clone(&token), Expr::Identity);
                let next = self.peek();
                match &next.kind {
                    TokenKind::StringLiteral(s) => {
                        self.next_token();
                        let key = Self::string_node(&next, s);
                        Ok(Node::new(token, Expr::Index(identity, key)))
                    }
                    _ => Ok(identity),
                }
            }
            TokenKind::DotDot => Ok(Node::new(token, Expr::Recurse)),
            TokenKind::Field(name) => {
                let identity = Node::new(Shared::clone(&token), Expr::Identity);
                let key = Self::string_node(&token, name);
                Ok(Node::new(token, Expr::Index(identity, key)))
            }
            TokenKind::NumberLiteral(n) => {
                let literal = Literal::Number(*n);
                Ok(Node::new(token, Expr::Literal(literal)))
            }
            TokenKind::StringLiteral(s) => {
                let literal = Literal::String(s.clone());
                Ok(Node::new(token, Expr::Literal(literal)))
            }
            TokenKind::BoolLiteral(b) => {
                let literal = Literal::Bool(*b);
                Ok(Node::new(token, Expr::Literal(literal)))
            }
            TokenKind::Null => Ok(Node::new(token, Expr::Literal(Literal::Null))),
            TokenKind::Variable(name) => self.parse_variable(Shared::clone(&token), name),
            TokenKind::LParen => {
                let expr = self.parse_pipe()?;
                self.expect_closing_paren()?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                if self.peek_is(&TokenKind::RBracket) {
                    self.next_token();
                    return Ok(Node::new(token, Expr::Array(None)));
                }

                let body = self.parse_pipe()?;
                self.expect_closing_bracket()?;
                Ok(Node::new(token, Expr::Array(Some(body))))
            }
            TokenKind::LBrace => self.parse_object(token),
            TokenKind::If => self.parse_if(token),
            TokenKind::Try => self.parse_try(token),
            TokenKind::Ident(name) => self.parse_call(Shared::clone(&token), name),
            TokenKind::Eof => Err(ParseError::UnexpectedEOFDetected((*token).clone())),
            _ => Err(ParseError::UnexpectedToken((*token).clone())),
        }
    }

    fn parse_variable(&mut self, token: Shared<Token>, name: &SmolStr) -> Result<Shared<Node>, ParseError> {
        if self.scope.iter().rev().any(|v| v == name) {
            Ok(Node::new(token, Expr::Variable(name.clone())))
        } else {
            Err(ParseError::UndefinedVariable((*token).clone(), name.clone()))
        }
    }

    fn parse_call(&mut self, token: Shared<Token>, name: &SmolStr) -> Result<Shared<Node>, ParseError> {
        let mut args: Args = SmallVec::new();

        if self.peek_is(&TokenKind::LParen) {
            self.next_token();
            loop {
                args.push(self.parse_pipe()?);
                let delimiter = self.next_token();
                match delimiter.kind {
                    TokenKind::SemiColon => continue,
                    TokenKind::RParen => break,
                    _ => return Err(ParseError::ExpectedClosingParen((*delimiter).clone())),
                }
            }
        }

        if !builtin::is_defined(name, args.len()) {
            return Err(ParseError::NotDefined(
                (*token).clone(),
                format!("{}/{}", name, args.len()),
            ));
        }

        Ok(Node::new(token, Expr::Call(name.clone(), args)))
    }

    fn parse_if(&mut self, token: Shared<Token>) -> Result<Shared<Node>, ParseError> {
        let mut branches: Branches = SmallVec::new();

        loop {
            let cond = self.parse_pipe()?;
            self.expect(TokenKind::Then, "then")?;
            let body = self.parse_pipe()?;
            branches.push((cond, body));

            let keyword = self.next_token();
            match keyword.kind {
                TokenKind::Elif => continue,
                TokenKind::Else => {
                    let else_ = self.parse_pipe()?;
                    self.expect(TokenKind::End, "end")?;
                    return Ok(Node::new(token, Expr::If(branches, Some(else_))));
                }
                TokenKind::End => return Ok(Node::new(token, Expr::If(branches, None))),
                _ => return Err(ParseError::ExpectedKeyword((*keyword).clone(), "end")),
            }
        }
    }

    fn parse_try(&mut self, token: Shared<Token>) -> Result<Shared<Node>, ParseError> {
        let body = self.nested(Self::parse_postfix)?;

        if self.peek_is(&TokenKind::Catch) {
            self.next_token();
            let handler = self.nested(Self::parse_postfix)?;
            return Ok(Node::new(token, Expr::Try(body, Some(handler))));
        }

        Ok(Node::new(token, Expr::Try(body, None)))
    }

    fn parse_object(&mut self, token: Shared<Token>) -> Result<Shared<Node>, ParseError> {
        let mut entries = Vec::new();

        if self.peek_is(&TokenKind::RBrace) {
            self.next_token();
            return Ok(Node::new(token, Expr::Object(entries)));
        }

        loop {
            entries.push(self.parse_object_entry()?);

            let delimiter = self.next_token();
            match delimiter.kind {
                TokenKind::Comma => continue,
                TokenKind::RBrace => break,
                _ => return Err(ParseError::ExpectedClosingBrace((*delimiter).clone())),
            }
        }

        Ok(Node::new(token, Expr::Object(entries)))
    }

    /// Parses `key: value`, `(expr): value`, `$var` or the `key` shorthand for `key: .key`.
    fn parse_object_entry(&mut self) -> Result<(Shared<Node>, Shared<Node>), ParseError> {
        let token = self.next_token();

        let (key, shorthand) = match &token.kind {
            TokenKind::Variable(name) => {
                let key = Self::string_node(&token, name);
                let value = self.parse_variable(Shared::clone(&token), name)?;
                return Ok((key, value));
            }
            TokenKind::StringLiteral(s) => (Self::string_node(&token, s), s.clone()),
            TokenKind::LParen => {
                let key = self.parse_pipe()?;
                self.expect_closing_paren()?;
                let colon = self.next_token();
                if colon.kind != TokenKind::Colon {
                    return Err(ParseError::ExpectedKeyword((*colon).clone(), ":"));
                }
                return Ok((key, self.parse_object_value()?));
            }
            TokenKind::Ident(_)
            | TokenKind::And
            | TokenKind::As
            | TokenKind::BoolLiteral(_)
            | TokenKind::Catch
            | TokenKind::Elif
            | TokenKind::Else
            | TokenKind::End
            | TokenKind::If
            | TokenKind::Null
            | TokenKind::Or
            | TokenKind::Then
            | TokenKind::Try => {
                let word = token.kind.to_string();
                (Self::string_node(&token, &word), word)
            }
            TokenKind::Eof => return Err(ParseError::UnexpectedEOFDetected((*token).clone())),
            _ => return Err(ParseError::UnexpectedToken((*token).clone())),
        };

        if self.peek_is(&TokenKind::Colon) {
            self.next_token();
            return Ok((key, self.parse_object_value()?));
        }

        let identity = Node::new(Shared::clone(&token), Expr::Identity);
        let field = Self::string_node(&token, &shorthand);
        Ok((key, Node::new(token, Expr::Index(identity, field))))
    }

    /// Object values stop at `,` so they bind tighter than the comma operator.
    fn parse_object_value(&mut self) -> Result<Shared<Node>, ParseError> {
        let depth = self.depth;
        let mut value = self.parse_alternative()?;

        while self.peek_is(&TokenKind::Pipe) {
            let token = self.next_token();
            self.descend()?;
            let rhs = self.parse_alternative()?;
            value = Node::new(token, Expr::Pipe(value, rhs));
        }

        self.depth = depth;
        Ok(value)
    }

    fn string_node(token: &Shared<Token>, s: &str) -> Shared<Node> {
        Node::new(
            Shared::clone(token),
            Expr::Literal(Literal::String(s.to_string())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::range::{Position, Range};
    use rstest::rstest;

    fn parse(source: &str) -> Result<Program, ParseError> {
        let tokens: Vec<Shared<Token>> = Lexer::new()
            .tokenize(source)
            .unwrap()
            .into_iter()
            .map(Shared::new)
            .collect();
        Parser::new(tokens.iter(), [SmolStr::new("ENV")]).parse()
    }

    #[rstest]
    #[case::empty("", ".")]
    #[case::identity(".", ".")]
    #[case::field(".foo", ".[\"foo\"]")]
    #[case::quoted_field(".\"foo bar\"", ".[\"foo bar\"]")]
    #[case::chained_fields(".a.b", ".[\"a\"][\"b\"]")]
    #[case::index(".[0]", ".[0]")]
    #[case::dot_index(".a.[1]", ".[\"a\"][1]")]
    #[case::iterate(".[]", ".[]")]
    #[case::slice(".[1:2]", ".[1:2]")]
    #[case::slice_from(".[1:]", ".[1:]")]
    #[case::slice_to(".[:2]", ".[:2]")]
    #[case::optional(".a?", "try .[\"a\"]")]
    #[case::recurse("..", "..")]
    #[case::map_law("[.[]+1]", "[(.[] + 1)]")]
    #[case::precedence("1 + 2 * 3", "(1 + (2 * 3))")]
    #[case::left_assoc("1 - 2 - 3", "((1 - 2) - 3)")]
    #[case::parens("(1 + 2) * 3", "((1 + 2) * 3)")]
    #[case::negate("-.a + 1", "((-.[\"a\"]) + 1)")]
    #[case::comparison(".a == 1 and .b", "((.[\"a\"] == 1) and .[\"b\"])")]
    #[case::or_and("true or false and false", "(true or (false and false))")]
    #[case::alternative(".a // .b // 1", "(.[\"a\"] // (.[\"b\"] // 1))")]
    #[case::comma_pipe("1, 2 | . + 1", "((1, 2) | (. + 1))")]
    #[case::pipe_right_assoc(". | . | .", "(. | (. | .))")]
    #[case::bind(". as $x | $x", "(. as $x | $x)")]
    #[case::bind_in_term("1 + . as $x | $x", "(1 + (. as $x | $x))")]
    #[case::array_empty("[]", "[]")]
    #[case::object("{a: 1, \"b\": .c, (.d): 2}", "{\"a\": 1, \"b\": .[\"c\"], .[\"d\"]: 2}")]
    #[case::object_shorthand("{a, $ENV}", "{\"a\": .[\"a\"], \"ENV\": $ENV}")]
    #[case::object_keyword_key("{if: 1}", "{\"if\": 1}")]
    #[case::object_value_pipe("{a: 1 | . + 1, b: 2}", "{\"a\": (1 | (. + 1)), \"b\": 2}")]
    #[case::if_elif_else("if . then 1 elif false then 2 else 3 end", "if . then 1 elif false then 2 else 3 end")]
    #[case::if_without_else("if . then 1 end", "if . then 1 end")]
    #[case::try_catch("try error(\"x\") catch .", "try error(\"x\") catch .")]
    #[case::call("test(\"a\"; \"i\")", "test(\"a\"; \"i\")")]
    #[case::call_no_args("length", "length")]
    #[case::comment("1 # one\n+ 2", "(1 + 2)")]
    fn test_parse(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(parse(source).unwrap().to_string(), expected);
    }

    fn at(line: u32, column: usize) -> Range {
        Range::new(Position::new(line, column), Position::new(line, column + 1))
    }

    #[rstest]
    #[case::unexpected_token(".a )", "Unexpected token `)`", 1, 4)]
    #[case::unclosed_bracket("[1, 2", "Expected a closing bracket `]` but got `EOF` delimiter", 1, 6)]
    #[case::unclosed_paren("(1", "Expected a closing parenthesis `)` but got `EOF` delimiter", 1, 3)]
    #[case::missing_then("if . 1 end", "Expected `then` but got `1`", 1, 6)]
    #[case::missing_end("if . then 1", "Expected `end` but got `EOF`", 1, 12)]
    #[case::undefined_function("foo", "foo/0 is not defined", 1, 1)]
    #[case::wrong_arity("map", "map/0 is not defined", 1, 1)]
    #[case::undefined_variable("$x", "$x is not defined", 1, 1)]
    #[case::variable_out_of_scope("(. as $x | $x), $x", "$x is not defined", 1, 17)]
    #[case::chained_comparison("1 < 2 < 3", "Unexpected token `<`", 1, 7)]
    #[case::dangling_operator("1 +", "Unexpected EOF detected", 1, 4)]
    #[case::bind_without_variable(". as x | .", "Expected a variable name after `as` but got `x`", 1, 6)]
    #[case::object_key_without_colon("{(.a) 1}", "Expected `:` but got `1`", 1, 7)]
    fn test_parse_error(
        #[case] source: &str,
        #[case] message: &str,
        #[case] line: u32,
        #[case] column: usize,
    ) {
        let err = parse(source).unwrap_err();
        assert_eq!(err.to_string(), message);
        assert_eq!(err.token().range.start, at(line, column).start);
    }

    /// Deep trees need more stack than the default test thread has.
    fn parse_deep(source: String) -> Result<Program, ParseError> {
        std::thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(move || parse(&source))
            .unwrap()
            .join()
            .unwrap()
    }

    fn nested_arrays(depth: usize) -> String {
        format!("{}1{}", "[".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn test_parse_at_max_depth() {
        assert!(parse_deep(nested_arrays(MAX_DEPTH - 1)).is_ok());
    }

    #[rstest]
    #[case::arrays(nested_arrays(MAX_DEPTH), 1, MAX_DEPTH + 1)]
    #[case::far_beyond_limit(nested_arrays(10_000), 1, MAX_DEPTH + 1)]
    #[case::parens(format!("{}1{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH)), 1, MAX_DEPTH + 1)]
    #[case::negations(format!("{}1", "-".repeat(MAX_DEPTH + 1)), 1, MAX_DEPTH + 1)]
    #[case::pipes(vec!["."; MAX_DEPTH + 1].join("|"), 1, 2 * MAX_DEPTH + 1)]
    #[case::commas(vec!["1"; MAX_DEPTH + 1].join(","), 1, 2 * MAX_DEPTH + 1)]
    #[case::additions(vec!["1"; MAX_DEPTH + 1].join("+"), 1, 2 * MAX_DEPTH + 1)]
    #[case::fields(".a".repeat(MAX_DEPTH + 1), 1, 2 * MAX_DEPTH + 1)]
    fn test_nesting_too_deep(#[case] source: String, #[case] line: u32, #[case] column: usize) {
        let err = parse_deep(source).unwrap_err();

        assert!(matches!(err, ParseError::NestingTooDeep(_)));
        assert_eq!(err.token().range.start, at(line, column).start);
    }
}
