//! `jqr-lang` compiles and runs filters written in a jq-style query language
//! over JSON values.
//!
//! A filter is compiled once into a [`Program`] that can be executed any
//! number of times. Each execution returns a lazy [`Results`] handle:
//! filters may produce zero, one, or many outputs per input, and nothing is
//! evaluated until the caller asks for it.
//!
//! ## Examples
//!
//! ```rust
//! use jqr_lang::Value;
//!
//! let program = jqr_lang::compile(".[] + 1").unwrap();
//! let input = Value::from(vec![Value::from(1), Value::from(2), Value::from(3)]);
//!
//! assert_eq!(program.execute(input.clone()).first().unwrap(), Value::from(2));
//! assert_eq!(program.execute(input).text().unwrap(), "2\n3\n4");
//!
//! // Text input may hold several JSON documents.
//! let outputs = program.execute_text("[1] [10, 20]").all().unwrap();
//! assert_eq!(outputs, vec![Value::from(2), Value::from(11), Value::from(21)]);
//!
//! // Compile-time configuration.
//! let program = jqr_lang::Compiler::new()
//!     .arg("suffix", "‽")
//!     .compile(". + $suffix")
//!     .unwrap();
//! assert_eq!(program.execute("Dragon").first().unwrap(), Value::from("Dragon‽"));
//! ```
//!
//! Errors implement [`miette::Diagnostic`], so they can be rendered with the
//! offending part of the filter or input highlighted.
mod ast;
mod engine;
mod error;
mod eval;
mod input;
mod lexer;
mod number;
mod optimizer;
mod range;
mod results;
mod value;

use std::sync::Arc;

pub use ast::IdentName;
pub use ast::error::ParseError;
pub use engine::{Compiler, Options, Program};
pub use error::{Error, ErrorKind, InnerError};
pub use eval::error::RuntimeError;
pub use input::{Input, InputError};
pub use lexer::error::LexerError;
pub use lexer::token::{Token, TokenKind};
pub use number::Number;
pub use range::{Position, Range};
pub use results::{Results, State, TextOptions};
pub use value::{Map, Value};

pub type Shared<T> = Arc<T>;

/// Compiles `source` with default [`Options`].
#[allow(clippy::result_large_err)]
pub fn compile(source: &str) -> Result<Program, Error> {
    Compiler::new().compile(source)
}

/// Compiles `source` and runs it against `input`. Compile errors surface
/// through the returned handle like any other error.
pub fn execute(source: &str, input: impl Into<Value>) -> Results {
    match compile(source) {
        Ok(program) => program.execute(input),
        Err(err) => Results::new(std::iter::once(Err(err))),
    }
}

/// Like [`execute`], with `text` decoded as whitespace separated JSON documents.
pub fn execute_text(source: &str, text: impl Into<String>) -> Results {
    match compile(source) {
        Ok(program) => program.execute_text(text),
        Err(err) => Results::new(std::iter::once(Err(err))),
    }
}
