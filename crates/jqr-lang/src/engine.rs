use std::iter::once;

use smol_str::SmolStr;
use tracing::debug;

use crate::{
    Shared, Value,
    ast::{self, IdentName, parser::Parser},
    error::{Error, InnerError},
    eval::Evaluator,
    input::{Documents, Input},
    lexer::Lexer,
    optimizer::Optimizer,
    results::Results,
    value::Map,
};

/// The variable every program can read the process environment from.
const ENV_VARIABLE: &str = "ENV";

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Fold constant expressions before execution.
    pub optimize: bool,
    /// Expose the process environment through `$ENV` and `env`. When off,
    /// both are an empty object.
    pub env: bool,
    /// Named arguments, visible to the program as `$name`.
    pub args: Vec<(IdentName, Value)>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            optimize: true,
            env: true,
            args: Vec::new(),
        }
    }
}

/// Builds [`Program`]s from filter source.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: Options,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn optimize(mut self, optimize: bool) -> Self {
        self.options.optimize = optimize;
        self
    }

    pub fn env(mut self, env: bool) -> Self {
        self.options.env = env;
        self
    }

    /// Binds `$name` to `value`. A later binding of the same name wins.
    pub fn arg(mut self, name: impl Into<IdentName>, value: impl Into<Value>) -> Self {
        self.options.args.push((name.into(), value.into()));
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    #[allow(clippy::result_large_err)]
    pub fn compile(&self, source: &str) -> Result<Program, Error> {
        debug!(source, optimize = self.options.optimize, "compiling filter");

        let tokens = Lexer::new()
            .tokenize(source)
            .map_err(|e| Error::from_error(source, InnerError::Lexer(e)))?
            .into_iter()
            .map(Shared::new)
            .collect::<Vec<_>>();

        let names = once(SmolStr::new(ENV_VARIABLE))
            .chain(self.options.args.iter().map(|(name, _)| name.clone()));
        let ast = Parser::new(tokens.iter(), names)
            .parse()
            .map_err(|e| Error::from_error(source, InnerError::Parse(e)))?;

        let ast = if self.options.optimize {
            Optimizer::new().optimize(&ast)
        } else {
            ast
        };

        debug!(source, "compiled filter");

        Ok(Program {
            source: Shared::from(source),
            ast,
            globals: Shared::new(self.globals()),
        })
    }

    fn globals(&self) -> Vec<(IdentName, Value)> {
        let env = if self.options.env {
            std::env::vars_os()
                .filter_map(|(key, value)| {
                    Some((key.into_string().ok()?, Value::String(value.into_string().ok()?)))
                })
                .collect::<Map>()
        } else {
            Map::new()
        };

        once((SmolStr::new(ENV_VARIABLE), Value::Object(env)))
            .chain(self.options.args.iter().cloned())
            .collect()
    }
}

/// A compiled filter.
///
/// Immutable and cheap to clone. Every execution gets its own evaluator, so
/// one program can be run any number of times, from any number of threads.
#[derive(Debug, Clone)]
pub struct Program {
    source: Shared<str>,
    ast: ast::Program,
    globals: Shared<Vec<(IdentName, Value)>>,
}

impl Program {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Runs the program against a single decoded value.
    pub fn execute(&self, input: impl Into<Value>) -> Results {
        self.execute_input(Input::Value(input.into()))
    }

    /// Runs the program against every JSON document in `text`, in order.
    pub fn execute_text(&self, text: impl Into<String>) -> Results {
        self.execute_input(Input::Text(text.into()))
    }

    pub fn execute_input(&self, input: Input) -> Results {
        debug!(source = &*self.source, mode = input.mode(), "executing program");

        let inputs: Box<dyn Iterator<Item = Result<Value, Error>>> = match input {
            Input::Value(value) => Box::new(once(Ok(value))),
            Input::Text(text) => {
                let text: Shared<str> = Shared::from(text);
                Box::new(
                    Documents::new(Shared::clone(&text))
                        .map(move |document| {
                            document.map_err(|e| Error::from_error(&*text, InnerError::Input(e)))
                        }),
                )
            }
        };

        let evaluator = Evaluator::new(Shared::clone(&self.ast), &self.globals);
        let source = Shared::clone(&self.source);

        Results::new(inputs.flat_map(
            move |input| -> Box<dyn Iterator<Item = Result<Value, Error>>> {
                match input {
                    Ok(value) => {
                        let source = Shared::clone(&source);
                        Box::new(evaluator.eval(value).map(move |output| {
                            output.map_err(|e| {
                                debug!(error = %e, "evaluation failed");
                                Error::from_error(&*source, InnerError::Eval(e))
                            })
                        }))
                    }
                    Err(err) => Box::new(once(Err(err))),
                }
            },
        ))
    }
}
