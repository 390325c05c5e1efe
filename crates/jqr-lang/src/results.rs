use std::fmt::{self, Debug, Formatter};

use crate::{
    Value,
    error::{Error, InnerError},
    eval::error::RuntimeError,
};

/// Where a [`Results`] handle is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// More outputs may follow.
    Pending,
    /// Every output was consumed without error.
    Exhausted,
    /// An error was surfaced. Nothing follows it.
    Failed,
}

/// How [`Results::text_with`] renders each output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextOptions {
    pub sort_keys: bool,
    /// Spaces per nesting level. `0` renders compact JSON.
    pub indent: usize,
}

/// The outputs of one execution of a [`Program`](crate::Program).
///
/// Outputs are produced on demand. Dropping the handle abandons the
/// execution without computing what was not pulled.
pub struct Results {
    outputs: Box<dyn Iterator<Item = Result<Value, Error>>>,
    state: State,
}

impl Debug for Results {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Results").field("state", &self.state).finish_non_exhaustive()
    }
}

impl Results {
    pub(crate) fn new(outputs: impl Iterator<Item = Result<Value, Error>> + 'static) -> Self {
        Self {
            outputs: Box::new(outputs),
            state: State::Pending,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The first output. Nothing past it is evaluated.
    #[allow(clippy::result_large_err)]
    pub fn first(mut self) -> Result<Value, Error> {
        match self.next() {
            Some(result) => result,
            None => Err(Error::from_error("", InnerError::Eval(RuntimeError::NoOutput))),
        }
    }

    /// Every output in order, or the first error.
    #[allow(clippy::result_large_err)]
    pub fn all(self) -> Result<Vec<Value>, Error> {
        self.collect()
    }

    /// Every output as compact JSON, one per line.
    #[allow(clippy::result_large_err)]
    pub fn text(self) -> Result<String, Error> {
        self.text_with(&TextOptions::default())
    }

    #[allow(clippy::result_large_err)]
    pub fn text_with(self, options: &TextOptions) -> Result<String, Error> {
        let values = self.all()?;

        let lines = values
            .iter()
            .map(|value| {
                value.to_json(options.indent, options.sort_keys).map_err(|err| {
                    Error::from_error(
                        "",
                        InnerError::Eval(RuntimeError::CannotSerialize(err.to_string())),
                    )
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(lines.join("\n"))
    }
}

impl Iterator for Results {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != State::Pending {
            return None;
        }

        match self.outputs.next() {
            Some(Ok(value)) => Some(Ok(value)),
            Some(Err(err)) => {
                self.state = State::Failed;
                Some(Err(err))
            }
            None => {
                self.state = State::Exhausted;
                None
            }
        }
    }
}

impl std::iter::FusedIterator for Results {}
