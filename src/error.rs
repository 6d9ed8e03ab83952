//! Error types for the luamock store.

use thiserror::Error;

/// The result type used throughout luamock.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for store and scripting operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Invalid arguments were supplied to an operation, e.g. fewer arguments
    /// than the number of keys a script declares.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A store command was unknown or used incorrectly.
    #[error("{0}")]
    Command(String),

    /// A command was applied to a key holding the wrong kind of value.
    #[error("WRONGTYPE {0}")]
    WrongType(String),

    /// A script raised an error that was not caught inside the script.
    #[error("Script error: {0}")]
    Script(String),

    /// The scripting runtime was used after it had been disposed.
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),
}

impl Error {
    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new command error.
    pub fn command(msg: impl Into<String>) -> Self {
        Error::Command(msg.into())
    }

    /// Creates a new script error.
    pub fn script(msg: impl Into<String>) -> Self {
        Error::Script(msg.into())
    }

    /// Creates a new lifecycle error.
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Error::Lifecycle(msg.into())
    }

    /// Creates the standard wrong-type error.
    pub fn wrong_type() -> Self {
        Error::WrongType("Operation against a key holding the wrong kind of value".to_string())
    }

    /// Creates the standard arity error for `command`.
    pub fn wrong_arity(command: &str) -> Self {
        Error::Command(format!(
            "ERR wrong number of arguments for '{}' command",
            command.to_ascii_lowercase()
        ))
    }

    /// Returns true for errors raised by the command dispatcher.
    pub fn is_command_error(&self) -> bool {
        matches!(self, Error::Command(_) | Error::WrongType(_))
    }
}
