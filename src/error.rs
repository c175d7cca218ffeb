//! Error types for the guest engine and the bridge

use thiserror::Error;

use crate::exception::Exception;
use crate::frame::{self, Traceback};
use crate::value::JsValue;

/// Source location information for error messages
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Why a context stopped executing guest code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TerminationReason {
    #[error("operation limit exceeded")]
    OutOfFuel,
    #[error("execution deadline exceeded")]
    DeadlineExceeded,
    #[error("execution interrupted")]
    Interrupted,
    #[error("maximum call depth exceeded")]
    StackOverflow,
}

/// Errors raised while running guest code.
///
/// Every variant carries the synthetic frame chain that was live when it was
/// created.
#[derive(Debug, Error)]
pub enum JsError {
    #[error("SyntaxError: {message} at {location}")]
    SyntaxError {
        message: String,
        location: SourceLocation,
        trace: Traceback,
    },

    #[error("TypeError: {message}")]
    TypeError { message: String, trace: Traceback },

    #[error("ReferenceError: {name} is not defined")]
    ReferenceError { name: String, trace: Traceback },

    #[error("RangeError: {message}")]
    RangeError { message: String, trace: Traceback },

    /// A guest value in flight. `origin` is set when the value stands for an
    /// exception that already exists on the host side.
    #[error("Uncaught {value:?}")]
    Thrown {
        value: JsValue,
        trace: Traceback,
        origin: Option<Exception>,
    },

    /// Not catchable by guest code.
    #[error("execution terminated: {reason}")]
    Terminated {
        reason: TerminationReason,
        trace: Traceback,
    },
}

impl JsError {
    pub fn syntax_error(message: impl Into<String>, line: u32, column: u32) -> Self {
        JsError::SyntaxError {
            message: message.into(),
            location: SourceLocation { line, column },
            trace: frame::capture(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
            trace: frame::capture(),
        }
    }

    pub fn reference_error(name: impl Into<String>) -> Self {
        JsError::ReferenceError {
            name: name.into(),
            trace: frame::capture(),
        }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
            trace: frame::capture(),
        }
    }

    pub fn thrown(value: JsValue) -> Self {
        JsError::Thrown {
            value,
            trace: frame::capture(),
            origin: None,
        }
    }

    pub fn terminated(reason: TerminationReason) -> Self {
        JsError::Terminated {
            reason,
            trace: frame::capture(),
        }
    }

    pub fn trace(&self) -> &Traceback {
        match self {
            JsError::SyntaxError { trace, .. }
            | JsError::TypeError { trace, .. }
            | JsError::ReferenceError { trace, .. }
            | JsError::RangeError { trace, .. }
            | JsError::Thrown { trace, .. }
            | JsError::Terminated { trace, .. } => trace,
        }
    }

    /// Terminations bypass guest `catch` and `finally` handlers.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, JsError::Terminated { .. })
    }

    /// Guest error constructor name and message for engine-raised errors.
    pub fn engine_error_parts(&self) -> Option<(&'static str, String)> {
        match self {
            JsError::SyntaxError {
                message, location, ..
            } => Some(("SyntaxError", format!("{} ({})", message, location))),
            JsError::TypeError { message, .. } => Some(("TypeError", message.clone())),
            JsError::ReferenceError { name, .. } => {
                Some(("ReferenceError", format!("{} is not defined", name)))
            }
            JsError::RangeError { message, .. } => Some(("RangeError", message.clone())),
            JsError::Thrown { .. } | JsError::Terminated { .. } => None,
        }
    }
}

/// Failures of the bridge itself, as opposed to errors raised by host or
/// guest code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("the context owning this value has been destroyed")]
    ContextDestroyed,

    #[error("stale or foreign handle")]
    InvalidHandle,

    #[error("{0} is not callable")]
    NotCallable(String),

    #[error("{0} is not an object")]
    NotAnObject(String),

    #[error("expected {expected}, got {got}")]
    TypeMismatch { expected: &'static str, got: String },

    #[error("property '{0}' is read-only")]
    ReadOnly(String),
}
