//! Unified error type.
//!
//! Two families live here. Setup-time errors ([`Error::DuplicateRoute`],
//! [`Error::InvalidPattern`]) are fatal: the router refuses the registration
//! and startup should abort. Request-time errors are always recovered into a
//! response by the dispatcher — nothing in request handling can crash the
//! process.
//!
//! A client disconnect mid-dispatch needs no error value at all: the
//! connection task's future is dropped and the dispatch abandoned — see the
//! cancellation notes on [`Server`](crate::Server).

use std::fmt;

use crate::method::Method;
use crate::status::Status;

/// The error type returned by rove's fallible operations.
#[derive(Debug)]
pub enum Error {
    /// A route with the same method and normalized pattern is already
    /// registered. Setup-time, fatal.
    DuplicateRoute { method: Method, pattern: String },
    /// The route pattern is malformed (e.g. a wildcard before the final
    /// segment, or an unnamed `:` parameter). Setup-time, fatal.
    InvalidPattern { pattern: String, reason: &'static str },
    /// No registered route matches the request. Recovered into `404`. The
    /// dispatcher returns it for unmatched paths; a handler may also bail
    /// with it to disown a request it cannot serve.
    NoMatch,
    /// The request body is not syntactically valid for the expected format.
    /// Recovered into `400`.
    Decode(String),
    /// The body parsed but its fields do not fit the target shape.
    /// Recovered into `400`.
    TypeMismatch(String),
    /// An application-raised error carrying its own status and message.
    /// Recovered into exactly that response.
    Handler { status: u16, message: String },
    /// Infrastructure failure: binding a port, accepting a connection.
    Io(std::io::Error),
}

impl Error {
    /// Shorthand for an application-raised error, the way a handler bails:
    ///
    /// ```rust
    /// use rove::{Error, Status};
    /// let err = Error::handler(Status::NotFound, "content not found");
    /// ```
    pub fn handler(status: Status, message: impl Into<String>) -> Self {
        Self::Handler { status: status.code(), message: message.into() }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRoute { method, pattern } => {
                write!(f, "duplicate route: {method} {pattern}")
            }
            Self::InvalidPattern { pattern, reason } => {
                write!(f, "invalid pattern `{pattern}`: {reason}")
            }
            Self::NoMatch => f.write_str("no matching route"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            Self::Handler { status, message } => write!(f, "{status}: {message}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Classifies a serde_json failure per the dispatch contract: syntax and
/// truncation problems are [`Error::Decode`], shape problems are
/// [`Error::TypeMismatch`].
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        use serde_json::error::Category;
        match e.classify() {
            Category::Data => Self::TypeMismatch(e.to_string()),
            _ => Self::Decode(e.to_string()),
        }
    }
}
