//! Error types and error handling strategy for settle.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - A rejection cause is an [`Error`]; it is cheap to clone so one rejection
//!   can be delivered to every registered continuation
//! - Panics inside continuations are caught and converted to
//!   [`ErrorKind::Panicked`]
//!
//! # Error Kinds
//!
//! - **InvalidState**: settling a promise that already left `Pending`
//! - **InvalidArgument**: caller configuration errors such as racing nothing
//! - **Cancelled**: a producer settled its promise as cancelled
//! - **Panicked**: a continuation or initializer panicked
//! - **User**: application-provided causes

use core::fmt;
use std::any::Any;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A promise was settled more than once.
    InvalidState,
    /// An operation was called with arguments it cannot work with.
    InvalidArgument,
    /// The producer settled the promise as cancelled.
    Cancelled,
    /// A continuation, initializer or cancel callback panicked.
    Panicked,
    /// Application-provided rejection cause.
    User,
}

impl ErrorKind {
    /// Returns true if this kind reports a bug in the calling code rather
    /// than a failure of the deferred computation.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(self, Self::InvalidState | Self::InvalidArgument)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidState => write!(f, "invalid state"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Panicked => write!(f, "panicked"),
            Self::User => write!(f, "rejected"),
        }
    }
}

/// The main error type, and the rejection cause carried by promises.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Creates an application rejection cause with a message.
    #[must_use]
    pub fn user(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(msg)
    }

    /// Wraps an arbitrary error as an application rejection cause.
    #[must_use]
    pub fn wrap(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::User).with_source(source)
    }

    /// Creates a state-violation error.
    #[must_use]
    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState).with_message(detail)
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_message(detail)
    }

    /// Creates the cause delivered when a producer settles as cancelled.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Builds an error from a caught panic payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "opaque panic payload".to_string()
        };
        Self::new(ErrorKind::Panicked).with_message(message)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents a cancelled settlement.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error was produced from a caught panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self.kind, ErrorKind::Panicked)
    }

    /// Returns true if this error reports a double settlement.
    #[must_use]
    pub const fn is_invalid_state(&self) -> bool {
        matches!(self.kind, ErrorKind::InvalidState)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns true if both errors are the same rejection cause.
    ///
    /// Causes cloned from one another share their source, so this is the
    /// identity check continuations use to tell "my error" from a new one.
    #[must_use]
    pub fn same_cause(&self, other: &Self) -> bool {
        let sources_match = match (&self.source, &other.source) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.kind == other.kind && self.message == other.message && sources_match
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("source", &self.source.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        if let Some(source) = &self.source {
            write!(f, " ({source})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for settle operations.
pub type Result<T> = core::result::Result<T, Error>;
