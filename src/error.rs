//! Error types and error handling strategy for sluice.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed; the [`ErrorKind`] says what went wrong
//! - Combinators never swallow errors: the first failure reaches the caller
//! - Callback and source failures are wrapped, keeping the original as `source`
//! - Errors are cheap to clone so one failure can be forwarded to a sink and
//!   returned to the caller at the same time
//!
//! # Error Categories
//!
//! - **Lifecycle**: stream termination misuse (push after close, dropped peers)
//! - **Reduction**: folding an empty source without a basis
//! - **Io**: failures of the byte adapters in [`crate::io`]
//! - **User**: failures raised by callbacks or by a custom source
//! - **Internal**: invariant violations inside the crate

use core::fmt;
use std::sync::Arc;

use crate::sync::AcquireError;

/// Message carried by [`ErrorKind::EmptyReduce`] errors.
pub const EMPTY_REDUCE_MESSAGE: &str = "can't reduce empty source without a basis";

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Lifecycle ===
    /// A value or terminal was pushed after the stream was already closed.
    StreamClosed,
    /// The other half of a stream or channel was dropped.
    Disconnected,
    /// A concurrency gate was closed while waiting for a permit.
    GateClosed,

    // === Reduction ===
    /// Reduce was called on an empty source without a basis.
    EmptyReduce,

    // === Io ===
    /// Underlying I/O failure.
    Io,
    /// Data could not be decoded (for example invalid UTF-8).
    InvalidData,

    // === User ===
    /// A callback or a custom source failed.
    User,

    // === Internal ===
    /// Internal invariant violated (bug).
    Internal,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::StreamClosed | Self::Disconnected | Self::GateClosed => ErrorCategory::Lifecycle,
            Self::EmptyReduce => ErrorCategory::Reduction,
            Self::Io | Self::InvalidData => ErrorCategory::Io,
            Self::User => ErrorCategory::User,
            Self::Internal => ErrorCategory::Internal,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Stream and gate lifecycle failures.
    Lifecycle,
    /// Reduction failures.
    Reduction,
    /// Byte I/O and decoding failures.
    Io,
    /// User-originated errors.
    User,
    /// Internal errors.
    Internal,
}

/// The main error type for sluice operations.
#[derive(Debug, Clone)]
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

    /// Wraps a failure raised by a callback or a custom source.
    #[must_use]
    pub fn user(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        let message = source.to_string();
        Self::new(ErrorKind::User)
            .with_message(message)
            .with_source(source)
    }

    /// Creates a user error from a plain message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(message)
    }

    /// Creates the distinguished "empty source without basis" error.
    #[must_use]
    pub fn empty_reduce() -> Self {
        Self::new(ErrorKind::EmptyReduce).with_message(EMPTY_REDUCE_MESSAGE)
    }

    /// Creates a "stream already closed" error.
    #[must_use]
    pub fn stream_closed() -> Self {
        Self::new(ErrorKind::StreamClosed).with_message("stream already closed")
    }

    /// Creates a disconnected error naming the half that went away.
    #[must_use]
    pub fn disconnected(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Disconnected).with_message(detail)
    }

    /// Creates an internal error (bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
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

    /// Returns true if this is the empty-reduce condition.
    #[must_use]
    pub const fn is_empty_reduce(&self) -> bool {
        matches!(self.kind, ErrorKind::EmptyReduce)
    }

    /// Returns true if this error reports a push onto a closed stream.
    #[must_use]
    pub const fn is_stream_closed(&self) -> bool {
        matches!(self.kind, ErrorKind::StreamClosed)
    }

    /// Returns true if a peer half was dropped.
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        matches!(self.kind, ErrorKind::Disconnected)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::InvalidData => ErrorKind::InvalidData,
            _ => ErrorKind::Io,
        };
        Self::new(kind).with_message(e.to_string()).with_source(e)
    }
}

impl From<AcquireError> for Error {
    fn from(e: AcquireError) -> Self {
        match e {
            AcquireError::Closed => Self::new(ErrorKind::GateClosed).with_message(e.to_string()),
        }
    }
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
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

/// A specialized Result type for sluice operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
