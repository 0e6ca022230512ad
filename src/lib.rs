//! Sluice: backpressure-aware asynchronous stream composition.
//!
//! # Overview
//!
//! Sluice models an asynchronous sequence as a [`Readable`]: something that
//! can be asked for its next [`Iteration`] and answers with a value and its
//! position, a terminal marker carrying an optional final value, or an error.
//! Everything else is built on that one method.
//!
//! # Core Guarantees
//!
//! - **Bounded flight**: every concurrency-limited combinator holds at most
//!   `max_in_flight` items between pulling them and finishing with them
//! - **No lost failures**: the first error from a source or a callback
//!   reaches the consumer; nothing is dropped silently
//! - **Indices survive**: transformations keep each element's source index,
//!   so out-of-order completion can be reassembled by position
//! - **Acknowledged writes**: producers on a [`BufferStream`] learn when the
//!   consumer has actually taken each value
//!
//! # Module Structure
//!
//! - [`stream`]: the readable protocol, combinators, pipes and adapters
//! - [`sync`]: FIFO counting semaphore and the concurrency gate built on it
//! - [`io`]: adapters between `std::io` and readables of byte chunks
//! - [`config`]: concurrency bounds, flow instrumentation, process defaults
//! - [`error`]: error types
//! - [`tracing_compat`]: optional structured logging

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::type_complexity)]

pub mod config;
pub mod error;
pub mod io;
pub mod stream;
pub mod sync;
pub mod tracing_compat;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use config::{Concurrency, Flow, StreamConfig};
pub use error::{Error, ErrorCategory, ErrorKind, Result, ResultExt};
pub use stream::{
    buffer_stream, BufferStream, Iteration, Joined, Pipe, Readable, ReadableExt, Reader, Sink,
    StreamWriter,
};
pub use sync::{Gate, Semaphore};
