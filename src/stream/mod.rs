//! Asynchronous sequences and their combinators.
//!
//! This module provides the [`Readable`] trait and the combinators built on
//! top of it.
//!
//! # Core Traits
//!
//! - [`Readable`]: one required method, `poll_next`, yielding [`Iteration`]s
//! - [`ReadableExt`]: extension trait providing combinator methods
//! - [`Sink`]: consumer endpoint for [`ReadableExt::copy`]
//!
//! # Combinators
//!
//! ## Concurrency-limited
//! - [`ForEach`]: runs a callback per element, up to `max_in_flight` at once
//! - [`Map`]: transforms elements concurrently, keeping their indices
//! - [`Reduce`]: concurrent reduction and left fold
//! - [`All`]: collects into an index-addressed vector
//! - [`Buffer`]: bounded read-ahead
//!
//! ## Terminal
//! - [`Copy`]: forwards every value into a [`Sink`]
//! - [`Join`]: concatenates chunks into text or bytes
//! - [`Drain`]: consumes and discards every value
//!
//! # Producers
//!
//! - [`buffer_stream`]: queue-backed writer/reader pair with acknowledgements
//! - [`Pipe`]: permit-gated input/output pair used by [`Map`] and [`Buffer`]
//! - [`Reader`]: adapters over vectors, iterators and push-style producers
//!
//! # Examples
//!
//! ```ignore
//! use sluice::stream::{ReadableExt, Reader};
//!
//! async fn example() -> sluice::Result<()> {
//!     let sum = Reader::from_vec(vec![1, 2, 3])
//!         .map(|n| async move { Ok(n * 2) }, 2)
//!         .reduce(|acc: i32, n, _| async move { Ok(acc + n) }, Some(0), 2)
//!         .await?;
//!     assert_eq!(sum, 12);
//!     Ok(())
//! }
//! ```

mod all;
mod buffer;
mod buffer_stream;
mod copy;
mod flight;
mod for_each;
mod iteration;
mod join;
mod map;
mod next;
mod pipe;
mod readable;
mod reader;
mod reduce;

pub use all::All;
pub use buffer::Buffer;
pub use buffer_stream::{buffer_stream, Ack, BufferStream, StreamWriter};
pub use copy::{Copy, Sink};
pub use for_each::{Drain, ForEach};
pub use iteration::Iteration;
pub use join::{Join, Joined};
pub use map::Map;
pub use next::Next;
pub use pipe::{Pipe, PipeInput, PipeOutput};
pub use readable::Readable;
pub use reader::Reader;
pub use reduce::Reduce;

use std::future::{Future, Ready};

use crate::config::Flow;
use crate::error::Result;

/// Extension trait providing combinator methods for readables.
///
/// This trait is automatically implemented for all types that implement
/// [`Readable`]. Every concurrency-limited combinator takes a flow:
/// anything convertible into [`Flow`], such as a plain `usize` where `0`
/// means unbounded.
pub trait ReadableExt: Readable {
    /// Returns the next iteration.
    fn next(&mut self) -> Next<'_, Self>
    where
        Self: Unpin,
    {
        Next::new(self)
    }

    /// Calls `f(value, index)` for every element, with up to
    /// `max_in_flight` calls running at once.
    ///
    /// Resolves to the source's terminal value after every call finished.
    fn for_each<F, Fut>(self, f: F, flow: impl Into<Flow>) -> ForEach<Self, F, Fut>
    where
        Self: Sized,
        F: FnMut(Self::Item, Option<usize>) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        ForEach::new(self, f, flow.into())
    }

    /// Transforms every element with `f`, with up to `max_in_flight` calls
    /// running at once.
    ///
    /// Results come out in completion order and keep their source index.
    fn map<U, F, Fut>(self, f: F, flow: impl Into<Flow>) -> Map<Self, F, Fut, U>
    where
        Self: Sized,
        F: FnMut(Self::Item) -> Fut,
        Fut: Future<Output = Result<U>>,
    {
        Map::new(self, f, flow.into())
    }

    /// Combines every element into a basis with `f(basis, value, index)`.
    ///
    /// Without a basis the first element is used, and an empty source
    /// fails with [`ErrorKind::EmptyReduce`](crate::ErrorKind::EmptyReduce).
    /// Up to `max_in_flight` callbacks run at once, each against whichever
    /// partial result settled first, and the partial results are combined
    /// with `f(left, right, None)` at the end. `f` must therefore be
    /// associative and commutative unless the bound is 1, which gives a
    /// strict left fold.
    fn reduce<F, Fut>(
        self,
        f: F,
        basis: Option<Self::Item>,
        flow: impl Into<Flow>,
    ) -> Reduce<Self, F, Fut, Self::Item>
    where
        Self: Sized,
        F: FnMut(Self::Item, Self::Item, Option<usize>) -> Fut,
        Fut: Future<Output = Result<Self::Item>>,
    {
        Reduce::combine(self, f, basis, flow.into())
    }

    /// Left fold into `basis`, which may have any type.
    ///
    /// There is a single accumulated value, so callbacks run one at a time
    /// in pull order; `max_in_flight` bounds how far the source is read
    /// ahead of the fold.
    fn fold<B, F, Fut>(self, basis: B, f: F, flow: impl Into<Flow>) -> Reduce<Self, F, Fut, B>
    where
        Self: Sized,
        F: FnMut(B, Self::Item, Option<usize>) -> Fut,
        Fut: Future<Output = Result<B>>,
    {
        Reduce::fold(self, f, basis, flow.into())
    }

    /// Reads up to `max_in_flight` elements ahead of the consumer.
    fn buffer(self, flow: impl Into<Flow>) -> Buffer<Self>
    where
        Self: Sized,
    {
        Buffer::new(self, flow.into())
    }

    /// Collects every element into a vector addressed by index.
    fn all(self, flow: impl Into<Flow>) -> All<Self>
    where
        Self: Sized,
    {
        All::new(self, flow.into())
    }

    /// Writes every value into `sink`, then closes it.
    fn copy<K>(self, sink: K) -> Copy<Self, K>
    where
        Self: Sized,
        K: Sink<Self::Item>,
    {
        Copy::new(self, sink)
    }

    /// Concatenates every chunk.
    fn read(self) -> Join<Self>
    where
        Self: Sized,
        Self::Item: AsRef<[u8]>,
    {
        Join::new(self, None)
    }

    /// Concatenates every chunk with `delimiter` between neighbours.
    fn join(self, delimiter: &str) -> Join<Self>
    where
        Self: Sized,
        Self::Item: AsRef<[u8]>,
    {
        Join::new(self, Some(delimiter.to_string()))
    }

    /// Consumes every element and discards it, one at a time.
    fn drain(self) -> Drain<Self>
    where
        Self: Sized,
    {
        let ignore: fn(Self::Item, Option<usize>) -> Ready<Result<()>> = for_each::ignore;
        ForEach::new(self, ignore, Flow::sequential())
    }

    /// Requests cancellation.
    ///
    /// Readables built from this crate have nothing to cancel: stopping a
    /// consumer is done by dropping it. Transports that own an external
    /// resource close it when dropped.
    fn cancel(&mut self) {}
}

// Blanket implementation for all Readable types
impl<S: Readable + ?Sized> ReadableExt for S {}
