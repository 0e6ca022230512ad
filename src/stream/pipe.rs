//! Demand-regulated pipe between a source and a consumer.
//!
//! ```text
//!            acquire permit            release permit
//!  source ──► PipeInput ──► (work) ──► PipeOutput ──► consumer
//!               ▲                                       │
//!               └──────────── demand flows back ────────┘
//! ```
//!
//! Every pull through [`PipeInput`] first takes a permit from the flow's
//! gate. The permit stays taken while the item is being worked on and while
//! its result waits in [`PipeOutput`]; it is returned only when the result
//! is handed to the consumer with [`PipeOutput::take`]. At most
//! `max_in_flight` items are therefore between the source and the consumer.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::flight::Flight;
use super::{Iteration, Readable};
use crate::config::Flow;
use crate::error::{Error, Result};
use crate::sync::{Gate, GateAcquire};
use crate::tracing_compat::trace;

/// An input/output pair sharing one concurrency gate.
#[derive(Debug)]
pub struct Pipe<S, T> {
    /// Permit-gated view of the source.
    pub input: PipeInput<S>,
    /// Result queue; taking a value releases its permit.
    pub output: PipeOutput<T>,
}

impl<S, T> Pipe<S, T> {
    /// Creates a pipe over `source` with the given flow.
    pub fn new(source: S, flow: impl Into<Flow>) -> Self {
        let flow = flow.into();
        let gate = Gate::new(flow.max_in_flight());
        let flight = Flight::new(&flow);
        Self {
            input: PipeInput {
                source,
                gate: gate.clone(),
                flight: flight.clone(),
                acquire: None,
                armed: false,
                exhausted: false,
            },
            output: PipeOutput {
                queue: VecDeque::new(),
                gate,
                flight,
            },
        }
    }

    /// Splits the pipe into its halves.
    pub fn into_parts(self) -> (PipeInput<S>, PipeOutput<T>) {
        (self.input, self.output)
    }
}

/// Source side of a [`Pipe`].
#[derive(Debug)]
#[must_use = "readables do nothing unless polled"]
pub struct PipeInput<S> {
    source: S,
    gate: Gate,
    flight: Flight,
    acquire: Option<GateAcquire>,
    /// A permit is held for the pull in progress.
    armed: bool,
    exhausted: bool,
}

impl<S> PipeInput<S> {
    /// Returns true once the source has produced its terminal outcome.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Number of items currently between source and consumer.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flight.current()
    }

    fn finish(&mut self) {
        self.armed = false;
        self.exhausted = true;
        self.gate.release();
        self.flight.leave();
    }
}

impl<S> Readable for PipeInput<S>
where
    S: Readable + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Iteration<S::Item>>> {
        let this = self.get_mut();
        if this.exhausted {
            return Poll::Ready(Ok(Iteration::done()));
        }

        if !this.armed {
            let acquire = this.acquire.get_or_insert_with(|| this.gate.acquire());
            match Pin::new(acquire).poll(cx) {
                Poll::Ready(Ok(permit)) => {
                    this.acquire = None;
                    permit.forget();
                    this.armed = true;
                    this.flight.enter();
                    trace!(in_flight = this.flight.current(), "pipe permit granted");
                }
                Poll::Ready(Err(e)) => {
                    this.acquire = None;
                    this.exhausted = true;
                    return Poll::Ready(Err(Error::from(e)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        match Pin::new(&mut this.source).poll_next(cx) {
            Poll::Ready(Ok(Iteration::Next { value, index })) => {
                this.armed = false;
                Poll::Ready(Ok(Iteration::Next { value, index }))
            }
            Poll::Ready(terminal) => {
                this.finish();
                Poll::Ready(terminal)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn charset(&self) -> Option<&str> {
        self.source.charset()
    }
}

/// Result side of a [`Pipe`].
#[derive(Debug)]
pub struct PipeOutput<T> {
    queue: VecDeque<Result<Iteration<T>>>,
    gate: Gate,
    flight: Flight,
}

impl<T> PipeOutput<T> {
    /// Queues a raw outcome.
    pub fn put(&mut self, item: Result<Iteration<T>>) {
        self.queue.push_back(item);
    }

    /// Queues one result, keeping the index of the element it came from.
    pub fn push_value(&mut self, value: T, index: Option<usize>) {
        self.put(Ok(Iteration::Next { value, index }));
    }

    /// Queues the terminal iteration.
    pub fn push_end(&mut self, value: Option<T>) {
        self.put(Ok(Iteration::Done(value)));
    }

    /// Queues a failure.
    pub fn push_error(&mut self, error: Error) {
        self.put(Err(error));
    }

    /// Hands the oldest queued outcome to the consumer.
    ///
    /// Taking a value returns its permit to the gate, which lets the input
    /// pull again.
    pub fn take(&mut self) -> Option<Result<Iteration<T>>> {
        let item = self.queue.pop_front()?;
        if matches!(item, Ok(Iteration::Next { .. })) {
            self.gate.release();
            self.flight.leave();
            trace!(queued = self.queue.len(), "pipe output take");
        }
        Some(item)
    }

    /// Number of queued outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
