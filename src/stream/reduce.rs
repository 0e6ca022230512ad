//! Reduce combinator.
//!
//! Settled accumulated values (bases) wait in a FIFO. Each pulled element is
//! paired with the oldest settled basis and handed to the callback, whose
//! result is queued as a new basis once it settles. Every pulled element
//! holds a gate permit until its callback settles, so at most
//! `max_in_flight` callbacks run at once.
//!
//! [`fold`](super::ReadableExt::fold) starts from a single basis of any
//! type and never has more than one, which makes it a left fold in pull
//! order whatever the bound. [`reduce`](super::ReadableExt::reduce) combines
//! elements of one type: an element pulled while every basis is busy
//! becomes a basis of its own, so callbacks overlap, and the remaining
//! bases are combined pairwise once the source ends. With a bound of 1 this
//! is again a strict left fold; with a larger bound the callback must be
//! associative and commutative.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::flight::{Flight, POLL_BUDGET};
use super::{Iteration, Readable};
use crate::config::Flow;
use crate::error::{Error, Result};
use crate::sync::{Gate, GateAcquire, GatePermit};
use crate::tracing_compat::{debug, trace};

/// Future for the [`reduce`](super::ReadableExt::reduce) and
/// [`fold`](super::ReadableExt::fold) methods.
///
/// Resolves to the final basis. Without an initial basis the first element
/// becomes the basis; an empty source then fails with
/// [`ErrorKind::EmptyReduce`](crate::ErrorKind::EmptyReduce).
#[must_use = "futures do nothing unless polled"]
pub struct Reduce<S: Readable, F, Fut, B> {
    source: S,
    f: F,
    /// Turns an element into a basis; set for same-typed reductions.
    promote: Option<fn(S::Item) -> B>,
    /// Turns a basis back into an element so two bases can be combined.
    demote: Option<fn(B) -> S::Item>,
    gate: Gate,
    limit: Option<usize>,
    flight: Flight,
    acquire: Option<GateAcquire>,
    permit: Option<GatePermit>,
    bases: VecDeque<B>,
    pulled: VecDeque<(GatePermit, S::Item, Option<usize>)>,
    running: Vec<(Option<GatePermit>, Pin<Box<Fut>>)>,
    source_done: bool,
    completed: bool,
}

impl<S: Readable, F, Fut, B> Reduce<S, F, Fut, B> {
    /// Folds every element into `basis`, one callback at a time.
    pub(crate) fn fold(source: S, f: F, basis: B, flow: Flow) -> Self {
        Self::with_parts(source, f, Some(basis), None, None, flow)
    }

    fn with_parts(
        source: S,
        f: F,
        basis: Option<B>,
        promote: Option<fn(S::Item) -> B>,
        demote: Option<fn(B) -> S::Item>,
        flow: Flow,
    ) -> Self {
        Self {
            source,
            f,
            promote,
            demote,
            gate: Gate::new(flow.max_in_flight()),
            limit: flow.max_in_flight().limit(),
            flight: Flight::new(&flow),
            acquire: None,
            permit: None,
            bases: basis.into_iter().collect(),
            pulled: VecDeque::new(),
            running: Vec::new(),
            source_done: false,
            completed: false,
        }
    }

    fn has_slot(&self) -> bool {
        self.limit.map_or(true, |limit| self.running.len() < limit)
    }

    fn fail(&mut self, error: Error) -> Poll<Result<B>> {
        self.completed = true;
        self.running.clear();
        self.pulled.clear();
        self.bases.clear();
        self.permit = None;
        self.acquire = None;
        Poll::Ready(Err(error))
    }
}

impl<S: Readable, F, Fut> Reduce<S, F, Fut, S::Item> {
    /// Reduces elements of one type, starting from `basis` or from the
    /// first element.
    pub(crate) fn combine(source: S, f: F, basis: Option<S::Item>, flow: Flow) -> Self {
        let promote: fn(S::Item) -> S::Item = std::convert::identity;
        let demote: fn(S::Item) -> S::Item = std::convert::identity;
        Self::with_parts(source, f, basis, Some(promote), Some(demote), flow)
    }
}

impl<S: Readable + Unpin, F, Fut, B> Unpin for Reduce<S, F, Fut, B> {}

impl<S, F, Fut, B> Future for Reduce<S, F, Fut, B>
where
    S: Readable + Unpin,
    F: FnMut(B, S::Item, Option<usize>) -> Fut,
    Fut: Future<Output = Result<B>>,
{
    type Output = Result<B>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<B>> {
        let this = self.get_mut();
        if this.completed {
            return Poll::Ready(Err(Error::internal("reduce polled after completion")));
        }

        let mut pulls = 0;
        loop {
            let mut progressed = false;

            let mut i = 0;
            while i < this.running.len() {
                match this.running[i].1.as_mut().poll(cx) {
                    Poll::Ready(Ok(basis)) => {
                        // Dropping the permit hands it back to the gate.
                        let (permit, _) = this.running.remove(i);
                        if permit.is_some() {
                            this.flight.leave();
                        }
                        this.bases.push_back(basis);
                        progressed = true;
                    }
                    Poll::Ready(Err(e)) => return this.fail(e),
                    Poll::Pending => i += 1,
                }
            }

            while let Some((permit, value, index)) = this.pulled.pop_front() {
                if let Some(basis) = this.bases.pop_front() {
                    trace!(?index, running = this.running.len() + 1, "reduce step");
                    let fut = (this.f)(basis, value, index);
                    this.running.push((Some(permit), Box::pin(fut)));
                } else if let Some(promote) = this.promote {
                    drop(permit);
                    this.flight.leave();
                    this.bases.push_back(promote(value));
                } else {
                    this.pulled.push_front((permit, value, index));
                    break;
                }
                progressed = true;
            }

            if this.source_done && this.pulled.is_empty() {
                if let Some(demote) = this.demote {
                    while this.bases.len() > 1 && this.has_slot() {
                        let (Some(left), Some(right)) =
                            (this.bases.pop_front(), this.bases.pop_front())
                        else {
                            break;
                        };
                        trace!(left = this.bases.len(), "reduce combining settled bases");
                        let fut = (this.f)(left, demote(right), None);
                        this.running.push((None, Box::pin(fut)));
                        progressed = true;
                    }
                }
            }

            if !this.source_done {
                if pulls == POLL_BUDGET {
                    cx.waker().wake_by_ref();
                    return Poll::Pending;
                }

                if this.permit.is_none() {
                    let acquire = this.acquire.get_or_insert_with(|| this.gate.acquire());
                    match Pin::new(acquire).poll(cx) {
                        Poll::Ready(Ok(permit)) => {
                            this.acquire = None;
                            this.permit = Some(permit);
                            this.flight.enter();
                        }
                        Poll::Ready(Err(e)) => return this.fail(e.into()),
                        Poll::Pending => {}
                    }
                }

                if this.permit.is_some() {
                    match Pin::new(&mut this.source).poll_next(cx) {
                        Poll::Ready(Ok(Iteration::Next { value, index })) => {
                            if let Some(permit) = this.permit.take() {
                                this.pulled.push_back((permit, value, index));
                            }
                            pulls += 1;
                            progressed = true;
                        }
                        Poll::Ready(Ok(Iteration::Done(_))) => {
                            this.permit = None;
                            this.flight.leave();
                            this.source_done = true;
                            progressed = true;
                        }
                        Poll::Ready(Err(e)) => return this.fail(e),
                        Poll::Pending => {}
                    }
                }
            }

            if this.source_done
                && this.running.is_empty()
                && this.pulled.is_empty()
                && this.bases.len() <= 1
            {
                this.completed = true;
                debug!(empty = this.bases.is_empty(), "reduce completed");
                return Poll::Ready(this.bases.pop_front().ok_or_else(Error::empty_reduce));
            }

            if !progressed {
                return Poll::Pending;
            }
        }
    }
}

impl<S: Readable + fmt::Debug, F, Fut, B> fmt::Debug for Reduce<S, F, Fut, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reduce")
            .field("source", &self.source)
            .field("read_ahead", &self.pulled.len())
            .field("running", &self.running.len())
            .field("bases", &self.bases.len())
            .field("source_done", &self.source_done)
            .finish()
    }
}
