//! ForEach combinator.
//!
//! Pulls elements in source order and starts one callback per element
//! without waiting for earlier callbacks to finish. Each running callback
//! holds a gate permit until it settles, so at most `max_in_flight`
//! callbacks run at once.

use std::fmt;
use std::future::{Future, Ready};
use std::pin::Pin;
use std::task::{Context, Poll};

use super::flight::{Flight, POLL_BUDGET};
use super::{Iteration, Readable};
use crate::config::Flow;
use crate::error::{Error, Result};
use crate::sync::{Gate, GateAcquire, GatePermit};
use crate::tracing_compat::debug;

/// Future for the [`for_each`](super::ReadableExt::for_each) method.
///
/// Resolves to the source's terminal value once the source is exhausted and
/// every callback has finished, or to the first error raised by the source
/// or by a callback.
#[must_use = "futures do nothing unless polled"]
pub struct ForEach<S: Readable, F, Fut> {
    source: S,
    f: F,
    gate: Gate,
    flight: Flight,
    acquire: Option<GateAcquire>,
    permit: Option<GatePermit>,
    running: Vec<(GatePermit, Pin<Box<Fut>>)>,
    terminal: Option<Option<S::Item>>,
    completed: bool,
}

/// Future for the [`drain`](super::ReadableExt::drain) method: a
/// [`ForEach`] whose callback ignores every element.
pub type Drain<S> = ForEach<
    S,
    fn(<S as Readable>::Item, Option<usize>) -> Ready<Result<()>>,
    Ready<Result<()>>,
>;

impl<S: Readable, F, Fut> ForEach<S, F, Fut> {
    pub(crate) fn new(source: S, f: F, flow: Flow) -> Self {
        Self {
            source,
            f,
            gate: Gate::new(flow.max_in_flight()),
            flight: Flight::new(&flow),
            acquire: None,
            permit: None,
            running: Vec::new(),
            terminal: None,
            completed: false,
        }
    }
}

pub(crate) fn ignore<T>(_value: T, _index: Option<usize>) -> Ready<Result<()>> {
    std::future::ready(Ok(()))
}

impl<S: Readable + Unpin, F, Fut> Unpin for ForEach<S, F, Fut> {}

impl<S, F, Fut> Future for ForEach<S, F, Fut>
where
    S: Readable + Unpin,
    F: FnMut(S::Item, Option<usize>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    type Output = Result<Option<S::Item>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.completed {
            return Poll::Ready(Err(Error::internal("for_each polled after completion")));
        }

        let mut pulls = 0;
        loop {
            let mut progressed = false;

            let mut i = 0;
            while i < this.running.len() {
                match this.running[i].1.as_mut().poll(cx) {
                    Poll::Ready(Ok(())) => {
                        // Dropping the permit hands it back to the gate.
                        drop(this.running.remove(i));
                        this.flight.leave();
                        progressed = true;
                    }
                    Poll::Ready(Err(e)) => {
                        this.completed = true;
                        this.running.clear();
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => i += 1,
                }
            }

            if this.terminal.is_none() && pulls == POLL_BUDGET {
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }

            if this.terminal.is_none() {
                if this.permit.is_none() {
                    let acquire = this.acquire.get_or_insert_with(|| this.gate.acquire());
                    match Pin::new(acquire).poll(cx) {
                        Poll::Ready(Ok(permit)) => {
                            this.acquire = None;
                            this.permit = Some(permit);
                            this.flight.enter();
                        }
                        Poll::Ready(Err(e)) => {
                            this.completed = true;
                            return Poll::Ready(Err(e.into()));
                        }
                        Poll::Pending => {}
                    }
                }

                if this.permit.is_some() {
                    match Pin::new(&mut this.source).poll_next(cx) {
                        Poll::Ready(Ok(Iteration::Next { value, index })) => {
                            if let Some(permit) = this.permit.take() {
                                let fut = (this.f)(value, index);
                                this.running.push((permit, Box::pin(fut)));
                            }
                            pulls += 1;
                            progressed = true;
                        }
                        Poll::Ready(Ok(Iteration::Done(value))) => {
                            this.permit = None;
                            this.flight.leave();
                            this.terminal = Some(value);
                            progressed = true;
                        }
                        Poll::Ready(Err(e)) => {
                            this.completed = true;
                            this.running.clear();
                            return Poll::Ready(Err(e));
                        }
                        Poll::Pending => {}
                    }
                }
            }

            if this.running.is_empty() {
                if let Some(value) = this.terminal.take() {
                    this.completed = true;
                    debug!("for_each completed");
                    return Poll::Ready(Ok(value));
                }
            }

            if !progressed {
                return Poll::Pending;
            }
        }
    }
}

impl<S: Readable + fmt::Debug, F, Fut> fmt::Debug for ForEach<S, F, Fut> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForEach")
            .field("source", &self.source)
            .field("running", &self.running.len())
            .field("exhausted", &self.terminal.is_some())
            .field("completed", &self.completed)
            .finish()
    }
}
