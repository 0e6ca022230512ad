//! Buffer combinator: bounded read-ahead.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::flight::POLL_BUDGET;
use super::pipe::{Pipe, PipeInput, PipeOutput};
use super::{Iteration, Readable};
use crate::config::Flow;
use crate::error::Result;

/// Readable for the [`buffer`](super::ReadableExt::buffer) method.
///
/// Whenever it is polled, pulls from the source until `max_in_flight`
/// elements are waiting, the source has nothing ready, or the per-poll pull
/// budget is spent, then hands out the oldest one. Source failures are queued behind the elements read before
/// them.
#[must_use = "readables do nothing unless polled"]
pub struct Buffer<S: Readable> {
    input: PipeInput<S>,
    output: PipeOutput<S::Item>,
    finished: bool,
}

impl<S: Readable> Buffer<S> {
    pub(crate) fn new(source: S, flow: Flow) -> Self {
        let (input, output) = Pipe::new(source, flow).into_parts();
        Self {
            input,
            output,
            finished: false,
        }
    }

    /// Number of elements read ahead and not yet handed out.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.output.len()
    }
}

impl<S: Readable + Unpin> Unpin for Buffer<S> {}

impl<S: Readable + Unpin> Readable for Buffer<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Iteration<S::Item>>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(Ok(Iteration::done()));
        }

        let mut pulls = 0;
        while !this.input.is_exhausted() && pulls < POLL_BUDGET {
            match Pin::new(&mut this.input).poll_next(cx) {
                Poll::Ready(item) => {
                    this.output.put(item);
                    pulls += 1;
                }
                Poll::Pending => break,
            }
        }

        match this.output.take() {
            Some(item) => {
                if !matches!(item, Ok(Iteration::Next { .. })) {
                    this.finished = true;
                }
                Poll::Ready(item)
            }
            None => Poll::Pending,
        }
    }

    fn charset(&self) -> Option<&str> {
        self.input.charset()
    }
}

impl<S: Readable + fmt::Debug> fmt::Debug for Buffer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("input", &self.input)
            .field("buffered", &self.output.len())
            .field("finished", &self.finished)
            .finish()
    }
}
