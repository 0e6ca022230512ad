//! Sink trait and the copy combinator.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::buffer_stream::{Ack, StreamWriter};
use super::{Iteration, Readable};
use crate::error::{Error, Result};
use crate::tracing_compat::debug;

/// Consumer side of a stream: accepts values, then a close or an abort.
///
/// Every operation returns a future that resolves once the sink has
/// accepted the operation.
pub trait Sink<T> {
    /// Acknowledgement future.
    type Ack: Future<Output = Result<()>> + Unpin;

    /// Offers one value.
    fn write(&mut self, value: T) -> Self::Ack;

    /// Signals clean completion.
    fn close(&mut self) -> Self::Ack;

    /// Signals that the producer failed.
    fn abort(&mut self, error: Error) -> Self::Ack;
}

impl<T, K: Sink<T> + ?Sized> Sink<T> for &mut K {
    type Ack = K::Ack;

    fn write(&mut self, value: T) -> Self::Ack {
        (**self).write(value)
    }

    fn close(&mut self) -> Self::Ack {
        (**self).close()
    }

    fn abort(&mut self, error: Error) -> Self::Ack {
        (**self).abort(error)
    }
}

impl<T> Sink<T> for StreamWriter<T> {
    type Ack = Ack<T>;

    fn write(&mut self, value: T) -> Ack<T> {
        self.push_value(value)
    }

    fn close(&mut self) -> Ack<T> {
        self.push_end(None)
    }

    fn abort(&mut self, error: Error) -> Ack<T> {
        self.push_error(error)
    }
}

enum State<A> {
    Pulling,
    Writing(A),
    Closing(A),
    Aborting(A, Error),
    Complete,
}

/// Future for the [`copy`](super::ReadableExt::copy) method.
///
/// Writes one value at a time, waiting for each write to be acknowledged
/// before pulling the next. A source failure is forwarded to the sink with
/// [`Sink::abort`] and then returned.
#[must_use = "futures do nothing unless polled"]
pub struct Copy<S: Readable, K: Sink<S::Item>> {
    source: S,
    sink: K,
    state: State<K::Ack>,
}

impl<S: Readable, K: Sink<S::Item>> Copy<S, K> {
    pub(crate) fn new(source: S, sink: K) -> Self {
        Self {
            source,
            sink,
            state: State::Pulling,
        }
    }
}

impl<S, K> Future for Copy<S, K>
where
    S: Readable + Unpin,
    K: Sink<S::Item> + Unpin,
{
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                State::Pulling => match Pin::new(&mut this.source).poll_next(cx) {
                    Poll::Ready(Ok(Iteration::Next { value, .. })) => {
                        this.state = State::Writing(this.sink.write(value));
                    }
                    Poll::Ready(Ok(Iteration::Done(_))) => {
                        this.state = State::Closing(this.sink.close());
                    }
                    Poll::Ready(Err(e)) => {
                        debug!(error = %e, "copy source failed, aborting sink");
                        let ack = this.sink.abort(e.clone());
                        this.state = State::Aborting(ack, e);
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Writing(ack) => match Pin::new(ack).poll(cx) {
                    Poll::Ready(Ok(())) => this.state = State::Pulling,
                    Poll::Ready(Err(e)) => {
                        this.state = State::Complete;
                        return Poll::Ready(Err(e));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Closing(ack) => match Pin::new(ack).poll(cx) {
                    Poll::Ready(result) => {
                        this.state = State::Complete;
                        return Poll::Ready(result);
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Aborting(ack, _) => match Pin::new(ack).poll(cx) {
                    Poll::Ready(_) => {
                        let State::Aborting(_, error) =
                            std::mem::replace(&mut this.state, State::Complete)
                        else {
                            return Poll::Ready(Err(Error::internal("copy state changed")));
                        };
                        return Poll::Ready(Err(error));
                    }
                    Poll::Pending => return Poll::Pending,
                },
                State::Complete => {
                    return Poll::Ready(Err(Error::internal("copy polled after completion")));
                }
            }
        }
    }
}

impl<S: Readable + fmt::Debug, K: Sink<S::Item>> fmt::Debug for Copy<S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Pulling => "pulling",
            State::Writing(_) => "writing",
            State::Closing(_) => "closing",
            State::Aborting(..) => "aborting",
            State::Complete => "complete",
        };
        f.debug_struct("Copy")
            .field("source", &self.source)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{buffer_stream, ReadableExt, Reader};
    use crate::test_utils::{block_on, init_test};
    use futures_lite::future;
    use std::future::Ready;

    #[derive(Default)]
    struct Recorder {
        values: Vec<i32>,
        closed: bool,
        aborted: Option<String>,
    }

    impl Sink<i32> for Recorder {
        type Ack = Ready<Result<()>>;

        fn write(&mut self, value: i32) -> Self::Ack {
            self.values.push(value);
            std::future::ready(Ok(()))
        }

        fn close(&mut self) -> Self::Ack {
            self.closed = true;
            std::future::ready(Ok(()))
        }

        fn abort(&mut self, error: Error) -> Self::Ack {
            self.aborted = error.message().map(str::to_string);
            std::future::ready(Ok(()))
        }
    }

    #[test]
    fn copies_then_closes() {
        init_test("copies_then_closes");
        let mut sink = Recorder::default();
        block_on(Reader::from_vec(vec![1, 2, 3]).copy(&mut sink)).expect("copy");
        assert_eq!(sink.values, vec![1, 2, 3]);
        crate::assert_with_log!(sink.closed, "closed", true, sink.closed);
        assert!(sink.aborted.is_none());
        crate::test_complete!("copies_then_closes");
    }

    #[test]
    fn source_failure_aborts_sink() {
        init_test("source_failure_aborts_sink");
        let (tx, rx) = buffer_stream();
        let _ = tx.push_value(7);
        let _ = tx.push_error(Error::msg("torn"));
        let mut sink = Recorder::default();
        let err = block_on(rx.copy(&mut sink)).expect_err("source failed");
        assert_eq!(err.message(), Some("torn"));
        assert_eq!(sink.values, vec![7]);
        assert!(!sink.closed);
        assert_eq!(sink.aborted.as_deref(), Some("torn"));
        crate::test_complete!("source_failure_aborts_sink");
    }

    #[test]
    fn copy_into_buffer_stream_waits_for_reader() {
        init_test("copy_into_buffer_stream_waits_for_reader");
        let (tx, rx) = buffer_stream();
        let copy = Reader::from_vec(vec!["a", "b", "c"]).copy(tx);
        let drain = rx.all(1);
        let (copied, drained) = block_on(future::zip(copy, drain));
        copied.expect("copy");
        assert_eq!(drained.expect("drain"), vec![Some("a"), Some("b"), Some("c")]);
        crate::test_complete!("copy_into_buffer_stream_waits_for_reader");
    }
}
