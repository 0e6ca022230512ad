//! Map combinator.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::flight::POLL_BUDGET;
use super::pipe::{Pipe, PipeInput, PipeOutput};
use super::{Iteration, Readable};
use crate::config::Flow;
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, trace};

/// Readable for the [`map`](super::ReadableExt::map) method.
///
/// Up to `max_in_flight` callbacks run at once. Results are emitted in
/// completion order, each carrying the index of the element it came from.
/// The first failure, from the source or a callback, is emitted as the
/// terminal outcome; remaining callbacks are dropped.
#[must_use = "readables do nothing unless polled"]
pub struct Map<S, F, Fut, U> {
    input: PipeInput<S>,
    output: PipeOutput<U>,
    f: F,
    running: Vec<(Option<usize>, Pin<Box<Fut>>)>,
    input_done: bool,
    failed: bool,
    finished: bool,
}

impl<S, F, Fut, U> Map<S, F, Fut, U> {
    pub(crate) fn new(source: S, f: F, flow: Flow) -> Self {
        let (input, output) = Pipe::new(source, flow).into_parts();
        Self {
            input,
            output,
            f,
            running: Vec::new(),
            input_done: false,
            failed: false,
            finished: false,
        }
    }

    fn fail(&mut self, error: Error) {
        self.output.push_error(error);
        self.failed = true;
        self.running.clear();
    }
}

impl<S: Unpin, F, Fut, U> Unpin for Map<S, F, Fut, U> {}

impl<S, F, Fut, U> Readable for Map<S, F, Fut, U>
where
    S: Readable + Unpin,
    F: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<U>>,
{
    type Item = U;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Iteration<U>>> {
        let this = self.get_mut();
        let mut pulls = 0;
        loop {
            if let Some(item) = this.output.take() {
                if item.is_err() {
                    this.finished = true;
                }
                return Poll::Ready(item);
            }
            if this.finished || this.failed {
                this.finished = true;
                return Poll::Ready(Ok(Iteration::done()));
            }

            let mut progressed = false;

            let mut i = 0;
            while i < this.running.len() {
                match this.running[i].1.as_mut().poll(cx) {
                    Poll::Ready(Ok(value)) => {
                        let (index, _) = this.running.remove(i);
                        this.output.push_value(value, index);
                        progressed = true;
                    }
                    Poll::Ready(Err(e)) => {
                        this.fail(e);
                        progressed = true;
                        break;
                    }
                    Poll::Pending => i += 1,
                }
            }

            if pulls == POLL_BUDGET {
                if !this.output.is_empty() || this.failed {
                    continue;
                }
                trace!(running = this.running.len(), "map pull budget spent, yielding");
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }

            if !this.failed && !this.input_done {
                match Pin::new(&mut this.input).poll_next(cx) {
                    Poll::Ready(Ok(Iteration::Next { value, index })) => {
                        let fut = (this.f)(value);
                        this.running.push((index, Box::pin(fut)));
                        pulls += 1;
                        progressed = true;
                    }
                    Poll::Ready(Ok(Iteration::Done(_))) => {
                        this.input_done = true;
                        progressed = true;
                    }
                    Poll::Ready(Err(e)) => {
                        this.fail(e);
                        progressed = true;
                    }
                    Poll::Pending => {}
                }
            }

            if this.input_done && this.running.is_empty() && this.output.is_empty() {
                this.finished = true;
                debug!("map completed");
                return Poll::Ready(Ok(Iteration::done()));
            }

            if !progressed {
                return Poll::Pending;
            }
        }
    }
}

impl<S: fmt::Debug, F, Fut, U> fmt::Debug for Map<S, F, Fut, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("input", &self.input)
            .field("running", &self.running.len())
            .field("queued", &self.output.len())
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{buffer_stream, ReadableExt, Reader};
    use crate::test_utils::{block_on, delay, init_test, poll_once};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn collect<R: Readable + Unpin>(mut readable: R) -> Vec<Result<Iteration<R::Item>>> {
        let mut out = Vec::new();
        loop {
            let item = block_on(readable.next());
            let terminal = !matches!(item, Ok(Iteration::Next { .. }));
            out.push(item);
            if terminal {
                return out;
            }
        }
    }

    #[test]
    fn sequential_map_keeps_source_order() {
        init_test("sequential_map_keeps_source_order");
        let mapped = Reader::from_vec(vec![1, 2, 3])
            .map(|n| std::future::ready(Ok(n * 10)), 1);
        let items: Vec<_> = collect(mapped)
            .into_iter()
            .map(|r| r.expect("ok"))
            .collect();
        assert_eq!(
            items,
            vec![
                Iteration::indexed(10, 0),
                Iteration::indexed(20, 1),
                Iteration::indexed(30, 2),
                Iteration::done(),
            ]
        );
        crate::test_complete!("sequential_map_keeps_source_order");
    }

    #[test]
    fn concurrent_map_emits_in_completion_order_with_indices() {
        init_test("concurrent_map_emits_in_completion_order_with_indices");
        // Element 0 is slow, element 1 is fast.
        let mapped = Reader::from_vec(vec![5usize, 0]).map(
            |polls| async move {
                delay(polls).await;
                Ok(polls)
            },
            2,
        );
        let items = collect(mapped);
        let indices: Vec<_> = items
            .iter()
            .filter_map(|r| r.as_ref().ok().and_then(Iteration::index))
            .collect();
        crate::assert_with_log!(indices == vec![1, 0], "completion order", vec![1, 0], indices);
        crate::test_complete!("concurrent_map_emits_in_completion_order_with_indices");
    }

    #[test]
    fn callback_error_closes_output() {
        init_test("callback_error_closes_output");
        let mapped = Reader::from_vec(vec![1, 2, 3]).map(
            |n| {
                std::future::ready(if n == 2 {
                    Err(Error::msg("bad element"))
                } else {
                    Ok(n)
                })
            },
            1,
        );
        let items = collect(mapped);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().expect("first"), &Iteration::indexed(1, 0));
        let err = items[1].as_ref().expect_err("second fails");
        assert_eq!(err.message(), Some("bad element"));
        crate::test_complete!("callback_error_closes_output");
    }

    #[test]
    fn source_error_closes_output() {
        init_test("source_error_closes_output");
        let (tx, rx) = buffer_stream::<i32>();
        let _ = tx.push_value(1);
        let _ = tx.push_error(Error::msg("upstream"));
        let mut mapped = rx.map(|n| std::future::ready(Ok(n + 1)), 4);
        assert_eq!(block_on(mapped.next()).expect("ok"), Iteration::indexed(2, 0));
        let err = block_on(mapped.next()).expect_err("upstream error");
        assert_eq!(err.message(), Some("upstream"));
        assert_eq!(block_on(mapped.next()).expect("done"), Iteration::done());
        crate::test_complete!("source_error_closes_output");
    }

    #[test]
    fn in_flight_bounded_by_consumer_demand() {
        init_test("in_flight_bounded_by_consumer_demand");
        let peak = Arc::new(AtomicUsize::new(0));
        let observer = Arc::clone(&peak);
        let flow = Flow::bounded(2).with_notify(move |n, _| {
            observer.fetch_max(n, Ordering::SeqCst);
        });
        let mapped = Reader::from_vec((0..10).collect::<Vec<usize>>()).map(
            |n| async move {
                delay(n % 3).await;
                Ok(n)
            },
            flow,
        );
        let items = collect(mapped);
        assert_eq!(items.len(), 11);
        let peak = peak.load(Ordering::SeqCst);
        crate::assert_with_log!(peak <= 2, "peak", 2usize, peak);
        crate::test_complete!("in_flight_bounded_by_consumer_demand");
    }

    #[test]
    fn unbounded_map_yields_on_endless_source() {
        init_test("unbounded_map_yields_on_endless_source");
        let mut mapped = Reader::from_iterator(0u64..).map(
            |n| async move {
                delay(200).await;
                Ok(n)
            },
            0,
        );
        // No callback finishes within one budget of pulls, so the poll
        // returns instead of pulling forever.
        assert!(poll_once(&mut mapped.next()).is_none());

        let first = block_on(mapped.next()).expect("ok");
        assert!(!first.is_done());
        crate::test_complete!("unbounded_map_yields_on_endless_source");
    }
}
