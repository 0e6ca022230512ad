//! Queue-backed stream with per-item acknowledgement.
//!
//! A [`buffer_stream`] is a single-producer, single-consumer queue of
//! iterations. The writer enqueues eagerly; every push returns an [`Ack`]
//! that resolves once the reader has taken that item, which gives the
//! producer a one-item-at-a-time backpressure signal when it awaits acks:
//!
//! ```text
//! StreamWriter                         BufferStream
//!     │── push_value(a) ──► [a] ──────────► next() ──► a @0
//!     │◄──────────── ack(a) resolves ───────┘
//!     │── push_end(z) ──► [done(z)] ──────► next() ──► done(z)
//!     │── push_value(b) ──► Err(StreamClosed)
//! ```
//!
//! Neither half is `Clone`; the reader is consumed through `&mut`, so one
//! producer and one consumer is the only shape the types allow.
//!
//! # Lifecycle
//!
//! - After a terminal item (`push_end` / `push_error`) every further push
//!   fails with [`ErrorKind::StreamClosed`](crate::ErrorKind::StreamClosed).
//! - Dropping the writer without a terminal item makes the reader observe
//!   [`ErrorKind::Disconnected`](crate::ErrorKind::Disconnected).
//! - Dropping the reader resolves outstanding acks with `Disconnected`.
//! - Once the terminal item has been read the reader keeps reporting
//!   `Done(None)`.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use super::{Iteration, Next, Readable};
use crate::error::{Error, Result};
use crate::tracing_compat::{debug, trace, warn};

struct Shared<T> {
    queue: VecDeque<Result<Iteration<T>>>,
    /// Items ever enqueued; the n-th push waits for `delivered >= n`.
    pushed: u64,
    delivered: u64,
    next_index: usize,
    consumer: Option<Waker>,
    acks: Vec<Waker>,
    /// A terminal item has been enqueued.
    closed: bool,
    /// The reader has taken a terminal outcome.
    finished: bool,
    writer_dropped: bool,
    reader_dropped: bool,
}

impl<T> Shared<T> {
    fn register_ack(&mut self, waker: &Waker) {
        if !self.acks.iter().any(|w| w.will_wake(waker)) {
            self.acks.push(waker.clone());
        }
    }
}

/// Creates a connected writer/reader pair.
#[must_use]
pub fn buffer_stream<T>() -> (StreamWriter<T>, BufferStream<T>) {
    let shared = Arc::new(Mutex::new(Shared {
        queue: VecDeque::new(),
        pushed: 0,
        delivered: 0,
        next_index: 0,
        consumer: None,
        acks: Vec::new(),
        closed: false,
        finished: false,
        writer_dropped: false,
        reader_dropped: false,
    }));
    (
        StreamWriter {
            shared: Arc::clone(&shared),
        },
        BufferStream {
            shared,
            charset: None,
        },
    )
}

/// Producer half of a [`buffer_stream`].
pub struct StreamWriter<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> StreamWriter<T> {
    /// Enqueues a raw iteration or failure.
    pub fn put(&self, item: Result<Iteration<T>>) -> Ack<T> {
        let terminal = !matches!(item, Ok(Iteration::Next { .. }));
        let mut shared = self.shared.lock();
        if shared.closed {
            drop(shared);
            warn!("push after buffer stream was closed");
            return Ack::ready(Err(Error::stream_closed()));
        }
        if shared.reader_dropped {
            return Ack::ready(Err(Error::disconnected("buffer stream reader dropped")));
        }
        trace!(
            index = ?item.as_ref().ok().and_then(Iteration::index),
            terminal,
            queued = shared.queue.len() + 1,
            "buffer stream push"
        );
        shared.queue.push_back(item);
        shared.pushed += 1;
        let seq = shared.pushed;
        if terminal {
            shared.closed = true;
            debug!(items = seq, "buffer stream closed");
        }
        let consumer = shared.consumer.take();
        drop(shared);
        if let Some(waker) = consumer {
            waker.wake();
        }
        Ack::pending(Arc::clone(&self.shared), seq)
    }

    /// Pushes one element, assigning the next automatic index.
    pub fn push_value(&self, value: T) -> Ack<T> {
        let index = {
            let mut shared = self.shared.lock();
            let index = shared.next_index;
            if !shared.closed {
                shared.next_index = shared.next_index.saturating_add(1);
            }
            index
        };
        self.put(Ok(Iteration::indexed(value, index)))
    }

    /// Pushes one element at an explicit index.
    ///
    /// The automatic counter continues after the largest index seen,
    /// saturating at `usize::MAX`.
    pub fn push_value_at(&self, value: T, index: usize) -> Ack<T> {
        {
            let mut shared = self.shared.lock();
            if !shared.closed && index >= shared.next_index {
                shared.next_index = index.saturating_add(1);
            }
        }
        self.put(Ok(Iteration::indexed(value, index)))
    }

    /// Ends the stream with an optional return value.
    pub fn push_end(&self, value: Option<T>) -> Ack<T> {
        self.put(Ok(Iteration::Done(value)))
    }

    /// Ends the stream with a failure.
    pub fn push_error(&self, error: Error) -> Ack<T> {
        self.put(Err(error))
    }

    /// Returns true once a terminal item has been pushed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl<T> Drop for StreamWriter<T> {
    fn drop(&mut self) {
        let consumer = {
            let mut shared = self.shared.lock();
            shared.writer_dropped = true;
            shared.consumer.take()
        };
        if let Some(waker) = consumer {
            waker.wake();
        }
    }
}

impl<T> fmt::Debug for StreamWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("StreamWriter")
            .field("pushed", &shared.pushed)
            .field("closed", &shared.closed)
            .finish()
    }
}

/// Consumer half of a [`buffer_stream`].
pub struct BufferStream<T> {
    shared: Arc<Mutex<Shared<T>>>,
    charset: Option<String>,
}

impl<T> BufferStream<T> {
    /// Tags the produced chunks as text in the given charset.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Takes the next queued item, waiting if the queue is empty.
    pub fn get(&mut self) -> Next<'_, Self> {
        Next::new(self)
    }

    /// Number of items queued and not yet taken.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Readable for BufferStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Iteration<T>>> {
        let mut shared = self.shared.lock();
        if let Some(item) = shared.queue.pop_front() {
            shared.delivered += 1;
            if !matches!(item, Ok(Iteration::Next { .. })) {
                shared.finished = true;
            }
            trace!(
                delivered = shared.delivered,
                queued = shared.queue.len(),
                "buffer stream take"
            );
            let acks = std::mem::take(&mut shared.acks);
            drop(shared);
            for waker in acks {
                waker.wake();
            }
            return Poll::Ready(item);
        }
        if shared.finished {
            return Poll::Ready(Ok(Iteration::done()));
        }
        if shared.writer_dropped {
            shared.finished = true;
            debug!("buffer stream writer dropped before closing");
            return Poll::Ready(Err(Error::disconnected(
                "buffer stream writer dropped before closing",
            )));
        }
        match &shared.consumer {
            Some(existing) if existing.will_wake(cx.waker()) => {}
            _ => shared.consumer = Some(cx.waker().clone()),
        }
        Poll::Pending
    }

    fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }
}

impl<T> Drop for BufferStream<T> {
    fn drop(&mut self) {
        let acks = {
            let mut shared = self.shared.lock();
            shared.reader_dropped = true;
            std::mem::take(&mut shared.acks)
        };
        for waker in acks {
            waker.wake();
        }
    }
}

impl<T> fmt::Debug for BufferStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("BufferStream")
            .field("queued", &shared.queue.len())
            .field("delivered", &shared.delivered)
            .field("charset", &self.charset)
            .finish()
    }
}

enum AckState<T> {
    Waiting {
        shared: Arc<Mutex<Shared<T>>>,
        seq: u64,
    },
    Ready(Option<Result<()>>),
}

/// Resolves once the corresponding pushed item has been taken by the reader.
///
/// The item is enqueued whether or not the ack is awaited.
pub struct Ack<T> {
    state: AckState<T>,
}

impl<T> Ack<T> {
    fn pending(shared: Arc<Mutex<Shared<T>>>, seq: u64) -> Self {
        Self {
            state: AckState::Waiting { shared, seq },
        }
    }

    fn ready(result: Result<()>) -> Self {
        Self {
            state: AckState::Ready(Some(result)),
        }
    }
}

impl<T> Future for Ack<T> {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            AckState::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| Err(Error::internal("ack polled after completion"))),
            ),
            AckState::Waiting { shared, seq } => {
                let mut guard = shared.lock();
                if guard.delivered >= *seq {
                    drop(guard);
                    this.state = AckState::Ready(None);
                    return Poll::Ready(Ok(()));
                }
                if guard.reader_dropped {
                    drop(guard);
                    this.state = AckState::Ready(None);
                    return Poll::Ready(Err(Error::disconnected("buffer stream reader dropped")));
                }
                guard.register_ack(cx.waker());
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Ack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            AckState::Waiting { seq, .. } => f.debug_struct("Ack").field("seq", seq).finish(),
            AckState::Ready(_) => f.debug_struct("Ack").field("ready", &true).finish(),
        }
    }
}
