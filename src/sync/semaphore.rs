//! Counting semaphore with a FIFO waiter queue.
//!
//! A semaphore controls access to a fixed pool of permits. `acquire` waits
//! until a permit is available; dropping the permit (or calling
//! [`Semaphore::release`]) returns it and wakes the oldest waiter.
//!
//! # Fairness
//!
//! Waiters are served strictly in the order they started waiting: a newly
//! created acquire future never takes a permit while an older waiter is
//! queued. Dropping a pending acquire future removes its waiter and, if it was
//! at the front, passes the wake-up on to the next one.
//!
//! # Example
//!
//! ```ignore
//! use sluice::sync::Semaphore;
//!
//! let sem = Semaphore::new(2);
//! let permit = sem.acquire().await?;
//! assert_eq!(sem.available_permits(), 1);
//! drop(permit);
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::tracing_compat::{debug, trace};

/// Error returned when semaphore acquisition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// The semaphore was closed.
    #[error("semaphore closed")]
    Closed,
}

/// Error returned when no permit is immediately available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no semaphore permits available")]
pub struct TryAcquireError;

/// A counting semaphore for limiting concurrent work.
#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<SemaphoreState>,
    /// Maximum permits (initial count).
    max_permits: usize,
}

#[derive(Debug)]
struct SemaphoreState {
    /// Number of available permits.
    permits: usize,
    closed: bool,
    waiters: VecDeque<Waiter>,
    next_waiter_id: u64,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    waker: Waker,
}

impl SemaphoreState {
    fn wake_front(&self) {
        if self.permits > 0 {
            if let Some(waiter) = self.waiters.front() {
                waiter.waker.wake_by_ref();
            }
        }
    }

    fn remove_waiter(&mut self, id: u64) {
        let was_front = self.waiters.front().is_some_and(|w| w.id == id);
        self.waiters.retain(|w| w.id != id);
        if was_front {
            self.wake_front();
        }
    }
}

impl Semaphore {
    /// Creates a new semaphore pre-loaded with `permits` permits.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(SemaphoreState {
                permits,
                closed: false,
                waiters: VecDeque::new(),
                next_waiter_id: 0,
            }),
            max_permits: permits,
        }
    }

    /// Returns the number of currently available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.state.lock().permits
    }

    /// Returns the maximum number of permits (initial count).
    #[must_use]
    pub fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Returns the number of queued waiters.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Returns true if the semaphore is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Closes the semaphore, failing every pending and future acquire.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        for waiter in state.waiters.drain(..) {
            waiter.waker.wake();
        }
    }

    /// Acquires one permit asynchronously.
    pub fn acquire(&self) -> AcquireFuture<'_> {
        AcquireFuture {
            semaphore: self,
            waiter_id: None,
        }
    }

    /// Acquires one permit asynchronously, holding a reference-counted handle.
    pub fn acquire_owned(self: &Arc<Self>) -> OwnedAcquireFuture {
        OwnedAcquireFuture {
            semaphore: Arc::clone(self),
            waiter_id: None,
        }
    }

    /// Tries to acquire one permit without waiting.
    pub fn try_acquire(&self) -> Result<SemaphorePermit<'_>, TryAcquireError> {
        self.take_now()?;
        Ok(SemaphorePermit { semaphore: self })
    }

    /// Tries to acquire one owned permit without waiting.
    pub fn try_acquire_owned(self: &Arc<Self>) -> Result<OwnedSemaphorePermit, TryAcquireError> {
        self.take_now()?;
        Ok(OwnedSemaphorePermit {
            semaphore: Some(Arc::clone(self)),
        })
    }

    /// Returns one permit to the pool and wakes the oldest waiter.
    ///
    /// The pool never grows past [`max_permits`](Self::max_permits); a release
    /// with no permit outstanding is ignored.
    pub fn release(&self) {
        let mut state = self.state.lock();
        if state.permits < self.max_permits {
            state.permits += 1;
        } else {
            debug!(
                max_permits = self.max_permits,
                "semaphore release ignored: no permit outstanding"
            );
        }
        state.wake_front();
    }

    fn take_now(&self) -> Result<(), TryAcquireError> {
        let mut state = self.state.lock();
        // Strict FIFO: never overtake a queued waiter.
        if state.closed || !state.waiters.is_empty() || state.permits == 0 {
            return Err(TryAcquireError);
        }
        state.permits -= 1;
        Ok(())
    }

    fn poll_acquire(
        &self,
        waiter_id: &mut Option<u64>,
        context: &mut Context<'_>,
    ) -> Poll<Result<(), AcquireError>> {
        let mut state = self.state.lock();

        if state.closed {
            if let Some(id) = waiter_id.take() {
                state.remove_waiter(id);
            }
            return Poll::Ready(Err(AcquireError::Closed));
        }

        let at_front = match *waiter_id {
            Some(id) => state.waiters.front().is_some_and(|w| w.id == id),
            None => state.waiters.is_empty(),
        };

        if at_front && state.permits > 0 {
            state.permits -= 1;
            if waiter_id.take().is_some() {
                state.waiters.pop_front();
            }
            // Leftover permits belong to the next waiter in line.
            state.wake_front();
            trace!(available = state.permits, "semaphore permit granted");
            return Poll::Ready(Ok(()));
        }

        match *waiter_id {
            Some(id) => {
                if let Some(existing) = state.waiters.iter_mut().find(|w| w.id == id) {
                    if !existing.waker.will_wake(context.waker()) {
                        existing.waker = context.waker().clone();
                    }
                }
            }
            None => {
                let id = state.next_waiter_id;
                state.next_waiter_id = state.next_waiter_id.wrapping_add(1);
                state.waiters.push_back(Waiter {
                    id,
                    waker: context.waker().clone(),
                });
                *waiter_id = Some(id);
                trace!(waiters = state.waiters.len(), "semaphore waiter queued");
            }
        }
        Poll::Pending
    }

    fn cancel_waiter(&self, waiter_id: Option<u64>) {
        if let Some(id) = waiter_id {
            self.state.lock().remove_waiter(id);
        }
    }
}

/// Future returned by [`Semaphore::acquire`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct AcquireFuture<'a> {
    semaphore: &'a Semaphore,
    waiter_id: Option<u64>,
}

impl Drop for AcquireFuture<'_> {
    fn drop(&mut self) {
        self.semaphore.cancel_waiter(self.waiter_id.take());
    }
}

impl<'a> Future for AcquireFuture<'a> {
    type Output = Result<SemaphorePermit<'a>, AcquireError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let semaphore = self.semaphore;
        semaphore
            .poll_acquire(&mut self.waiter_id, cx)
            .map(|res| res.map(|()| SemaphorePermit { semaphore }))
    }
}

/// Future returned by [`Semaphore::acquire_owned`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct OwnedAcquireFuture {
    semaphore: Arc<Semaphore>,
    waiter_id: Option<u64>,
}

impl Drop for OwnedAcquireFuture {
    fn drop(&mut self) {
        self.semaphore.cancel_waiter(self.waiter_id.take());
    }
}

impl Future for OwnedAcquireFuture {
    type Output = Result<OwnedSemaphorePermit, AcquireError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        this.semaphore
            .poll_acquire(&mut this.waiter_id, cx)
            .map(|res| {
                res.map(|()| OwnedSemaphorePermit {
                    semaphore: Some(Arc::clone(&this.semaphore)),
                })
            })
    }
}

/// A permit from a semaphore.
#[derive(Debug)]
#[must_use = "permit will be immediately released if not held"]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl SemaphorePermit<'_> {
    /// Forgets the permit without releasing it back to the semaphore.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// An owned permit from a semaphore.
#[derive(Debug)]
#[must_use = "permit will be immediately released if not held"]
pub struct OwnedSemaphorePermit {
    semaphore: Option<Arc<Semaphore>>,
}

impl OwnedSemaphorePermit {
    /// Forgets the permit; it stays taken until someone calls
    /// [`Semaphore::release`].
    pub fn forget(mut self) {
        self.semaphore = None;
    }
}

impl Drop for OwnedSemaphorePermit {
    fn drop(&mut self) {
        if let Some(semaphore) = self.semaphore.take() {
            semaphore.release();
        }
    }
}
