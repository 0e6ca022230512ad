//! Concurrency gate selected by configuration.
//!
//! A bounded gate is a [`Semaphore`] pre-loaded with `n` permits. An unbounded
//! gate is a distinct zero-cost variant: acquiring resolves immediately and
//! releasing does nothing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::semaphore::{AcquireError, OwnedAcquireFuture, OwnedSemaphorePermit, Semaphore};
use crate::config::Concurrency;

/// A concurrency gate: bounded semaphore or unlimited pass-through.
#[derive(Debug, Clone)]
pub enum Gate {
    /// No limit; every acquire succeeds immediately.
    Unbounded,
    /// Fixed pool of permits.
    Bounded(Arc<Semaphore>),
}

impl Gate {
    /// Creates the gate for the given bound.
    #[must_use]
    pub fn new(limit: impl Into<Concurrency>) -> Self {
        match limit.into() {
            Concurrency::Unbounded => Self::Unbounded,
            Concurrency::Bounded(n) => Self::Bounded(Arc::new(Semaphore::new(n.get()))),
        }
    }

    /// Returns the configured bound.
    #[must_use]
    pub fn limit(&self) -> Concurrency {
        match self {
            Self::Unbounded => Concurrency::Unbounded,
            Self::Bounded(sem) => Concurrency::bounded(sem.max_permits()),
        }
    }

    /// Returns available permits, or `None` for an unbounded gate.
    #[must_use]
    pub fn available_permits(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(sem) => Some(sem.available_permits()),
        }
    }

    /// Waits for a permit.
    pub fn acquire(&self) -> GateAcquire {
        GateAcquire {
            inner: match self {
                Self::Unbounded => None,
                Self::Bounded(sem) => Some(sem.acquire_owned()),
            },
        }
    }

    /// Takes a permit if one is free right now.
    #[must_use]
    pub fn try_acquire(&self) -> Option<GatePermit> {
        match self {
            Self::Unbounded => Some(GatePermit { permit: None }),
            Self::Bounded(sem) => sem
                .try_acquire_owned()
                .ok()
                .map(|permit| GatePermit {
                    permit: Some(permit),
                }),
        }
    }

    /// Returns one permit taken by a forgotten [`GatePermit`].
    pub fn release(&self) {
        if let Self::Bounded(sem) = self {
            sem.release();
        }
    }
}

/// Future returned by [`Gate::acquire`].
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct GateAcquire {
    inner: Option<OwnedAcquireFuture>,
}

impl Future for GateAcquire {
    type Output = Result<GatePermit, AcquireError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.inner.as_mut() {
            None => Poll::Ready(Ok(GatePermit { permit: None })),
            Some(fut) => Pin::new(fut).poll(cx).map(|res| {
                res.map(|permit| GatePermit {
                    permit: Some(permit),
                })
            }),
        }
    }
}

/// A held gate permit; dropping it releases the permit.
#[derive(Debug)]
#[must_use = "permit will be immediately released if not held"]
pub struct GatePermit {
    permit: Option<OwnedSemaphorePermit>,
}

impl GatePermit {
    /// Keeps the permit taken after this value is gone. Whoever forgets a
    /// permit is responsible for a matching [`Gate::release`].
    pub fn forget(self) {
        if let Some(permit) = self.permit {
            permit.forget();
        }
    }
}
