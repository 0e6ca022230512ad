//! Concurrency gates.
//!
//! - [`Semaphore`]: counting semaphore with a strict FIFO waiter queue
//! - [`Gate`]: either a bounded semaphore or a zero-cost unbounded pass-through,
//!   selected from a [`Concurrency`](crate::Concurrency)
//!
//! Every concurrency-limited combinator acquires a gate permit before pulling
//! from its source and gives it back when the pulled item leaves flight.

mod gate;
mod semaphore;

pub use gate::{Gate, GateAcquire, GatePermit};
pub use semaphore::{
    AcquireError, AcquireFuture, OwnedAcquireFuture, OwnedSemaphorePermit, Semaphore,
    SemaphorePermit, TryAcquireError,
};
