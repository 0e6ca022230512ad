//! The `Readable` trait.

use std::ops::DerefMut;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::Iteration;
use crate::error::Result;

/// An asynchronous sequence of [`Iteration`]s.
///
/// A `Readable` yields zero or more `Next` iterations followed by exactly one
/// terminal outcome: `Ok(Iteration::Done(_))` for clean exhaustion or `Err(_)`
/// for failure. Behavior after the terminal outcome is up to the
/// implementation; callers stop polling once they have seen it.
#[must_use = "readables do nothing unless polled"]
pub trait Readable {
    /// Values produced by this readable.
    type Item;

    /// Attempts to pull the next iteration.
    ///
    /// # Returns
    /// - `Poll::Pending` if no iteration is ready yet
    /// - `Poll::Ready(Ok(Iteration::Next { .. }))` for one element
    /// - `Poll::Ready(Ok(Iteration::Done(_)))` at exhaustion
    /// - `Poll::Ready(Err(_))` on failure
    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Result<Iteration<Self::Item>>>;

    /// Text encoding of the produced chunks, if they are text.
    ///
    /// [`join`](super::ReadableExt::join) concatenates as text when this is
    /// set and as bytes otherwise.
    fn charset(&self) -> Option<&str> {
        None
    }
}

impl<S> Readable for &mut S
where
    S: Readable + Unpin + ?Sized,
{
    type Item = S::Item;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Iteration<Self::Item>>> {
        Pin::new(&mut **self).poll_next(cx)
    }

    fn charset(&self) -> Option<&str> {
        (**self).charset()
    }
}

impl<S> Readable for Box<S>
where
    S: Readable + Unpin + ?Sized,
{
    type Item = S::Item;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Iteration<Self::Item>>> {
        Pin::new(&mut **self).poll_next(cx)
    }

    fn charset(&self) -> Option<&str> {
        (**self).charset()
    }
}

impl<P> Readable for Pin<P>
where
    P: DerefMut + Unpin,
    P::Target: Readable,
{
    type Item = <P::Target as Readable>::Item;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Iteration<Self::Item>>> {
        self.get_mut().as_mut().poll_next(cx)
    }

    fn charset(&self) -> Option<&str> {
        (**self).charset()
    }
}
