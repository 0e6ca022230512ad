//! All combinator: collect every element into an index-addressed vector.

use std::fmt;
use std::future::{Future, Ready};
use std::pin::Pin;
use std::task::{Context, Poll};

use super::reduce::Reduce;
use super::Readable;
use crate::config::Flow;
use crate::error::{Error, ErrorKind, Result};

type Slots<T> = Vec<Option<T>>;
type SlotFn<T> = fn(Slots<T>, T, Option<usize>) -> Ready<Result<Slots<T>>>;

/// Future for the [`all`](super::ReadableExt::all) method.
///
/// Slot `i` of the result holds the element produced with index `i`;
/// positions no element claimed stay `None`. Elements without an index take
/// the next position after the current end. An index whose slots cannot be
/// allocated fails with [`ErrorKind::InvalidData`](crate::ErrorKind::InvalidData).
#[must_use = "futures do nothing unless polled"]
pub struct All<S: Readable> {
    inner: Reduce<S, SlotFn<S::Item>, Ready<Result<Slots<S::Item>>>, Slots<S::Item>>,
}

impl<S: Readable> All<S> {
    pub(crate) fn new(source: S, flow: Flow) -> Self {
        let f: SlotFn<S::Item> = slot::<S::Item>;
        Self {
            inner: Reduce::fold(source, f, Vec::new(), flow),
        }
    }
}

fn slot<T>(mut out: Slots<T>, value: T, index: Option<usize>) -> Ready<Result<Slots<T>>> {
    let at = index.unwrap_or(out.len());
    if at >= out.len() {
        let grown = at
            .checked_add(1)
            .filter(|&len| out.try_reserve_exact(len - out.len()).is_ok());
        let Some(len) = grown else {
            return std::future::ready(Err(Error::new(ErrorKind::InvalidData)
                .with_message(format!("index {at} is too large to collect"))));
        };
        out.resize_with(len, || None);
    }
    out[at] = Some(value);
    std::future::ready(Ok(out))
}

impl<S: Readable + Unpin> Future for All<S> {
    type Output = Result<Vec<Option<S::Item>>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

impl<S: Readable + fmt::Debug> fmt::Debug for All<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("All").field("inner", &self.inner).finish()
    }
}
