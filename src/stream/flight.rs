//! In-flight accounting shared by the concurrency-limited combinators.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{Concurrency, Flow, Notify};

/// Source pulls a combinator makes in one poll before yielding to the
/// executor.
pub(crate) const POLL_BUDGET: usize = 64;

/// Counts items between "pulled from the source" and "finished".
///
/// Every change of the count is reported to the flow's notify callback as
/// `(in_flight, max_in_flight)`. Clones share the same counter.
#[derive(Clone)]
pub(crate) struct Flight {
    count: Arc<AtomicUsize>,
    limit: Concurrency,
    notify: Option<Notify>,
}

impl Flight {
    pub(crate) fn new(flow: &Flow) -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            limit: flow.max_in_flight(),
            notify: flow.notify().cloned(),
        }
    }

    pub(crate) fn enter(&self) {
        let now = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        self.report(now);
    }

    pub(crate) fn leave(&self) {
        let prev = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .unwrap_or(0);
        self.report(prev.saturating_sub(1));
    }

    pub(crate) fn current(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn report(&self, now: usize) {
        if let Some(notify) = &self.notify {
            notify(now, self.limit);
        }
    }
}

impl fmt::Debug for Flight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flight")
            .field("in_flight", &self.current())
            .field("limit", &self.limit)
            .finish()
    }
}
