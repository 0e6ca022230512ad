//! Concurrency and flow configuration.
//!
//! Every concurrency-limited combinator takes a [`Flow`]: the maximum number
//! of items allowed in flight plus an optional instrumentation callback.
//! Plain integers convert into a `Flow`, with `0` meaning "unbounded":
//!
//! ```ignore
//! use sluice::{Flow, ReadableExt};
//!
//! source.for_each(handler, 3);                       // at most 3 in flight
//! source.map(f, Flow::unbounded());                  // no limit
//! source.map(f, Flow::bounded(2).with_notify(|n, max| println!("{n}/{max}")));
//! ```
//!
//! [`StreamConfig`] carries process-wide defaults and can be deserialized
//! from a configuration file or read from the environment.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Environment variable consulted by [`StreamConfig::from_env`] for the
/// default in-flight bound.
pub const MAX_IN_FLIGHT_ENV: &str = "SLUICE_MAX_IN_FLIGHT";
/// Environment variable consulted by [`StreamConfig::from_env`] for the
/// default byte chunk size.
pub const CHUNK_SIZE_ENV: &str = "SLUICE_CHUNK_SIZE";

/// Default chunk size for byte readers.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Upper bound on concurrently outstanding work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<usize>", into = "Option<usize>")]
pub enum Concurrency {
    /// No limit.
    #[default]
    Unbounded,
    /// At most this many items in flight.
    Bounded(NonZeroUsize),
}

impl Concurrency {
    /// One item at a time.
    pub const SEQUENTIAL: Self = Self::Bounded(NonZeroUsize::MIN);

    /// Creates a bound; `0` selects [`Concurrency::Unbounded`].
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        NonZeroUsize::new(limit).map_or(Self::Unbounded, Self::Bounded)
    }

    /// Returns the numeric limit, or `None` when unbounded.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(n) => Some(n.get()),
        }
    }

    /// Returns true if no limit applies.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

impl From<usize> for Concurrency {
    fn from(limit: usize) -> Self {
        Self::bounded(limit)
    }
}

impl From<Option<usize>> for Concurrency {
    fn from(limit: Option<usize>) -> Self {
        limit.map_or(Self::Unbounded, Self::bounded)
    }
}

impl From<Concurrency> for Option<usize> {
    fn from(c: Concurrency) -> Self {
        c.limit()
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Bounded(n) => write!(f, "{n}"),
        }
    }
}

/// Error returned when parsing a [`Concurrency`] from text fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid concurrency {input:?}: expected a number or \"unbounded\"")]
pub struct ConcurrencyParseError {
    /// The rejected input.
    pub input: String,
}

impl FromStr for Concurrency {
    type Err = ConcurrencyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "unbounded" | "unlimited" | "none" => Ok(Self::Unbounded),
            other => other
                .parse::<usize>()
                .map(Self::bounded)
                .map_err(|_| ConcurrencyParseError {
                    input: s.to_string(),
                }),
        }
    }
}

/// Instrumentation callback invoked with `(in_flight, max_in_flight)` on
/// every change of the in-flight count.
pub type Notify = Arc<dyn Fn(usize, Concurrency) + Send + Sync>;

/// Concurrency settings for one combinator invocation.
#[derive(Clone, Default)]
pub struct Flow {
    max_in_flight: Concurrency,
    notify: Option<Notify>,
}

impl Flow {
    /// Creates a flow with the given bound and no instrumentation.
    #[must_use]
    pub fn new(max_in_flight: impl Into<Concurrency>) -> Self {
        Self {
            max_in_flight: max_in_flight.into(),
            notify: None,
        }
    }

    /// Strictly one item at a time.
    #[must_use]
    pub fn sequential() -> Self {
        Self::new(Concurrency::SEQUENTIAL)
    }

    /// No in-flight limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(Concurrency::Unbounded)
    }

    /// At most `limit` items in flight (`0` means unbounded).
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self::new(limit)
    }

    /// Installs an instrumentation callback.
    #[must_use]
    pub fn with_notify<F>(mut self, notify: F) -> Self
    where
        F: Fn(usize, Concurrency) + Send + Sync + 'static,
    {
        self.notify = Some(Arc::new(notify));
        self
    }

    /// Returns the in-flight bound.
    #[must_use]
    pub const fn max_in_flight(&self) -> Concurrency {
        self.max_in_flight
    }

    /// Returns the instrumentation callback, if any.
    #[must_use]
    pub fn notify(&self) -> Option<&Notify> {
        self.notify.as_ref()
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("max_in_flight", &self.max_in_flight)
            .field("notify", &self.notify.is_some())
            .finish()
    }
}

impl From<usize> for Flow {
    fn from(limit: usize) -> Self {
        Self::new(limit)
    }
}

impl From<Concurrency> for Flow {
    fn from(max_in_flight: Concurrency) -> Self {
        Self::new(max_in_flight)
    }
}

/// Process-wide defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Default in-flight bound for combinators built from this config.
    pub max_in_flight: Concurrency,
    /// Chunk size used by byte readers.
    pub chunk_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_in_flight: Concurrency::Unbounded,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl StreamConfig {
    /// Reads overrides from `SLUICE_MAX_IN_FLIGHT` and `SLUICE_CHUNK_SIZE`,
    /// falling back to defaults for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_in_flight = std::env::var(MAX_IN_FLIGHT_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_in_flight);
        let chunk_size = std::env::var(CHUNK_SIZE_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.chunk_size);
        Self {
            max_in_flight,
            chunk_size,
        }
    }

    /// Builds a [`Flow`] with this config's bound.
    #[must_use]
    pub fn flow(&self) -> Flow {
        Flow::new(self.max_in_flight)
    }
}
