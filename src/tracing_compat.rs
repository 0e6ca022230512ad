//! Tracing compatibility layer.
//!
//! - **With `tracing-integration`**: re-exports the `tracing` macros.
//! - **Without it**: no-op macros that expand to nothing.
//!
//! Library code logs through this module only:
//!
//! ```rust,ignore
//! use sluice::tracing_compat::{debug, trace};
//!
//! trace!(index = 3, "buffer stream push");
//! debug!("buffer stream closed");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op implementations when tracing is disabled.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
