//! Logging compatibility layer.
//!
//! Works whether or not the `tracing-integration` feature is enabled:
//!
//! - **With feature enabled**: re-exports the event macros from `tracing`.
//! - **Without feature**: no-op macros that compile to nothing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::tracing_compat::{debug, trace};
//!
//! trace!(promise_id = %id, "promise created");
//! debug!(promise_id = %id, winner, "race settled");
//! ```
//!
//! # Feature Flag
//!
//! ```toml
//! settle = { version = "0.1", features = ["tracing-integration"] }
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

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

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
