//! Error types and the fatal-abort path used for unrecoverable conditions.
//!
//! Seed-file I/O failures (missing, malformed, lock/write trouble) are
//! logged and absorbed at the call site in `seedfile` -- per `spec.md` §7
//! they are soft failures that must never propagate to a caller as a
//! `Result`, so there is no variant for them here. What does reach this
//! enum are failures a caller hands bad input into directly. Separately,
//! the conditions `spec.md` §7 calls out as unrecoverable programmer or
//! environment errors (no slow-gather capability configured, a poisoned
//! pool mutex, an oversize extraction request, a second `set_seed_file`
//! call) go through `fatal!` below rather than this enum at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsprngError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

pub type Result<T> = std::result::Result<T, CsprngError>;

/// Log at error level and then abort the process, mirroring the original's
/// `log_fatal` (which never returns). Do not reach for this for anything a
/// caller could plausibly recover from -- see `spec.md` §7 for the closed
/// list of conditions that belong here.
macro_rules! fatal {
    ($($arg:tt)*) => {{
        tracing::error!($($arg)*);
        panic!($($arg)*)
    }};
}
pub(crate) use fatal;
