//! Configuration resolved before the pool is first used.

use std::path::PathBuf;

use crate::error::fatal;

/// Knobs fixed for the lifetime of a `Csprng`. All setters are meant to be
/// called once, before the first call to `Csprng::random` -- nothing here
/// is re-read per-call.
#[derive(Debug, Default)]
pub struct Config {
    pub(crate) seed_file: Option<PathBuf>,
    seed_file_set: bool,
    pub(crate) secure_alloc: bool,
    pub(crate) quick_test: bool,
    pub(crate) jitter_rng_present: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the seed file path. Calling this a second time is a fatal
    /// bug, matching the original's `BUG()` on a repeated
    /// `_gcry_rngcsprng_set_seed_file`.
    pub fn set_seed_file(&mut self, path: impl Into<PathBuf>) {
        if self.seed_file_set {
            fatal!("set_seed_file called more than once");
        }
        self.seed_file = Some(path.into());
        self.seed_file_set = true;
    }

    /// Request that pool buffers come from a secure (non-swappable)
    /// allocator. The allocator itself is out of scope for this crate --
    /// this only records the caller's intent for `Csprng::is_secure_alloc`.
    pub fn enable_secure_alloc(&mut self) {
        self.secure_alloc = true;
    }

    /// Downgrade `VeryStrong` requests to `Strong`, skipping the
    /// extra-poll top-up. Intended for test environments only.
    pub fn enable_quick_test(&mut self) {
        self.quick_test = true;
    }

    /// Tell the seed-file manager whether a jitter-entropy capability is
    /// available, which decides whether `read_seed`'s forced top-up pulls
    /// 128 or 32 bytes.
    pub fn set_jitter_rng_present(&mut self, present: bool) {
        self.jitter_rng_present = present;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "set_seed_file called more than once")]
    fn second_set_seed_file_is_fatal() {
        let mut config = Config::new();
        config.set_seed_file("/tmp/a.seed");
        config.set_seed_file("/tmp/b.seed");
    }

    #[test]
    fn defaults_are_conservative() {
        let config = Config::new();
        assert!(config.seed_file.is_none());
        assert!(!config.secure_alloc);
        assert!(!config.quick_test);
        assert!(!config.jitter_rng_present);
    }
}
