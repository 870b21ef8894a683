//! Continuously-seeded CSPRNG core implementing Gutmann's 1998 design: a
//! sliding-window entropy pool, periodic accumulation from pluggable
//! entropy sources, and a fork-safe extraction protocol.
//!
//! Platform entropy gathering, the hash primitive's internals beyond the
//! mixblock transform, a secure-memory allocator, and an outward-facing
//! API/CLI wrapper are all out of scope here -- see the gather traits in
//! [`poller`] for the seams a caller plugs real capabilities into.

#![allow(clippy::upper_case_acronyms)]

mod accumulator;
mod config;
mod error;
mod extractor;
mod gather;
mod hash;
mod mixer;
mod pool;
mod poller;
mod seedfile;
mod stats;

pub use config::Config;
pub use error::{CsprngError, Result};
pub use gather::{HwrngGather, JitterGather, UrandomGather};
pub use pool::EntropyOrigin;
pub use poller::{FastGather, HwPoll, SlowGather};
pub use stats::Stats;

use std::sync::Mutex;

use hash::{HashPrimitive, Sha1Primitive};
use pool::Pool;

/// Quality requested of an extraction. `Weak` is aliased to `Strong` --
/// there is no separate weak code path in this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityLevel {
    Weak = 0,
    Strong = 1,
    VeryStrong = 2,
}

/// Process-wide CSPRNG handle: the pool mutex, the resolved entropy-source
/// capabilities, and the configuration it was built with. Cheap to share
/// behind an `Arc` -- all interior state is already synchronized.
///
/// Construction is two-phase, per `spec.md` §4.7/§9: [`Csprng::basic_init`]
/// establishes the pool mutex and is all that's needed before any
/// capability has been chosen; [`Csprng::full_init`] (or
/// [`Csprng::bind_slow_gather`] on a `basic_init`-only handle) binds the
/// slow-gather capability a pool can actually be filled from. Calling
/// [`Csprng::random`] before a slow-gather capability is bound is a fatal
/// error, matching the original's "fatal if none available" for the
/// required capability.
pub struct Csprng {
    pool: Mutex<Pool>,
    stats: Stats,
    hash: Box<dyn HashPrimitive>,
    config: Config,
    slow: Option<Box<dyn SlowGather>>,
    fast: Option<Box<dyn FastGather>>,
    hwrng: Option<Box<dyn HwPoll>>,
}

impl Csprng {
    /// Basic initialization: establishes the pool mutex (a freshly
    /// allocated, empty `Pool`) and the chosen hash primitive, and asserts
    /// the `Weak < Strong < VeryStrong` quality-level ordering invariant
    /// `spec.md` §4.7 calls out. Idempotent -- repeated calls each produce
    /// an equally valid, independent handle with no capabilities bound
    /// yet. No slow-gather capability is required at this stage; binding
    /// one is deferred to `full_init`/`bind_slow_gather`.
    pub fn basic_init(config: Config) -> Self {
        assert!(
            (QualityLevel::Weak as u8) < (QualityLevel::Strong as u8)
                && (QualityLevel::Strong as u8) < (QualityLevel::VeryStrong as u8),
            "quality level ordering invariant violated"
        );
        Self {
            pool: Mutex::new(Pool::new()),
            stats: Stats::default(),
            hash: Box::new(Sha1Primitive),
            config,
            slow: None,
            fast: None,
            hwrng: None,
        }
    }

    /// Full initialization: `basic_init` followed by binding the required
    /// slow-gather capability (a core without one can never fill its
    /// pool). Fast-gather and hardware-RNG capabilities are optional and
    /// attached afterward with `with_fast_gather`/`with_hwrng`.
    pub fn full_init(config: Config, slow: Box<dyn SlowGather>) -> Self {
        Self::basic_init(config).bind_slow_gather(slow)
    }

    /// Bind the slow-gather capability on a handle created with
    /// `basic_init`. A no-op wrapper for callers that split `basic_init`
    /// and capability binding into separate steps instead of using
    /// `full_init` directly.
    pub fn bind_slow_gather(mut self, slow: Box<dyn SlowGather>) -> Self {
        self.slow = Some(slow);
        self
    }

    pub fn with_fast_gather(mut self, fast: Box<dyn FastGather>) -> Self {
        self.fast = Some(fast);
        self
    }

    pub fn with_hwrng(mut self, hwrng: Box<dyn HwPoll>) -> Self {
        self.hwrng = Some(hwrng);
        self
    }

    fn lock_pool(&self) -> std::sync::MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(|e| error::fatal!("pool mutex poisoned: {e}"))
    }

    /// The bound slow-gather capability, or a fatal abort if none has been
    /// bound yet -- there is no way to fill the pool without one.
    fn slow_gather(&self) -> &dyn SlowGather {
        self.slow
            .as_deref()
            .unwrap_or_else(|| error::fatal!("no slow-gather capability bound"))
    }

    /// Fill `out` with random bytes at the given quality level. Requests
    /// larger than the pool size are served as independent pool-sized
    /// reads, each advancing `read_pos` from wherever the previous read
    /// left it.
    pub fn random(&self, out: &mut [u8], level: QualityLevel) {
        let slow = self.slow_gather();
        let mut pool = self.lock_pool();
        for chunk in out.chunks_mut(pool::POOLSIZE) {
            extractor::read(
                &mut pool,
                &self.stats,
                self.hash.as_ref(),
                &self.config,
                slow,
                self.fast.as_deref(),
                self.hwrng.as_deref(),
                chunk,
                level,
            );
        }
    }

    /// Fold caller-supplied entropy into the pool. `quality` below 10 is
    /// dropped without touching the pool or its statistics -- this mirrors
    /// the original's documented shortcut for low-confidence sources.
    pub fn add_external_bytes(&self, buf: &[u8], quality: i32) -> Result<()> {
        if buf.is_empty() {
            return Err(CsprngError::InvalidArgument("buffer must not be empty"));
        }
        if quality < 10 {
            return Ok(());
        }
        let mut pool = self.lock_pool();
        for chunk in buf.chunks(pool::POOLSIZE) {
            accumulator::add(
                &mut pool,
                &self.stats,
                self.hash.as_ref(),
                chunk,
                EntropyOrigin::External,
            );
        }
        Ok(())
    }

    /// Log the current usage counters. Does not take the pool lock -- see
    /// [`Stats::dump`].
    pub fn dump_stats(&self) {
        self.stats.dump(pool::POOLSIZE);
    }

    /// Release the slow-gather capability's descriptors (if one is bound)
    /// and reset the pool to its just-allocated state. Safe to call on a
    /// `basic_init`-only handle, before any capability has been bound.
    pub fn close(&self) {
        if let Some(slow) = self.slow.as_deref() {
            slow.release();
        }
        let mut pool = self.lock_pool();
        *pool = Pool::new();
    }

    /// Persist the current pool to the configured seed file. A no-op if
    /// no seed file was configured or the pool has never been filled.
    pub fn update_seed_file(&self) {
        let mut pool = self.lock_pool();
        seedfile::update_seed(&mut pool, &self.stats, self.hash.as_ref(), &self.config);
    }

    /// Whether `VeryStrong` requests are being silently downgraded to
    /// `Strong` (set via `Config::enable_quick_test`).
    pub fn is_faked(&self) -> bool {
        self.config.quick_test
    }

    /// Whether pool buffers were requested to come from a secure,
    /// non-swappable allocator (set via `Config::enable_secure_alloc`).
    pub fn is_secure_alloc(&self) -> bool {
        self.config.secure_alloc
    }
}

lazy_static::lazy_static! {
    /// Convenience global instance, seeded from `/dev/urandom` with no
    /// fast-poll or hardware-RNG capability attached. Most callers with
    /// access to better entropy sources should build their own `Csprng`
    /// with `full_init` instead.
    static ref GLOBAL: Csprng = Csprng::full_init(Config::new(), Box::new(UrandomGather));
}

/// Borrow the process-wide default instance.
pub fn global() -> &'static Csprng {
    &GLOBAL
}
