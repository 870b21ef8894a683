//! Entropy collection: the external gather capabilities this crate depends
//! on (but does not implement the platform side of), plus the fast/slow
//! poll orchestration that feeds them into the accumulator.

use std::sync::atomic::Ordering;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::accumulator;
use crate::error::fatal;
use crate::hash::HashPrimitive;
use crate::pool::{EntropyOrigin, Pool, POOLSIZE};
use crate::stats::Stats;
use crate::QualityLevel;

/// External slow entropy source (kernel blocking pool, jitter RNG, EGD
/// socket, ...). Must deliver at least `length` bytes, invoking `callback`
/// one or more times; returning `Err` is treated as fatal by the poller,
/// since there is no fallback once the core depends on this capability.
pub trait SlowGather: Send + Sync {
    fn gather(
        &self,
        callback: &mut dyn FnMut(&[u8], EntropyOrigin),
        origin: EntropyOrigin,
        length: usize,
        level: QualityLevel,
    ) -> anyhow::Result<()>;

    /// Best-effort release of any held descriptors, e.g. before process exit.
    fn release(&self) {}
}

/// External fast, non-blocking, best-effort entropy source. No length
/// contract -- the callback may be invoked zero or more times.
pub trait FastGather: Send + Sync {
    fn gather(&self, callback: &mut dyn FnMut(&[u8], EntropyOrigin), origin: EntropyOrigin);
}

/// Optional hardware-RNG quick-read capability, folded from the fast path.
pub trait HwPoll: Send + Sync {
    fn poll(&self, callback: &mut dyn FnMut(&[u8], EntropyOrigin));
}

fn mono_nanos() -> u64 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let anchor = ANCHOR.get_or_init(Instant::now);
    anchor.elapsed().as_nanos() as u64
}

/// Fast, non-blocking poll: folds the external fast-gather capability (if
/// any), available time sources, process resource usage, and an optional
/// hardware-RNG quick read. All bytes are folded with origin FASTPOLL,
/// which never advances entropy estimates.
pub(crate) fn do_fast_poll(
    pool: &mut Pool,
    stats: &Stats,
    hash: &dyn HashPrimitive,
    fast: Option<&dyn FastGather>,
    hwrng: Option<&dyn HwPoll>,
) {
    stats.fastpolls.fetch_add(1, Ordering::Relaxed);

    let mut add_cb = |data: &[u8], origin: EntropyOrigin| {
        accumulator::add(pool, stats, hash, data, origin);
    };

    if let Some(fast) = fast {
        fast.gather(&mut add_cb, EntropyOrigin::FastPoll);
    }

    let wall = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    add_cb(&wall.as_secs().to_ne_bytes(), EntropyOrigin::FastPoll);
    add_cb(&wall.subsec_nanos().to_ne_bytes(), EntropyOrigin::FastPoll);
    add_cb(&mono_nanos().to_ne_bytes(), EntropyOrigin::FastPoll);

    #[cfg(unix)]
    {
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } == 0 {
            let bytes = unsafe {
                std::slice::from_raw_parts(
                    (&usage as *const libc::rusage) as *const u8,
                    std::mem::size_of::<libc::rusage>(),
                )
            };
            add_cb(bytes, EntropyOrigin::FastPoll);
        }
        let clk = unsafe { libc::clock() };
        add_cb(&clk.to_ne_bytes(), EntropyOrigin::FastPoll);
    }

    if let Some(hw) = hwrng {
        hw.poll(&mut add_cb);
    }
}

/// Blocking slow poll requesting `POOLSIZE / 5` bytes at STRONG quality,
/// origin SLOWPOLL.
pub(crate) fn random_poll(pool: &mut Pool, stats: &Stats, hash: &dyn HashPrimitive, slow: &dyn SlowGather) {
    stats.slowpolls.fetch_add(1, Ordering::Relaxed);
    read_random_source(
        pool,
        stats,
        hash,
        slow,
        EntropyOrigin::SlowPoll,
        POOLSIZE / 5,
        QualityLevel::Strong,
    );
}

/// Forced read from the slow-gather capability with explicit parameters.
/// Fatal if the capability hard-fails -- there is nowhere else to turn.
pub(crate) fn read_random_source(
    pool: &mut Pool,
    stats: &Stats,
    hash: &dyn HashPrimitive,
    slow: &dyn SlowGather,
    origin: EntropyOrigin,
    length: usize,
    level: QualityLevel,
) {
    let mut add_cb = |data: &[u8], o: EntropyOrigin| {
        accumulator::add(pool, stats, hash, data, o);
    };
    if let Err(e) = slow.gather(&mut add_cb, origin, length, level) {
        fatal!("no way to gather entropy for the RNG: {e}");
    }
}
