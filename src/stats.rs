//! Best-effort usage counters, mirroring the original's `rndstats`.
//!
//! `dump` deliberately does not take the pool mutex -- these are plain
//! atomics specifically so a caller can read them without contending with
//! in-flight extraction, accepting that a dump can race a concurrent
//! update and be off by a count or two.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Stats {
    pub(crate) mixrnd: AtomicU64,
    pub(crate) mixkey: AtomicU64,
    pub(crate) slowpolls: AtomicU64,
    pub(crate) fastpolls: AtomicU64,
    pub(crate) getbytes1: AtomicU64,
    pub(crate) ngetbytes1: AtomicU64,
    pub(crate) getbytes2: AtomicU64,
    pub(crate) ngetbytes2: AtomicU64,
    pub(crate) addbytes: AtomicU64,
    pub(crate) naddbytes: AtomicU64,
}

impl Stats {
    pub(crate) fn dump(&self, poolsize: usize) {
        tracing::info!(
            poolsize,
            mixed = self.mixrnd.load(Ordering::Relaxed),
            keymixed = self.mixkey.load(Ordering::Relaxed),
            slowpolls = self.slowpolls.load(Ordering::Relaxed),
            fastpolls = self.fastpolls.load(Ordering::Relaxed),
            nadds = self.naddbytes.load(Ordering::Relaxed),
            addbytes = self.addbytes.load(Ordering::Relaxed),
            ngetlvl1 = self.ngetbytes1.load(Ordering::Relaxed),
            getlvl1bytes = self.getbytes1.load(Ordering::Relaxed),
            ngetlvl2 = self.ngetbytes2.load(Ordering::Relaxed),
            getlvl2bytes = self.getbytes2.load(Ordering::Relaxed),
            "csprng pool usage"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = Stats::default();
        assert_eq!(stats.mixrnd.load(Ordering::Relaxed), 0);
        assert_eq!(stats.addbytes.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn dump_does_not_panic_on_fresh_stats() {
        let stats = Stats::default();
        stats.dump(600);
    }
}
