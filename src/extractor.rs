//! The read protocol: the eleven steps a single extraction goes through,
//! including the fork-safety checks that bracket it.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::accumulator;
use crate::config::Config;
use crate::error::fatal;
use crate::hash::HashPrimitive;
use crate::mixer;
use crate::pool::{EntropyOrigin, Pool, POOLSIZE};
use crate::poller::{self, FastGather, HwPoll, SlowGather};
use crate::seedfile;
use crate::stats::Stats;
use crate::QualityLevel;

/// PID observed by the previous extraction, or `-1` before the first one.
/// A process-wide value by design: fork detection compares the OS pid
/// across calls, not per-`Csprng`-instance state.
static RECORDED_PID: AtomicI64 = AtomicI64::new(-1);

fn current_pid() -> i64 {
    std::process::id() as i64
}

/// Fill `out` (at most `POOLSIZE` bytes; callers chunk larger requests)
/// with bytes extracted at `level`. Implements `spec.md`'s eleven-step
/// read protocol, retrying the whole extraction if a fork is detected
/// either before or after it.
pub(crate) fn read(
    pool: &mut Pool,
    stats: &Stats,
    hash: &dyn HashPrimitive,
    config: &Config,
    slow: &dyn SlowGather,
    fast: Option<&dyn FastGather>,
    hwrng: Option<&dyn HwPoll>,
    out: &mut [u8],
    mut level: QualityLevel,
) {
    let length = out.len();
    if length > POOLSIZE {
        fatal!("extractor: requested {length} bytes exceeds pool size {POOLSIZE}");
    }
    if config.quick_test && level == QualityLevel::VeryStrong {
        level = QualityLevel::Strong;
    }

    if level == QualityLevel::VeryStrong {
        stats.getbytes2.fetch_add(length as u64, Ordering::Relaxed);
        stats.ngetbytes2.fetch_add(1, Ordering::Relaxed);
    } else {
        stats.getbytes1.fetch_add(length as u64, Ordering::Relaxed);
        stats.ngetbytes1.fetch_add(1, Ordering::Relaxed);
    }

    loop {
        // Step 1: fork check before doing any work.
        let pid_before = current_pid();
        note_pid_change(pool, stats, hash, pid_before);

        // Step 2: make sure the pool has at least an initial fill.
        if !pool.pool_filled {
            seedfile::read_seed(pool, stats, hash, config, slow);
        }
        while !pool.pool_filled {
            poller::random_poll(pool, stats, hash, slow);
        }

        // Step 3: VERY_STRONG top-up.
        if level == QualityLevel::VeryStrong {
            top_up_very_strong(pool, stats, hash, slow, length);
        }

        // Step 4: fast poll.
        poller::do_fast_poll(pool, stats, hash, fast, hwrng);

        // Step 5: fold the pid back in.
        accumulator::add(pool, stats, hash, &pid_before.to_ne_bytes(), EntropyOrigin::Init);

        // Step 6: mix rndpool if it isn't already freshly mixed.
        if !pool.just_mixed {
            mixer::mix_rnd(pool, stats, hash);
        }

        // Step 7: derive keypool from rndpool.
        pool.derive_keypool();

        // Step 8: mix both pools again, unconditionally.
        mixer::mix_rnd(pool, stats, hash);
        mixer::mix_key(pool, stats, hash);

        // Step 9: deliver bytes from keypool, wrapping read_pos.
        for byte in out.iter_mut() {
            *byte = pool.keypool.as_slice()[pool.read_pos];
            pool.read_pos += 1;
            if pool.read_pos >= POOLSIZE {
                pool.read_pos = 0;
            }
            pool.pool_balance -= 1;
        }
        if pool.pool_balance < 0 {
            pool.pool_balance = 0;
        }

        // Step 10: zeroise keypool content immediately after delivery.
        pool.keypool.as_mut_slice()[..POOLSIZE].fill(0);

        // Step 11: fork check after the work; retry from the top if it fired.
        let pid_after = current_pid();
        if pid_after != pid_before {
            note_pid_change(pool, stats, hash, pid_after);
            continue;
        }

        break;
    }
}

fn note_pid_change(pool: &mut Pool, stats: &Stats, hash: &dyn HashPrimitive, pid: i64) {
    let previous = RECORDED_PID.swap(pid, Ordering::SeqCst);
    if previous != -1 && previous != pid {
        accumulator::add(pool, stats, hash, &pid.to_ne_bytes(), EntropyOrigin::Init);
        pool.just_mixed = false;
    }
}

fn top_up_very_strong(
    pool: &mut Pool,
    stats: &Stats,
    hash: &dyn HashPrimitive,
    slow: &dyn SlowGather,
    length: usize,
) {
    if !pool.did_initial_extra_seeding {
        pool.pool_balance = 0;
        let needed = length.max(16);
        if needed > POOLSIZE {
            fatal!("extractor: very-strong top-up of {needed} bytes exceeds pool size");
        }
        poller::read_random_source(
            pool,
            stats,
            hash,
            slow,
            EntropyOrigin::ExtraPoll,
            needed,
            QualityLevel::VeryStrong,
        );
        pool.pool_balance += needed as i64;
        pool.did_initial_extra_seeding = true;
    }

    if pool.pool_balance < length as i64 {
        if pool.pool_balance < 0 {
            pool.pool_balance = 0;
        }
        let needed = (length as i64 - pool.pool_balance) as usize;
        if needed > POOLSIZE {
            fatal!("extractor: very-strong top-up of {needed} bytes exceeds pool size");
        }
        poller::read_random_source(
            pool,
            stats,
            hash,
            slow,
            EntropyOrigin::ExtraPoll,
            needed,
            QualityLevel::VeryStrong,
        );
        pool.pool_balance += needed as i64;
    }
}
