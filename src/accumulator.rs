//! XOR-fold accumulation of external bytes into `rndpool`, with
//! wraparound-triggered remixing.

use std::sync::atomic::Ordering;

use crate::hash::HashPrimitive;
use crate::mixer;
use crate::pool::{EntropyOrigin, Pool, POOLSIZE};
use crate::stats::Stats;

/// Fold `buffer` into `rndpool` one byte at a time starting at
/// `write_pos`. Every time the cursor wraps past `POOLSIZE` the pool is
/// remixed and, if `origin` counts toward the fill threshold and the pool
/// isn't already marked full, `pool_filled_counter` is credited with the
/// bytes folded since the last wrap.
pub(crate) fn add(
    pool: &mut Pool,
    stats: &Stats,
    hash: &dyn HashPrimitive,
    buffer: &[u8],
    origin: EntropyOrigin,
) {
    let total = buffer.len();
    let mut since_wrap = 0usize;

    for (idx, &b) in buffer.iter().enumerate() {
        pool.rndpool.as_mut_slice()[pool.write_pos] ^= b;
        pool.write_pos += 1;
        since_wrap += 1;

        if pool.write_pos >= POOLSIZE {
            if origin.counts_toward_fill() && !pool.pool_filled {
                pool.pool_filled_counter += since_wrap;
                if pool.pool_filled_counter >= POOLSIZE {
                    pool.pool_filled = true;
                }
            }
            since_wrap = 0;
            pool.write_pos = 0;
            mixer::mix_rnd(pool, stats, hash);
            pool.just_mixed = idx + 1 == total;
        }
    }

    stats.addbytes.fetch_add(total as u64, Ordering::Relaxed);
    stats.naddbytes.fetch_add(1, Ordering::Relaxed);
}
