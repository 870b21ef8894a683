//! The sliding-window pool mix: Gutmann's step of folding a pool's own
//! bytes back through the hash primitive, block by overlapping block.

use std::sync::atomic::Ordering;

use zeroize::Zeroize;

use crate::hash::{HashPrimitive, MixState};
use crate::pool::{Pool, BLOCKLEN, DIGESTLEN, POOLBLOCKS, POOLSIZE};
use crate::stats::Stats;

/// Five-step mix over a single pool buffer. `buf` must be at least
/// `POOLSIZE + BLOCKLEN` bytes (content plus scratch tail). `failsafe` is
/// `Some` only when mixing `rndpool` -- `keypool` never gets the
/// failsafe-digest treatment.
fn mix(
    buf: &mut [u8],
    failsafe: Option<(&mut [u8; DIGESTLEN], &mut bool)>,
    hash: &dyn HashPrimitive,
) {
    debug_assert!(buf.len() >= POOLSIZE + BLOCKLEN);

    let mut state = MixState::new();
    let mut block = [0u8; BLOCKLEN];

    // Step 1: seed the window with the pool's last digest-length bytes
    // followed by its first block-minus-digest bytes.
    block[..DIGESTLEN].copy_from_slice(&buf[POOLSIZE - DIGESTLEN..POOLSIZE]);
    block[DIGESTLEN..BLOCKLEN].copy_from_slice(&buf[0..BLOCKLEN - DIGESTLEN]);
    hash.mix_block(&mut state, &mut block);
    buf[0..DIGESTLEN].copy_from_slice(&block[..DIGESTLEN]);

    // Step 2: XOR in the failsafe digest from the previous mix of rndpool,
    // if one exists.
    if let Some((digest, valid)) = failsafe.as_ref() {
        if **valid {
            for i in 0..DIGESTLEN {
                buf[i] ^= digest[i];
            }
        }
    }

    // Step 3: slide the window forward a digest-length at a time, wrapping
    // around the pool, for the remaining blocks.
    for n in 1..POOLBLOCKS {
        let p = n * DIGESTLEN;
        for (i, slot) in block.iter_mut().enumerate() {
            *slot = buf[(p + i) % POOLSIZE];
        }
        hash.mix_block(&mut state, &mut block);
        buf[p..p + DIGESTLEN].copy_from_slice(&block[..DIGESTLEN]);
    }

    // Step 4: record a fresh failsafe digest of the whole pool for next
    // time, again only for rndpool.
    if let Some((digest, valid)) = failsafe {
        let mut new_digest = [0u8; DIGESTLEN];
        hash.hash_buffer(&mut new_digest, &buf[..POOLSIZE]);
        *digest = new_digest;
        *valid = true;
    }

    block.zeroize();
}

pub(crate) fn mix_rnd(pool: &mut Pool, stats: &Stats, hash: &dyn HashPrimitive) {
    mix(
        pool.rndpool.as_mut_slice(),
        Some((&mut pool.failsafe_digest, &mut pool.failsafe_digest_valid)),
        hash,
    );
    stats.mixrnd.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn mix_key(pool: &mut Pool, stats: &Stats, hash: &dyn HashPrimitive) {
    mix(pool.keypool.as_mut_slice(), None, hash);
    stats.mixkey.fetch_add(1, Ordering::Relaxed);
}
