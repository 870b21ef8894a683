//! The hash primitive this module is built against: a one-shot digest plus
//! a raw, unpadded compression step applied once per 64-byte pool block.
//!
//! Gutmann's design (and libgcrypt's `_gcry_rngcsprng_mixblock`) does not
//! run a padded SHA-1 digest over each block -- it feeds the block straight
//! through the compression transform and keeps the running state across
//! the pool's thirty blocks. No generic digest crate exposes that as a
//! stable public API, so `mix_block` implements the transform directly;
//! `hash_buffer` is a real padded digest and uses the `sha1` crate's
//! `Digest` trait.

use zeroize::Zeroize;

use crate::pool::{BLOCKLEN, DIGESTLEN};

const SHA1_IV: [u32; 5] = [0x67452301, 0xEFCDAB89, 0x98BADCFE, 0x10325476, 0xC3D2E1F0];

/// Running compression state threaded across the thirty blocks of a single
/// `mixer::mix` pass. Reset to the standard SHA-1 IV at the start of every
/// pass -- it is never persisted across separate pool mixes.
pub(crate) struct MixState {
    words: [u32; 5],
}

impl MixState {
    pub(crate) fn new() -> Self {
        Self { words: SHA1_IV }
    }
}

/// External hash primitive the pool mixer and seed-file manager are built
/// against. Production code uses [`Sha1Primitive`]; tests use a stub that
/// makes `mixer::mix` a pure, inspectable function of the pool bytes.
pub(crate) trait HashPrimitive: Send + Sync {
    /// One-shot digest of `input` into `out`.
    fn hash_buffer(&self, out: &mut [u8; DIGESTLEN], input: &[u8]);

    /// Advance `state` by one block, and overwrite `block` in place with
    /// the resulting digest words. Returns the number of bytes of `block`
    /// that should be treated as scrubbed scratch space afterward.
    fn mix_block(&self, state: &mut MixState, block: &mut [u8; BLOCKLEN]) -> usize;
}

#[derive(Default)]
pub(crate) struct Sha1Primitive;

impl HashPrimitive for Sha1Primitive {
    fn hash_buffer(&self, out: &mut [u8; DIGESTLEN], input: &[u8]) {
        use sha1::{Digest, Sha1};
        let digest = Sha1::digest(input);
        out.copy_from_slice(&digest);
    }

    fn mix_block(&self, state: &mut MixState, block: &mut [u8; BLOCKLEN]) -> usize {
        sha1_compress(&mut state.words, block);
        for (i, word) in state.words.iter().enumerate() {
            block[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        BLOCKLEN
    }
}

/// One round of the SHA-1 compression function over a single 64-byte block.
fn sha1_compress(state: &mut [u32; 5], block: &[u8; BLOCKLEN]) {
    let mut w = [0u32; 80];
    for (i, word) in w.iter_mut().take(16).enumerate() {
        *word = u32::from_be_bytes([
            block[4 * i],
            block[4 * i + 1],
            block[4 * i + 2],
            block[4 * i + 3],
        ]);
    }
    for i in 16..80 {
        w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
    }

    let (mut a, mut b, mut c, mut d, mut e) = (state[0], state[1], state[2], state[3], state[4]);
    for (i, &wi) in w.iter().enumerate() {
        let (f, k) = match i {
            0..=19 => ((b & c) | ((!b) & d), 0x5A827999u32),
            20..=39 => (b ^ c ^ d, 0x6ED9EBA1),
            40..=59 => ((b & c) | (b & d) | (c & d), 0x8F1BBCDC),
            _ => (b ^ c ^ d, 0xCA62C1D6),
        };
        let temp = a
            .rotate_left(5)
            .wrapping_add(f)
            .wrapping_add(e)
            .wrapping_add(k)
            .wrapping_add(wi);
        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = temp;
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
    state[4] = state[4].wrapping_add(e);

    w.zeroize();
}

/// Deterministic stand-in used by tests: `hash_buffer` copies the leading
/// `DIGESTLEN` bytes of its input (zero-padded), and `mix_block` leaves its
/// block untouched, so the "result" written back into the pool is simply
/// the block's own first twenty bytes.
#[cfg(test)]
pub(crate) struct StubPrimitive;

#[cfg(test)]
impl HashPrimitive for StubPrimitive {
    fn hash_buffer(&self, out: &mut [u8; DIGESTLEN], input: &[u8]) {
        out.fill(0);
        let n = input.len().min(DIGESTLEN);
        out[..n].copy_from_slice(&input[..n]);
    }

    fn mix_block(&self, _state: &mut MixState, _block: &mut [u8; BLOCKLEN]) -> usize {
        DIGESTLEN
    }
}
