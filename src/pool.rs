//! Fixed-size entropy pool storage: the two zeroizing buffers, their
//! cursors, and the flags the rest of the crate coordinates through.

use zeroize::ZeroizeOnDrop;

/// SHA-1 digest length, and the step size the mixer advances by.
pub(crate) const DIGESTLEN: usize = 20;
/// SHA-1 block length, and the width of the mixer's sliding window.
pub(crate) const BLOCKLEN: usize = 64;
/// Number of `DIGESTLEN`-sized blocks the mixer steps over.
pub(crate) const POOLBLOCKS: usize = 30;
/// Pool content size in bytes. Also the exact size of the seed file.
pub(crate) const POOLSIZE: usize = POOLBLOCKS * DIGESTLEN;
/// Pool content size in machine words, for the keypool derivation step.
pub(crate) const POOLWORDS: usize = POOLSIZE / std::mem::size_of::<usize>();
/// Word-sized constant (every byte `0xA5`) added to each pool word when
/// deriving the keypool from the rndpool.
pub(crate) const ADD_VALUE: usize = usize::from_ne_bytes([0xA5u8; std::mem::size_of::<usize>()]);

/// Origin tag carried with every entropy accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyOrigin {
    Init,
    SlowPoll,
    FastPoll,
    ExtraPoll,
    External,
}

impl EntropyOrigin {
    /// Only a completed slow poll or a forced extra-poll top-up are solid
    /// enough to count toward the initial-fill threshold. INIT, FASTPOLL,
    /// and caller-supplied EXTERNAL bytes never advance `pool_filled_counter`.
    pub(crate) fn counts_toward_fill(self) -> bool {
        matches!(self, EntropyOrigin::SlowPoll | EntropyOrigin::ExtraPoll)
    }
}

/// A heap buffer that is zeroed on construction and on drop. Plain byte
/// buffer otherwise -- callers index through `as_slice`/`as_mut_slice`.
#[derive(ZeroizeOnDrop)]
pub(crate) struct SecureBuffer(Vec<u8>);

impl SecureBuffer {
    fn zeroed(len: usize) -> Self {
        Self(vec![0u8; len])
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// The two pools (rndpool, keypool), their read/write cursors, and the
/// bookkeeping flags the accumulator, mixer, seed-file manager, and
/// extractor all read and update. Always accessed behind the single pool
/// mutex in `Csprng`.
pub(crate) struct Pool {
    pub(crate) rndpool: SecureBuffer,
    pub(crate) keypool: SecureBuffer,
    pub(crate) write_pos: usize,
    pub(crate) read_pos: usize,
    pub(crate) pool_filled: bool,
    pub(crate) pool_filled_counter: usize,
    pub(crate) did_initial_extra_seeding: bool,
    pub(crate) pool_balance: i64,
    pub(crate) just_mixed: bool,
    pub(crate) failsafe_digest: [u8; DIGESTLEN],
    pub(crate) failsafe_digest_valid: bool,
    /// Set once a seed file has been successfully read or created; gates
    /// whether `update_seed` is allowed to write back.
    pub(crate) allow_seed_file_update: bool,
}

impl Pool {
    pub(crate) fn new() -> Self {
        Self {
            rndpool: SecureBuffer::zeroed(POOLSIZE + BLOCKLEN),
            keypool: SecureBuffer::zeroed(POOLSIZE + BLOCKLEN),
            write_pos: 0,
            read_pos: 0,
            pool_filled: false,
            pool_filled_counter: 0,
            did_initial_extra_seeding: false,
            pool_balance: 0,
            just_mixed: false,
            failsafe_digest: [0u8; DIGESTLEN],
            failsafe_digest_valid: false,
            allow_seed_file_update: false,
        }
    }

    /// Word-wise keypool derivation shared by the extractor's step 7 and
    /// the seed-file manager's `update_seed`: `keypool[i] = rndpool[i] +
    /// ADD_VALUE`, one machine word at a time.
    pub(crate) fn derive_keypool(&mut self) {
        let word = std::mem::size_of::<usize>();
        for w in 0..POOLWORDS {
            let i = w * word;
            let mut bytes = [0u8; std::mem::size_of::<usize>()];
            bytes.copy_from_slice(&self.rndpool.as_slice()[i..i + word]);
            let v = usize::from_ne_bytes(bytes).wrapping_add(ADD_VALUE);
            self.keypool.as_mut_slice()[i..i + word].copy_from_slice(&v.to_ne_bytes());
        }
    }
}
