//! Default, best-effort implementations of the gather capabilities defined
//! in `poller`. Platform entropy collection proper is out of scope for
//! this core (see `spec.md`'s Non-goals) -- these exist so the crate is
//! usable standalone, adapted from the teacher's `EntropySource` family
//! (`URandom`, `HardwareRNG`, `JitterEntropy`) but expressed against the
//! callback-based gather traits rather than a `fill_bytes` contract.

use std::fs::File;
use std::io::Read;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha512};

use crate::pool::EntropyOrigin;
use crate::poller::{FastGather, HwPoll, SlowGather};
use crate::QualityLevel;

/// Reads from `/dev/urandom`. The default slow-gather capability.
#[derive(Default)]
pub struct UrandomGather;

impl SlowGather for UrandomGather {
    fn gather(
        &self,
        callback: &mut dyn FnMut(&[u8], EntropyOrigin),
        origin: EntropyOrigin,
        length: usize,
        _level: QualityLevel,
    ) -> anyhow::Result<()> {
        let mut file = File::open("/dev/urandom")?;
        let mut buf = vec![0u8; length];
        file.read_exact(&mut buf)?;
        callback(&buf, origin);
        Ok(())
    }
}

/// Quick reads from `/dev/hwrng`, when present. Usable as either a fast
/// poll capability or the dedicated hardware-RNG quick-read slot.
pub struct HwrngGather {
    available: bool,
}

impl HwrngGather {
    pub fn new() -> Self {
        Self {
            available: std::path::Path::new("/dev/hwrng").exists(),
        }
    }
}

impl Default for HwrngGather {
    fn default() -> Self {
        Self::new()
    }
}

impl HwPoll for HwrngGather {
    fn poll(&self, callback: &mut dyn FnMut(&[u8], EntropyOrigin)) {
        if !self.available {
            return;
        }
        if let Ok(mut file) = File::open("/dev/hwrng") {
            let mut buf = [0u8; 16];
            if file.read_exact(&mut buf).is_ok() {
                callback(&buf, EntropyOrigin::FastPoll);
            }
        }
    }
}

impl FastGather for HwrngGather {
    fn gather(&self, callback: &mut dyn FnMut(&[u8], EntropyOrigin), origin: EntropyOrigin) {
        if !self.available {
            return;
        }
        if let Ok(mut file) = File::open("/dev/hwrng") {
            let mut buf = [0u8; 16];
            if file.read_exact(&mut buf).is_ok() {
                callback(&buf, origin);
            }
        }
    }
}

/// CPU-timing jitter, whitened through SHA-512, in the style of the
/// teacher's `JitterEntropy`. A best-effort fast-poll source, not a
/// substitute for a real entropy daemon on the slow path.
#[derive(Default)]
pub struct JitterGather;

impl JitterGather {
    fn collect(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(256 * 8);
        let mut last = 0u64;
        for _ in 0..256 {
            let start = Instant::now();
            let mut x = 1u64;
            for i in 1..100u64 {
                x = x.wrapping_mul(i).wrapping_add(i);
            }
            std::hint::black_box(x);
            let elapsed = start.elapsed().as_nanos() as u64;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64;
            let diff = elapsed ^ last ^ now;
            last = elapsed;
            raw.extend_from_slice(&diff.to_le_bytes());
        }
        raw
    }
}

impl FastGather for JitterGather {
    fn gather(&self, callback: &mut dyn FnMut(&[u8], EntropyOrigin), origin: EntropyOrigin) {
        let raw = self.collect();
        let digest = Sha512::digest(&raw);
        callback(&digest, origin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_gather_invokes_callback_with_fastpoll() {
        let gatherer = JitterGather;
        let mut seen = None;
        gatherer.gather(
            &mut |data, origin| seen = Some((data.to_vec(), origin)),
            EntropyOrigin::FastPoll,
        );
        let (data, origin) = seen.expect("callback not invoked");
        assert_eq!(data.len(), 64);
        assert_eq!(origin, EntropyOrigin::FastPoll);
    }

    #[test]
    fn hwrng_gather_is_a_noop_without_the_device() {
        let gatherer = HwrngGather { available: false };
        let mut calls = 0;
        gatherer.gather(&mut |_, _| calls += 1, EntropyOrigin::FastPoll);
        assert_eq!(calls, 0);
    }
}
