//! End-to-end behavior of `Csprng::random`/`add_external_bytes`, driven
//! entirely through the public API with in-memory gather doubles standing
//! in for real entropy sources.

use std::sync::{Arc, Mutex};

use csprng_core::{
    Config, Csprng, EntropyOrigin, FastGather, JitterGather, QualityLevel, SlowGather,
    UrandomGather,
};

/// Records every call it receives and always succeeds, delivering
/// deterministic filler bytes so assertions can focus on call shape
/// (origin, length, ordering) rather than content. Wrapped in `Arc` so the
/// test can keep a handle after the `Csprng` takes ownership of a boxed
/// clone.
#[derive(Default)]
struct RecordingSlow {
    calls: Mutex<Vec<(EntropyOrigin, usize)>>,
}

impl RecordingSlow {
    fn calls(&self) -> Vec<(EntropyOrigin, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

/// Implemented on the `Arc` handle itself (rather than `RecordingSlow`
/// directly) so the test can keep a clone of the same `Arc` to inspect
/// calls after the `Csprng` takes ownership of a boxed clone.
impl SlowGather for Arc<RecordingSlow> {
    fn gather(
        &self,
        callback: &mut dyn FnMut(&[u8], EntropyOrigin),
        origin: EntropyOrigin,
        length: usize,
        _level: QualityLevel,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push((origin, length));
        callback(&vec![0xE7u8; length], origin);
        Ok(())
    }
}

mockall::mock! {
    CountingFast {}

    impl FastGather for CountingFast {
        fn gather(&self, callback: &mut dyn FnMut(&[u8], EntropyOrigin), origin: EntropyOrigin);
    }
}

#[test]
fn fresh_module_fills_the_pool_via_slow_gather() {
    let recorder = Arc::new(RecordingSlow::default());
    let csprng = Csprng::full_init(Config::new(), Box::new(recorder.clone()));

    let mut out = [0u8; 20];
    csprng.random(&mut out, QualityLevel::Strong);

    assert!(
        recorder
            .calls()
            .iter()
            .any(|(origin, _)| *origin == EntropyOrigin::SlowPoll),
        "a fresh module must slow-poll to reach its initial fill"
    );
}

#[test]
fn very_strong_first_use_draws_at_least_sixteen_bytes_of_extrapoll() {
    let recorder = Arc::new(RecordingSlow::default());
    let csprng = Csprng::full_init(Config::new(), Box::new(recorder.clone()));

    let mut out = [0u8; 4];
    csprng.random(&mut out, QualityLevel::VeryStrong);

    let calls = recorder.calls();
    let extrapoll: Vec<_> = calls
        .iter()
        .filter(|(origin, _)| *origin == EntropyOrigin::ExtraPoll)
        .collect();
    assert!(!extrapoll.is_empty(), "expected a forced EXTRAPOLL top-up");
    assert!(
        extrapoll.iter().any(|(_, len)| *len >= 16),
        "VERY_STRONG top-up must draw at least max(length, 16) bytes"
    );
}

#[test]
fn very_strong_64_byte_request_draws_exactly_64_bytes_of_extrapoll() {
    // spec.md §8 scenario 3: a VERY_STRONG request for 64 bytes triggers
    // an EXTRAPOLL for exactly max(64, 16) = 64 bytes on first use, not
    // merely "at least" that many.
    let recorder = Arc::new(RecordingSlow::default());
    let csprng = Csprng::full_init(Config::new(), Box::new(recorder.clone()));

    let mut out = [0u8; 64];
    csprng.random(&mut out, QualityLevel::VeryStrong);

    let calls = recorder.calls();
    let extrapoll: Vec<_> = calls
        .iter()
        .filter(|(origin, _)| *origin == EntropyOrigin::ExtraPoll)
        .collect();
    assert_eq!(
        extrapoll.first().map(|(_, len)| *len),
        Some(64),
        "first EXTRAPOLL top-up for a 64-byte VERY_STRONG request must be exactly 64 bytes"
    );
}

#[test]
fn quick_test_config_downgrades_very_strong_and_skips_extrapoll() {
    let recorder = Arc::new(RecordingSlow::default());
    let mut config = Config::new();
    config.enable_quick_test();
    let csprng = Csprng::full_init(config, Box::new(recorder.clone()));

    let mut out = [0u8; 4];
    csprng.random(&mut out, QualityLevel::VeryStrong);

    assert!(
        recorder
            .calls()
            .iter()
            .all(|(origin, _)| *origin != EntropyOrigin::ExtraPoll),
        "quick_test must downgrade VERY_STRONG before any EXTRAPOLL top-up runs"
    );
}

#[test]
fn oversize_request_is_chunked_into_pool_sized_reads() {
    let mut mock = MockCountingFast::new();
    mock.expect_gather()
        .returning(|_callback: &mut dyn FnMut(&[u8], EntropyOrigin), _origin| {});

    let recorder = Arc::new(RecordingSlow::default());
    let csprng = Csprng::full_init(Config::new(), Box::new(recorder.clone()))
        .with_fast_gather(Box::new(mock));

    // Larger than the pool: must still come back fully populated, split
    // internally into pool-sized extractions.
    let mut out = vec![0u8; 601];
    csprng.random(&mut out, QualityLevel::Strong);
    assert_eq!(out.len(), 601);
}

#[test]
fn low_quality_external_bytes_never_touch_the_gather_capability() {
    struct PanicsIfCalled;
    impl SlowGather for PanicsIfCalled {
        fn gather(
            &self,
            _callback: &mut dyn FnMut(&[u8], EntropyOrigin),
            _origin: EntropyOrigin,
            _length: usize,
            _level: QualityLevel,
        ) -> anyhow::Result<()> {
            panic!("add_external_bytes with quality < 10 must not poll the slow source");
        }
    }

    let csprng = Csprng::full_init(Config::new(), Box::new(PanicsIfCalled));
    csprng.add_external_bytes(&[1, 2, 3, 4], 9).unwrap();
}

#[test]
fn zero_byte_seed_file_forces_a_jitter_sized_extrapoll_top_up() {
    let tmp = tempfile::NamedTempFile::new().expect("tempfile");
    std::fs::write(tmp.path(), vec![0u8; 600]).unwrap();

    let recorder = Arc::new(RecordingSlow::default());
    let mut config = Config::new();
    config.set_seed_file(tmp.path());
    config.set_jitter_rng_present(true);
    let csprng = Csprng::full_init(config, Box::new(recorder.clone()));

    let mut out = [0u8; 8];
    csprng.random(&mut out, QualityLevel::Strong);

    let calls = recorder.calls();
    let first_extrapoll = calls
        .iter()
        .find(|(origin, _)| *origin == EntropyOrigin::ExtraPoll);
    assert_eq!(
        first_extrapoll.map(|(_, len)| *len),
        Some(128),
        "reading a seed file with a jitter RNG present should draw a 128-byte top-up"
    );
}

#[test]
fn zero_byte_seed_file_yields_output_unlike_the_seed_or_the_add_constant() {
    // spec.md §8 scenario 6's closing assertion: after loading an all-zero
    // seed file, a subsequent extraction must not hand back the seed
    // content itself, nor the keypool's pre-mix ADD_VALUE-broadcast word
    // pattern, with overwhelming probability -- checked here against the
    // real SHA-1 primitive, not a stub.
    let tmp = tempfile::NamedTempFile::new().expect("tempfile");
    std::fs::write(tmp.path(), vec![0u8; 600]).unwrap();

    let recorder = Arc::new(RecordingSlow::default());
    let mut config = Config::new();
    config.set_seed_file(tmp.path());
    let csprng = Csprng::full_init(config, Box::new(recorder.clone()));

    let mut out = [0u8; 32];
    csprng.random(&mut out, QualityLevel::Strong);

    assert_ne!(out, [0u8; 32], "output must not equal the zeroed seed bytes");
    assert_ne!(
        out,
        [0xA5u8; 32],
        "output must not equal the ADD_VALUE byte-broadcast pattern"
    );
}

#[test]
fn same_seed_file_without_jitter_rng_draws_a_smaller_top_up() {
    let tmp = tempfile::NamedTempFile::new().expect("tempfile");
    std::fs::write(tmp.path(), vec![0u8; 600]).unwrap();

    let recorder = Arc::new(RecordingSlow::default());
    let mut config = Config::new();
    config.set_seed_file(tmp.path());
    let csprng = Csprng::full_init(config, Box::new(recorder.clone()));

    let mut out = [0u8; 8];
    csprng.random(&mut out, QualityLevel::Strong);

    let calls = recorder.calls();
    let first_extrapoll = calls
        .iter()
        .find(|(origin, _)| *origin == EntropyOrigin::ExtraPoll);
    assert_eq!(first_extrapoll.map(|(_, len)| *len), Some(32));
}

#[test]
fn jitter_and_urandom_doubles_implement_the_public_traits() {
    // Smoke test: the bundled default capabilities satisfy the public
    // trait objects a caller would box them as.
    let _fast: Box<dyn FastGather> = Box::new(JitterGather);
    let _slow: Box<dyn SlowGather> = Box::new(UrandomGather);
}
