//! Seed-file manager: loading a previously saved pool state at startup and
//! persisting the current one back out, both under an advisory whole-file
//! lock with bounded exponential backoff.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::{Duration, Instant};

use nix::fcntl::{flock, FlockArg};
use zeroize::Zeroize;

use crate::accumulator;
use crate::config::Config;
use crate::hash::HashPrimitive;
use crate::pool::{EntropyOrigin, Pool, POOLSIZE};
use crate::poller::{self, SlowGather};
use crate::stats::Stats;
use crate::QualityLevel;

const LOCK_WARN_AFTER: Duration = Duration::from_millis(2250);
const LOCK_MAX_SLEEP: Duration = Duration::from_millis(10_250);

/// Acquire an advisory lock on `file`, retrying indefinitely with capped
/// linear backoff: a 250ms floor, growing by a further second per attempt
/// up to a 10.25s ceiling on the *per-attempt* sleep, with a single
/// warning logged once the wait has run past roughly 2.25s. This never
/// gives up and returns a timeout -- the original (`lock_seed_file`) loops
/// on `fcntl` forever and only bounds how long each individual sleep is
/// allowed to grow to.
fn lock_with_backoff(file: &File, exclusive: bool, path: &Path) -> std::io::Result<()> {
    let arg = if exclusive {
        FlockArg::LockExclusiveNonblock
    } else {
        FlockArg::LockSharedNonblock
    };

    let start = Instant::now();
    let mut backoff = 0u64;
    let mut warned = false;

    loop {
        match flock(file.as_raw_fd(), arg) {
            Ok(()) => return Ok(()),
            Err(nix::errno::Errno::EAGAIN) | Err(nix::errno::Errno::EACCES) => {
                if !warned && start.elapsed() > LOCK_WARN_AFTER {
                    tracing::warn!(path = %path.display(), "waiting to lock seed file");
                    warned = true;
                }
                let sleep = Duration::from_millis(backoff * 1000 + 250).min(LOCK_MAX_SLEEP);
                std::thread::sleep(sleep);
                backoff = (backoff + 1).min(10);
            }
            Err(e) => return Err(std::io::Error::from(e)),
        }
    }
}

/// Load the seed file configured in `config` into the pool. Returns
/// `true` iff a valid, correctly-sized seed was read and folded in; any
/// other outcome (missing file, wrong size, lock failure) is logged and
/// treated as "nothing to load" rather than propagated.
pub(crate) fn read_seed(
    pool: &mut Pool,
    stats: &Stats,
    hash: &dyn HashPrimitive,
    config: &Config,
    slow: &dyn SlowGather,
) -> bool {
    let Some(path) = config.seed_file.as_ref() else {
        return false;
    };

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            pool.allow_seed_file_update = true;
            return false;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "can't open seed file");
            return false;
        }
    };

    if let Err(e) = lock_with_backoff(&file, false, path) {
        tracing::warn!(path = %path.display(), error = %e, "can't lock seed file");
        return false;
    }

    let meta = match file.metadata() {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "can't stat seed file");
            return false;
        }
    };

    if !meta.is_file() {
        tracing::warn!(path = %path.display(), "seed file is not a regular file, ignoring it");
        return false;
    }
    if meta.len() == 0 {
        tracing::warn!(path = %path.display(), "seed file is empty");
        pool.allow_seed_file_update = true;
        return false;
    }
    if meta.len() as usize != POOLSIZE {
        tracing::warn!(
            path = %path.display(),
            size = meta.len(),
            expected = POOLSIZE,
            "seed file has an unexpected size, not using it"
        );
        return false;
    }

    let mut buffer = vec![0u8; POOLSIZE];
    let mut file = file;
    if let Err(e) = file.read_exact(&mut buffer) {
        tracing::error!(path = %path.display(), error = %e, "can't read seed file");
        panic!("can't read seed file {}: {e}", path.display());
    }
    drop(file);

    accumulator::add(pool, stats, hash, &buffer, EntropyOrigin::Init);
    buffer.zeroize();

    let pid = std::process::id();
    accumulator::add(pool, stats, hash, &pid.to_ne_bytes(), EntropyOrigin::Init);

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    accumulator::add(
        pool,
        stats,
        hash,
        &now.as_secs().to_ne_bytes(),
        EntropyOrigin::Init,
    );

    #[cfg(unix)]
    {
        let clk = unsafe { libc::clock() };
        accumulator::add(pool, stats, hash, &clk.to_ne_bytes(), EntropyOrigin::Init);
    }

    let extra_len = if config.jitter_rng_present { 128 } else { 32 };
    poller::read_random_source(
        pool,
        stats,
        hash,
        slow,
        EntropyOrigin::ExtraPoll,
        extra_len,
        QualityLevel::Strong,
    );

    pool.allow_seed_file_update = true;
    true
}

/// Derive the keypool's word-wise transform of the current rndpool, mix
/// both pools, and write the keypool bytes out to the seed file. A no-op
/// if no seed file is configured, the pool was never filled, or the pool
/// was never allowed to write (seed file present but not yet loaded).
/// Every failure is logged and absorbed -- a failed seed-file write must
/// never take down the process that asked for random bytes.
pub(crate) fn update_seed(pool: &mut Pool, stats: &Stats, hash: &dyn HashPrimitive, config: &Config) {
    let Some(path) = config.seed_file.as_ref() else {
        return;
    };

    if !pool.pool_filled {
        tracing::info!(path = %path.display(), "seed file not updated: pool not yet filled");
        return;
    }
    if !pool.allow_seed_file_update {
        return;
    }

    pool.derive_keypool();

    crate::mixer::mix_rnd(pool, stats, hash);
    crate::mixer::mix_key(pool, stats, hash);

    let file = match OpenOptions::new()
        .write(true)
        .create(true)
        .mode(0o600)
        .open(path)
    {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "can't open seed file for writing");
            return;
        }
    };

    if let Err(e) = lock_with_backoff(&file, true, path) {
        tracing::warn!(path = %path.display(), error = %e, "can't lock seed file for writing");
        return;
    }

    if let Err(e) = file.set_len(0) {
        tracing::warn!(path = %path.display(), error = %e, "can't truncate seed file");
        return;
    }

    let mut file = file;
    if let Err(e) = file.write_all(&pool.keypool.as_slice()[..POOLSIZE]) {
        tracing::warn!(path = %path.display(), error = %e, "can't write seed file");
        return;
    }
    if let Err(e) = file.flush() {
        tracing::warn!(path = %path.display(), error = %e, "can't flush seed file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::StubPrimitive;
    use tempfile::NamedTempFile;

    struct StubSlow;
    impl SlowGather for StubSlow {
        fn gather(
            &self,
            callback: &mut dyn FnMut(&[u8], EntropyOrigin),
            origin: EntropyOrigin,
            length: usize,
            _level: QualityLevel,
        ) -> anyhow::Result<()> {
            callback(&vec![0x5Au8; length], origin);
            Ok(())
        }
    }

    #[test]
    fn missing_seed_file_allows_future_update() {
        let mut pool = Pool::new();
        let stats = Stats::default();
        let hash = StubPrimitive;
        let mut config = Config::new();
        config.set_seed_file("/nonexistent/path/to/seed");

        let loaded = read_seed(&mut pool, &stats, &hash, &config, &StubSlow);

        assert!(!loaded);
        assert!(pool.allow_seed_file_update);
    }

    #[test]
    fn wrong_sized_seed_file_is_rejected() {
        let tmp = NamedTempFile::new().expect("tempfile");
        std::fs::write(tmp.path(), [0u8; 10]).unwrap();

        let mut pool = Pool::new();
        let stats = Stats::default();
        let hash = StubPrimitive;
        let mut config = Config::new();
        config.set_seed_file(tmp.path());

        let loaded = read_seed(&mut pool, &stats, &hash, &config, &StubSlow);

        assert!(!loaded);
        assert!(!pool.allow_seed_file_update);
    }

    #[test]
    fn round_trip_through_update_and_read_changes_the_file() {
        let tmp = NamedTempFile::new().expect("tempfile");
        let path = tmp.path().to_path_buf();
        std::fs::write(&path, vec![0u8; POOLSIZE]).unwrap();

        let mut pool = Pool::new();
        let stats = Stats::default();
        let hash = StubPrimitive;
        let mut config = Config::new();
        config.set_seed_file(&path);

        assert!(read_seed(&mut pool, &stats, &hash, &config, &StubSlow));
        pool.pool_filled = true;

        update_seed(&mut pool, &stats, &hash, &config);

        let after = std::fs::read(&path).unwrap();
        assert_eq!(after.len(), POOLSIZE);
        assert_ne!(after, vec![0u8; POOLSIZE]);
    }
}
