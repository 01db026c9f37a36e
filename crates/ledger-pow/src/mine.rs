use crate::block::{Block, HashTemplate, Nonce};
use crate::config::ChainConfig;
use crate::difficulty::retarget;
use crate::pow::meets_difficulty;
use serde_json::Value;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MiningError {
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("failed to spawn mining worker: {0}")]
    Spawn(#[from] io::Error),

    #[error("mining worker panicked")]
    WorkerPanicked,
}

/// Source of nanosecond timestamps for mining.
pub trait Clock {
    fn now_ns(&self) -> u64;
}

/// Wall clock: nanoseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ns(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Shared stop flag for an in-flight search. Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Mine a block on top of `predecessor`, running until one is found.
pub fn mine(predecessor: &Block, data: Value, config: &ChainConfig) -> Block {
    match search(predecessor, data, config, &SystemClock, None) {
        Ok(block) => block,
        Err(_) => unreachable!("a search without a cancel token runs to completion"),
    }
}

/// Mine with an explicit clock, giving up once `cancel` is set.
///
/// The token is checked before every attempt.
pub fn mine_with<C: Clock + ?Sized>(
    predecessor: &Block,
    data: Value,
    config: &ChainConfig,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Block, MiningError> {
    search(predecessor, data, config, clock, Some(cancel))
}

fn search<C: Clock + ?Sized>(
    predecessor: &Block,
    data: Value,
    config: &ChainConfig,
    clock: &C,
    cancel: Option<&CancelToken>,
) -> Result<Block, MiningError> {
    let mut timestamp = clock.now_ns();
    let last_hash = predecessor.hash().to_string();
    let difficulty = retarget(predecessor, timestamp, config);
    let template = HashTemplate::new(&last_hash, &data, difficulty);

    let mut nonce = 0u64;
    let mut hash = template.hash(timestamp, &Nonce::Counter(nonce));

    while !meets_difficulty(&hash, difficulty) {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            info!(attempts = nonce + 1, "mining cancelled");
            return Err(MiningError::Cancelled {
                attempts: nonce + 1,
            });
        }
        nonce += 1;
        timestamp = clock.now_ns();
        hash = template.hash(timestamp, &Nonce::Counter(nonce));
    }

    info!(
        %difficulty,
        nonce,
        %hash,
        attempts = nonce + 1,
        "mined block"
    );

    Ok(Block::from_parts(
        timestamp,
        last_hash,
        hash,
        data,
        difficulty,
        Nonce::Counter(nonce),
    ))
}

/// A mining search running on its own thread.
pub struct MiningWorker {
    cancel: CancelToken,
    handle: JoinHandle<Result<Block, MiningError>>,
}

impl MiningWorker {
    pub fn spawn(
        predecessor: Block,
        data: Value,
        config: ChainConfig,
    ) -> Result<Self, MiningError> {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = thread::Builder::new()
            .name("miner".into())
            .spawn(move || mine_with(&predecessor, data, &config, &SystemClock, &token))?;
        Ok(Self { cancel, handle })
    }

    /// Token that stops this worker; hand it to whoever learns of a
    /// competing block.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<Block, MiningError> {
        self.handle.join().map_err(|_| MiningError::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SECONDS;
    use crate::pow::hex_to_binary;
    use crate::validate::validate;
    use serde_json::json;
    use std::cell::Cell;

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now_ns(&self) -> u64 {
            self.0
        }
    }

    /// Advances by `step` on every read.
    struct SteppingClock {
        next: Cell<u64>,
        step: u64,
    }

    impl Clock for SteppingClock {
        fn now_ns(&self) -> u64 {
            let now = self.next.get();
            self.next.set(now + self.step);
            now
        }
    }

    #[test]
    fn mined_block_from_genesis() {
        let genesis = Block::genesis();
        let block = mine(&genesis, json!("foo"), &ChainConfig::default());
        assert_eq!(block.last_hash(), "genesis_hash");
        assert_eq!(block.data(), &json!("foo"));
        let d = block.difficulty().get();
        assert!((2..=4).contains(&d));
        let bits = hex_to_binary(block.hash()).unwrap();
        assert!(bits.starts_with(&"0".repeat(d as usize)));
        assert_eq!(block.hash(), block.recompute_hash());
        assert!(validate(&genesis, &block).is_ok());
    }

    #[test]
    fn fast_block_raises_difficulty() {
        let genesis = Block::genesis();
        let clock = FixedClock(genesis.timestamp() + 1);
        let block = mine_with(
            &genesis,
            json!("fast"),
            &ChainConfig::default(),
            &clock,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(block.difficulty().get(), 4);
        assert_eq!(block.timestamp(), genesis.timestamp() + 1);
        assert!(validate(&genesis, &block).is_ok());
    }

    #[test]
    fn slow_block_lowers_difficulty() {
        let genesis = Block::genesis();
        let clock = FixedClock(genesis.timestamp() + 10 * SECONDS);
        let block = mine_with(
            &genesis,
            json!("slow"),
            &ChainConfig::default(),
            &clock,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(block.difficulty().get(), 2);
        assert!(validate(&genesis, &block).is_ok());
    }

    #[test]
    fn timestamp_is_sampled_per_attempt() {
        let genesis = Block::genesis();
        let start = 1_000 * SECONDS;
        let clock = SteppingClock {
            next: Cell::new(start),
            step: 1,
        };
        let block = mine_with(
            &genesis,
            json!(["tx"]),
            &ChainConfig::default(),
            &clock,
            &CancelToken::new(),
        )
        .unwrap();
        let Nonce::Counter(nonce) = block.nonce() else {
            panic!("mined nonce must be a counter");
        };
        // One read for the first attempt, one more per extra nonce.
        assert_eq!(block.timestamp(), start + nonce);
        assert!(validate(&genesis, &block).is_ok());
    }

    #[test]
    fn cancelled_search_stops() {
        let genesis = Block::genesis();
        let cancel = CancelToken::new();
        cancel.cancel();
        // Difficulty 200+ is never met in practice; the token must end it.
        let prev = Block::from_parts(
            genesis.timestamp(),
            "prev".into(),
            "prev".into(),
            json!([]),
            crate::Difficulty::new(200).unwrap(),
            Nonce::Counter(0),
        );
        let err = mine_with(
            &prev,
            json!("x"),
            &ChainConfig::default(),
            &FixedClock(genesis.timestamp()),
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, MiningError::Cancelled { attempts: 1 }));
    }

    #[test]
    fn worker_can_be_cancelled() {
        let prev = Block::from_parts(
            SystemClock.now_ns(),
            "prev".into(),
            "prev".into(),
            json!([]),
            crate::Difficulty::new(200).unwrap(),
            Nonce::Counter(0),
        );
        let worker = MiningWorker::spawn(prev, json!("x"), ChainConfig::default()).unwrap();
        worker.cancel_token().cancel();
        assert!(matches!(worker.join(), Err(MiningError::Cancelled { .. })));
    }

    #[test]
    fn worker_runs_to_completion() {
        let genesis = Block::genesis();
        let worker =
            MiningWorker::spawn(genesis.clone(), json!("bg"), ChainConfig::default()).unwrap();
        let block = worker.join().unwrap();
        assert!(validate(&genesis, &block).is_ok());
    }

    #[test]
    fn system_clock_is_nanoseconds() {
        // After 2001 in nanoseconds.
        assert!(SystemClock.now_ns() > 1_000_000_000 * SECONDS);
    }
}
