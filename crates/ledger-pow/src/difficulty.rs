//! Difficulty value and the per-block retarget rule.

use crate::block::Block;
use crate::config::ChainConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("difficulty must be at least 1")]
pub struct DifficultyError;

/// Required number of leading zero bits. Never below 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Difficulty(NonZeroU32);

impl Difficulty {
    pub const MIN: Difficulty = Difficulty(NonZeroU32::MIN);

    pub fn new(bits: u32) -> Result<Self, DifficultyError> {
        NonZeroU32::new(bits).map(Self).ok_or(DifficultyError)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    pub fn raise(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// One step easier, floored at 1.
    pub fn lower(self) -> Self {
        NonZeroU32::new(self.get() - 1).map_or(Self::MIN, Self)
    }

    pub fn abs_diff(self, other: Self) -> u32 {
        self.get().abs_diff(other.get())
    }
}

impl TryFrom<u32> for Difficulty {
    type Error = DifficultyError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl From<Difficulty> for u32 {
    fn from(d: Difficulty) -> u32 {
        d.get()
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Difficulty for a block proposed at `timestamp` on top of `predecessor`.
///
/// Faster than the target mine rate raises difficulty by one, anything
/// else lowers it by one without going below 1.
pub fn retarget(predecessor: &Block, timestamp: u64, config: &ChainConfig) -> Difficulty {
    let elapsed = timestamp.saturating_sub(predecessor.timestamp());
    let current = predecessor.difficulty();
    let next = if elapsed < config.mine_rate_ns {
        current.raise()
    } else {
        current.lower()
    };
    debug!(elapsed_ns = elapsed, %current, %next, "retarget");
    next
}
