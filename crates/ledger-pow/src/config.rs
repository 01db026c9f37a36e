use crate::constants::{MINE_RATE, SECONDS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing parameters supplied by the embedding environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Target interval between blocks, in nanoseconds.
    pub mine_rate_ns: u64,
    /// Nanoseconds per reported second.
    pub seconds_ns: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            mine_rate_ns: MINE_RATE,
            seconds_ns: SECONDS,
        }
    }
}

impl ChainConfig {
    pub fn with_mine_rate(mut self, rate: Duration) -> Self {
        self.mine_rate_ns = u64::try_from(rate.as_nanos()).unwrap_or(u64::MAX);
        self
    }

    pub fn mine_rate(&self) -> Duration {
        Duration::from_nanos(self.mine_rate_ns)
    }

    /// Convert a raw nanosecond span into seconds for reporting.
    pub fn to_seconds(&self, ns: u64) -> f64 {
        if self.seconds_ns == 0 {
            return 0.0;
        }
        ns as f64 / self.seconds_ns as f64
    }
}
