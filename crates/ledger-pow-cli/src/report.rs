use ledger_pow::ChainConfig;
use std::fmt;

/// Running totals for the block-rate benchmark.
#[derive(Debug, Default)]
pub struct RateStats {
    times: Vec<f64>,
    total_time: f64,
}

/// One report line group for a freshly appended block.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLine {
    pub difficulty: u32,
    pub time_to_mine: f64,
    pub average_time: f64,
    pub total_blocks: usize,
    pub total_time: f64,
}

impl RateStats {
    pub fn record(&mut self, difficulty: u32, elapsed_ns: u64, config: &ChainConfig) -> RateLine {
        let time_to_mine = config.to_seconds(elapsed_ns);
        self.times.push(time_to_mine);
        self.total_time += time_to_mine;
        RateLine {
            difficulty,
            time_to_mine,
            average_time: self.times.iter().sum::<f64>() / self.times.len() as f64,
            total_blocks: self.times.len(),
            total_time: self.total_time,
        }
    }
}

impl fmt::Display for RateLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "New block difficulty: {}", self.difficulty)?;
        writeln!(f, "Time to mine new block: {}s", self.time_to_mine)?;
        writeln!(f, "Average time to add blocks: {}s", self.average_time)?;
        writeln!(f, "Total number of blocks: {}", self.total_blocks)?;
        writeln!(f, "Total time to mine: {}", self.total_time)
    }
}
