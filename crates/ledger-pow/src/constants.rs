pub const NANOSECONDS: u64 = 1;
pub const MICROSECONDS: u64 = 1_000 * NANOSECONDS;
pub const MILLISECONDS: u64 = 1_000 * MICROSECONDS;
pub const SECONDS: u64 = 1_000 * MILLISECONDS;

/// Target interval between consecutive blocks.
pub const MINE_RATE: u64 = 4 * SECONDS;

pub const BITS_PER_HEX_DIGIT: usize = 4;
pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

pub const GENESIS_TIMESTAMP: u64 = 1;
pub const GENESIS_LAST_HASH: &str = "genesis_last_hash";
pub const GENESIS_HASH: &str = "genesis_hash";
pub const GENESIS_DIFFICULTY: u32 = 3;
pub const GENESIS_NONCE: &str = "genesis_nonce";
