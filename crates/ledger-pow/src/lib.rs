//! Proof-of-work core of a minimal ledger.
//!
//! A [`Block`] is bound to its predecessor by hash, found by [`mine`] at a
//! difficulty chosen by [`retarget`], and accepted by a receiver only after
//! [`validate`] passes. Every other concern (chain storage, fork choice,
//! networking) lives outside this crate and consumes blocks through their
//! flat serde record.

pub mod block;
pub mod config;
pub mod constants;
pub mod difficulty;
pub mod fingerprint;
pub mod mine;
pub mod pow;
pub mod validate;

pub use block::{Block, Nonce};
pub use config::ChainConfig;
pub use difficulty::{retarget, Difficulty, DifficultyError};
pub use fingerprint::{canonical_json, fingerprint};
pub use mine::{mine, mine_with, CancelToken, Clock, MiningError, MiningWorker, SystemClock};
pub use pow::{hex_to_binary, leading_zero_bits, meets_difficulty, HexError};
pub use validate::{validate, validate_sequence, RejectionKind, SequenceError, ValidationError};

// Used by the `fingerprint!` macro.
#[doc(hidden)]
pub use serde_json;
