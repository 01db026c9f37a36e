//! Acceptance rules for a candidate block against its predecessor.

use crate::block::Block;
use crate::pow::meets_difficulty;
use thiserror::Error;
use tracing::debug;

/// Which rule rejected a block, without the offending values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    Linkage,
    ProofOfWork,
    DifficultyJump,
    HashMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the block last_hash must be correct (expected {expected}, found {found})")]
    Linkage { expected: String, found: String },

    #[error("the proof of work requirement was not met ({difficulty} leading zero bits required by {hash})")]
    ProofOfWork { hash: String, difficulty: u32 },

    #[error("the block difficulty must only adjust by 1 (from {previous} to {candidate})")]
    DifficultyJump { previous: u32, candidate: u32 },

    #[error("the block hash must be correct (expected {expected}, found {found})")]
    HashMismatch { expected: String, found: String },
}

impl ValidationError {
    pub fn kind(&self) -> RejectionKind {
        match self {
            ValidationError::Linkage { .. } => RejectionKind::Linkage,
            ValidationError::ProofOfWork { .. } => RejectionKind::ProofOfWork,
            ValidationError::DifficultyJump { .. } => RejectionKind::DifficultyJump,
            ValidationError::HashMismatch { .. } => RejectionKind::HashMismatch,
        }
    }
}

/// Check `candidate` against `predecessor`. Rules run in a fixed order and
/// the first failure is returned.
pub fn validate(predecessor: &Block, candidate: &Block) -> Result<(), ValidationError> {
    check(predecessor, candidate).inspect_err(|err| {
        debug!(reason = %err, hash = candidate.hash(), "rejected block");
    })
}

fn check(predecessor: &Block, candidate: &Block) -> Result<(), ValidationError> {
    if candidate.last_hash() != predecessor.hash() {
        return Err(ValidationError::Linkage {
            expected: predecessor.hash().to_string(),
            found: candidate.last_hash().to_string(),
        });
    }

    if !meets_difficulty(candidate.hash(), candidate.difficulty()) {
        return Err(ValidationError::ProofOfWork {
            hash: candidate.hash().to_string(),
            difficulty: candidate.difficulty().get(),
        });
    }

    if predecessor.difficulty().abs_diff(candidate.difficulty()) > 1 {
        return Err(ValidationError::DifficultyJump {
            previous: predecessor.difficulty().get(),
            candidate: candidate.difficulty().get(),
        });
    }

    let reconstructed = candidate.recompute_hash();
    if candidate.hash() != reconstructed {
        return Err(ValidationError::HashMismatch {
            expected: reconstructed,
            found: candidate.hash().to_string(),
        });
    }

    Ok(())
}

/// Error from walking a run of blocks: the index of the rejected block and why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("block {index} rejected: {source}")]
pub struct SequenceError {
    pub index: usize,
    #[source]
    pub source: ValidationError,
}

/// Validate every block of `blocks` against the block before it.
/// The first block is taken as given.
pub fn validate_sequence(blocks: &[Block]) -> Result<(), SequenceError> {
    for (i, pair) in blocks.windows(2).enumerate() {
        validate(&pair[0], &pair[1]).map_err(|source| SequenceError {
            index: i + 1,
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Nonce;
    use crate::config::ChainConfig;
    use crate::difficulty::Difficulty;
    use crate::mine::mine;
    use serde_json::json;

    fn rebuild(block: &Block, edit: impl FnOnce(&mut serde_json::Value)) -> Block {
        let mut record = block.to_json();
        edit(&mut record);
        Block::from_json(record).unwrap()
    }

    #[test]
    fn mined_block_is_valid() {
        let genesis = Block::genesis();
        let block = mine(&genesis, json!("foo"), &ChainConfig::default());
        assert_eq!(validate(&genesis, &block), Ok(()));
    }

    #[test]
    fn bad_last_hash_is_a_linkage_error() {
        let genesis = Block::genesis();
        let block = mine(&genesis, json!("foo"), &ChainConfig::default());
        let evil = rebuild(&block, |r| r["last_hash"] = json!("evil_data"));
        let err = validate(&genesis, &evil).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::Linkage);
        assert!(err.to_string().starts_with("the block last_hash must be correct"));
    }

    #[test]
    fn unmet_proof_of_work() {
        let genesis = Block::genesis();
        let block = mine(&genesis, json!("foo"), &ChainConfig::default());
        let bad = rebuild(&block, |r| r["hash"] = json!("f".repeat(64)));
        assert_eq!(
            validate(&genesis, &bad).unwrap_err().kind(),
            RejectionKind::ProofOfWork
        );
        let not_hex = rebuild(&block, |r| r["hash"] = json!("genesis_hash"));
        assert_eq!(
            validate(&genesis, &not_hex).unwrap_err().kind(),
            RejectionKind::ProofOfWork
        );
    }

    #[test]
    fn difficulty_jump() {
        let genesis = Block::genesis();
        let block = mine(&genesis, json!("foo"), &ChainConfig::default());
        // Genesis sits at 3, so 1 is two steps away yet still met by the hash.
        let jumped = rebuild(&block, |r| r["difficulty"] = json!(1));
        assert_eq!(
            validate(&genesis, &jumped).unwrap_err(),
            ValidationError::DifficultyJump {
                previous: 3,
                candidate: 1
            }
        );
    }

    #[test]
    fn tampered_fields_mismatch_hash() {
        let genesis = Block::genesis();
        let block = mine(&genesis, json!("foo"), &ChainConfig::default());
        let edits: [(&str, serde_json::Value); 3] = [
            ("data", json!("bar")),
            ("nonce", json!(u64::MAX)),
            ("timestamp", json!(block.timestamp() + 1)),
        ];
        for (field, value) in edits {
            let tampered = rebuild(&block, |r| r[field] = value);
            assert_eq!(
                validate(&genesis, &tampered).unwrap_err().kind(),
                RejectionKind::HashMismatch,
                "field {field}"
            );
        }
    }

    #[test]
    fn forged_zero_hash_mismatches() {
        let genesis = Block::genesis();
        let block = mine(&genesis, json!("foo"), &ChainConfig::default());
        let forged = rebuild(&block, |r| r["hash"] = json!("0".repeat(64)));
        let err = validate(&genesis, &forged).unwrap_err();
        assert_eq!(err.kind(), RejectionKind::HashMismatch);
    }

    #[test]
    fn linkage_is_checked_before_proof_of_work() {
        let genesis = Block::genesis();
        let bogus = Block::from_parts(
            5,
            "evil_data".into(),
            "ffff".into(),
            json!([]),
            Difficulty::new(40).unwrap(),
            Nonce::Counter(0),
        );
        assert_eq!(
            validate(&genesis, &bogus).unwrap_err().kind(),
            RejectionKind::Linkage
        );
    }

    #[test]
    fn sequence_reports_first_bad_index() {
        let config = ChainConfig {
            mine_rate_ns: 0,
            ..ChainConfig::default()
        };
        let mut blocks = vec![Block::genesis()];
        for i in 0..4 {
            let next = mine(blocks.last().unwrap(), json!(i), &config);
            blocks.push(next);
        }
        assert_eq!(validate_sequence(&blocks), Ok(()));

        blocks[3] = rebuild(&blocks[3], |r| r["data"] = json!("changed"));
        let err = validate_sequence(&blocks).unwrap_err();
        assert_eq!(err.index, 3);
        assert_eq!(err.source.kind(), RejectionKind::HashMismatch);
    }

    #[test]
    fn short_sequences_are_valid() {
        assert_eq!(validate_sequence(&[]), Ok(()));
        assert_eq!(validate_sequence(&[Block::genesis()]), Ok(()));
    }
}
