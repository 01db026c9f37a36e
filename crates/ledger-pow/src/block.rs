use crate::constants::{
    GENESIS_DIFFICULTY, GENESIS_HASH, GENESIS_LAST_HASH, GENESIS_NONCE, GENESIS_TIMESTAMP,
};
use crate::difficulty::Difficulty;
use crate::fingerprint::{canonical_value, digest_canonical, fingerprint};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Value varied by the miner. The genesis block carries a text sentinel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Nonce {
    Counter(u64),
    Sentinel(String),
}

impl Nonce {
    fn canonical(&self) -> String {
        match self {
            Nonce::Counter(n) => n.to_string(),
            Nonce::Sentinel(s) => canonical_value(&Value::from(s.as_str())),
        }
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nonce::Counter(n) => write!(f, "{n}"),
            Nonce::Sentinel(s) => f.write_str(s),
        }
    }
}

/// A unit of storage in the ledger.
///
/// Blocks are immutable once built. Serialized, a block is the flat record
/// `{timestamp, last_hash, hash, data, difficulty, nonce}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    timestamp: u64,
    last_hash: String,
    hash: String,
    data: Value,
    difficulty: Difficulty,
    nonce: Nonce,
}

impl Block {
    /// Rebuild a block from its six fields, e.g. one received from a peer.
    /// No check is made here; run the validator before trusting it.
    pub fn from_parts(
        timestamp: u64,
        last_hash: String,
        hash: String,
        data: Value,
        difficulty: Difficulty,
        nonce: Nonce,
    ) -> Self {
        Self {
            timestamp,
            last_hash,
            hash,
            data,
            difficulty,
            nonce,
        }
    }

    /// The well-known chain root.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: json!([]),
            difficulty: Difficulty::new(GENESIS_DIFFICULTY).unwrap_or(Difficulty::MIN),
            nonce: Nonce::Sentinel(GENESIS_NONCE.to_string()),
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn last_hash(&self) -> &str {
        &self.last_hash
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Fingerprint of this block's own fields, independent of the stored hash.
    pub fn recompute_hash(&self) -> String {
        fingerprint(&[
            json!(self.timestamp),
            json!(self.last_hash),
            self.data.clone(),
            json!(self.difficulty),
            json!(self.nonce),
        ])
    }

    pub fn to_json(&self) -> Value {
        json!({
            "timestamp": self.timestamp,
            "last_hash": self.last_hash,
            "hash": self.hash,
            "data": self.data,
            "difficulty": self.difficulty,
            "nonce": self.nonce,
        })
    }

    pub fn from_json(record: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record)
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block(")?;
        writeln!(f, "    timestamp: {},", self.timestamp)?;
        writeln!(f, "    last_hash: {},", self.last_hash)?;
        writeln!(f, "    hash: {},", self.hash)?;
        writeln!(f, "    data: {},", self.data)?;
        writeln!(f, "    difficulty: {},", self.difficulty)?;
        writeln!(f, "    nonce: {}", self.nonce)?;
        write!(f, ")")
    }
}

/// Hash inputs that stay fixed for the whole of one mining search, rendered
/// once so each attempt only renders the timestamp and nonce.
pub(crate) struct HashTemplate {
    last_hash: String,
    data: String,
    difficulty: String,
}

impl HashTemplate {
    pub(crate) fn new(last_hash: &str, data: &Value, difficulty: Difficulty) -> Self {
        Self {
            last_hash: canonical_value(&Value::from(last_hash)),
            data: canonical_value(data),
            difficulty: difficulty.get().to_string(),
        }
    }

    pub(crate) fn hash(&self, timestamp: u64, nonce: &Nonce) -> String {
        let timestamp = timestamp.to_string();
        let nonce = nonce.canonical();
        let mut parts = [
            timestamp.as_str(),
            self.last_hash.as_str(),
            self.data.as_str(),
            self.difficulty.as_str(),
            nonce.as_str(),
        ];
        digest_canonical(&mut parts)
    }
}
