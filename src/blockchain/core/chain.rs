use crate::error::ChainError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const GENESIS_INDEX: u64 = 0;
pub const GENESIS_PREVIOUS_HASH: &str = "";
pub const GENESIS_TIMESTAMP: u64 = 1_465_154_705;
pub const GENESIS_DATA: &str = "The journey starts here.";
pub const GENESIS_HASH: &str = "540226b74219c44f130d8b407eed9b6a6170a93c7e9b6b3b1e9c4d65536545e9";

/// The genesis block shared by every node. Pinned, never re-derived during
/// validation.
pub static GENESIS: Lazy<Block> = Lazy::new(|| Block {
    index: GENESIS_INDEX,
    hash: GENESIS_HASH.to_string(),
    previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
    timestamp: GENESIS_TIMESTAMP,
    data: GENESIS_DATA.to_string(),
});

/// Digest over the four hashed fields of a block.
///
/// This is a wire contract between nodes: integers are rendered in base-10 ASCII
/// with no padding or separators, the fields are concatenated in the order
/// `index ++ previous_hash ++ timestamp ++ data`, and the SHA-256 digest of the
/// UTF-8 bytes is returned as 64 lowercase hex characters.
pub fn calculate_hash(index: u64, previous_hash: &str, timestamp: u64, data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_string().as_bytes());
    hasher.update(previous_hash.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Height in the chain; genesis is 0.
    pub index: u64,
    /// Lowercase hex SHA-256 over the other four fields.
    pub hash: String,
    /// Hash of the block this one extends; empty only for genesis.
    pub previous_hash: String,
    /// Seconds since the Unix epoch, as supplied by the producer.
    pub timestamp: u64,
    /// Opaque payload.
    pub data: String,
}

impl Block {
    /// Builds a block and computes its hash from the given fields.
    pub fn new(index: u64, previous_hash: impl Into<String>, timestamp: u64, data: impl Into<String>) -> Self {
        let previous_hash = previous_hash.into();
        let data = data.into();
        let hash = calculate_hash(index, &previous_hash, timestamp, &data);

        Block {
            index,
            hash,
            previous_hash,
            timestamp,
            data,
        }
    }

    /// Builds the block extending `head`, stamped with the current wall clock.
    ///
    /// No validation happens here; local minting trusts local state and the
    /// ledger validates on append.
    pub fn next(head: &Block, data: impl Into<String>) -> Self {
        let timestamp = chrono::Utc::now().timestamp().max(0) as u64;
        Self::next_at(head, data, timestamp)
    }

    /// Same as [`Block::next`] with an explicit timestamp.
    pub fn next_at(head: &Block, data: impl Into<String>, timestamp: u64) -> Self {
        Self::new(head.index + 1, head.hash.clone(), timestamp, data)
    }

    pub fn calculate_hash(&self) -> String {
        calculate_hash(self.index, &self.previous_hash, self.timestamp, &self.data)
    }

    pub fn has_valid_hash(&self) -> bool {
        self.calculate_hash() == self.hash
    }

    /// Field-by-field comparison against the pinned genesis block. Returns the
    /// name of the first mismatching field.
    pub fn check_genesis(&self) -> Result<(), &'static str> {
        let genesis = &*GENESIS;
        if self.index != genesis.index {
            return Err("index");
        }
        if self.hash != genesis.hash {
            return Err("hash");
        }
        if self.previous_hash != genesis.previous_hash {
            return Err("previousHash");
        }
        if self.timestamp != genesis.timestamp {
            return Err("timestamp");
        }
        if self.data != genesis.data {
            return Err("data");
        }
        Ok(())
    }

    pub fn is_genesis(&self) -> bool {
        self.check_genesis().is_ok()
    }

    /// Decodes a block received from outside the process. The shape check runs
    /// first, so a malformed value is rejected without ever being hashed.
    pub fn from_wire(value: &Value, position: usize) -> Result<Self, ChainError> {
        check_well_formed(value).map_err(|reason| ChainError::MalformedBlock {
            position,
            reason: reason.to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| ChainError::MalformedBlock {
            position,
            reason: e.to_string(),
        })
    }
}

/// Shallow shape check of a wire block. Does not look at the hash or linkage.
pub fn check_well_formed(value: &Value) -> Result<(), &'static str> {
    let object = value.as_object().ok_or("block is not an object")?;

    match object.get("index") {
        Some(v) if v.as_u64().is_some() => {}
        _ => return Err("index must be a non-negative integer"),
    }
    match object.get("hash") {
        Some(Value::String(_)) => {}
        _ => return Err("hash must be a string"),
    }
    match object.get("previousHash") {
        Some(Value::String(_)) => {}
        _ => return Err("previousHash must be a string"),
    }
    match object.get("timestamp") {
        Some(v) if v.as_u64().is_some() => {}
        _ => return Err("timestamp must be a non-negative integer"),
    }
    match object.get("data") {
        Some(Value::String(_)) => {}
        _ => return Err("data must be a string"),
    }
    Ok(())
}

pub fn is_well_formed(value: &Value) -> bool {
    check_well_formed(value).is_ok()
}

/// Decodes wire blocks, shape-checking each one before it is parsed.
pub fn decode_blocks(values: &[Value]) -> Result<Vec<Block>, ChainError> {
    values
        .iter()
        .enumerate()
        .map(|(position, value)| Block::from_wire(value, position))
        .collect()
}
