//! Error types for HashLedger

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Malformed block at position {position}: {reason}")]
    MalformedBlock { position: usize, reason: String },
    #[error("Invalid index: expected {expected}, got {found}")]
    InvalidIndex { expected: u64, found: u64 },
    #[error("Invalid previous hash: expected {expected}, got {found}")]
    InvalidPreviousHash { expected: String, found: String },
    #[error("Invalid hash: computed {computed}, block carries {found}")]
    InvalidHash { computed: String, found: String },
    #[error("Chain is empty")]
    EmptyChain,
    #[error("Genesis block mismatch on field `{0}`")]
    InvalidGenesis(&'static str),
    #[error("Block at position {position} does not extend its predecessor: {cause}")]
    InvalidSuccessor {
        position: usize,
        cause: Box<ChainError>,
    },
    #[error("Candidate chain of length {candidate} is not longer than current chain of length {current}")]
    ChainNotLonger { candidate: usize, current: usize },
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ChainError {
    /// Stable, machine-readable code for logs and API responses.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ChainError::MalformedBlock { .. } => "malformed_block",
            ChainError::InvalidIndex { .. } | ChainError::InvalidPreviousHash { .. } => {
                "invalid_linkage"
            }
            ChainError::InvalidHash { .. } => "invalid_hash",
            ChainError::EmptyChain => "empty_chain",
            ChainError::InvalidGenesis(_) => "invalid_genesis",
            ChainError::InvalidSuccessor { cause, .. } => cause.reason_code(),
            ChainError::ChainNotLonger { .. } => "chain_not_longer",
            ChainError::NetworkError(_) => "network_error",
            ChainError::ConfigError(_) => "config_error",
            ChainError::IoError(_) => "io_error",
            ChainError::SerializationError(_) => "serialization_error",
        }
    }

    /// True for rejections that mean the submitted data is corrupt, as opposed
    /// to merely stale (`ChainNotLonger`) or an environment failure.
    pub fn is_invalid_data(&self) -> bool {
        matches!(
            self,
            ChainError::MalformedBlock { .. }
                | ChainError::InvalidIndex { .. }
                | ChainError::InvalidPreviousHash { .. }
                | ChainError::InvalidHash { .. }
                | ChainError::EmptyChain
                | ChainError::InvalidGenesis(_)
                | ChainError::InvalidSuccessor { .. }
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes_distinguish_stale_from_corrupt() {
        let stale = ChainError::ChainNotLonger {
            candidate: 2,
            current: 2,
        };
        let corrupt = ChainError::InvalidSuccessor {
            position: 1,
            cause: Box::new(ChainError::InvalidHash {
                computed: "aa".to_string(),
                found: "bb".to_string(),
            }),
        };

        assert_eq!(stale.reason_code(), "chain_not_longer");
        assert!(!stale.is_invalid_data());
        assert_eq!(corrupt.reason_code(), "invalid_hash");
        assert!(corrupt.is_invalid_data());
    }

    #[test]
    fn test_linkage_failures_share_a_code() {
        let index = ChainError::InvalidIndex {
            expected: 2,
            found: 5,
        };
        let prev = ChainError::InvalidPreviousHash {
            expected: "a".to_string(),
            found: "b".to_string(),
        };
        assert_eq!(index.reason_code(), "invalid_linkage");
        assert_eq!(prev.reason_code(), "invalid_linkage");
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ChainError::InvalidGenesis("data").to_string(),
            "Genesis block mismatch on field `data`"
        );
        assert_eq!(ChainError::EmptyChain.to_string(), "Chain is empty");
    }
}
