use crate::error::ChainError;

use super::chain::Block;

/// Checks that `candidate` directly extends `predecessor`.
///
/// Checks run in order and stop at the first failure: index, previous hash,
/// then the block's own hash.
pub fn validate_successor(candidate: &Block, predecessor: &Block) -> Result<(), ChainError> {
    let expected_index = predecessor.index + 1;
    if candidate.index != expected_index {
        return Err(ChainError::InvalidIndex {
            expected: expected_index,
            found: candidate.index,
        });
    }

    if candidate.previous_hash != predecessor.hash {
        return Err(ChainError::InvalidPreviousHash {
            expected: predecessor.hash.clone(),
            found: candidate.previous_hash.clone(),
        });
    }

    let computed = candidate.calculate_hash();
    if computed != candidate.hash {
        return Err(ChainError::InvalidHash {
            computed,
            found: candidate.hash.clone(),
        });
    }

    Ok(())
}

pub fn is_valid_successor(candidate: &Block, predecessor: &Block) -> bool {
    validate_successor(candidate, predecessor).is_ok()
}

/// Validates a full candidate chain: element 0 must be the pinned genesis
/// block and every later element must extend the one before it.
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
    let first = chain.first().ok_or(ChainError::EmptyChain)?;
    first.check_genesis().map_err(ChainError::InvalidGenesis)?;

    for (position, pair) in chain.windows(2).enumerate() {
        validate_successor(&pair[1], &pair[0]).map_err(|cause| ChainError::InvalidSuccessor {
            position: position + 1,
            cause: Box::new(cause),
        })?;
    }

    Ok(())
}

pub fn is_valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain).is_ok()
}
