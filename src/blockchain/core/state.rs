//! Authoritative chain held by a node, and the longest-chain replacement policy.

use crate::error::{ChainError, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::chain::{decode_blocks, Block, GENESIS};
use super::validation::{validate_chain, validate_successor};

/// Receives the new head after the ledger adopts a peer's chain.
///
/// Called after the ledger lock is released. Implementations must not block;
/// delivery to peers is the implementation's concern.
pub trait HeadBroadcaster: Send + Sync {
    fn broadcast_latest(&self, head: &Block);
}

/// Broadcaster that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl HeadBroadcaster for NoopBroadcaster {
    fn broadcast_latest(&self, _head: &Block) {}
}

/// Result of offering a candidate chain to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced { length: usize },
    RejectedInvalid(ChainError),
    RejectedNotLonger { candidate: usize, current: usize },
}

impl ReplaceOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, ReplaceOutcome::Replaced { .. })
    }

    /// The rejection as an error, or `None` when the chain was adopted.
    pub fn rejection(&self) -> Option<ChainError> {
        match self {
            ReplaceOutcome::Replaced { .. } => None,
            ReplaceOutcome::RejectedInvalid(err) => Some(err.clone()),
            ReplaceOutcome::RejectedNotLonger { candidate, current } => {
                Some(ChainError::ChainNotLonger {
                    candidate: *candidate,
                    current: *current,
                })
            }
        }
    }
}

pub struct Ledger {
    // Never empty; element 0 is always the genesis block.
    chain: RwLock<Arc<Vec<Block>>>,
    broadcaster: Arc<dyn HeadBroadcaster>,
}

impl Ledger {
    /// Create a ledger holding only the genesis block, with no peer notifications.
    pub fn new() -> Self {
        Self::with_broadcaster(Arc::new(NoopBroadcaster))
    }

    pub fn with_broadcaster(broadcaster: Arc<dyn HeadBroadcaster>) -> Self {
        Ledger {
            chain: RwLock::new(Arc::new(vec![GENESIS.clone()])),
            broadcaster,
        }
    }

    /// Read-only snapshot of the current chain. Later appends or replacements
    /// do not affect a snapshot already handed out.
    pub fn chain(&self) -> Arc<Vec<Block>> {
        self.chain.read().clone()
    }

    pub fn head(&self) -> Block {
        let chain = self.chain.read();
        chain.last().cloned().unwrap_or_else(|| GENESIS.clone())
    }

    pub fn len(&self) -> usize {
        self.chain.read().len()
    }

    // A ledger always holds at least the genesis block.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        let chain = self.chain.read();
        usize::try_from(index).ok().and_then(|i| chain.get(i).cloned())
    }

    /// Appends a block that must extend the current head. On failure the
    /// chain is left untouched.
    pub fn append_local(&self, block: Block) -> Result<()> {
        let mut chain = self.chain.write();
        Self::append_locked(&mut chain, block)
    }

    /// Builds the next block from `data` and appends it, in one critical
    /// section with respect to other appends and replacements.
    pub fn mint(&self, data: impl Into<String>) -> Result<Block> {
        let mut chain = self.chain.write();
        let head = chain.last().unwrap_or(&*GENESIS);
        let block = Block::next(head, data);

        Self::append_locked(&mut chain, block.clone())?;
        info!(index = block.index, hash = %block.hash, "ledger.mint");
        Ok(block)
    }

    fn append_locked(chain: &mut Arc<Vec<Block>>, block: Block) -> Result<()> {
        let head = chain.last().unwrap_or(&*GENESIS);
        if let Err(e) = validate_successor(&block, head) {
            warn!(index = block.index, reason = e.reason_code(), error = %e, "ledger.append.rejected");
            return Err(e);
        }

        // Copies the vector only if a reader still holds the previous snapshot.
        Arc::make_mut(chain).push(block);
        Ok(())
    }

    /// Adopts `candidate` iff it is a valid chain strictly longer than the
    /// current one. Equal length loses.
    pub fn try_replace(&self, candidate: Vec<Block>) -> ReplaceOutcome {
        // Validation only reads the candidate, so it runs outside the lock.
        if let Err(e) = validate_chain(&candidate) {
            warn!(
                length = candidate.len(),
                reason = e.reason_code(),
                error = %e,
                "ledger.replace.rejected_invalid"
            );
            return ReplaceOutcome::RejectedInvalid(e);
        }

        let candidate_len = candidate.len();
        let new_chain = Arc::new(candidate);

        let outcome = {
            let mut chain = self.chain.write();
            let current = chain.len();
            if candidate_len <= current {
                ReplaceOutcome::RejectedNotLonger {
                    candidate: candidate_len,
                    current,
                }
            } else {
                *chain = new_chain.clone();
                ReplaceOutcome::Replaced {
                    length: candidate_len,
                }
            }
        };

        match &outcome {
            ReplaceOutcome::Replaced { length } => {
                info!(length, "ledger.replace");
                if let Some(head) = new_chain.last() {
                    self.broadcaster.broadcast_latest(head);
                }
            }
            ReplaceOutcome::RejectedNotLonger { candidate, current } => {
                debug!(candidate, current, "ledger.replace.rejected_not_longer");
            }
            ReplaceOutcome::RejectedInvalid(_) => {}
        }

        outcome
    }

    /// Entry point for chains delivered by a peer transport: every element is
    /// shape-checked before anything is hashed.
    pub fn receive_candidate_chain(&self, blocks: &[Value]) -> ReplaceOutcome {
        match decode_blocks(blocks) {
            Ok(candidate) => self.try_replace(candidate),
            Err(e) => {
                warn!(reason = e.reason_code(), error = %e, "ledger.replace.rejected_malformed");
                ReplaceOutcome::RejectedInvalid(e)
            }
        }
    }

    /// Re-validates the held chain.
    pub fn validate(&self) -> Result<()> {
        let chain = self.chain();
        validate_chain(&chain)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
