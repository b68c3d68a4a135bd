//! Reconciliation of block responses received from peers.
//!
//! A peer answers `QUERY_LATEST` with its head and `QUERY_ALL` with its whole
//! chain. This module decides what a response means for the local ledger:
//! - the peer is not ahead: nothing to do
//! - the peer is exactly one block ahead: append its head
//! - the peer is further ahead but sent only its head: ask for everything
//! - the peer sent a full chain: hand it to the replacement policy

use crate::blockchain::{Block, Ledger, ReplaceOutcome};
use crate::error::ChainError;
use tracing::{debug, info};

pub use crate::blockchain::decode_blocks;

/// What the local node should do after processing a peer response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// The response carried nothing newer than the local head.
    Ignored,
    /// The peer's head extended ours and was appended.
    Appended(Block),
    /// The peer is ahead on a different history; request its full chain.
    QueryAll,
    /// The peer's chain replaced ours.
    Replaced,
    /// The response was rejected by validation or the length rule.
    Rejected(ChainError),
}

pub fn handle_blockchain_response(ledger: &Ledger, mut received: Vec<Block>) -> SyncAction {
    received.sort_by_key(|b| b.index);

    let latest_received = match received.last() {
        Some(block) => block.clone(),
        None => return SyncAction::Ignored,
    };
    let held = ledger.head();

    if latest_received.index <= held.index {
        debug!(
            received = latest_received.index,
            held = held.index,
            "sync.peer_not_ahead"
        );
        return SyncAction::Ignored;
    }

    info!(
        received = latest_received.index,
        held = held.index,
        "sync.peer_ahead"
    );

    if held.hash == latest_received.previous_hash {
        return match ledger.append_local(latest_received.clone()) {
            Ok(()) => SyncAction::Appended(latest_received),
            Err(e) => SyncAction::Rejected(e),
        };
    }

    if received.len() == 1 {
        return SyncAction::QueryAll;
    }

    match ledger.try_replace(received) {
        ReplaceOutcome::Replaced { .. } => SyncAction::Replaced,
        outcome => match outcome.rejection() {
            Some(e) => SyncAction::Rejected(e),
            None => SyncAction::Ignored,
        },
    }
}
