//! End-to-end reconciliation of a local ledger against competing chains.

use hashledger::blockchain::{is_valid_chain, Block, Ledger, ReplaceOutcome, GENESIS};
use hashledger::error::ChainError;
use serde_json::json;

fn chain_from_genesis(payloads: &[&str]) -> Vec<Block> {
    let mut chain = vec![GENESIS.clone()];
    for (i, data) in payloads.iter().enumerate() {
        let next = Block::next_at(chain.last().unwrap(), *data, 1_700_000_000 + i as u64);
        chain.push(next);
    }
    chain
}

#[test]
fn test_mint_then_adopt_longer_chain_then_reject_forgery() {
    let ledger = Ledger::new();

    let minted = ledger.mint("hello").unwrap();
    assert_eq!(minted.index, 1);
    assert_eq!(ledger.head(), minted);

    let remote = chain_from_genesis(&["A", "B"]);
    match ledger.try_replace(remote.clone()) {
        ReplaceOutcome::Replaced { length } => assert_eq!(length, 3),
        other => panic!("expected replacement, got {:?}", other),
    }
    assert_eq!(ledger.chain().as_ref(), &remote);

    // Forged successor: hash field does not match the block's contents
    let mut forged = chain_from_genesis(&["X", "Y", "Z"]);
    forged[1].data = "tampered".to_string();
    let outcome = ledger.try_replace(forged);
    assert!(matches!(
        outcome,
        ReplaceOutcome::RejectedInvalid(ChainError::InvalidSuccessor { position: 1, .. })
    ));
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.chain().as_ref(), &remote);

    let equal = chain_from_genesis(&["C", "D"]);
    assert_eq!(
        ledger.try_replace(equal),
        ReplaceOutcome::RejectedNotLonger {
            candidate: 3,
            current: 3
        }
    );
    assert_eq!(ledger.chain().as_ref(), &remote);
    assert!(is_valid_chain(&ledger.chain()));
}

#[test]
fn test_shorter_forged_chain_is_rejected_as_invalid_not_as_short() {
    let ledger = Ledger::new();

    let a = ledger.mint("hello").unwrap();
    assert_eq!(a.index, 1);

    // Extend the locally minted block, as a peer that saw it would.
    let b = Block::next_at(&a, "B", a.timestamp + 1);
    let extended = vec![GENESIS.clone(), a.clone(), b.clone()];
    assert_eq!(
        ledger.try_replace(extended.clone()),
        ReplaceOutcome::Replaced { length: 3 }
    );
    assert_eq!(ledger.head(), b);

    let mut x = Block::next_at(&GENESIS, "X", a.timestamp);
    x.hash = "0".repeat(64);
    let outcome = ledger.try_replace(vec![GENESIS.clone(), x]);

    match &outcome {
        ReplaceOutcome::RejectedInvalid(ChainError::InvalidSuccessor { position, cause }) => {
            assert_eq!(*position, 1);
            assert!(matches!(**cause, ChainError::InvalidHash { .. }));
        }
        other => panic!("expected an invalid-chain rejection, got {:?}", other),
    }
    assert_eq!(outcome.rejection().map(|e| e.reason_code()), Some("invalid_hash"));
    assert_eq!(ledger.len(), 3);
    assert_eq!(ledger.chain().as_ref(), &extended);
}

#[test]
fn test_foreign_genesis_never_adopted() {
    let ledger = Ledger::new();

    let foreign_genesis = Block::new(0, "", 1, "another network");
    let mut candidate = vec![foreign_genesis];
    for i in 0..5 {
        let next = Block::next_at(candidate.last().unwrap(), format!("f{}", i), 10 + i);
        candidate.push(next);
    }

    let outcome = ledger.try_replace(candidate);
    assert!(matches!(
        outcome,
        ReplaceOutcome::RejectedInvalid(ChainError::InvalidGenesis(_))
    ));
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.head(), *GENESIS);
}

#[test]
fn test_wire_candidates_are_shape_checked() {
    let ledger = Ledger::new();
    let good = chain_from_genesis(&["A", "B"]);

    let mut wire: Vec<_> = good.iter().map(|b| serde_json::to_value(b).unwrap()).collect();
    wire[2] = json!({
        "index": "2",
        "previousHash": good[1].hash,
        "timestamp": 1_700_000_001u64,
        "data": "B",
        "hash": good[2].hash,
    });

    let outcome = ledger.receive_candidate_chain(&wire);
    assert_eq!(outcome.rejection().map(|e| e.reason_code()), Some("malformed_block"));
    assert_eq!(ledger.len(), 1);

    let wire: Vec<_> = good.iter().map(|b| serde_json::to_value(b).unwrap()).collect();
    assert!(ledger.receive_candidate_chain(&wire).is_replaced());
    assert_eq!(ledger.head(), good[2]);
}
