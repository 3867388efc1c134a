//! Ledger integration tests
//!
//! Drives the public API end to end: genesis, transfers, block admission,
//! replay validation and the shared handle.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::thread;
use utxo_ledger::{
    Block, Chain, ClaimVerifier, Hash256, LedgerConfig, LedgerError, OwnerClaimVerifier,
    ProofOfWork, SharedChain, Transaction, TransactionInput, TransactionOutput, UnsealedBlock,
};

fn test_config() -> LedgerConfig {
    LedgerConfig {
        difficulty: 4,
        block_reward: 50,
        ..LedgerConfig::default()
    }
}

fn replay(blocks: Vec<Block>) -> Result<Chain, LedgerError> {
    Chain::from_blocks(blocks, &test_config(), Arc::new(OwnerClaimVerifier))
}

// Round-trip a block through JSON so a test can edit fields the API never exposes
fn tamper(block: &Block, edit: impl FnOnce(&mut serde_json::Value)) -> Block {
    let mut json = serde_json::to_value(block).unwrap();
    edit(&mut json);
    serde_json::from_value(json).unwrap()
}

#[test]
fn test_genesis_and_transfer() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    assert_eq!(chain.balance_of("A"), 50);

    let tx = chain.build_transaction("A", "B", 20).unwrap();
    chain.append_block(vec![tx], "A").unwrap();

    // 50 spent, 30 change back, 50 fresh reward
    assert_eq!(chain.balance_of("A"), 80);
    assert_eq!(chain.balance_of("B"), 20);
    assert_eq!(chain.total_unspent_value(), 2 * 50);
    chain.validate_chain().unwrap();
}

#[test]
fn test_insufficient_funds() {
    let chain = Chain::new("A", &test_config()).unwrap();
    let err = chain.build_transaction("A", "B", 51).unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientFunds {
            required: 51,
            available: 50
        }
    );
}

#[test]
fn test_double_spend_across_blocks() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    let tx = chain.build_transaction("A", "B", 20).unwrap();
    let spent_input = tx.inputs()[0].clone();
    chain.append_block(vec![tx], "A").unwrap();

    // Same genesis output again, now to C
    let replay_spend = Transaction::new_transfer(
        vec![spent_input],
        vec![TransactionOutput::new(50, "C")],
    )
    .unwrap();
    let err = chain.append_block(vec![replay_spend], "A").unwrap_err();
    assert!(matches!(err, LedgerError::DoubleSpend { height: 2, .. }));
    assert_eq!(chain.height(), 1);
}

#[test]
fn test_foreign_block_with_double_spend_is_rejected() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    let genesis_coinbase = chain.blocks()[0].transactions()[0].hash();
    let tx = chain.build_transaction("A", "B", 50).unwrap();
    chain.append_block(vec![tx], "A").unwrap();

    let respend = Transaction::new_transfer(
        vec![TransactionInput::new(genesis_coinbase, 0, b"A".to_vec())],
        vec![TransactionOutput::new(50, "C")],
    )
    .unwrap();
    let block = UnsealedBlock::new(
        vec![Transaction::new_coinbase_at_height(2, 50, "M"), respend],
        chain.tip_hash(),
        2,
        4,
    )
    .unwrap()
    .mine_and_seal(&ProofOfWork::new())
    .unwrap();

    let err = chain.commit_block(block).unwrap_err();
    assert!(matches!(err, LedgerError::DoubleSpend { height: 2, .. }));
    assert_eq!(chain.balance_of("C"), 0);
}

#[test]
fn test_batch_is_all_or_nothing() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    chain.append_block(Vec::new(), "B").unwrap();

    let good = chain.build_transaction("B", "C", 10).unwrap();
    let bad = chain.build_transaction("A", "C", 10).unwrap();
    let forged = Transaction::new_transfer(
        vec![TransactionInput::spending(bad.inputs()[0].outpoint(), b"C".to_vec())],
        vec![TransactionOutput::new(50, "C")],
    )
    .unwrap();

    let before = chain.utxo_set().clone();
    let err = chain.append_block(vec![good, forged], "M").unwrap_err();
    assert!(matches!(err, LedgerError::ClaimMismatch { .. }));
    assert_eq!(chain.utxo_set(), &before);
    assert_eq!(chain.height(), 1);
    assert_eq!(chain.balance_of("M"), 0);
}

#[test]
fn test_injected_verifier_is_consulted() {
    struct OnlyAlice;

    impl ClaimVerifier for OnlyAlice {
        fn verify(&self, unlock_proof: &[u8], claim: &str, _tx_digest: &Hash256) -> bool {
            claim == "alice" && unlock_proof == b"alice"
        }
    }

    let mut chain = Chain::with_verifier("alice", &test_config(), Arc::new(OnlyAlice)).unwrap();
    let tx = chain.build_transaction("alice", "bob", 5).unwrap();
    chain.append_block(vec![tx], "alice").unwrap();

    let tx = chain.build_transaction("bob", "carol", 5).unwrap();
    let err = chain.append_block(vec![tx], "alice").unwrap_err();
    assert!(matches!(err, LedgerError::ClaimMismatch { height: 2, .. }));
}

#[test]
fn test_conservation_over_random_transfers() {
    let names = ["A", "B", "C", "D"];
    let mut rng = StdRng::seed_from_u64(7);
    let mut chain = Chain::new("A", &test_config()).unwrap();

    for _ in 0..8 {
        let from = names[rng.gen_range(0..names.len())];
        let to = names[rng.gen_range(0..names.len())];
        let miner = names[rng.gen_range(0..names.len())];
        let balance = chain.balance_of(from);
        let candidates = if balance > 0 {
            let amount = rng.gen_range(1..=balance);
            vec![chain.build_transaction(from, to, amount).unwrap()]
        } else {
            Vec::new()
        };
        chain.append_block(candidates, miner).unwrap();

        let total: u64 = names.iter().map(|name| chain.balance_of(name)).sum();
        assert_eq!(total, (chain.height() + 1) * 50);
        assert_eq!(chain.total_unspent_value(), total);
    }

    chain.validate_chain().unwrap();
    chain.verify_utxo_index().unwrap();
}

#[test]
fn test_blocks_link_to_their_parents() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    for _ in 0..3 {
        chain.append_block(Vec::new(), "M").unwrap();
    }

    let blocks = chain.blocks();
    assert_eq!(blocks[0].previous_hash(), &Hash256::zero());
    for pair in blocks.windows(2) {
        assert_eq!(pair[1].previous_hash(), pair[0].hash());
        assert_eq!(pair[1].height(), pair[0].height() + 1);
    }
    for block in blocks {
        assert!(ProofOfWork::validate(block.header()));
        assert!(block.hash().leading_zero_bits() >= 4);
    }
}

#[test]
fn test_replay_detects_missing_block() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    for _ in 0..2 {
        chain.append_block(Vec::new(), "M").unwrap();
    }

    let mut blocks = chain.blocks().to_vec();
    blocks.remove(1);
    let err = replay(blocks).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ChainLinkageBroken { height: 1, .. }
    ));
}

#[test]
fn test_replay_detects_tampered_transaction() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    let tx = chain.build_transaction("A", "B", 20).unwrap();
    chain.append_block(vec![tx], "A").unwrap();

    let mut blocks = chain.blocks().to_vec();
    blocks[1] = tamper(&blocks[1], |json| {
        json["transactions"][1]["outputs"][0]["value"] = serde_json::json!(45);
    });

    let err = replay(blocks).unwrap_err();
    assert_eq!(err, LedgerError::MerkleMismatch { height: 1 });
}

#[test]
fn test_replay_detects_tampered_nonce() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    chain.append_block(Vec::new(), "M").unwrap();

    let mut blocks = chain.blocks().to_vec();
    blocks[1] = tamper(&blocks[1], |json| {
        let nonce = json["header"]["nonce"].as_u64().unwrap();
        json["header"]["nonce"] = serde_json::json!(nonce.wrapping_add(1));
    });

    let err = replay(blocks).unwrap_err();
    assert_eq!(err, LedgerError::ProofInvalid { height: 1 });
}

#[test]
fn test_replay_of_valid_chain_matches() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    let tx = chain.build_transaction("A", "B", 35).unwrap();
    chain.append_block(vec![tx], "C").unwrap();

    let replayed = replay(chain.blocks().to_vec()).unwrap();
    assert_eq!(replayed.tip_hash(), chain.tip_hash());
    for name in ["A", "B", "C"] {
        assert_eq!(replayed.balance_of(name), chain.balance_of(name));
    }
}

#[test]
fn test_merkle_proof_for_included_transaction() {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    chain.append_block(Vec::new(), "B").unwrap();
    let first = chain.build_transaction("A", "C", 10).unwrap();
    let second = chain.build_transaction("B", "C", 10).unwrap();
    let block = chain.append_block(vec![first, second], "M").unwrap();

    for index in 0..block.transactions().len() {
        let proof = block.merkle_proof(index).unwrap();
        assert_eq!(proof.transaction_hash, block.transactions()[index].hash());
        assert!(block.verify_merkle_proof(&proof));
    }
}

#[test]
fn test_shared_chain_readers_never_see_partial_blocks() {
    let shared = SharedChain::new(Chain::new("A", &test_config()).unwrap());

    let writer = {
        let shared = shared.clone();
        thread::spawn(move || {
            for i in 0..5 {
                let candidates = match shared.build_transaction("A", "B", 1) {
                    Ok(tx) if i % 2 == 0 => vec![tx],
                    _ => Vec::new(),
                };
                shared.append_block(candidates, "A").unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let (height, total, a, b) = shared
                        .with_chain(|chain| {
                            (
                                chain.height(),
                                chain.total_unspent_value(),
                                chain.balance_of("A"),
                                chain.balance_of("B"),
                            )
                        })
                        .unwrap();
                    assert_eq!(total, (height + 1) * 50);
                    assert_eq!(a + b, total);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(shared.height().unwrap(), 5);
    assert_eq!(shared.balance_of("B").unwrap(), 3);
    shared.validate_chain().unwrap();
}

#[test]
fn test_shared_chain_cancellation() {
    let shared = SharedChain::new(Chain::new("A", &test_config()).unwrap());
    let token = shared.cancel_token();

    token.cancel();
    let err = shared.append_block(Vec::new(), "M").unwrap_err();
    assert_eq!(err, LedgerError::MiningCancelled { attempts: 0 });
    assert_eq!(shared.height().unwrap(), 0);

    // The token is cleared once the cancelled search returns
    let block = shared.append_block(Vec::new(), "M").unwrap();
    assert_eq!(block.height(), 1);
    assert_eq!(shared.balance_of("M").unwrap(), 50);
}
