//! Storage integration tests
//!
//! Persists chains through the block stores and replays them back.

use std::sync::Arc;
use tempfile::tempdir;
use utxo_ledger::storage::open_chain;
use utxo_ledger::{
    Block, BlockStore, Chain, LedgerConfig, LedgerError, MemoryBlockStore, OwnerClaimVerifier,
    SledBlockStore,
};

fn test_config() -> LedgerConfig {
    LedgerConfig {
        difficulty: 4,
        block_reward: 50,
        ..LedgerConfig::default()
    }
}

fn build_chain() -> Chain {
    let mut chain = Chain::new("A", &test_config()).unwrap();
    let tx = chain.build_transaction("A", "B", 20).unwrap();
    chain.append_block(vec![tx], "A").unwrap();
    let tx = chain.build_transaction("B", "C", 5).unwrap();
    chain.append_block(vec![tx], "M").unwrap();
    chain
}

fn save_all(store: &dyn BlockStore, blocks: &[Block]) {
    for block in blocks {
        store.save_block(block).unwrap();
    }
}

#[test]
fn test_sled_persist_and_reload() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("ledger");
    let chain = build_chain();

    {
        let store = SledBlockStore::open(&db_path).unwrap();
        save_all(&store, chain.blocks());
        store.flush().unwrap();
    }

    let store = SledBlockStore::open(&db_path).unwrap();
    let reloaded = open_chain(&store, &test_config(), Arc::new(OwnerClaimVerifier)).unwrap();

    assert_eq!(reloaded.height(), 2);
    assert_eq!(reloaded.tip_hash(), chain.tip_hash());
    assert_eq!(reloaded.utxo_set(), chain.utxo_set());
    assert_eq!(reloaded.balance_of("A"), 80);
    assert_eq!(reloaded.balance_of("B"), 15);
    assert_eq!(reloaded.balance_of("C"), 5);
    assert_eq!(reloaded.balance_of("M"), 50);
    reloaded.validate_chain().unwrap();
}

#[test]
fn test_reloaded_chain_keeps_growing() {
    let temp_dir = tempdir().unwrap();
    let store = SledBlockStore::open(temp_dir.path()).unwrap();
    let chain = Chain::new("A", &test_config()).unwrap();
    save_all(&store, chain.blocks());

    let mut reloaded = open_chain(&store, &test_config(), Arc::new(OwnerClaimVerifier)).unwrap();
    let tx = reloaded.build_transaction("A", "B", 50).unwrap();
    let block = reloaded.append_block(vec![tx], "A").unwrap();
    store.save_block(&block).unwrap();

    let again = open_chain(&store, &test_config(), Arc::new(OwnerClaimVerifier)).unwrap();
    assert_eq!(again.height(), 1);
    assert_eq!(again.balance_of("B"), 50);
}

#[test]
fn test_empty_store_has_no_chain() {
    let store = MemoryBlockStore::new();
    let result = open_chain(&store, &test_config(), Arc::new(OwnerClaimVerifier));
    assert!(matches!(result, Err(LedgerError::InvalidInput(_))));
}

#[test]
fn test_corrupted_store_fails_replay() {
    let chain = build_chain();
    let mut blocks = chain.blocks().to_vec();

    let mut json = serde_json::to_value(&blocks[2]).unwrap();
    json["transactions"][0]["outputs"][0]["claim"] = serde_json::json!("thief");
    blocks[2] = serde_json::from_value(json).unwrap();

    let store = MemoryBlockStore::new();
    save_all(&store, &blocks);
    let err = open_chain(&store, &test_config(), Arc::new(OwnerClaimVerifier)).unwrap_err();
    assert_eq!(err, LedgerError::MerkleMismatch { height: 2 });
}

#[test]
fn test_stricter_config_rejects_stored_blocks() {
    let chain = build_chain();
    let store = MemoryBlockStore::new();
    save_all(&store, chain.blocks());

    let strict = LedgerConfig {
        difficulty: 12,
        ..test_config()
    };
    let err = open_chain(&store, &strict, Arc::new(OwnerClaimVerifier)).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidBlock { height: 0, .. }));
}
