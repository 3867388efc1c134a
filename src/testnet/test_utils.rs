//! Test utilities for ledger testing

use crate::config::LedgerConfig;
use crate::core::{Block, Chain, Hash256, ProofOfWork, Transaction, UnsealedBlock};
use crate::error::Result;
use crate::storage::SledBlockStore;
use tempfile::TempDir;

/// Low difficulty so that every test mines in a few dozen attempts
pub const TEST_DIFFICULTY: u32 = 4;
pub const TEST_REWARD: u64 = 50;

pub fn test_config() -> LedgerConfig {
    LedgerConfig {
        difficulty: TEST_DIFFICULTY,
        block_reward: TEST_REWARD,
        ..LedgerConfig::default()
    }
}

/// Chain whose genesis pays the test reward to `address`
pub fn funded_chain(address: &str) -> Chain {
    Chain::new(address, &test_config()).expect("genesis mining at test difficulty")
}

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(tempfile::tempdir()?)
}

/// Open a sled block store in a fresh temporary directory
pub fn create_test_store() -> Result<(SledBlockStore, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let store = SledBlockStore::open(temp_dir.path().join("blocks"))?;
    Ok((store, temp_dir))
}

/// Mine a coinbase-only block on `parent` without going through a chain
pub fn mine_empty_block(parent: &Block, miner_address: &str) -> Result<Block> {
    let height = parent.height() + 1;
    let coinbase = Transaction::new_coinbase_at_height(height, TEST_REWARD, miner_address);
    UnsealedBlock::new(vec![coinbase], *parent.hash(), height, TEST_DIFFICULTY)?
        .mine_and_seal(&ProofOfWork::new())
}

/// Mine a block at `height` claiming `previous_hash` as its parent
pub fn mine_block_on(previous_hash: Hash256, height: u64, miner_address: &str) -> Result<Block> {
    let coinbase = Transaction::new_coinbase_at_height(height, TEST_REWARD, miner_address);
    UnsealedBlock::new(vec![coinbase], previous_hash, height, TEST_DIFFICULTY)?
        .mine_and_seal(&ProofOfWork::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_funded_chain() {
        let chain = funded_chain("alice");
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.balance_of("alice"), TEST_REWARD);
    }

    #[test]
    fn test_mine_empty_block_extends_chain() {
        let mut chain = funded_chain("alice");
        let block = mine_empty_block(&chain.blocks()[0], "bob").unwrap();
        chain.commit_block(block).unwrap();
        assert_eq!(chain.balance_of("bob"), TEST_REWARD);
        chain.validate_chain().unwrap();
    }

    #[test]
    fn test_mine_block_on_foreign_parent_is_rejected() {
        let mut chain = funded_chain("alice");
        let block = mine_block_on(Hash256::digest(b"nowhere"), 1, "bob").unwrap();
        assert!(chain.commit_block(block).is_err());
    }

    #[test]
    fn test_create_test_store() {
        let (store, _temp_dir) = create_test_store().unwrap();
        assert!(store.is_empty());
    }
}
