//! Data storage and persistence
//!
//! This module manages the unspent-output index and the block stores a chain
//! is persisted to and replayed from.

pub mod block_store;
pub mod utxo_set;

pub use block_store::{BlockStore, MemoryBlockStore, SledBlockStore};
pub use utxo_set::UtxoSet;

use crate::config::LedgerConfig;
use crate::core::{Chain, ClaimVerifier};
use crate::error::Result;
use log::info;
use std::sync::Arc;

/// Load every block from `store` and replay it into a validated [`Chain`]
pub fn open_chain(
    store: &dyn BlockStore,
    config: &LedgerConfig,
    verifier: Arc<dyn ClaimVerifier>,
) -> Result<Chain> {
    let blocks = store.load_chain()?;
    info!("Loaded {} blocks from storage", blocks.len());
    Chain::from_blocks(blocks, config, verifier)
}
