//! # utxo-ledger
//!
//! A minimal UTXO ledger: transactions spend earlier outputs, blocks commit to
//! their transactions through a Merkle root, proof-of-work seals each block,
//! and a chain keeps an incrementally maintained index of unspent outputs.
//!
//! ## Layout
//! - `core/`: hashes, Merkle trees, transactions, blocks, mining, the chain
//! - `storage/`: the UTXO index and the block stores a chain replays from
//! - `config/`: TOML ledger parameters with environment overrides
//! - `cli/`: argument parsing for the `utxo-ledger` binary
//! - `utils/`: SHA-256, timestamps and bincode helpers
//!
//! ## Using it
//! Build a [`Chain`] from a [`LedgerConfig`], create transfers with
//! [`Chain::build_transaction`] and mine them in with [`Chain::append_block`].
//! Wrap the chain in a [`SharedChain`] to share it between threads.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::LedgerConfig;
pub use core::{
    Block, BlockHeader, CancelToken, Chain, ClaimVerifier, Hash256, MerkleProof, MerkleTree,
    OutPoint, OwnerClaimVerifier, ProofOfWork, SharedChain, Transaction, TransactionInput,
    TransactionOutput, UnsealedBlock,
};
pub use error::{LedgerError, Result};
pub use storage::{BlockStore, MemoryBlockStore, SledBlockStore, UtxoSet};
pub use utils::{current_timestamp, sha256_digest};
