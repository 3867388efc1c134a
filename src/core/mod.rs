//! Core ledger functionality
//!
//! This module contains the fundamental ledger components: hashes, Merkle
//! trees, transactions, blocks, proof-of-work, and the chain that ties them
//! together.

pub mod block;
pub mod blockchain;
pub mod hash;
pub mod merkle;
pub mod proof_of_work;
pub mod shared_chain;
pub mod transaction;
pub mod verifier;

pub use block::{Block, BlockHeader, UnsealedBlock, HEADER_SIZE};
pub use blockchain::Chain;
pub use hash::{Hash256, HASH_SIZE};
pub use merkle::{MerkleProof, MerkleTree, ProofElement};
pub use proof_of_work::{CancelToken, ProofOfWork, MAX_DIFFICULTY};
pub use shared_chain::SharedChain;
pub use transaction::{
    OutPoint, Transaction, TransactionInput, TransactionOutput, COINBASE_SOURCE_INDEX,
};
pub use verifier::{ClaimVerifier, OwnerClaimVerifier};
