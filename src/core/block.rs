use crate::core::{Hash256, MerkleProof, MerkleTree, ProofOfWork, Transaction, MAX_DIFFICULTY};
use crate::error::{LedgerError, Result};
use crate::utils::{current_timestamp, deserialize, serialize};
use log::info;
use serde::{Deserialize, Serialize};

pub const HEADER_SIZE: usize = 32 + 32 + 8 + 8 + 4 + 8;

#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    previous_hash: Hash256,
    merkle_root: Hash256,
    timestamp: i64, // Advisory only, milliseconds since the epoch
    height: u64,
    difficulty: u32, // Required leading zero bits
    nonce: u64,
}

impl BlockHeader {
    pub fn new(
        previous_hash: Hash256,
        merkle_root: Hash256,
        timestamp: i64,
        height: u64,
        difficulty: u32,
    ) -> BlockHeader {
        BlockHeader {
            previous_hash,
            merkle_root,
            timestamp,
            height,
            difficulty,
            nonce: 0,
        }
    }

    /// Canonical 92-byte encoding, big endian, fixed field order:
    /// previous_hash | merkle_root | timestamp | height | difficulty | nonce
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data_bytes = Vec::with_capacity(HEADER_SIZE);
        data_bytes.extend(self.previous_hash.as_bytes());
        data_bytes.extend(self.merkle_root.as_bytes());
        data_bytes.extend(self.timestamp.to_be_bytes());
        data_bytes.extend(self.height.to_be_bytes());
        data_bytes.extend(self.difficulty.to_be_bytes());
        data_bytes.extend(self.nonce.to_be_bytes());
        data_bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<BlockHeader> {
        if bytes.len() != HEADER_SIZE {
            return Err(LedgerError::InvalidInput(format!(
                "Header must be {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }

        // Lengths are fixed above, so the slice conversions cannot fail
        let be8 = |at: usize| -> [u8; 8] {
            let mut out = [0u8; 8];
            out.copy_from_slice(&bytes[at..at + 8]);
            out
        };
        let mut difficulty = [0u8; 4];
        difficulty.copy_from_slice(&bytes[80..84]);

        Ok(BlockHeader {
            previous_hash: Hash256::from_slice(&bytes[0..32])?,
            merkle_root: Hash256::from_slice(&bytes[32..64])?,
            timestamp: i64::from_be_bytes(be8(64)),
            height: u64::from_be_bytes(be8(72)),
            difficulty: u32::from_be_bytes(difficulty),
            nonce: u64::from_be_bytes(be8(84)),
        })
    }

    pub fn hash(&self) -> Hash256 {
        Hash256::digest(&self.to_bytes())
    }

    pub fn previous_hash(&self) -> &Hash256 {
        &self.previous_hash
    }

    pub fn merkle_root(&self) -> &Hash256 {
        &self.merkle_root
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    // Only the nonce search and unsealed blocks move the nonce
    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}

/// A block that has its Merkle root but no proof-of-work yet
#[derive(Debug, Clone)]
pub struct UnsealedBlock {
    header: BlockHeader,
    transactions: Vec<Transaction>,
}

impl UnsealedBlock {
    pub fn new(
        transactions: Vec<Transaction>,
        previous_hash: Hash256,
        height: u64,
        difficulty: u32,
    ) -> Result<UnsealedBlock> {
        if transactions.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Block must contain at least one transaction".to_string(),
            ));
        }
        if difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidInput(format!(
                "Difficulty {difficulty} exceeds {MAX_DIFFICULTY} bits"
            )));
        }

        let merkle_root = Self::calculate_merkle_root(&transactions)?;
        let header = BlockHeader::new(
            previous_hash,
            merkle_root,
            current_timestamp()?,
            height,
            difficulty,
        );

        Ok(UnsealedBlock {
            header,
            transactions,
        })
    }

    /// Pin the timestamp, e.g. for reproducible hashes in tests
    pub fn with_timestamp(mut self, timestamp: i64) -> UnsealedBlock {
        self.header.timestamp = timestamp;
        self
    }

    /// Start the nonce search somewhere other than 0, e.g. after `ProofNotFound`
    pub fn with_nonce(mut self, nonce: u64) -> UnsealedBlock {
        self.header.nonce = nonce;
        self
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    fn calculate_merkle_root(transactions: &[Transaction]) -> Result<Hash256> {
        let hashes: Vec<Hash256> = transactions.iter().map(|tx| tx.hash()).collect();
        MerkleTree::build_root(&hashes)
    }

    /// Run the nonce search and freeze the result into a [`Block`]
    pub fn mine_and_seal(&self, pow: &ProofOfWork) -> Result<Block> {
        let header = pow.mine(&self.header)?;
        let hash = header.hash();
        info!(
            "Sealed block {} at height {} with {} transactions",
            hash,
            header.height(),
            self.transactions.len()
        );

        Ok(Block {
            header,
            transactions: self.transactions.clone(),
            hash,
        })
    }
}

/// A sealed block. It has no mutating methods.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    hash: Hash256,
}

impl Block {
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn hash(&self) -> &Hash256 {
        &self.hash
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn previous_hash(&self) -> &Hash256 {
        &self.header.previous_hash
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    /// Verify the Merkle root, then the proof-of-work
    ///
    /// The root is rebuilt from freshly recomputed transaction hashes, so a
    /// transaction edited after hashing surfaces as `MerkleMismatch` even when
    /// its cached id was left alone.
    pub fn validate_structure(&self) -> Result<()> {
        let height = self.header.height;

        let fresh_root = MerkleTree::from_transactions(&self.transactions)
            .map_err(|_| LedgerError::MerkleMismatch { height })?
            .root();
        if fresh_root != self.header.merkle_root {
            return Err(LedgerError::MerkleMismatch { height });
        }

        if self.header.hash() != self.hash || !ProofOfWork::validate(&self.header) {
            return Err(LedgerError::ProofInvalid { height });
        }

        Ok(())
    }

    /// Inclusion proof for the transaction at `transaction_index`
    pub fn merkle_proof(&self, transaction_index: usize) -> Result<MerkleProof> {
        let merkle_tree = MerkleTree::from_transactions(&self.transactions)?;
        merkle_tree.proof(transaction_index)
    }

    pub fn verify_merkle_proof(&self, proof: &MerkleProof) -> bool {
        proof.verify(&self.header.merkle_root)
    }
}
