use crate::core::{Hash256, Transaction};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};

/// Merkle tree over an ordered list of transaction hashes
///
/// Leaves are the transaction hashes themselves. Each level pairs adjacent
/// nodes left to right and hashes `left ‖ right`. When a level above the root
/// has an odd number of nodes, the last node is paired with itself. That
/// duplication rule is a determinism convention, not a reviewed cryptographic
/// choice: it lets `[a, b, c]` and `[a, b, c, c]` share a root.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    // levels[0] are the leaves, levels.last() holds only the root
    levels: Vec<Vec<Hash256>>,
}

/// Merkle proof for transaction inclusion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Transaction hash being proven
    pub transaction_hash: Hash256,
    /// Index of the transaction in the block
    pub transaction_index: usize,
    /// Sibling hashes from the leaf up to (not including) the root
    pub proof_path: Vec<ProofElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofElement {
    /// Sibling hash
    pub hash: Hash256,
    /// Direction: true if sibling is on the right, false if on the left
    pub is_right: bool,
}

impl MerkleTree {
    /// Build the full tree from transaction hashes
    pub fn from_hashes(hashes: &[Hash256]) -> Result<Self> {
        if hashes.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Cannot build a Merkle tree from an empty hash list".to_string(),
            ));
        }

        let mut levels = vec![hashes.to_vec()];
        while levels[levels.len() - 1].len() > 1 {
            let next = Self::next_level(&levels[levels.len() - 1]);
            levels.push(next);
        }

        Ok(MerkleTree { levels })
    }

    /// Build the tree over the freshly computed hashes of `transactions`
    pub fn from_transactions(transactions: &[Transaction]) -> Result<Self> {
        let hashes: Vec<Hash256> = transactions.iter().map(|tx| tx.compute_hash()).collect();
        Self::from_hashes(&hashes)
    }

    /// Reduce an ordered hash list to its root without keeping the levels
    pub fn build_root(hashes: &[Hash256]) -> Result<Hash256> {
        if hashes.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Cannot calculate a Merkle root from an empty hash list".to_string(),
            ));
        }

        let mut current_level = hashes.to_vec();
        while current_level.len() > 1 {
            current_level = Self::next_level(&current_level);
        }
        Ok(current_level[0])
    }

    fn next_level(level: &[Hash256]) -> Vec<Hash256> {
        level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => Hash256::digest_pair(left, right),
                [single] => Hash256::digest_pair(single, single),
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect()
    }

    pub fn root(&self) -> Hash256 {
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Generate an inclusion proof for the leaf at `transaction_index`
    pub fn proof(&self, transaction_index: usize) -> Result<MerkleProof> {
        if transaction_index >= self.leaf_count() {
            return Err(LedgerError::InvalidInput(format!(
                "Transaction index {} out of bounds (leaf count: {})",
                transaction_index,
                self.leaf_count()
            )));
        }

        let mut proof_path = Vec::with_capacity(self.levels.len() - 1);
        let mut index = transaction_index;
        for level in &self.levels[..self.levels.len() - 1] {
            let element = if index % 2 == 0 {
                // A left node without a right neighbour is paired with itself
                let sibling = level.get(index + 1).unwrap_or(&level[index]);
                ProofElement {
                    hash: *sibling,
                    is_right: true,
                }
            } else {
                ProofElement {
                    hash: level[index - 1],
                    is_right: false,
                }
            };
            proof_path.push(element);
            index /= 2;
        }

        Ok(MerkleProof {
            transaction_hash: self.levels[0][transaction_index],
            transaction_index,
            proof_path,
        })
    }

    /// Check whether `transactions` reproduce `expected_root`
    pub fn verify_transactions(transactions: &[Transaction], expected_root: &Hash256) -> Result<bool> {
        let hashes: Vec<Hash256> = transactions.iter().map(|tx| tx.compute_hash()).collect();
        Ok(Self::build_root(&hashes)? == *expected_root)
    }
}

impl MerkleProof {
    /// Fold the proof path and compare with `merkle_root`
    pub fn verify(&self, merkle_root: &Hash256) -> bool {
        let mut current_hash = self.transaction_hash;
        for element in &self.proof_path {
            current_hash = if element.is_right {
                Hash256::digest_pair(&current_hash, &element.hash)
            } else {
                Hash256::digest_pair(&element.hash, &current_hash)
            };
        }
        current_hash == *merkle_root
    }
}
