//! 256-bit digest used for transaction ids, Merkle nodes and block hashes.

use crate::error::{LedgerError, Result};
use crate::utils::{sha256_digest, sha256_digest_parts};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const HASH_SIZE: usize = 32;

#[derive(
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct Hash256([u8; HASH_SIZE]);

impl Hash256 {
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash256(bytes)
    }

    /// The all-zero sentinel used as the genesis block's previous hash.
    pub const fn zero() -> Self {
        Hash256([0u8; HASH_SIZE])
    }

    pub fn digest(data: &[u8]) -> Self {
        Hash256(sha256_digest(data))
    }

    /// `SHA256(left ‖ right)`
    pub fn digest_pair(left: &Hash256, right: &Hash256) -> Self {
        Hash256(sha256_digest_parts(&[&left.0, &right.0]))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HASH_SIZE {
            return Err(LedgerError::InvalidInput(format!(
                "Expected {HASH_SIZE} bytes for a hash, got {}",
                bytes.len()
            )));
        }
        let mut out = [0u8; HASH_SIZE];
        out.copy_from_slice(bytes);
        Ok(Hash256(out))
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let bytes = HEXLOWER
            .decode(hex.as_bytes())
            .map_err(|e| LedgerError::InvalidInput(format!("Invalid hash hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn leading_zero_bits(&self) -> u32 {
        let mut total = 0u32;
        for b in &self.0 {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}
