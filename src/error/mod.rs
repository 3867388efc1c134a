//! Error handling for the ledger
//!
//! Every operation in the ledger core returns one of these kinds. Nothing is
//! retried internally and nothing is process-fatal.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error kinds for ledger operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or empty construction arguments
    InvalidInput(String),
    /// A transfer cannot be funded from the referenced outputs
    InsufficientFunds { required: u64, available: u64 },
    /// An input references an output that is not in the unspent set
    DoubleSpend { height: u64, outpoint: String },
    /// The claim verifier rejected an unlock proof
    ClaimMismatch { height: u64, outpoint: String },
    /// The stored Merkle root does not match the block's transactions
    MerkleMismatch { height: u64 },
    /// The header hash is wrong or misses the difficulty target
    ProofInvalid { height: u64 },
    /// A bounded nonce search ran out of attempts
    ProofNotFound { attempts: u64, next_nonce: u64 },
    /// Mining was cancelled through its cancel token
    MiningCancelled { attempts: u64 },
    /// `previous_hash` or height does not follow the prior block. `expected`
    /// and `found` name which of the two they describe.
    ChainLinkageBroken {
        height: u64,
        expected: String,
        found: String,
    },
    /// Block-level rule violations other than Merkle/PoW (coinbase shape, reward)
    InvalidBlock { height: u64, reason: String },
    /// Database-related errors
    Database(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Configuration errors
    Config(String),
    /// Poisoned locks around shared chain state
    Concurrency(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            LedgerError::DoubleSpend { height, outpoint } => {
                write!(
                    f,
                    "Double spend at height {height}: output {outpoint} is not unspent"
                )
            }
            LedgerError::ClaimMismatch { height, outpoint } => {
                write!(
                    f,
                    "Claim mismatch at height {height}: unlock proof rejected for {outpoint}"
                )
            }
            LedgerError::MerkleMismatch { height } => {
                write!(f, "Merkle root mismatch in block at height {height}")
            }
            LedgerError::ProofInvalid { height } => {
                write!(f, "Invalid proof-of-work in block at height {height}")
            }
            LedgerError::ProofNotFound {
                attempts,
                next_nonce,
            } => {
                write!(
                    f,
                    "Proof not found after {attempts} attempts (resume at nonce {next_nonce})"
                )
            }
            LedgerError::MiningCancelled { attempts } => {
                write!(f, "Mining cancelled after {attempts} attempts")
            }
            LedgerError::ChainLinkageBroken {
                height,
                expected,
                found,
            } => {
                write!(
                    f,
                    "Chain linkage broken at height {height}: expected {expected}, found {found}"
                )
            }
            LedgerError::InvalidBlock { height, reason } => {
                write!(f, "Invalid block at height {height}: {reason}")
            }
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Concurrency(msg) => write!(f, "Concurrency error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
