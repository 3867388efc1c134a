//! Utility functions and helpers
//!
//! SHA-256 hashing, timestamps, and the bincode storage encoding.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, sha256_digest, sha256_digest_parts};

pub use serialization::{deserialize, serialize};
