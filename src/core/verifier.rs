//! Claim verification boundary
//!
//! Key management and real signatures live outside this crate. The chain asks
//! a [`ClaimVerifier`] once per input whether the unlock proof satisfies the
//! claim of the output being spent.

use crate::core::Hash256;

pub trait ClaimVerifier: Send + Sync {
    /// `tx_digest` is the spending transaction's signing digest
    fn verify(&self, unlock_proof: &[u8], claim: &str, tx_digest: &Hash256) -> bool;
}

/// Accepts an input when its unlock proof is the claim itself
///
/// This is the convention `Chain::build_transaction` signs with. It proves
/// nothing cryptographically and stands in until a signing layer is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct OwnerClaimVerifier;

impl ClaimVerifier for OwnerClaimVerifier {
    fn verify(&self, unlock_proof: &[u8], claim: &str, _tx_digest: &Hash256) -> bool {
        unlock_proof == claim.as_bytes()
    }
}
