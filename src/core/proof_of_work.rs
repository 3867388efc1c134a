use crate::core::{BlockHeader, Hash256};
use crate::error::{LedgerError, Result};
use log::{debug, info};
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const MAX_DIFFICULTY: u32 = 256;

/// Shared flag that stops an in-flight nonce search
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear the flag so the same token can guard the next search
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Nonce search engine
///
/// A header is valid when its SHA-256 digest, read as a big-endian integer, is
/// below `2^(256 - difficulty)`. The search starts at the header's current
/// nonce and counts upward. It never wraps: once `u64::MAX` has been tried the
/// search ends with `ProofNotFound`, bounded or not.
#[derive(Debug, Clone, Default)]
pub struct ProofOfWork {
    max_attempts: Option<u64>,
    cancel: Option<CancelToken>,
}

impl ProofOfWork {
    /// Unbounded, non-cancellable engine
    pub fn new() -> ProofOfWork {
        ProofOfWork::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> ProofOfWork {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> ProofOfWork {
        self.cancel = Some(token);
        self
    }

    pub fn max_attempts(&self) -> Option<u64> {
        self.max_attempts
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    /// `2^(256 - difficulty)`
    pub fn target(difficulty: u32) -> Result<BigInt> {
        if difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::InvalidInput(format!(
                "Difficulty {difficulty} exceeds {MAX_DIFFICULTY} bits"
            )));
        }
        let mut target = BigInt::from(1);
        target.shl_assign(MAX_DIFFICULTY - difficulty);
        Ok(target)
    }

    fn meets_target(hash: &Hash256, target: &BigInt) -> bool {
        let hash_int = BigInt::from_bytes_be(Sign::Plus, hash.as_bytes());
        hash_int < *target
    }

    /// Search for a nonce that satisfies the header's difficulty
    pub fn mine(&self, header: &BlockHeader) -> Result<BlockHeader> {
        let target = Self::target(header.difficulty())?;
        let mut candidate = header.clone();
        let mut attempts = 0u64;

        info!(
            "Mining block at height {} with difficulty {} (budget: {})",
            header.height(),
            header.difficulty(),
            self.max_attempts
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unbounded".to_string())
        );

        loop {
            if let Some(max) = self.max_attempts {
                if attempts >= max {
                    debug!("Nonce budget of {max} exhausted at height {}", header.height());
                    return Err(LedgerError::ProofNotFound {
                        attempts,
                        next_nonce: candidate.nonce(),
                    });
                }
            }
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                info!("Mining cancelled after {attempts} attempts");
                return Err(LedgerError::MiningCancelled { attempts });
            }

            attempts += 1;
            let hash = candidate.hash();
            if Self::meets_target(&hash, &target) {
                info!(
                    "Found nonce {} after {attempts} attempts: {hash} ({} leading zero bits)",
                    candidate.nonce(),
                    hash.leading_zero_bits()
                );
                return Ok(candidate);
            }

            match candidate.nonce().checked_add(1) {
                Some(next) => candidate.set_nonce(next),
                None => {
                    return Err(LedgerError::ProofNotFound {
                        attempts,
                        next_nonce: u64::MAX,
                    })
                }
            }
        }
    }

    /// Recompute the header digest and check it against its own target
    pub fn validate(header: &BlockHeader) -> bool {
        match Self::target(header.difficulty()) {
            Ok(target) => Self::meets_target(&header.hash(), &target),
            Err(_) => false,
        }
    }
}
