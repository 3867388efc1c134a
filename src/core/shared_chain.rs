//! Thread-safe handle around a [`Chain`]
//!
//! Appends are serialized by a gate mutex. The nonce search runs with no
//! state lock held, so balance queries and validation keep working while a
//! block is being mined.

use crate::core::{Block, CancelToken, Chain, Hash256, Transaction};
use crate::error::{LedgerError, Result};
use log::info;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone)]
pub struct SharedChain {
    state: Arc<RwLock<Chain>>,
    append_gate: Arc<Mutex<()>>,
    cancel: CancelToken,
}

impl SharedChain {
    pub fn new(mut chain: Chain) -> SharedChain {
        let cancel = chain
            .proof_of_work()
            .cancel_token()
            .cloned()
            .unwrap_or_default();
        let pow = chain.proof_of_work().clone().with_cancel_token(cancel.clone());
        chain.set_proof_of_work(pow);

        SharedChain {
            state: Arc::new(RwLock::new(chain)),
            append_gate: Arc::new(Mutex::new(())),
            cancel,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Chain>> {
        self.state
            .read()
            .map_err(|e| LedgerError::Concurrency(format!("Chain read lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Chain>> {
        self.state
            .write()
            .map_err(|e| LedgerError::Concurrency(format!("Chain write lock poisoned: {e}")))
    }

    /// Setting this token aborts the nonce search of an in-flight append
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn append_block(&self, candidates: Vec<Transaction>, miner_address: &str) -> Result<Block> {
        let _gate = self
            .append_gate
            .lock()
            .map_err(|e| LedgerError::Concurrency(format!("Append gate poisoned: {e}")))?;

        // The gate keeps other writers out, so this snapshot stays current
        // until the commit below
        let (unsealed, pow) = {
            let chain = self.read()?;
            (
                chain.prepare_block(candidates, miner_address)?,
                chain.proof_of_work().clone(),
            )
        };

        let block = match unsealed.mine_and_seal(&pow) {
            Ok(block) => block,
            Err(e @ LedgerError::MiningCancelled { .. }) => {
                self.cancel.reset();
                info!("Append at height {} cancelled", unsealed.header().height());
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.write()?.commit_block(block.clone())?;
        Ok(block)
    }

    pub fn build_transaction(&self, from: &str, to: &str, amount: u64) -> Result<Transaction> {
        self.read()?.build_transaction(from, to, amount)
    }

    pub fn balance_of(&self, claim: &str) -> Result<u64> {
        Ok(self.read()?.balance_of(claim))
    }

    pub fn validate_chain(&self) -> Result<()> {
        self.read()?.validate_chain()
    }

    pub fn height(&self) -> Result<u64> {
        Ok(self.read()?.height())
    }

    pub fn tip_hash(&self) -> Result<Hash256> {
        Ok(self.read()?.tip_hash())
    }

    pub fn total_unspent_value(&self) -> Result<u64> {
        Ok(self.read()?.total_unspent_value())
    }

    /// Run `f` against a consistent view of the chain
    pub fn with_chain<R>(&self, f: impl FnOnce(&Chain) -> R) -> Result<R> {
        let chain = self.read()?;
        Ok(f(&chain))
    }
}
