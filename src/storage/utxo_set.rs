use crate::core::{Block, OutPoint, Transaction, TransactionOutput};
use crate::error::{LedgerError, Result};
use log::warn;
use std::collections::{BTreeSet, HashMap};

/// Incrementally maintained index of unspent outputs
///
/// Besides the outpoint map it keeps, per claim, the ordered set of owned
/// outpoints and their running balance, so balance queries and coin selection
/// never rescan the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    outputs: HashMap<OutPoint, TransactionOutput>,
    by_claim: HashMap<String, BTreeSet<OutPoint>>,
    balances: HashMap<String, u64>,
}

impl UtxoSet {
    pub fn new() -> UtxoSet {
        UtxoSet::default()
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TransactionOutput> {
        self.outputs.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.outputs.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn balance_of(&self, claim: &str) -> u64 {
        self.balances.get(claim).copied().unwrap_or(0)
    }

    /// Sum of all unspent value, saturating at `u64::MAX`
    pub fn total_value(&self) -> u64 {
        self.balances
            .values()
            .fold(0u64, |total, balance| total.saturating_add(*balance))
    }

    /// Outputs owned by `claim`, in `OutPoint` order
    pub fn outputs_for<'a>(
        &'a self,
        claim: &str,
    ) -> impl Iterator<Item = (OutPoint, &'a TransactionOutput)> + 'a {
        self.by_claim
            .get(claim)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(move |outpoint| self.outputs.get(outpoint).map(|out| (*outpoint, out)))
    }

    /// First-fit coin selection: walk the claim's outputs in order and stop as
    /// soon as `amount` is covered. Returns the accumulated value and the
    /// selected outpoints, even when the amount was not reached.
    pub fn find_spendable_outputs(&self, claim: &str, amount: u64) -> (u64, Vec<OutPoint>) {
        let mut accumulated = 0u64;
        let mut selected = Vec::new();
        for (outpoint, out) in self.outputs_for(claim) {
            if accumulated >= amount {
                break;
            }
            accumulated = accumulated.saturating_add(out.value());
            selected.push(outpoint);
        }
        (accumulated, selected)
    }

    /// Add an unspent output. An outpoint that is already live, or a value
    /// that would overflow its claim's balance, leaves the set untouched.
    pub fn insert(&mut self, outpoint: OutPoint, output: TransactionOutput) -> Result<()> {
        if self.outputs.contains_key(&outpoint) {
            return Err(LedgerError::Database(format!(
                "outpoint {outpoint} is already unspent"
            )));
        }
        let balance = self.balance_of(output.claim());
        let updated = balance.checked_add(output.value()).ok_or_else(|| {
            LedgerError::Database(format!(
                "balance of {} overflows adding {}",
                output.claim(),
                output.value()
            ))
        })?;
        let claim = output.claim().to_string();
        self.outputs.insert(outpoint, output);
        self.by_claim.entry(claim.clone()).or_default().insert(outpoint);
        self.balances.insert(claim, updated);
        Ok(())
    }

    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<TransactionOutput> {
        let output = self.outputs.remove(outpoint)?;
        if let Some(set) = self.by_claim.get_mut(output.claim()) {
            set.remove(outpoint);
            if set.is_empty() {
                self.by_claim.remove(output.claim());
            }
        }
        self.debit(output.claim(), output.value());
        Some(output)
    }

    fn debit(&mut self, claim: &str, value: u64) {
        if let Some(balance) = self.balances.get_mut(claim) {
            *balance = balance.saturating_sub(value);
            if *balance == 0 && !self.by_claim.contains_key(claim) {
                self.balances.remove(claim);
            }
        }
    }

    /// Consume a transaction's inputs and add its outputs
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<()> {
        if !tx.is_coinbase() {
            for input in tx.inputs() {
                if self.remove(&input.outpoint()).is_none() {
                    warn!(
                        "Applying {} consumed unknown outpoint {}",
                        tx.hash(),
                        input.outpoint()
                    );
                }
            }
        }
        for (outpoint, output) in tx.created_outputs() {
            self.insert(outpoint, output.clone())?;
        }
        Ok(())
    }

    /// Apply a block that has already been validated against this set
    pub fn apply_block(&mut self, block: &Block) -> Result<()> {
        for tx in block.transactions() {
            self.apply_transaction(tx)?;
        }
        Ok(())
    }

    pub fn count_transactions(&self) -> usize {
        self.outputs
            .keys()
            .map(|outpoint| outpoint.txid)
            .collect::<BTreeSet<_>>()
            .len()
    }
}
