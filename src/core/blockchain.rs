// This is the ledger itself: an ordered list of sealed blocks plus the index of
// outputs nobody has spent yet. Every way a block can get in here (genesis,
// append, commit of a block mined elsewhere, replay from storage) goes through
// the same admission checks in `admit_block`.

use crate::config::LedgerConfig;
use crate::core::{
    Block, ClaimVerifier, Hash256, OutPoint, OwnerClaimVerifier, ProofOfWork, Transaction,
    TransactionInput, TransactionOutput, UnsealedBlock,
};
use crate::error::{LedgerError, Result};
use crate::storage::UtxoSet;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub struct Chain {
    blocks: Vec<Block>,
    utxos: UtxoSet,
    verifier: Arc<dyn ClaimVerifier>,
    config: LedgerConfig,
    pow: ProofOfWork,
}

impl Chain {
    /// Mine a genesis block paying `block_reward` to `genesis_address`
    pub fn new(genesis_address: &str, config: &LedgerConfig) -> Result<Chain> {
        Self::with_verifier(genesis_address, config, Arc::new(OwnerClaimVerifier))
    }

    pub fn with_verifier(
        genesis_address: &str,
        config: &LedgerConfig,
        verifier: Arc<dyn ClaimVerifier>,
    ) -> Result<Chain> {
        config.validate()?;
        if genesis_address.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Genesis reward address cannot be empty".to_string(),
            ));
        }

        let mut chain = Chain::empty(config, verifier);
        info!("Creating genesis block for address: {genesis_address}");
        let coinbase = Transaction::new_coinbase_at_height(0, config.block_reward, genesis_address);
        let genesis = UnsealedBlock::new(vec![coinbase], Hash256::zero(), 0, config.difficulty)?
            .mine_and_seal(&chain.pow)?;
        chain.commit_block(genesis)?;
        Ok(chain)
    }

    /// Rebuild a chain from a stored block sequence, re-validating every block
    pub fn from_blocks(
        blocks: Vec<Block>,
        config: &LedgerConfig,
        verifier: Arc<dyn ClaimVerifier>,
    ) -> Result<Chain> {
        config.validate()?;
        if blocks.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Cannot replay a chain without a genesis block".to_string(),
            ));
        }

        let mut chain = Chain::empty(config, verifier);
        for block in blocks {
            chain.commit_block(block)?;
        }
        info!(
            "Replayed {} blocks, tip {}",
            chain.blocks.len(),
            chain.tip_hash()
        );
        Ok(chain)
    }

    fn empty(config: &LedgerConfig, verifier: Arc<dyn ClaimVerifier>) -> Chain {
        Chain {
            blocks: Vec::new(),
            utxos: UtxoSet::new(),
            verifier,
            config: config.clone(),
            pow: config.proof_of_work(),
        }
    }

    /// Spend `from`'s outputs first-fit in `OutPoint` order until `amount` is
    /// covered, paying any surplus back to `from` as change
    ///
    /// The result is not reserved against the UTXO set. Two transactions built
    /// from the same funds before either is appended will collide on append.
    pub fn build_transaction(&self, from: &str, to: &str, amount: u64) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidInput(
                "Transfer amount must be positive".to_string(),
            ));
        }
        if from.is_empty() || to.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Sender and recipient cannot be empty".to_string(),
            ));
        }

        let (accumulated, selected) = self.utxos.find_spendable_outputs(from, amount);
        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let inputs = selected
            .into_iter()
            .map(|outpoint| TransactionInput::spending(outpoint, from.as_bytes().to_vec()))
            .collect();
        let mut outputs = vec![TransactionOutput::new(amount, to)];
        if accumulated > amount {
            outputs.push(TransactionOutput::new(accumulated - amount, from));
        }

        let tx = Transaction::new_transfer(inputs, outputs)?;
        debug!("Built transaction {} sending {amount} from {from} to {to}", tx.hash());
        Ok(tx)
    }

    /// Validate `candidates` against the current UTXO set and assemble the next
    /// block around them, without mining it
    pub fn prepare_block(
        &self,
        candidates: Vec<Transaction>,
        miner_address: &str,
    ) -> Result<UnsealedBlock> {
        if miner_address.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Miner reward address cannot be empty".to_string(),
            ));
        }

        let height = self.next_height();
        let mut spent_in_batch = HashSet::new();
        for (index, tx) in candidates.iter().enumerate() {
            if let Err(e) = self.check_candidate(tx, height, &mut spent_in_batch) {
                warn!(
                    "Rejected batch of {} transactions: candidate {index} failed: {e}",
                    candidates.len()
                );
                return Err(e);
            }
        }

        let mut transactions = Vec::with_capacity(candidates.len() + 1);
        transactions.push(Transaction::new_coinbase_at_height(
            height,
            self.config.block_reward,
            miner_address,
        ));
        transactions.extend(candidates);

        UnsealedBlock::new(
            transactions,
            self.tip_hash(),
            height,
            self.config.difficulty,
        )
    }

    fn check_candidate(
        &self,
        tx: &Transaction,
        height: u64,
        spent_in_batch: &mut HashSet<OutPoint>,
    ) -> Result<()> {
        if tx.is_coinbase() {
            return Err(LedgerError::InvalidInput(format!(
                "Candidate {} is a coinbase; the chain mints its own",
                tx.hash()
            )));
        }
        if !tx.has_consistent_hash() {
            return Err(LedgerError::InvalidInput(format!(
                "Candidate {} was modified after hashing",
                tx.hash()
            )));
        }
        check_transfer(tx, height, &self.utxos, spent_in_batch, self.verifier.as_ref())?;
        debug!("Candidate {} is valid at height {height}", tx.hash());
        Ok(())
    }

    /// Validate, mine and append a block holding `candidates` behind a fresh
    /// coinbase to `miner_address`. Nothing changes unless every step succeeds.
    pub fn append_block(
        &mut self,
        candidates: Vec<Transaction>,
        miner_address: &str,
    ) -> Result<Block> {
        let unsealed = self.prepare_block(candidates, miner_address)?;
        let block = unsealed.mine_and_seal(&self.pow)?;
        self.commit_block(block.clone())?;
        Ok(block)
    }

    /// Admit an already sealed block on top of the current tip
    pub fn commit_block(&mut self, block: Block) -> Result<()> {
        admit_block(
            &block,
            self.blocks.last(),
            &self.utxos,
            &self.config,
            self.verifier.as_ref(),
        )?;
        self.utxos.apply_block(&block)?;
        info!(
            "Added block {} at height {} ({} transactions)",
            block.hash(),
            block.height(),
            block.transactions().len()
        );
        self.blocks.push(block);
        Ok(())
    }

    pub fn balance_of(&self, claim: &str) -> u64 {
        self.utxos.balance_of(claim)
    }

    /// Replay every block from an empty UTXO set and report the first failure
    pub fn validate_chain(&self) -> Result<()> {
        let replayed = self.replay()?;
        info!(
            "Validated {} blocks, {} unspent outputs",
            self.blocks.len(),
            replayed.len()
        );
        Ok(())
    }

    fn replay(&self) -> Result<UtxoSet> {
        let mut utxos = UtxoSet::new();
        let mut previous: Option<&Block> = None;
        for block in &self.blocks {
            admit_block(
                block,
                previous,
                &utxos,
                &self.config,
                self.verifier.as_ref(),
            )?;
            utxos.apply_block(block)?;
            previous = Some(block);
        }
        Ok(utxos)
    }

    /// Height of the tip block
    pub fn height(&self) -> u64 {
        self.blocks.len().saturating_sub(1) as u64
    }

    fn next_height(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn tip_hash(&self) -> Hash256 {
        self.blocks
            .last()
            .map(|block| *block.hash())
            .unwrap_or_else(Hash256::zero)
    }

    pub fn blocks(&self) -> &[Block] {
        self.blocks.as_slice()
    }

    pub fn block_at(&self, height: u64) -> Option<&Block> {
        usize::try_from(height)
            .ok()
            .and_then(|index| self.blocks.get(index))
    }

    pub fn block_by_hash(&self, hash: &Hash256) -> Option<&Block> {
        self.blocks.iter().find(|block| block.hash() == hash)
    }

    pub fn find_transaction(&self, txid: &Hash256) -> Option<&Transaction> {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions())
            .find(|tx| tx.hash() == *txid)
    }

    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxos
    }

    pub fn total_unspent_value(&self) -> u64 {
        self.utxos.total_value()
    }

    /// Throw the incremental index away and rebuild it by replay
    pub fn reindex_utxo(&mut self) -> Result<&UtxoSet> {
        self.utxos = self.replay()?;
        info!("Reindexed UTXO set: {} unspent outputs", self.utxos.len());
        Ok(&self.utxos)
    }

    /// Check that the incremental index matches a full replay
    pub fn verify_utxo_index(&self) -> Result<()> {
        let replayed = self.replay()?;
        if replayed != self.utxos {
            return Err(LedgerError::Database(format!(
                "UTXO index diverged from replay: {} indexed outputs, {} replayed",
                self.utxos.len(),
                replayed.len()
            )));
        }
        Ok(())
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn set_proof_of_work(&mut self, pow: ProofOfWork) {
        self.pow = pow;
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("height", &self.height())
            .field("tip_hash", &self.tip_hash())
            .field("unspent_outputs", &self.utxos.len())
            .field("config", &self.config)
            .finish()
    }
}

// Checks run on every block before it is applied, whether it was just mined,
// handed in from elsewhere or read back from storage
fn admit_block(
    block: &Block,
    previous: Option<&Block>,
    utxos: &UtxoSet,
    config: &LedgerConfig,
    verifier: &dyn ClaimVerifier,
) -> Result<()> {
    let height = previous.map(|prev| prev.height() + 1).unwrap_or(0);
    let expected_previous = previous
        .map(|prev| *prev.hash())
        .unwrap_or_else(Hash256::zero);

    if block.height() != height {
        return Err(LedgerError::ChainLinkageBroken {
            height,
            expected: format!("height {height}"),
            found: format!("height {}", block.height()),
        });
    }
    if *block.previous_hash() != expected_previous {
        return Err(LedgerError::ChainLinkageBroken {
            height,
            expected: format!("previous hash {}", expected_previous.to_hex()),
            found: format!("previous hash {}", block.previous_hash().to_hex()),
        });
    }

    block.validate_structure()?;

    if block.header().difficulty() < config.difficulty {
        return Err(LedgerError::InvalidBlock {
            height,
            reason: format!(
                "difficulty {} is below the required {}",
                block.header().difficulty(),
                config.difficulty
            ),
        });
    }

    check_coinbase(block, height, config.block_reward)?;
    check_new_ids(block, height, utxos)?;
    if utxos.total_value().checked_add(config.block_reward).is_none() {
        return Err(invalid_block(
            height,
            format!("reward of {} overflows the unspent total", config.block_reward),
        ));
    }

    let mut spent_in_block = HashSet::new();
    for tx in block.transactions().iter().skip(1) {
        if tx.is_coinbase() {
            return Err(invalid_block(height, "more than one coinbase"));
        }
        if !tx.has_consistent_hash() {
            return Err(invalid_block(
                height,
                format!("transaction {} does not match its id", tx.hash()),
            ));
        }
        check_transfer(tx, height, utxos, &mut spent_in_block, verifier).map_err(|e| match e {
            LedgerError::InvalidInput(reason) => LedgerError::InvalidBlock { height, reason },
            other => other,
        })?;
    }
    Ok(())
}

fn check_coinbase(block: &Block, height: u64, block_reward: u64) -> Result<()> {
    let coinbase = block
        .coinbase()
        .ok_or_else(|| invalid_block(height, "first transaction is not a coinbase"))?;
    if !coinbase.has_consistent_hash() {
        return Err(invalid_block(height, "coinbase does not match its id"));
    }
    let tag = coinbase.inputs().first().map(TransactionInput::unlock_proof);
    if tag != Some(height.to_be_bytes().as_slice()) {
        return Err(invalid_block(
            height,
            format!("coinbase is not tagged with height {height}"),
        ));
    }
    match coinbase.outputs() {
        [reward] if reward.value() == block_reward => Ok(()),
        [reward] => Err(invalid_block(
            height,
            format!(
                "coinbase pays {} instead of {block_reward}",
                reward.value()
            ),
        )),
        outputs => Err(invalid_block(
            height,
            format!("coinbase has {} outputs instead of one", outputs.len()),
        )),
    }
}

// A transaction id may appear once per block and never while an earlier
// transaction with the same id still has unspent outputs
fn check_new_ids(block: &Block, height: u64, utxos: &UtxoSet) -> Result<()> {
    let mut seen = HashSet::new();
    for tx in block.transactions() {
        let txid = tx.hash();
        if !seen.insert(txid) {
            return Err(invalid_block(
                height,
                format!("transaction {txid} appears twice"),
            ));
        }
        if tx.created_outputs().any(|(outpoint, _)| utxos.contains(&outpoint)) {
            return Err(invalid_block(
                height,
                format!("transaction {txid} already has unspent outputs"),
            ));
        }
    }
    Ok(())
}

fn invalid_block(height: u64, reason: impl Into<String>) -> LedgerError {
    LedgerError::InvalidBlock {
        height,
        reason: reason.into(),
    }
}

// A transfer must spend only unspent outputs, each at most once across the
// batch, with proofs the verifier accepts, and move exactly the value it spends
fn check_transfer(
    tx: &Transaction,
    height: u64,
    utxos: &UtxoSet,
    spent_in_batch: &mut HashSet<OutPoint>,
    verifier: &dyn ClaimVerifier,
) -> Result<()> {
    let digest = tx.signing_digest();
    let mut input_value = 0u64;

    for input in tx.inputs() {
        let outpoint = input.outpoint();
        let spent = match utxos.get(&outpoint) {
            Some(output) if !spent_in_batch.contains(&outpoint) => output,
            _ => {
                return Err(LedgerError::DoubleSpend {
                    height,
                    outpoint: outpoint.to_string(),
                })
            }
        };
        spent_in_batch.insert(outpoint);
        if !verifier.verify(input.unlock_proof(), spent.claim(), &digest) {
            return Err(LedgerError::ClaimMismatch {
                height,
                outpoint: outpoint.to_string(),
            });
        }
        input_value = input_value
            .checked_add(spent.value())
            .ok_or_else(|| LedgerError::InvalidInput("Input value overflow".to_string()))?;
    }

    let output_value = tx.output_value()?;
    if output_value > input_value {
        return Err(LedgerError::InsufficientFunds {
            required: output_value,
            available: input_value,
        });
    }
    if output_value < input_value {
        return Err(LedgerError::InvalidInput(format!(
            "transaction {} spends {input_value} but only assigns {output_value}",
            tx.hash()
        )));
    }
    Ok(())
}
