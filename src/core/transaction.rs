// This file implements the transaction model: inputs consume earlier outputs and
// outputs create new spendable value. I follow the UTXO model, so an output is only
// ever identified by (transaction hash, output index).

use crate::core::Hash256;
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// The synthetic input of a coinbase transaction points at this "output"
pub const COINBASE_SOURCE_INDEX: u32 = u32::MAX;

/// Reference to one output of one transaction
#[derive(
    Debug,
    Clone,
    Copy,
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
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u32) -> OutPoint {
        OutPoint { txid, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

// A transaction input - "I want to spend output #2 from transaction ABC123"
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TransactionInput {
    source_txid: Hash256,  // The transaction holding the output I want to spend
    source_index: u32,     // Which output of that transaction
    unlock_proof: Vec<u8>, // Whatever the claim verifier needs to accept the spend
}

impl TransactionInput {
    pub fn new(source_txid: Hash256, source_index: u32, unlock_proof: Vec<u8>) -> TransactionInput {
        TransactionInput {
            source_txid,
            source_index,
            unlock_proof,
        }
    }

    pub fn spending(outpoint: OutPoint, unlock_proof: Vec<u8>) -> TransactionInput {
        Self::new(outpoint.txid, outpoint.index, unlock_proof)
    }

    fn coinbase_marker(tag: Vec<u8>) -> TransactionInput {
        TransactionInput {
            source_txid: Hash256::zero(),
            source_index: COINBASE_SOURCE_INDEX,
            unlock_proof: tag,
        }
    }

    pub fn source_txid(&self) -> &Hash256 {
        &self.source_txid
    }

    pub fn source_index(&self) -> u32 {
        self.source_index
    }

    pub fn unlock_proof(&self) -> &[u8] {
        self.unlock_proof.as_slice()
    }

    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.source_txid, self.source_index)
    }

    pub fn is_coinbase_marker(&self) -> bool {
        self.source_txid.is_zero() && self.source_index == COINBASE_SOURCE_INDEX
    }
}

// A transaction output - "pay 20 units to whoever satisfies claim B"
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct TransactionOutput {
    value: u64,    // Integral base units, never floating point
    claim: String, // Opaque claim condition (stand-in for a locking script/address)
}

impl TransactionOutput {
    pub fn new(value: u64, claim: impl Into<String>) -> TransactionOutput {
        TransactionOutput {
            value,
            claim: claim.into(),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn claim(&self) -> &str {
        self.claim.as_str()
    }

    pub fn is_claimed_by(&self, claim: &str) -> bool {
        self.claim == claim
    }
}

/// A transfer of value, or the reward-minting coinbase
///
/// The id is computed once, at construction, over the canonical encoding of
/// inputs and outputs. There are no mutators; a transaction whose stored id no
/// longer matches [`Transaction::compute_hash`] was altered after hashing and
/// is rejected by the chain.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Hash256,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
}

impl Transaction {
    /// Reward transaction tagged with random bytes so repeated rewards to the
    /// same claim still get distinct ids
    pub fn new_coinbase(reward: u64, claim: &str) -> Transaction {
        Self::coinbase_with_tag(reward, claim, Uuid::new_v4().as_bytes().to_vec())
    }

    /// Reward transaction tagged with the block height it is minted in
    pub fn new_coinbase_at_height(height: u64, reward: u64, claim: &str) -> Transaction {
        Self::coinbase_with_tag(reward, claim, height.to_be_bytes().to_vec())
    }

    fn coinbase_with_tag(reward: u64, claim: &str, tag: Vec<u8>) -> Transaction {
        Self::from_parts(
            vec![TransactionInput::coinbase_marker(tag)],
            vec![TransactionOutput::new(reward, claim)],
        )
    }

    /// Build a transfer. Spendability is checked by the chain, not here.
    pub fn new_transfer(
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
    ) -> Result<Transaction> {
        if inputs.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Transfer must spend at least one input".to_string(),
            ));
        }
        if outputs.is_empty() {
            return Err(LedgerError::InvalidInput(
                "Transfer must create at least one output".to_string(),
            ));
        }
        if inputs.iter().any(TransactionInput::is_coinbase_marker) {
            return Err(LedgerError::InvalidInput(
                "Transfer inputs cannot use the coinbase marker".to_string(),
            ));
        }

        let tx = Self::from_parts(inputs, outputs);
        tx.output_value()?;
        Ok(tx)
    }

    fn from_parts(inputs: Vec<TransactionInput>, outputs: Vec<TransactionOutput>) -> Transaction {
        let mut tx = Transaction {
            id: Hash256::zero(),
            inputs,
            outputs,
        };
        tx.id = tx.compute_hash();
        tx
    }

    /// Fixed-order, fixed-width encoding of inputs and outputs. The cached id
    /// is never part of it.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        Self::encode(&self.inputs, &self.outputs, true)
    }

    fn encode(
        inputs: &[TransactionInput],
        outputs: &[TransactionOutput],
        with_proofs: bool,
    ) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend((inputs.len() as u32).to_be_bytes());
        for input in inputs {
            bytes.extend(input.source_txid.as_bytes());
            bytes.extend(input.source_index.to_be_bytes());
            if with_proofs {
                bytes.extend((input.unlock_proof.len() as u32).to_be_bytes());
                bytes.extend(&input.unlock_proof);
            } else {
                bytes.extend(0u32.to_be_bytes());
            }
        }
        bytes.extend((outputs.len() as u32).to_be_bytes());
        for output in outputs {
            bytes.extend(output.value.to_be_bytes());
            bytes.extend((output.claim.len() as u32).to_be_bytes());
            bytes.extend(output.claim.as_bytes());
        }
        bytes
    }

    /// Recompute the content hash from scratch
    pub fn compute_hash(&self) -> Hash256 {
        Hash256::digest(&self.canonical_bytes())
    }

    /// The id fixed at construction
    pub fn hash(&self) -> Hash256 {
        self.id
    }

    pub fn has_consistent_hash(&self) -> bool {
        self.id == self.compute_hash()
    }

    /// Digest handed to the claim verifier: the transaction with every unlock
    /// proof emptied, so a proof never has to cover itself
    pub fn signing_digest(&self) -> Hash256 {
        Hash256::digest(&Self::encode(&self.inputs, &self.outputs, false))
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase_marker()
    }

    pub fn inputs(&self) -> &[TransactionInput] {
        self.inputs.as_slice()
    }

    pub fn outputs(&self) -> &[TransactionOutput] {
        self.outputs.as_slice()
    }

    /// Outpoints created by this transaction, paired with their outputs
    pub fn created_outputs(&self) -> impl Iterator<Item = (OutPoint, &TransactionOutput)> + '_ {
        let txid = self.id;
        self.outputs
            .iter()
            .enumerate()
            .map(move |(idx, out)| (OutPoint::new(txid, idx as u32), out))
    }

    pub fn output_value(&self) -> Result<u64> {
        let mut total = 0u64;
        for output in &self.outputs {
            total = total
                .checked_add(output.value)
                .ok_or_else(|| LedgerError::InvalidInput("Output value overflow".to_string()))?;
        }
        Ok(total)
    }
}
