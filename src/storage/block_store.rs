// Block persistence. The chain itself never touches disk; whoever owns a store
// saves each admitted block and replays the stored sequence on startup.

use crate::core::Block;
use crate::error::{LedgerError, Result};
use log::{debug, info};
use sled::{Db, Tree};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

// One tree holds every block, keyed by big-endian height so iteration is in chain order
const BLOCKS_TREE: &str = "blocks";

pub trait BlockStore {
    fn save_block(&self, block: &Block) -> Result<()>;

    /// Every stored block, ordered by height
    fn load_chain(&self) -> Result<Vec<Block>>;
}

/// Volatile store for tests and throwaway chains
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<Vec<Block>>,
}

impl MemoryBlockStore {
    pub fn new() -> MemoryBlockStore {
        MemoryBlockStore::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self
            .blocks
            .read()
            .map_err(|e| LedgerError::Concurrency(format!("Block store lock poisoned: {e}")))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl BlockStore for MemoryBlockStore {
    fn save_block(&self, block: &Block) -> Result<()> {
        let mut blocks = self
            .blocks
            .write()
            .map_err(|e| LedgerError::Concurrency(format!("Block store lock poisoned: {e}")))?;
        let expected = blocks.len() as u64;
        if block.height() != expected {
            return Err(LedgerError::Database(format!(
                "Cannot store block at height {} when the next height is {expected}",
                block.height()
            )));
        }
        blocks.push(block.clone());
        Ok(())
    }

    fn load_chain(&self) -> Result<Vec<Block>> {
        Ok(self
            .blocks
            .read()
            .map_err(|e| LedgerError::Concurrency(format!("Block store lock poisoned: {e}")))?
            .clone())
    }
}

/// Sled-backed store
pub struct SledBlockStore {
    db: Db,
    blocks_tree: Tree,
    db_path: PathBuf,
}

impl SledBlockStore {
    pub fn open(path: impl AsRef<Path>) -> Result<SledBlockStore> {
        let db_path = path.as_ref().to_path_buf();
        let db = sled::open(&db_path)
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {e}")))?;
        let blocks_tree = db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open blocks tree: {e}")))?;
        info!("Opened block store at {}", db_path.display());

        Ok(SledBlockStore {
            db,
            blocks_tree,
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_empty(&self) -> bool {
        self.blocks_tree.is_empty()
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // One past the highest stored key
    fn next_height(&self) -> Result<u64> {
        match self.blocks_tree.last()? {
            None => Ok(0),
            Some((key, _)) => {
                let bytes: [u8; 8] = key.as_ref().try_into().map_err(|_| {
                    LedgerError::Database(format!("Malformed block key of {} bytes", key.len()))
                })?;
                Ok(u64::from_be_bytes(bytes) + 1)
            }
        }
    }
}

impl BlockStore for SledBlockStore {
    fn save_block(&self, block: &Block) -> Result<()> {
        let expected = self.next_height()?;
        if block.height() != expected {
            return Err(LedgerError::Database(format!(
                "Cannot store block at height {} when the next height is {expected}",
                block.height()
            )));
        }
        let key = block.height().to_be_bytes();
        let block_data = block.serialize()?;
        self.blocks_tree.insert(key, block_data)?;
        self.blocks_tree.flush()?;
        debug!("Stored block {} at height {}", block.hash(), block.height());
        Ok(())
    }

    fn load_chain(&self) -> Result<Vec<Block>> {
        let mut blocks = Vec::with_capacity(self.blocks_tree.len());
        for entry in self.blocks_tree.iter() {
            let (key, value) = entry?;
            let block = Block::deserialize(value.as_ref())?;
            if key.as_ref() != block.height().to_be_bytes().as_slice() {
                return Err(LedgerError::Database(format!(
                    "Block stored under the wrong key at height {}",
                    block.height()
                )));
            }
            blocks.push(block);
        }
        Ok(blocks)
    }
}
