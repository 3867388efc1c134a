use crate::core::{ProofOfWork, MAX_DIFFICULTY};
use crate::error::{LedgerError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";
const BLOCK_REWARD_KEY: &str = "LEDGER_BLOCK_REWARD";
const MAX_MINING_ATTEMPTS_KEY: &str = "LEDGER_MAX_MINING_ATTEMPTS";
const DATA_DIR_KEY: &str = "LEDGER_DATA_DIR";

const DEFAULT_DIFFICULTY: u32 = 16;
const DEFAULT_BLOCK_REWARD: u64 = 50;
const DEFAULT_DATA_DIR: &str = "./data";

/// Ledger parameters, passed explicitly to every chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Required leading zero bits of every block hash
    pub difficulty: u32,
    /// Value minted by each coinbase
    pub block_reward: u64,
    /// Nonce budget per block; unbounded when unset
    pub max_mining_attempts: Option<u64>,
    pub data_dir: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            difficulty: DEFAULT_DIFFICULTY,
            block_reward: DEFAULT_BLOCK_REWARD,
            max_mining_attempts: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl LedgerConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(contents: &str) -> Result<LedgerConfig> {
        let config: LedgerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<LedgerConfig> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        debug!("Loaded ledger config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    /// Overlay `LEDGER_*` environment variables
    pub fn apply_env_overrides(self) -> Result<LedgerConfig> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<LedgerConfig> {
        if let Some(value) = lookup(DIFFICULTY_KEY) {
            self.difficulty = parse_var(DIFFICULTY_KEY, &value)?;
        }
        if let Some(value) = lookup(BLOCK_REWARD_KEY) {
            self.block_reward = parse_var(BLOCK_REWARD_KEY, &value)?;
        }
        if let Some(value) = lookup(MAX_MINING_ATTEMPTS_KEY) {
            self.max_mining_attempts = Some(parse_var(MAX_MINING_ATTEMPTS_KEY, &value)?);
        }
        if let Some(value) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(value);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Config(format!(
                "difficulty {} exceeds {MAX_DIFFICULTY} bits",
                self.difficulty
            )));
        }
        if self.block_reward == 0 {
            return Err(LedgerError::Config(
                "block_reward must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Mining engine honoring `max_mining_attempts`
    pub fn proof_of_work(&self) -> ProofOfWork {
        match self.max_mining_attempts {
            Some(max_attempts) => ProofOfWork::new().with_max_attempts(max_attempts),
            None => ProofOfWork::new(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LedgerError::Config(format!("Invalid value {value:?} for {key}: {e}")))
}
