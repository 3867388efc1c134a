//! Configuration management
//!
//! Ledger parameters loaded from TOML with `LEDGER_*` environment overrides.
//! There is no global instance; a config is handed to each chain explicitly.

pub mod settings;

pub use settings::LedgerConfig;
