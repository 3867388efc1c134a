// Entry point for the ledger CLI. Every command opens the sled block store,
// replays it into a validated chain, and persists whatever block it mines.

use clap::Parser;
use log::{error, info, LevelFilter};
use serde_json::json;
use std::process;
use std::sync::Arc;
use utxo_ledger::storage::open_chain;
use utxo_ledger::{
    Block, BlockStore, Chain, Command, LedgerConfig, LedgerError, Opt, OwnerClaimVerifier,
    SledBlockStore,
};

fn main() {
    // Info by default, RUST_LOG still wins
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(opt: &Opt) -> Result<LedgerConfig, LedgerError> {
    let config = match &opt.config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    let mut config = config.apply_env_overrides()?;
    if let Some(data_dir) = &opt.data_dir {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}

fn load_chain(store: &SledBlockStore, config: &LedgerConfig) -> Result<Chain, LedgerError> {
    if store.is_empty() {
        return Err(LedgerError::InvalidInput(
            "No existing chain found. Create one first.".to_string(),
        ));
    }
    open_chain(store, config, Arc::new(OwnerClaimVerifier))
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&opt)?;
    let store = SledBlockStore::open(&config.data_dir)?;

    match opt.command {
        Command::Createchain { address } => {
            if !store.is_empty() {
                return Err("A chain already exists in this data directory".into());
            }
            let chain = Chain::new(&address, &config)?;
            store.save_block(&chain.blocks()[0])?;
            println!("Done! Genesis block: {}", chain.tip_hash());
        }
        Command::Send {
            from,
            to,
            amount,
            miner,
        } => {
            let mut chain = load_chain(&store, &config)?;
            let tx = chain.build_transaction(&from, &to, amount)?;
            let block = chain.append_block(vec![tx], &miner)?;
            store.save_block(&block)?;
            println!("Success! Block {} at height {}", block.hash(), block.height());
        }
        Command::Mine { miner } => {
            let mut chain = load_chain(&store, &config)?;
            let block = chain.append_block(Vec::new(), &miner)?;
            store.save_block(&block)?;
            println!("Mined block {} at height {}", block.hash(), block.height());
        }
        Command::GetBalance { address } => {
            let chain = load_chain(&store, &config)?;
            println!("Balance of '{address}': {}", chain.balance_of(&address));
        }
        Command::Printchain => {
            let chain = load_chain(&store, &config)?;
            let blocks: Vec<_> = chain.blocks().iter().map(block_summary).collect();
            println!("{}", serde_json::to_string_pretty(&blocks)?);
        }
        Command::Validatechain => {
            let chain = load_chain(&store, &config)?;
            chain.validate_chain()?;
            chain.verify_utxo_index()?;
            info!("Chain of {} blocks is valid", chain.blocks().len());
            println!("Valid. Height {}, tip {}", chain.height(), chain.tip_hash());
        }
    }

    store.flush()?;
    Ok(())
}

fn block_summary(block: &Block) -> serde_json::Value {
    let header = block.header();
    let transactions: Vec<_> = block
        .transactions()
        .iter()
        .map(|tx| {
            let inputs: Vec<_> = if tx.is_coinbase() {
                Vec::new()
            } else {
                tx.inputs()
                    .iter()
                    .map(|input| input.outpoint().to_string())
                    .collect()
            };
            let outputs: Vec<_> = tx
                .outputs()
                .iter()
                .map(|output| json!({ "value": output.value(), "claim": output.claim() }))
                .collect();
            json!({
                "txid": tx.hash().to_hex(),
                "coinbase": tx.is_coinbase(),
                "inputs": inputs,
                "outputs": outputs,
            })
        })
        .collect();

    json!({
        "height": header.height(),
        "hash": block.hash().to_hex(),
        "previous_hash": header.previous_hash().to_hex(),
        "merkle_root": header.merkle_root().to_hex(),
        "timestamp": header.timestamp(),
        "difficulty": header.difficulty(),
        "nonce": header.nonce(),
        "transactions": transactions,
    })
}
