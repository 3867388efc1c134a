use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "utxo-ledger")]
pub struct Opt {
    #[arg(long = "config", global = true, help = "Path to a TOML ledger config")]
    pub config: Option<PathBuf>,
    #[arg(
        long = "data-dir",
        global = true,
        help = "Directory holding the block database"
    )]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createchain", about = "Create a new chain")]
    Createchain {
        #[arg(help = "The claim to send the genesis reward to")]
        address: String,
    },
    #[command(name = "send", about = "Transfer value and mine it into a block")]
    Send {
        #[arg(help = "Spending claim")]
        from: String,
        #[arg(help = "Receiving claim")]
        to: String,
        #[arg(help = "Amount to send, in base units")]
        amount: u64,
        #[arg(help = "Claim that receives the block reward")]
        miner: String,
    },
    #[command(name = "mine", about = "Mine a block holding only the coinbase")]
    Mine {
        #[arg(help = "Claim that receives the block reward")]
        miner: String,
    },
    #[command(name = "getbalance", about = "Get the unspent balance of a claim")]
    GetBalance {
        #[arg(help = "The claim")]
        address: String,
    },
    #[command(name = "printchain", about = "Print all blocks as JSON")]
    Printchain,
    #[command(name = "validatechain", about = "Replay and validate every block")]
    Validatechain,
}
