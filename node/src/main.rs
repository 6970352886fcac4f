use std::path::PathBuf;

use clap::{ArgEnum, Parser};
use tracing::Level;

use types::network::Network;
use types::Address;

mod environment;
mod node;
mod source;

#[derive(ArgEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Reward point chain node: imports, validates and extends a block chain.
#[derive(Parser, Debug, Default)]
#[clap(author, version, about, long_about = None)]
pub(crate) struct Args {
    /// JSON environment file, read before the other flags are applied
    #[clap(long)]
    pub config: Option<PathBuf>,
    #[clap(long)]
    pub network: Option<Network>,
    #[clap(long)]
    pub datadir: Option<PathBuf>,
    /// Keep every column in memory instead of opening RocksDB
    #[clap(long)]
    pub in_memory: bool,
    #[clap(long)]
    pub genesis: Option<PathBuf>,
    /// Blocks to import, one JSON encoded block per line
    #[clap(long)]
    pub blocks: Option<PathBuf>,
    #[clap(long)]
    pub miner: Option<Address>,
    /// Number of empty blocks to mine on top of the best block
    #[clap(long, default_value = "0")]
    pub mine: u64,
    /// Recompute stored cumulative reward points from this height
    #[clap(long)]
    pub recompute_totals_from: Option<u64>,
    #[clap(long)]
    pub exit_on_block_conflict: bool,
    #[clap(long, arg_enum)]
    pub log_level: Option<LogLevel>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    node::run(&args)
}
