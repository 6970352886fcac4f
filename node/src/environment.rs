use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use tracing::{info, warn, Level};

use consensus::ChainParams;
use state::StateSnapshots;
use storage::{PersistentStorage, Schema};
use types::config::EnvironmentConfig;
use types::genesis::Genesis;

use crate::Args;

/// Base directory for node data, one sub directory per network.
pub(crate) fn default_base_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "rewardchain", "rewardchain")
        .ok_or_else(|| anyhow!("no home directory to place node data in"))?;
    Ok(dirs.data_dir().to_path_buf())
}

pub(crate) fn setup_environment(args: &Args) -> Result<EnvironmentConfig> {
    let mut config = EnvironmentConfig::default();

    let base_dir = match &args.datadir {
        Some(datadir) => datadir.clone(),
        None => default_base_dir()?,
    };

    if let Some(config_file_path) = &args.config {
        let config_file = OpenOptions::new().read(true).open(config_file_path)?;
        config = serde_json::from_reader(config_file)?;
    } else {
        let res: Result<EnvironmentConfig> = OpenOptions::new()
            .read(true)
            .open(base_dir.join("config.json"))
            .map_err(|e| anyhow!("{}", e))
            .and_then(|config_file| serde_json::from_reader(config_file).map_err(|e| anyhow!("{}", e)));
        match res {
            Ok(c) => config = c,
            Err(error) => {
                warn!(error = %error, "failed to read config file, reverting to application default");
            }
        }
    }

    if let Some(network) = args.network {
        config.network = network;
    }
    if let Some(datadir) = &args.datadir {
        config.data_dir = Some(datadir.display().to_string());
    }
    if let Some(genesis) = &args.genesis {
        config.genesis_file = Some(genesis.display().to_string());
    }
    if let Some(blocks) = &args.blocks {
        config.blocks_file = Some(blocks.display().to_string());
    }
    if let Some(miner) = args.miner {
        config.coinbase = Some(miner);
    }
    if args.exit_on_block_conflict {
        config.exit_on_block_conflict = true;
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_lowercase());
    }
    Ok(config)
}

pub(crate) fn log_level(config: &EnvironmentConfig) -> Level {
    config
        .log_level
        .as_deref()
        .and_then(|level| Level::from_str(level).ok())
        .unwrap_or(Level::INFO)
}

/// Directory holding the database of the configured network.
pub(crate) fn datadir(config: &EnvironmentConfig) -> Result<PathBuf> {
    let base = match &config.data_dir {
        Some(dir) => PathBuf::from(dir),
        None => default_base_dir()?,
    };
    Ok(base.join(config.network.to_string()))
}

pub(crate) fn open_storage(args: &Args, config: &EnvironmentConfig) -> Result<PersistentStorage> {
    if args.in_memory {
        let mut columns = blockchain::column_family_names();
        columns.push(StateSnapshots::column());
        return Ok(PersistentStorage::in_memory(columns));
    }
    let path = datadir(config)?.join("main");
    std::fs::create_dir_all(&path)?;
    let mut columns = blockchain::column_families();
    columns.push(StateSnapshots::descriptor());
    info!(path = %path.display(), "opening database");
    PersistentStorage::open_rocksdb(path, columns)
}

/// Genesis from the configured file, or an empty allocation.
pub(crate) fn load_genesis(config: &EnvironmentConfig, params: &ChainParams) -> Result<Genesis> {
    match &config.genesis_file {
        Some(path) => Genesis::from_file(path),
        None => Ok(Genesis {
            gas_limit: params.block_gas_limit,
            ..Default::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempdir::TempDir;

    use types::network::Network;

    use super::*;
    use crate::LogLevel;

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new("environment").unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(br#"{"network": "testnet", "blocks_file": "/tmp/blocks.jsonl"}"#)
            .unwrap();

        let args = Args {
            config: Some(path),
            network: Some(Network::Unitest),
            exit_on_block_conflict: true,
            log_level: Some(LogLevel::Debug),
            ..Default::default()
        };
        let config = setup_environment(&args).unwrap();
        assert_eq!(config.network, Network::Unitest);
        assert_eq!(config.blocks_file.as_deref(), Some("/tmp/blocks.jsonl"));
        assert!(config.ledger_config().exit_on_block_conflict);
        assert_eq!(log_level(&config), Level::DEBUG);
    }

    #[test]
    fn test_datadir_per_network() {
        let config = EnvironmentConfig {
            network: Network::Mainnet,
            data_dir: Some("/data".to_string()),
            ..Default::default()
        };
        assert_eq!(datadir(&config).unwrap(), PathBuf::from("/data/mainnet"));
    }
}
