use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, info, warn};

use blockchain::{ImportStats, Ledger};
use consensus::ChainParams;
use state::{State, StateSnapshots};
use transaction::TransferExecutor;
use types::config::EnvironmentConfig;
use types::events::LocalEventMessage;
use types::Address;

use crate::environment::{load_genesis, log_level, open_storage, setup_environment};
use crate::source::JsonLinesSource;
use crate::Args;

type NodeLedger = Ledger<State, TransferExecutor>;

pub(crate) fn run(args: &Args) -> Result<()> {
    let env = setup_environment(args)?;
    tracing_subscriber::fmt().with_max_level(log_level(&env)).init();
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { start_node(args, env).await })
}

async fn start_node(args: &Args, env: EnvironmentConfig) -> Result<()> {
    let params = ChainParams::for_network(env.network);
    let storage = open_storage(args, &env)?;
    let genesis = load_genesis(&env, &params)?;
    info!(network = %env.network, chain_id = env.network.chain_id(), "starting node");

    let (local_sender, mut local_receiver) = unbounded_channel();
    let state = Arc::new(State::new(storage.kv::<StateSnapshots>()));
    let ledger = Arc::new(NodeLedger::new(
        params,
        env.ledger_config(),
        state,
        Arc::new(TransferExecutor),
        &storage,
        &genesis,
        Some(local_sender),
    )?);

    let listener = tokio::spawn(async move {
        while let Some(event) = local_receiver.recv().await {
            handle_event(event);
        }
    });

    let maintenance = args.recompute_totals_from.map(|from| {
        let ledger = ledger.clone();
        tokio::task::spawn_blocking(move || ledger.update_block_total_reward_points(from))
    });

    if let Some(path) = env.blocks_file.clone() {
        let ledger = ledger.clone();
        let stats = tokio::task::spawn_blocking(move || -> Result<ImportStats> {
            let mut source = JsonLinesSource::open(&path)?;
            ledger.import_from(&mut source)
        })
        .await??;
        info!(
            imported_best = stats.imported_best,
            imported_not_best = stats.imported_not_best,
            exist = stats.exist,
            no_parent = stats.no_parent,
            invalid = stats.invalid,
            "block import finished"
        );
    }

    if args.mine > 0 {
        let coinbase = env
            .coinbase
            .ok_or_else(|| anyhow!("mining requires a coinbase address"))?;
        mine(&ledger, coinbase, args.mine).await?;
    }

    if let Some(task) = maintenance {
        let changed = task.await??;
        info!(changed, "reward point maintenance finished");
    }

    let best = ledger.best_block()?;
    info!(
        level = best.number(),
        header = ?best.hash(),
        total_reward_point = %ledger.total_reward_point()?,
        "best block"
    );

    // the listener drains once the last sender is gone
    drop(ledger);
    listener.await?;
    Ok(())
}

async fn mine(ledger: &NodeLedger, coinbase: Address, count: u64) -> Result<()> {
    for _ in 0..count {
        let parent = ledger.best_block()?;
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let timestamp = ledger.next_timestamp(&parent, now);
        if timestamp > now {
            tokio::time::sleep(Duration::from_secs(timestamp - now)).await;
        }
        let block = ledger.create_new_block(&parent, vec![], timestamp, coinbase)?;
        let result = ledger.try_to_connect(&block)?;
        if result.is_successful() {
            info!(level = block.number(), header = ?block.hash(), result = ?result, "mined block");
        } else {
            warn!(level = block.number(), result = ?result, "mined block was not accepted");
        }
    }
    Ok(())
}

fn handle_event(event: LocalEventMessage) {
    match event {
        LocalEventMessage::BlockImported {
            block,
            rewards,
            receipts,
            best,
        } => {
            debug!(
                level = block.number(),
                header = ?block.hash(),
                best,
                credited = rewards.len(),
                receipts = receipts.len(),
                "block imported"
            );
        }
        LocalEventMessage::ChainReorganized { old_head, new_head } => {
            info!(old_head = ?old_head, new_head = ?new_head, "chain reorganized");
        }
    }
}
