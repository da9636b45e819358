//! Block store simulator
//!
//! Registers synthetic DataNodes, runs concurrent allocation workers against
//! the registry and reports per-class block counters via the IOCtl handler.

use anyhow::{bail, Context};
use clap::Parser;
use namenode_blockstore::{
    BlockInfo, BlockStore, BlockStoreConfig, BlockStoreError, CancellationToken, DataNodeInfo,
    IoctlCommand, IoctlReply, SelectionPolicy,
};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "blockstore-sim")]
#[command(about = "Drive the DataNode block registry with synthetic load")]
struct Args {
    /// TOML config file (defaults apply when omitted)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Override the number of storage classes
    #[arg(long)]
    storage_classes: Option<usize>,

    /// Override the block selection policy (roundrobin, random)
    #[arg(long)]
    block_selection: Option<String>,

    /// DataNodes registered per storage class
    #[arg(short = 'd', long, default_value = "4")]
    datanodes: u32,

    /// Free blocks contributed by each DataNode
    #[arg(short = 'b', long, default_value = "256")]
    blocks_per_datanode: u64,

    /// Concurrent allocation workers
    #[arg(short = 'w', long, default_value = "4")]
    workers: usize,

    /// Allocations attempted by each worker
    #[arg(short = 'n', long, default_value = "200")]
    allocations: usize,

    /// Storage class requested by the workers
    #[arg(long, default_value = "1")]
    storage_class: u32,

    /// Per-allocation deadline in milliseconds
    #[arg(long, default_value = "100")]
    timeout_ms: u64,
}

fn load_config(args: &Args) -> anyhow::Result<BlockStoreConfig> {
    let mut config = match &args.config {
        Some(path) => BlockStoreConfig::load(path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => BlockStoreConfig::default(),
    };
    if let Some(classes) = args.storage_classes {
        config.storage_classes = classes;
    }
    if let Some(policy) = &args.block_selection {
        config.block_selection = policy
            .parse::<SelectionPolicy>()
            .map_err(anyhow::Error::msg)?;
    }
    config.validate()?;
    Ok(config)
}

fn populate(store: &BlockStore, args: &Args) -> anyhow::Result<()> {
    for class in 0..store.storage_classes() as u32 {
        for n in 0..args.datanodes {
            let ip = Ipv4Addr::new(10, class as u8, (n >> 8) as u8, n as u8);
            let dn = DataNodeInfo::new(ip, 50020, class, 0, n % 2);
            for i in 0..args.blocks_per_datanode {
                let block = BlockInfo::new(dn, i * (1 << 20), 1 << 20, n);
                store.add_block(Arc::new(block))?;
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    if args.workers == 0 {
        bail!("at least one worker is required");
    }

    let config = load_config(&args)?;
    let store = Arc::new(BlockStore::new(&config)?);
    populate(&store, &args)?;
    info!(
        "Registered {} DataNodes in each of {} storage classes",
        args.datanodes,
        store.storage_classes()
    );

    let started = Instant::now();
    let handles: Vec<_> = (0..args.workers)
        .map(|worker| {
            let store = Arc::clone(&store);
            let allocations = args.allocations;
            let storage_class = args.storage_class;
            let timeout = Duration::from_millis(args.timeout_ms);
            std::thread::spawn(move || {
                let mut granted = 0usize;
                for _ in 0..allocations {
                    let token = CancellationToken::with_timeout(timeout);
                    match store.get_block(storage_class, (worker % 2) as u32, &token) {
                        Ok(_) => granted += 1,
                        Err(BlockStoreError::Cancelled) => break,
                        Err(e) => {
                            warn!("worker {} allocation failed: {}", worker, e);
                            break;
                        }
                    }
                }
                granted
            })
        })
        .collect();

    let mut granted = 0usize;
    for handle in handles {
        granted += handle
            .join()
            .map_err(|_| anyhow::anyhow!("allocation worker panicked"))?;
    }
    info!(
        "Granted {} blocks to {} workers in {:?}",
        granted,
        args.workers,
        started.elapsed()
    );

    for class in 0..store.storage_classes() as u32 {
        let response = store.ioctl(&IoctlCommand::GetClassStat {
            storage_class: class,
        });
        if let IoctlReply::ClassStat(stat) = response.reply {
            println!(
                "class {}: {} blocks, {} consumed",
                class, stat.all_blocks, stat.consumed_blocks
            );
        }
    }

    store.validate()?;
    Ok(())
}
