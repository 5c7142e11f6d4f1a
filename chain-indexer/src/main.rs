//! `chain-indexer` CLI (spec.md §6): `ingest [--fast]`, `cache`, `size`,
//! `duplicates`, `wipe [--all] [--chain=N] [--pchain]`.

use std::process::ExitCode;
use std::sync::Arc;

use chain_cache::FsCache;
use chain_indexer::config::{ChainConfig, Settings};
use chain_indexer::error::Result;
use chain_indexer::fetcher::{EvmFetcher, PChainFetcher};
use chain_indexer::indexer::IndexerRunner;
use chain_indexer::ports::{Fetcher, SystemClock};
use chain_indexer::store::ClickHouseStore;
use chain_indexer::syncer::ChainSyncer;
use chain_indexer::types::primitives::Vm;
use chain_indexer::validator::ValidatorSyncer;
use clap::{Parser, Subcommand};
use rpc_client::{RpcClient, RpcClientConfig};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// `chain-indexer`: continuous blockchain ingestion and derivation pipeline.
#[derive(Parser, Debug)]
#[command(name = "chain-indexer", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, default_value = "config/chains.toml")]
    config: std::path::PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run continuous sync for every configured chain.
    Ingest {
        /// Disable the indexer runner, running only the raw-data chain syncers.
        #[arg(long)]
        fast: bool,
    },
    /// Fill the on-disk block cache without writing to the store.
    Cache,
    /// Report row counts for every raw/derived table.
    Size,
    /// Report sort-key collisions in raw tables.
    Duplicates,
    /// Delete stored data.
    Wipe {
        /// Wipe every table this store manages.
        #[arg(long)]
        all: bool,
        /// Wipe one chain's raw tables, watermarks, and derived rows.
        #[arg(long)]
        chain: Option<u32>,
        /// Wipe P-chain validator/subnet derivation state.
        #[arg(long)]
        pchain: bool,
    },
}

fn init_tracing(settings: &chain_indexer::config::LoggingSettings) {
    let filter = tracing_subscriber::EnvFilter::try_new(&settings.level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Installs a `CancellationToken` that fires on SIGINT/SIGTERM, per spec.md
/// §6's "exit code ... 1 on ... received termination signal".
fn spawn_shutdown_listener() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        let ctrl_c = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        #[cfg(unix)]
        let terminate = async {
            let Ok(mut sigterm) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
                return;
            };
            sigterm.recv().await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("received SIGINT, shutting down"),
            () = terminate => info!("received SIGTERM, shutting down"),
        }
        signal_token.cancel();
    });
    token
}

fn rpc_client_for(chain: &ChainConfig) -> Result<RpcClient> {
    let config = RpcClientConfig::default()
        .with_rpc_batch_size(chain.fetch_batch_size as usize)
        .with_debug_batch_size(chain.debug_batch_size)
        .with_max_concurrency(chain.max_concurrency);
    RpcClient::with_config(chain.rpc_url.clone(), config).map_err(Into::into)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load(&cli.config) {
        Ok(s) => s,
        Err(err) => {
            eprintln!("failed to load configuration from {}: {err}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&settings.logging);

    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!("configuration error: {e}");
        }
        return ExitCode::FAILURE;
    }

    info!(version = chain_indexer::VERSION, chains = settings.chains.len(), "starting chain-indexer");

    let store = Arc::new(ClickHouseStore::new(&settings.store));
    let shutdown = spawn_shutdown_listener();

    let result = match cli.command {
        Command::Ingest { fast } => run_ingest(&settings, store, &shutdown, fast).await,
        Command::Cache => run_cache(&settings, &shutdown).await,
        Command::Size => run_size(store.as_ref()).await,
        Command::Duplicates => run_duplicates(store.as_ref()).await,
        Command::Wipe { all, chain, pchain } => run_wipe(store.as_ref(), all, chain, pchain).await,
    };

    match result {
        Ok(()) if shutdown.is_cancelled() => {
            info!("shut down cleanly after termination signal");
            ExitCode::FAILURE
        }
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "fatal error, exiting");
            ExitCode::FAILURE
        }
    }
}

/// `ingest`: spawn one chain syncer (plus, unless `--fast`, one indexer
/// runner and one validator syncer) per configured chain, running until
/// `shutdown` fires.
async fn run_ingest(
    settings: &Settings,
    store: Arc<ClickHouseStore>,
    shutdown: &CancellationToken,
    fast: bool,
) -> Result<()> {
    let mut tasks = tokio::task::JoinSet::new();

    for chain in settings.chains.clone() {
        let store = store.clone();
        let shutdown = shutdown.clone();
        let cache_root = settings.cache.root_dir.join(chain.chain_id.to_string());
        let indexer_settings = settings.indexer.clone();
        let retry = settings.retry.clone();

        match chain.vm {
            Vm::Evm => {
                let client = rpc_client_for(&chain)?;
                let cache = Arc::new(FsCache::new(cache_root));
                let fetcher = Arc::new(EvmFetcher::new(
                    chain.chain_id,
                    client,
                    cache,
                    chain.fetch_batch_size as usize,
                    chain.debug_batch_size,
                ));
                spawn_evm_chain(&mut tasks, chain, fetcher, store, indexer_settings, retry, shutdown, fast);
            }
            Vm::PChain => {
                let client = rpc_client_for(&chain)?;
                let cache = Arc::new(FsCache::new(cache_root));
                let fetcher = Arc::new(PChainFetcher::new(chain.chain_id, client, cache));
                spawn_pchain_chain(&mut tasks, chain, fetcher, store, indexer_settings, retry, shutdown, fast);
            }
        }
    }

    let mut first_fatal = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(%err, "chain task ended with error");
                if first_fatal.is_none() {
                    first_fatal = Some(err);
                }
                shutdown.cancel();
            }
            Err(join_err) => warn!(%join_err, "chain task panicked"),
        }
    }

    first_fatal.map_or(Ok(()), Err)
}

#[allow(clippy::too_many_arguments)]
fn spawn_evm_chain(
    tasks: &mut tokio::task::JoinSet<Result<()>>,
    chain: ChainConfig,
    fetcher: Arc<EvmFetcher<FsCache>>,
    store: Arc<ClickHouseStore>,
    indexer_settings: chain_indexer::config::IndexerSettings,
    retry: chain_indexer::config::RetrySettings,
    shutdown: CancellationToken,
    fast: bool,
) {
    let (on_block_tx, on_block_rx) = watch::channel((0u64, 0i64));
    let syncer = ChainSyncer::new(
        chain.chain_id,
        chain.name.clone(),
        chain.start_block,
        chain.fetch_batch_size,
        fetcher,
        store.clone(),
        retry,
        Some(on_block_tx),
    );
    let syncer_shutdown = shutdown.clone();
    tasks.spawn(async move { syncer.run(&syncer_shutdown).await });

    if fast {
        return;
    }

    let sql_root = indexer_settings.sql_root.clone();
    let chain_id = chain.chain_id;
    let indexer_shutdown = shutdown.clone();
    tasks.spawn(async move {
        let mut runner =
            IndexerRunner::load(chain_id, Vm::Evm, &sql_root, indexer_settings, store, on_block_rx).await?;
        runner.run(&indexer_shutdown).await
    });
}

#[allow(clippy::too_many_arguments)]
fn spawn_pchain_chain(
    tasks: &mut tokio::task::JoinSet<Result<()>>,
    chain: ChainConfig,
    fetcher: Arc<PChainFetcher<FsCache>>,
    store: Arc<ClickHouseStore>,
    indexer_settings: chain_indexer::config::IndexerSettings,
    retry: chain_indexer::config::RetrySettings,
    shutdown: CancellationToken,
    fast: bool,
) {
    let (on_block_tx, on_block_rx) = watch::channel((0u64, 0i64));
    let syncer = ChainSyncer::new(
        chain.chain_id,
        chain.name.clone(),
        chain.start_block,
        chain.fetch_batch_size,
        fetcher.clone(),
        store.clone(),
        retry,
        Some(on_block_tx),
    );
    let syncer_shutdown = shutdown.clone();
    tasks.spawn(async move { syncer.run(&syncer_shutdown).await });

    if let Some(validator_settings) = chain.validator_sync {
        let validator_syncer = ValidatorSyncer::new(
            chain.chain_id,
            fetcher,
            store.clone(),
            Arc::new(SystemClock),
            validator_settings.interval(),
        );
        let validator_shutdown = shutdown.clone();
        tasks.spawn(async move { validator_syncer.run(&validator_shutdown).await });
    }

    if fast {
        return;
    }

    let sql_root = indexer_settings.sql_root.clone();
    let chain_id = chain.chain_id;
    let indexer_shutdown = shutdown.clone();
    tasks.spawn(async move {
        let mut runner =
            IndexerRunner::load(chain_id, Vm::PChain, &sql_root, indexer_settings, store, on_block_rx).await?;
        runner.run(&indexer_shutdown).await
    });
}

/// `cache`: fetch every configured chain up to its latest height, relying on
/// the fetcher's own on-disk cache as the only persistence — the store is
/// never touched (spec.md §6: "fill disk cache without writing to the store").
async fn run_cache(settings: &Settings, shutdown: &CancellationToken) -> Result<()> {
    for chain in &settings.chains {
        if shutdown.is_cancelled() {
            return Ok(());
        }
        let cache_root = settings.cache.root_dir.join(chain.chain_id.to_string());
        let client = rpc_client_for(chain)?;
        let cache = Arc::new(FsCache::new(cache_root));

        let latest = match chain.vm {
            Vm::Evm => {
                let fetcher = EvmFetcher::new(
                    chain.chain_id,
                    client,
                    cache,
                    chain.fetch_batch_size as usize,
                    chain.debug_batch_size,
                );
                warm_cache(&fetcher, chain, shutdown).await?
            }
            Vm::PChain => {
                let fetcher = PChainFetcher::new(chain.chain_id, client, cache);
                warm_cache(&fetcher, chain, shutdown).await?
            }
        };
        info!(chain_id = chain.chain_id, latest, "cache warmed");
    }
    Ok(())
}

async fn warm_cache(fetcher: &impl Fetcher, chain: &ChainConfig, shutdown: &CancellationToken) -> Result<u64> {
    let latest = fetcher.get_latest().await?;
    let mut from = chain.start_block;
    while from <= latest {
        if shutdown.is_cancelled() {
            break;
        }
        let to = (from + chain.fetch_batch_size - 1).min(latest);
        fetcher.fetch_range(from, to).await?;
        from = to + 1;
    }
    Ok(latest)
}

/// `size`: report row counts for every raw/derived table.
async fn run_size(store: &ClickHouseStore) -> Result<()> {
    for table in store.table_sizes().await? {
        println!("{:<32} {}", table.table, table.row_count);
    }
    Ok(())
}

/// `duplicates`: report sort-key collisions in raw tables.
async fn run_duplicates(store: &ClickHouseStore) -> Result<()> {
    let duplicates = store.find_duplicates().await?;
    if duplicates.is_empty() {
        println!("no duplicates found");
        return Ok(());
    }
    for dup in duplicates {
        println!("{:<48} {}", dup.key, dup.count);
    }
    Ok(())
}

/// `wipe`: delete stored data per the `--all`/`--chain`/`--pchain` flags.
async fn run_wipe(store: &ClickHouseStore, all: bool, chain: Option<u32>, pchain: bool) -> Result<()> {
    if all {
        store.wipe_all().await?;
        info!("wiped all tables");
        return Ok(());
    }
    if let Some(chain_id) = chain {
        store.wipe_chain(chain_id).await?;
        info!(chain_id, "wiped chain");
    }
    if pchain {
        store.wipe_pchain().await?;
        info!("wiped P-chain validator/subnet state");
    }
    if !pchain && chain.is_none() {
        warn!("wipe called with no target; pass --all, --chain=N, or --pchain");
    }
    Ok(())
}
