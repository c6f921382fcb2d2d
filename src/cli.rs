//! Command-line interface for the ledger sync service.
//!
//! # Commands
//!
//! - `sync <address>...`: run one incremental pass per address
//! - `ledger <address>`: print the stored ledger with totals
//! - `recent`: print the most recent rewards across all reporters
//! - `reporters [--refresh]`: print the reporter registry with stake cooldowns
//! - `market`: print spot prices, gas price and chain head
//! - `serve`: run the REST API (and the report listener when `WS_URL` is set)
//! - `listen`: run the report listener only
//!
//! # Example
//!
//! ```bash
//! oracle-ledger-sync sync 0x8cFc184c877154a8F9ffE0fe75649dbe5e2DBEbf
//! oracle-ledger-sync ledger 0x8cFc184c877154a8F9ffE0fe75649dbe5e2DBEbf --hide-failed
//! oracle-ledger-sync serve --port 8080
//! ```

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::address::format_address;
use crate::api;
use crate::app_state::AppState;
use crate::config::Config;
use crate::db::{self, models::LedgerRecord, repository::Repository};
use crate::error::{LedgerError, LedgerResult};
use crate::feed::{self, FeedSender};
use crate::indexer::MoralisClient;
use crate::listener::ReportListener;
use crate::oracle::{market_snapshot, spot_prices, LiveOracle, MarketOracle};
use crate::query::{summary, QueryService, DEFAULT_RECENT_LIMIT};
use crate::registry::{self, RegistryHandle, ReporterEntry};
use crate::rpc::{check_connection, ReconnectingWebSocket};
use crate::stakers::{self, StakerSource, SubgraphClient};
use crate::sync::{SyncEngine, SyncReport, SyncSettings};

/// Oracle reporter ledger sync
#[derive(Parser, Debug)]
#[command(name = "oracle-ledger-sync")]
#[command(about = "Incremental wallet ledgers and reward reconciliation for oracle reporters", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync one or more addresses
    Sync {
        /// Wallet addresses (0x hex)
        #[arg(required = true, num_args = 1..)]
        addresses: Vec<String>,
    },

    /// Print the stored ledger of an address
    Ledger {
        /// Wallet address (0x hex)
        address: String,

        /// Leave out reverted transactions
        #[arg(long)]
        hide_failed: bool,
    },

    /// Print the most recent rewards across all reporters
    Recent {
        /// Records to show
        #[arg(short, long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: u32,
    },

    /// Print the reporter registry
    Reporters {
        /// Pull the current stakers from the subgraph first
        #[arg(long)]
        refresh: bool,
    },

    /// Print spot prices, gas price and chain head
    Market,

    /// Run the REST API
    Serve {
        /// Port to listen on (default: API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Listen for oracle reports and update the registry
    Listen,
}

/// Collaborators built once at start and injected everywhere.
struct Services {
    config: Config,
    repository: Repository,
    oracle: Arc<LiveOracle>,
    indexer: Arc<MoralisClient>,
    stakers: Option<Arc<dyn StakerSource>>,
    feed: FeedSender,
}

impl Services {
    async fn start() -> LedgerResult<Self> {
        let config = Config::from_env()?;
        let pool = db::create_pool(config.database_url()).await?;
        let oracle = LiveOracle::new(
            config.rpc_url(),
            config.price_api_url(),
            config.reward_contract(),
        )?;
        let indexer = MoralisClient::new(
            config.indexer_url(),
            config.indexer_api_key(),
            config.chain(),
        )?;
        let stakers = match config.subgraph_url() {
            Some(url) => Some(Arc::new(SubgraphClient::new(url)?) as Arc<dyn StakerSource>),
            None => None,
        };

        Ok(Self {
            config,
            repository: Repository::new(pool),
            oracle: Arc::new(oracle),
            indexer: Arc::new(indexer),
            stakers,
            feed: feed::channel(),
        })
    }

    async fn registry(&self) -> LedgerResult<(RegistryHandle, JoinHandle<()>)> {
        registry::spawn(
            Arc::new(self.repository.clone()),
            self.oracle.clone(),
            Some(self.feed.clone()),
        )
        .await
    }

    fn engine(&self, registry: RegistryHandle) -> SyncEngine {
        let store = Arc::new(self.repository.clone());
        SyncEngine::new(
            self.indexer.clone(),
            self.oracle.clone(),
            store.clone(),
            store,
            SyncSettings::from_config(&self.config),
        )
        .with_registry(registry)
        .with_feed(self.feed.clone())
    }

    fn listener(&self, registry: RegistryHandle) -> Option<ReportListener> {
        let ws_url = self.config.ws_url()?;
        let settings = SyncSettings::from_config(&self.config);

        Some(ReportListener::new(
            ReconnectingWebSocket::new(ws_url.to_string()),
            self.oracle.provider(),
            self.config.reward_contract(),
            settings.rule,
            registry,
        ))
    }
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading fails
/// - The database cannot be opened
/// - Command execution fails
pub async fn run() -> LedgerResult<()> {
    let cli = Cli::parse();
    let services = Services::start().await?;

    match cli.command {
        Commands::Sync { addresses } => run_sync_command(&services, &addresses).await,
        Commands::Ledger {
            address,
            hide_failed,
        } => run_ledger_command(&services, &address, hide_failed).await,
        Commands::Recent { limit } => run_recent_command(&services, limit).await,
        Commands::Reporters { refresh } => run_reporters_command(&services, refresh).await,
        Commands::Market => {
            run_market_command(services.oracle.as_ref()).await;
            Ok(())
        }
        Commands::Serve { port } => run_serve_command(&services, port).await,
        Commands::Listen => run_listen_command(&services).await,
    }
}

/// Sync each address; one failure does not stop the others.
async fn run_sync_command(services: &Services, addresses: &[String]) -> LedgerResult<()> {
    let (registry, registry_task) = services.registry().await?;
    let engine = services.engine(registry);

    let outcomes = engine.sync_many(addresses).await;
    let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();

    for (address, outcome) in &outcomes {
        match outcome {
            Ok(report) => print_sync_report(report),
            Err(e) => println!("{} {} {}", "✗".red().bold(), address.yellow(), e),
        }
    }

    // Let the registry drain its queue before exiting
    drop(engine);
    let _ = registry_task.await;

    if failed > 0 {
        return Err(LedgerError::indexer(
            format!("{failed} of {} addresses failed to sync", outcomes.len()),
            None,
        ));
    }
    Ok(())
}

async fn run_ledger_command(
    services: &Services,
    address: &str,
    hide_failed: bool,
) -> LedgerResult<()> {
    let query = QueryService::new(Arc::new(services.repository.clone()));
    let (records, prices) = tokio::join!(
        query.ledger(address, hide_failed),
        spot_prices(services.oracle.as_ref()),
    );
    let records = records?;

    if records.is_empty() {
        println!(
            "{}",
            "No records stored. Run `sync` for this address first."
                .yellow()
                .bold()
        );
        return Ok(());
    }

    for record in &records {
        print_record(record);
    }

    let totals = summary(&records, prices);
    println!();
    println!(
        "{} {} records | fees {} ETH | rewards {} TRB | net {}",
        "Σ".cyan().bold(),
        totals.records,
        format!("{:.6}", totals.total_fee).red(),
        format!("{:.4}", totals.total_reward).green(),
        format_usd(totals.net_earning),
    );

    Ok(())
}

async fn run_recent_command(services: &Services, limit: u32) -> LedgerResult<()> {
    let query = QueryService::new(Arc::new(services.repository.clone()));
    let records = query.recent_earnings(limit).await?;

    if records.is_empty() {
        println!("{}", "No rewards stored yet.".yellow().bold());
        return Ok(());
    }

    for record in &records {
        println!(
            "{} {} {} TRB at block {}",
            format_time(record.block_timestamp).dimmed(),
            record.address.blue(),
            format!("{:.4}", record.reward_amount).green().bold(),
            record.block_number.to_string().yellow(),
        );
    }
    Ok(())
}

async fn run_reporters_command(services: &Services, refresh: bool) -> LedgerResult<()> {
    let mut reporters = if refresh {
        let source = services.stakers.as_ref().ok_or_else(|| {
            LedgerError::config("SUBGRAPH_URL is required to refresh stakers", None)
        })?;
        let (registry, registry_task) = services.registry().await?;
        stakers::refresh(source.as_ref(), &registry).await?;
        let snapshot = registry.snapshot().await?;

        drop(registry);
        let _ = registry_task.await;
        snapshot.into_values().collect()
    } else {
        services.repository.get_reporters().await?
    };

    if reporters.is_empty() {
        println!("{}", "No reporters known yet.".yellow().bold());
        return Ok(());
    }

    // Soonest to report first; unstaked entries last
    let now = Utc::now().timestamp();
    reporters.sort_by_key(|entry| entry.remaining_secs(now).unwrap_or(i64::MAX));

    for entry in &reporters {
        print_reporter(entry, now);
    }
    Ok(())
}

async fn run_market_command(oracle: &dyn MarketOracle) {
    let snapshot = market_snapshot(oracle).await;

    println!(
        "{} ETH {} | TRB {} | gas {} gwei",
        "📈".cyan(),
        format_usd(snapshot.prices.eth_usd),
        format_usd(snapshot.prices.trb_usd),
        format!("{:.2}", snapshot.gas_price_gwei).yellow(),
    );
    println!(
        "{} head block {} | last oracle value {}",
        "⛓".cyan(),
        snapshot
            .head_block
            .map_or_else(|| "unknown".to_string(), |b| b.to_string())
            .yellow(),
        snapshot
            .last_submission
            .and_then(|t| i64::try_from(t).ok())
            .map_or_else(|| "unknown".to_string(), format_time)
            .dimmed(),
    );
    println!(
        "{} available reward {} TRB | estimated earning {}",
        "💰".cyan(),
        snapshot
            .available_reward
            .map_or_else(|| "unknown".to_string(), |trb| format!("{trb:.2}"))
            .yellow(),
        snapshot
            .estimated_earning
            .map_or_else(|| "unknown".to_string(), format_usd),
    );
}

async fn run_serve_command(services: &Services, port: Option<u16>) -> LedgerResult<()> {
    if let Err(e) = check_connection(&services.oracle.provider()).await {
        warn!(error = %e, "Node unreachable, market and sync endpoints will fail until it recovers");
    }

    let (registry, _registry_task) = services.registry().await?;
    let engine = Arc::new(services.engine(registry.clone()));

    let listener_task = spawn_listener(services, registry.clone());
    let staker_task = services.stakers.clone().map(|source| {
        stakers::spawn_refresh(source, registry.clone(), services.config.staker_refresh())
    });

    let state = AppState::new(
        services.repository.clone(),
        engine,
        registry,
        services.oracle.clone(),
        services.feed.clone(),
    );

    let port = port.unwrap_or_else(|| services.config.api_port());
    println!(
        "{} API listening on port {} (docs at /swagger-ui)",
        "🚀".cyan(),
        port.to_string().yellow().bold()
    );

    let result = tokio::select! {
        result = api::run_server(
            state,
            port,
            services.config.rate_limit_rpm(),
            services.config.cors_origins(),
        ) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            println!("{}", "👋 Shutdown complete".green().bold());
            Ok(())
        }
    };

    for task in listener_task.into_iter().chain(staker_task) {
        task.abort();
    }
    result
}

async fn run_listen_command(services: &Services) -> LedgerResult<()> {
    let (registry, _registry_task) = services.registry().await?;
    let listener = services.listener(registry).ok_or_else(|| {
        LedgerError::config("WS_URL or ALCHEMY_API_KEY is required to listen", None)
    })?;

    let mut events = services.feed.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let crate::feed::FeedEvent::Report(report) = event {
                println!(
                    "{} {} {} TRB | fee {} ETH | block {}",
                    "📝".cyan(),
                    report.reporter.blue(),
                    format!("{:.4}", report.reward).green().bold(),
                    format!("{:.6}", report.fee).red(),
                    report.block_number.to_string().yellow(),
                );
            }
        }
    });

    println!(
        "{} Listening for reports from {}",
        "🔍".cyan(),
        format_address(services.config.reward_contract()).yellow()
    );

    let result = tokio::select! {
        result = listener.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            println!("{}", "👋 Shutdown complete".green().bold());
            Ok(())
        }
    };

    printer.abort();
    result
}

fn spawn_listener(services: &Services, registry: RegistryHandle) -> Option<JoinHandle<()>> {
    let Some(listener) = services.listener(registry) else {
        warn!("No WebSocket endpoint configured, report listener disabled");
        return None;
    };

    Some(tokio::spawn(async move {
        if let Err(e) = listener.run().await {
            error!(error = %e, "Report listener stopped");
        }
    }))
}

fn print_sync_report(report: &SyncReport) {
    let cursor = report
        .cursor_after
        .map_or_else(|| "-".to_string(), |c| c.to_string());

    println!(
        "{} {} blocks {}..={} | {} txs | {} rewarded | {} requests | cursor {}",
        "✓".green().bold(),
        report.address.blue(),
        report.from_block,
        report.to_block,
        report.transactions.to_string().yellow(),
        report.rewarded.to_string().green(),
        report.requests,
        cursor.cyan(),
    );
}

fn print_record(record: &LedgerRecord) {
    let status = if record.succeeded() {
        "ok".green()
    } else {
        "failed".red()
    };
    let reward = if record.reward_amount > 0.0 {
        format!("+{:.4} TRB", record.reward_amount).green().bold()
    } else {
        "-".dimmed()
    };

    println!(
        "{} {} {} {} fee {} ETH {} {}",
        format_time(record.block_timestamp).dimmed(),
        record.block_number.to_string().yellow(),
        record.hash.get(..12).unwrap_or(record.hash.as_str()),
        record.method_selector.magenta(),
        format!("{:.6}", record.fee).red(),
        reward,
        status,
    );
}

fn print_reporter(entry: &ReporterEntry, now: i64) {
    let kind = if entry.is_contract { "contract" } else { "eoa" };
    let working = if entry.is_working {
        "working".green()
    } else {
        "paused".red()
    };
    let last_report = entry
        .last_report_at
        .map_or_else(|| "never".to_string(), format_time);

    println!(
        "{} {} [{}] {} | last report {} | synced to {} | {} recent rewards",
        entry.address.blue(),
        entry.label.as_deref().unwrap_or("").cyan(),
        kind,
        working,
        last_report.dimmed(),
        entry
            .last_synced_block
            .map_or_else(|| "-".to_string(), |b| b.to_string())
            .yellow(),
        entry.recent_rewards.len(),
    );

    if let Some(stake) = entry.stake {
        let next = match entry.remaining_secs(now) {
            Some(left) if left <= 0 => "eligible".green().bold(),
            Some(left) => format!("in {}", format_duration(left)).yellow(),
            None => "below minimum stake".red(),
        };
        println!(
            "    stake {} TRB | locked {} TRB | cooldown {} | next report {}",
            format!("{stake:.2}").cyan(),
            format!("{:.2}", entry.locked_balance.unwrap_or(0.0)).dimmed(),
            entry
                .cooldown_secs()
                .and_then(|secs| i64::try_from(secs).ok())
                .map_or_else(|| "-".to_string(), format_duration),
            next,
        );
    }
}

/// `H:MM:SS`
fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60)
}

fn format_time(unix: i64) -> String {
    chrono::DateTime::from_timestamp(unix, 0)
        .map_or_else(|| unix.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn format_usd(amount: f64) -> String {
    let text = format!("${amount:.2}");
    if amount < 0.0 {
        text.red().bold().to_string()
    } else {
        text.green().bold().to_string()
    }
}
