//! CLI entry point for the ledger sync service.
//!
//! ```text
//! main.rs (runtime + tracing)
//!     ↓
//! cli.rs (commands, wiring)
//!     ↓
//! config → db → indexer / oracle → sync engine → registry → api / listener
//! ```
//!
//! All errors bubble up via `LedgerResult<T>`.

use oracle_ledger_sync::{cli, observability};
use tracing::error;

/// Entry point.
///
/// Logging is configured from the environment:
/// - `RUST_LOG`: filter directives (e.g. `oracle_ledger_sync=debug,sqlx=warn`)
/// - `LOG_JSON`: JSON console output (`true`/`false`)
/// - `LOG_FILE`: daily rotated JSON log file
#[tokio::main]
async fn main() {
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    // Held until exit so the file writer flushes
    let _log_guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run().await {
        error!(error = %e, transient = e.is_transient(), "Application error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
