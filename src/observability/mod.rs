//! Structured logging setup.
//!
//! Every component logs through `tracing`; this module only wires the
//! subscriber. Sync passes run inside an `address` span so interleaved passes
//! for different wallets stay readable.
//!
//! ```bash
//! # Component-specific levels
//! RUST_LOG=oracle_ledger_sync=debug,sqlx=warn cargo run -- sync 0xabc...
//!
//! # JSON console output and a daily rotated JSON file
//! LOG_JSON=true LOG_FILE=./logs/ledger.log cargo run -- serve
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default filter when neither `RUST_LOG` nor an explicit level is given.
pub const DEFAULT_FILTER: &str = "oracle_ledger_sync=info,warn";

/// Initialize the global tracing subscriber.
///
/// * `log_level` - filter directive used when `RUST_LOG` is unset
/// * `log_file` - optional file path; enables a daily rotated JSON log
/// * `json_output` - JSON console output instead of the pretty format
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    json_output: bool,
) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let env_filter = match (std::env::var("RUST_LOG"), log_level) {
        (Ok(filter), _) => EnvFilter::new(filter),
        (Err(_), Some(level)) => EnvFilter::new(level),
        (Err(_), None) => EnvFilter::new(DEFAULT_FILTER),
    };

    let console_layer = if json_output {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .boxed()
    };

    let (file_layer, guard) = match log_file.as_ref() {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::daily(
                dir,
                path.file_name().unwrap_or_else(|| OsStr::new("ledger.log")),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(
        json_output,
        file_logging = log_file.is_some(),
        "Tracing initialized"
    );

    Ok(guard)
}

/// Test subscriber writing through the test harness; safe to call repeatedly.
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_an_error_not_a_panic() {
        init_test_tracing();
        let result = init_tracing(Some("debug".to_string()), None, false);
        assert!(result.is_err());
    }
}
