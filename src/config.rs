//! Configuration management for the ledger sync service.
//!
//! Settings are loaded from environment variables (and a `.env` file when
//! present, via `dotenvy`). All validation failures are reported as
//! [`LedgerError::ConfigError`].
//!
//! ## Environment Variables
//!
//! Required:
//! - `MORALIS_API_KEY`: API key for the chain-indexing API
//! - `RPC_URL` or `ALCHEMY_API_KEY`: Ethereum JSON-RPC endpoint
//!
//! Optional (with defaults):
//! - `WS_URL`: WebSocket JSON-RPC endpoint for report events (derived from
//!   `ALCHEMY_API_KEY` when absent)
//! - `DATABASE_URL`: SQLite database (default: `sqlite:./ledger.db`)
//! - `INDEXER_URL`: indexer base URL (default: Moralis v2.2)
//! - `CHAIN`: indexer chain identifier (default: `eth`)
//! - `PAGE_SIZE`: rows per indexer page (default: 100)
//! - `GENESIS_BLOCK`: lower bound for addresses never synced (default: 0)
//! - `REWARD_CONTRACT`: reward-issuing oracle contract (default: Tellor Flex)
//! - `REWARD_CEILING`: largest plausible single reward (default: 10)
//! - `PRICE_API_URL`: spot price API base (default: Binance v3)
//! - `API_PORT`: REST API port (default: 3000)
//! - `RATE_LIMIT_RPM`: REST API rate limit (default: 120)
//! - `CORS_ORIGINS`: comma separated allowed origins (default: `*`)
//! - `SUBGRAPH_URL`: staking subgraph; stakes and cooldowns stay empty without it
//! - `STAKER_REFRESH_SECS`: staker refresh period while serving (default: 300)
//!
//! ## Example
//!
//! ```no_run
//! use oracle_ledger_sync::config::Config;
//! use oracle_ledger_sync::error::LedgerResult;
//!
//! # fn main() -> LedgerResult<()> {
//! let config = Config::from_env()?;
//! println!("Indexer: {}", config.indexer_url());
//! # Ok(())
//! # }
//! ```

use crate::error::{LedgerError, LedgerResult};
use alloy::primitives::Address;
use std::env;
use std::str::FromStr;

/// Tellor Flex oracle on Ethereum mainnet. Rewards are TRB transfers sent
/// from this contract to the reporter.
pub const DEFAULT_REWARD_CONTRACT: &str = "0x8cFc184c877154a8F9ffE0fe75649dbe5e2DBEbf";

/// Default indexer base URL.
pub const DEFAULT_INDEXER_URL: &str = "https://deep-index.moralis.io/api/v2.2";

/// Default spot price API base URL.
pub const DEFAULT_PRICE_API_URL: &str = "https://api.binance.com/api/v3";

/// Largest page the indexer serves.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Transfers above this many reward tokens are treated as misattributed.
pub const DEFAULT_REWARD_CEILING: f64 = 10.0;

/// Seconds between staker refreshes.
pub const DEFAULT_STAKER_REFRESH_SECS: u64 = 300;

/// Main configuration struct.
#[derive(Debug, Clone)]
pub struct Config {
    indexer_url: String,
    indexer_api_key: String,
    chain: String,
    page_size: u32,
    genesis_block: u64,
    rpc_url: String,
    ws_url: Option<String>,
    database_url: String,
    reward_contract: Address,
    reward_ceiling: f64,
    price_api_url: String,
    api_port: u16,
    rate_limit_rpm: u32,
    cors_origins: Vec<String>,
    subgraph_url: Option<String>,
    staker_refresh_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `MORALIS_API_KEY` is missing or a placeholder
    /// - neither `RPC_URL` nor `ALCHEMY_API_KEY` is set
    /// - a numeric variable does not parse
    /// - `REWARD_CONTRACT` is not a valid address
    pub fn from_env() -> LedgerResult<Self> {
        dotenvy::dotenv().ok();

        let indexer_api_key = env::var("MORALIS_API_KEY").map_err(|e| {
            LedgerError::config(
                "MORALIS_API_KEY environment variable is required",
                Some(Box::new(e)),
            )
        })?;

        if indexer_api_key.is_empty() || indexer_api_key == "your_moralis_api_key_here" {
            return Err(LedgerError::config(
                "MORALIS_API_KEY must be set to a valid API key",
                None,
            ));
        }

        let alchemy_key = env::var("ALCHEMY_API_KEY").ok().filter(|k| !k.is_empty());

        let rpc_url = match (env::var("RPC_URL").ok().filter(|u| !u.is_empty()), &alchemy_key) {
            (Some(url), _) => url,
            (None, Some(key)) => format!("https://eth-mainnet.g.alchemy.com/v2/{key}"),
            (None, None) => {
                return Err(LedgerError::config(
                    "Either RPC_URL or ALCHEMY_API_KEY must be set",
                    None,
                ))
            }
        };

        let ws_url = env::var("WS_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .or_else(|| {
                alchemy_key
                    .as_ref()
                    .map(|key| format!("wss://eth-mainnet.g.alchemy.com/v2/{key}"))
            });

        let reward_contract_raw =
            env::var("REWARD_CONTRACT").unwrap_or_else(|_| DEFAULT_REWARD_CONTRACT.to_string());
        let reward_contract = Address::from_str(&reward_contract_raw).map_err(|e| {
            LedgerError::config(
                format!("REWARD_CONTRACT must be a valid address, got: {reward_contract_raw}"),
                Some(Box::new(e)),
            )
        })?;

        let page_size = parse_var("PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        if page_size == 0 || page_size > DEFAULT_PAGE_SIZE {
            return Err(LedgerError::config(
                format!("PAGE_SIZE must be between 1 and {DEFAULT_PAGE_SIZE}, got: {page_size}"),
                None,
            ));
        }

        let reward_ceiling = parse_var("REWARD_CEILING", DEFAULT_REWARD_CEILING)?;
        if !reward_ceiling.is_finite() || reward_ceiling < 0.0 {
            return Err(LedgerError::config(
                "REWARD_CEILING must be a non-negative number",
                None,
            ));
        }

        let staker_refresh_secs = parse_var("STAKER_REFRESH_SECS", DEFAULT_STAKER_REFRESH_SECS)?;
        if staker_refresh_secs == 0 {
            return Err(LedgerError::config(
                "STAKER_REFRESH_SECS must be greater than zero",
                None,
            ));
        }

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(ToString::to_string)
            .collect();

        Ok(Self {
            indexer_url: env::var("INDEXER_URL")
                .unwrap_or_else(|_| DEFAULT_INDEXER_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            indexer_api_key,
            chain: env::var("CHAIN").unwrap_or_else(|_| "eth".to_string()),
            page_size,
            genesis_block: parse_var("GENESIS_BLOCK", 0_u64)?,
            rpc_url,
            ws_url,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./ledger.db".to_string()),
            reward_contract,
            reward_ceiling,
            price_api_url: env::var("PRICE_API_URL")
                .unwrap_or_else(|_| DEFAULT_PRICE_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_port: parse_var("API_PORT", 3000_u16)?,
            rate_limit_rpm: parse_var("RATE_LIMIT_RPM", 120_u32)?,
            cors_origins,
            subgraph_url: env::var("SUBGRAPH_URL").ok().filter(|u| !u.trim().is_empty()),
            staker_refresh_secs,
        })
    }

    /// Indexer base URL without trailing slash.
    #[must_use]
    pub fn indexer_url(&self) -> &str {
        &self.indexer_url
    }

    /// Indexer API key.
    #[must_use]
    pub fn indexer_api_key(&self) -> &str {
        &self.indexer_api_key
    }

    /// Indexer chain identifier.
    #[must_use]
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Rows requested per indexer page.
    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Lower bound used for addresses without a cursor.
    #[must_use]
    pub const fn genesis_block(&self) -> u64 {
        self.genesis_block
    }

    /// HTTP JSON-RPC endpoint.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// WebSocket JSON-RPC endpoint, if configured.
    #[must_use]
    pub fn ws_url(&self) -> Option<&str> {
        self.ws_url.as_deref()
    }

    /// SQLite connection string.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Reward-issuing oracle contract.
    #[must_use]
    pub const fn reward_contract(&self) -> Address {
        self.reward_contract
    }

    /// Reward sanity ceiling.
    #[must_use]
    pub const fn reward_ceiling(&self) -> f64 {
        self.reward_ceiling
    }

    /// Spot price API base URL.
    #[must_use]
    pub fn price_api_url(&self) -> &str {
        &self.price_api_url
    }

    /// REST API port.
    #[must_use]
    pub const fn api_port(&self) -> u16 {
        self.api_port
    }

    /// REST API requests per minute.
    #[must_use]
    pub const fn rate_limit_rpm(&self) -> u32 {
        self.rate_limit_rpm
    }

    /// Allowed CORS origins.
    #[must_use]
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    /// Staking subgraph endpoint, if configured.
    #[must_use]
    pub fn subgraph_url(&self) -> Option<&str> {
        self.subgraph_url.as_deref()
    }

    /// Period of the background staker refresh.
    #[must_use]
    pub const fn staker_refresh(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.staker_refresh_secs)
    }
}

fn parse_var<T>(name: &str, default: T) -> LedgerResult<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            LedgerError::config(
                format!("{name} has an invalid value: {raw}"),
                Some(Box::new(e)),
            )
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-wide.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "MORALIS_API_KEY",
        "RPC_URL",
        "ALCHEMY_API_KEY",
        "WS_URL",
        "PAGE_SIZE",
        "REWARD_CONTRACT",
        "REWARD_CEILING",
        "GENESIS_BLOCK",
        "SUBGRAPH_URL",
        "STAKER_REFRESH_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_missing_indexer_key() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_placeholder_indexer_key() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("MORALIS_API_KEY", "your_moralis_api_key_here");
        env::set_var("RPC_URL", "http://localhost:8545");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_rpc_url_from_alchemy_key() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("MORALIS_API_KEY", "key");
        env::set_var("ALCHEMY_API_KEY", "abc");

        let config = Config::from_env();
        assert!(config.is_ok());
        if let Ok(config) = config {
            assert_eq!(config.rpc_url(), "https://eth-mainnet.g.alchemy.com/v2/abc");
            assert_eq!(config.ws_url(), Some("wss://eth-mainnet.g.alchemy.com/v2/abc"));
            assert_eq!(config.page_size(), 100);
            assert_eq!(config.genesis_block(), 0);
            assert!((config.reward_ceiling() - 10.0).abs() < f64::EPSILON);
            assert_eq!(config.subgraph_url(), None);
            assert_eq!(config.staker_refresh().as_secs(), 300);
        }

        clear_env();
    }

    #[test]
    fn test_rejects_oversized_page() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("MORALIS_API_KEY", "key");
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var("PAGE_SIZE", "500");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_rejects_invalid_reward_contract() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("MORALIS_API_KEY", "key");
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var("REWARD_CONTRACT", "not-an-address");

        assert!(Config::from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_staker_settings() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("MORALIS_API_KEY", "key");
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var("SUBGRAPH_URL", "https://api.thegraph.com/subgraphs/name/tellor-io/tellor-flex");
        env::set_var("STAKER_REFRESH_SECS", "60");

        let config = Config::from_env().expect("config");
        assert_eq!(
            config.subgraph_url(),
            Some("https://api.thegraph.com/subgraphs/name/tellor-io/tellor-flex")
        );
        assert_eq!(config.staker_refresh().as_secs(), 60);

        env::set_var("STAKER_REFRESH_SECS", "0");
        assert!(Config::from_env().is_err());

        clear_env();
    }
}
