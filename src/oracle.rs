//! Market and chain reads: spot prices, gas price, chain head, contract code.
//!
//! [`MarketOracle`] is the seam the sync engine and the registry depend on;
//! [`LiveOracle`] reads the chain over HTTP JSON-RPC and prices from a
//! Binance-style ticker endpoint.

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{instrument, warn};
use utoipa::ToSchema;

use crate::error::{LedgerError, LedgerResult};
use crate::events::ITellorFlex;
use crate::rpc::{self, Provider};

/// Quote symbol of the reward token.
pub const REWARD_SYMBOL: &str = "TRB";

/// Quote symbol of the fee currency.
pub const FEE_SYMBOL: &str = "ETH";

/// Gas used by one `submitValue` report.
pub const REPORT_GAS_ESTIMATE: u128 = 272_954;

/// The time-based reward accrues one TRB per this many seconds without a report.
pub const REWARD_ACCRUAL_SECS: u64 = 600;

/// Price, gas and chain reads.
#[async_trait]
pub trait MarketOracle: Send + Sync {
    /// USD price of `symbol` (e.g. `ETH`, `TRB`).
    async fn spot_price(&self, symbol: &str) -> LedgerResult<f64>;

    /// Current gas price in wei.
    async fn gas_price(&self) -> LedgerResult<u128>;

    /// Latest block number.
    async fn chain_head_block(&self) -> LedgerResult<u64>;

    /// Latest block timestamp, unix seconds.
    async fn chain_head_timestamp(&self) -> LedgerResult<u64>;

    /// Whether `address` holds contract code.
    async fn is_contract(&self, address: &str) -> LedgerResult<bool>;

    /// Time of the oracle's most recent accepted value, unix seconds.
    async fn last_submission_time(&self) -> LedgerResult<u64>;
}

/// Prices used to value rewards and fees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpotPrices {
    /// USD per ETH
    pub eth_usd: f64,
    /// USD per TRB
    pub trb_usd: f64,
}

/// Everything the dashboard header shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MarketSnapshot {
    /// Spot prices
    pub prices: SpotPrices,
    /// Gas price in gwei
    pub gas_price_gwei: f64,
    /// Latest block
    pub head_block: Option<u64>,
    /// Latest block timestamp
    pub head_timestamp: Option<u64>,
    /// Oracle's last accepted value time
    pub last_submission: Option<u64>,
    /// Time-based reward waiting for the next report (TRB)
    pub available_reward: Option<f64>,
    /// Available reward minus the gas of one report, in USD
    pub estimated_earning: Option<f64>,
}

/// TRB accrued since `last_submission` at `now`.
#[must_use]
pub fn available_reward(now: i64, last_submission: u64) -> f64 {
    let last = i64::try_from(last_submission).unwrap_or(i64::MAX);
    #[allow(clippy::cast_precision_loss)]
    let idle = now.saturating_sub(last).max(0) as f64;
    #[allow(clippy::cast_precision_loss)]
    let per_trb = REWARD_ACCRUAL_SECS as f64;
    idle / per_trb
}

/// USD value of reporting now: `available` TRB less the gas of one report.
#[must_use]
pub fn estimated_earning(available: f64, gas_price_wei: u128, prices: SpotPrices) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let gas_eth = gas_price_wei.saturating_mul(REPORT_GAS_ESTIMATE) as f64 / 1e18;
    available * prices.trb_usd - gas_eth * prices.eth_usd
}

/// ETH and TRB prices; an unavailable quote reads as 0.
pub async fn spot_prices(oracle: &dyn MarketOracle) -> SpotPrices {
    let (eth, trb) = tokio::join!(
        oracle.spot_price(FEE_SYMBOL),
        oracle.spot_price(REWARD_SYMBOL)
    );

    SpotPrices {
        eth_usd: or_zero(eth, FEE_SYMBOL),
        trb_usd: or_zero(trb, REWARD_SYMBOL),
    }
}

/// Prices, gas and chain head in one round; failures degrade per field.
pub async fn market_snapshot(oracle: &dyn MarketOracle) -> MarketSnapshot {
    let (prices, gas, head, head_ts, last) = tokio::join!(
        spot_prices(oracle),
        oracle.gas_price(),
        oracle.chain_head_block(),
        oracle.chain_head_timestamp(),
        oracle.last_submission_time(),
    );

    let gas = gas.map_err(|e| warn!(error = %e, "Gas price unavailable")).ok();
    #[allow(clippy::cast_precision_loss)]
    let gas_price_gwei = gas.map_or(0.0, |wei| wei as f64 / 1e9);

    let last = last
        .map_err(|e| warn!(error = %e, "Last submission unavailable"))
        .ok();
    let available = last.map(|last| available_reward(Utc::now().timestamp(), last));
    let estimated = available
        .zip(gas)
        .map(|(available, wei)| estimated_earning(available, wei, prices));

    MarketSnapshot {
        prices,
        gas_price_gwei,
        head_block: head.map_err(|e| warn!(error = %e, "Head block unavailable")).ok(),
        head_timestamp: head_ts
            .map_err(|e| warn!(error = %e, "Head timestamp unavailable"))
            .ok(),
        last_submission: last,
        available_reward: available,
        estimated_earning: estimated,
    }
}

fn or_zero(price: LedgerResult<f64>, symbol: &str) -> f64 {
    price.unwrap_or_else(|e| {
        warn!(symbol, error = %e, "Spot price unavailable");
        0.0
    })
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

/// JSON-RPC and ticker API backed oracle.
#[derive(Clone)]
pub struct LiveOracle {
    provider: Provider,
    http_client: reqwest::Client,
    price_api_url: String,
    oracle_contract: Address,
}

impl LiveOracle {
    /// Build the oracle once at start.
    ///
    /// # Errors
    ///
    /// Returns an RPC error for an invalid RPC URL, or a configuration error
    /// if the HTTP client cannot be built.
    pub fn new(rpc_url: &str, price_api_url: &str, oracle_contract: Address) -> LedgerResult<Self> {
        let provider = rpc::create_provider(rpc_url)?;
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LedgerError::config("Failed to build HTTP client", Some(Box::new(e))))?;

        Ok(Self {
            provider,
            http_client,
            price_api_url: price_api_url.trim_end_matches('/').to_string(),
            oracle_contract,
        })
    }

    /// HTTP provider, shared with the report listener for receipts.
    #[must_use]
    pub fn provider(&self) -> Provider {
        self.provider.clone()
    }
}

#[async_trait]
impl MarketOracle for LiveOracle {
    #[instrument(skip(self))]
    async fn spot_price(&self, symbol: &str) -> LedgerResult<f64> {
        let url = format!("{}/ticker/price", self.price_api_url);
        let ticker: TickerPrice = self
            .http_client
            .get(&url)
            .query(&[("symbol", format!("{}USDT", symbol.to_uppercase()))])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| LedgerError::rpc(format!("Price request for {symbol} failed"), Some(Box::new(e))))?
            .json()
            .await
            .map_err(|e| LedgerError::decoding(format!("Malformed price for {symbol}"), Some(Box::new(e))))?;

        ticker.price.trim().parse::<f64>().map_err(|e| {
            LedgerError::decoding(format!("Invalid price for {symbol}: {}", ticker.price), Some(Box::new(e)))
        })
    }

    async fn gas_price(&self) -> LedgerResult<u128> {
        rpc::get_gas_price(&self.provider).await
    }

    async fn chain_head_block(&self) -> LedgerResult<u64> {
        rpc::get_latest_block(&self.provider).await
    }

    async fn chain_head_timestamp(&self) -> LedgerResult<u64> {
        rpc::get_head_timestamp(&self.provider).await
    }

    async fn is_contract(&self, address: &str) -> LedgerResult<bool> {
        let address = Address::from_str(address).map_err(|e| {
            LedgerError::decoding(format!("Invalid address: {address}"), Some(Box::new(e)))
        })?;
        rpc::has_code(&self.provider, address).await
    }

    async fn last_submission_time(&self) -> LedgerResult<u64> {
        let oracle = ITellorFlex::new(self.oracle_contract, self.provider.clone());
        let time = oracle
            .getTimeOfLastNewValue()
            .call()
            .await
            .map_err(|e| LedgerError::rpc("Failed to read last oracle value time", Some(Box::new(e))))?
            ._0;

        u64::try_from(time)
            .map_err(|e| LedgerError::decoding("Oracle time out of range", Some(Box::new(e))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedOracle {
        eth: LedgerResult<f64>,
    }

    #[async_trait]
    impl MarketOracle for FixedOracle {
        async fn spot_price(&self, symbol: &str) -> LedgerResult<f64> {
            match (symbol, &self.eth) {
                ("ETH", Ok(price)) => Ok(*price),
                ("ETH", Err(_)) => Err(LedgerError::rpc("ticker down", None)),
                _ => Ok(100.0),
            }
        }
        async fn gas_price(&self) -> LedgerResult<u128> {
            Ok(25_000_000_000)
        }
        async fn chain_head_block(&self) -> LedgerResult<u64> {
            Ok(19_000_000)
        }
        async fn chain_head_timestamp(&self) -> LedgerResult<u64> {
            Err(LedgerError::rpc("no block", None))
        }
        async fn is_contract(&self, _address: &str) -> LedgerResult<bool> {
            Ok(false)
        }
        async fn last_submission_time(&self) -> LedgerResult<u64> {
            Ok(1_700_000_000)
        }
    }

    #[tokio::test]
    async fn test_spot_prices_degrade_to_zero() {
        let oracle = FixedOracle {
            eth: Err(LedgerError::rpc("down", None)),
        };
        let prices = spot_prices(&oracle).await;

        assert!(prices.eth_usd.abs() < f64::EPSILON);
        assert!((prices.trb_usd - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_market_snapshot_per_field() {
        let oracle = FixedOracle { eth: Ok(4_000.0) };
        let snapshot = market_snapshot(&oracle).await;

        assert!((snapshot.prices.eth_usd - 4_000.0).abs() < f64::EPSILON);
        assert!((snapshot.gas_price_gwei - 25.0).abs() < 1e-9);
        assert_eq!(snapshot.head_block, Some(19_000_000));
        assert_eq!(snapshot.head_timestamp, None);
        assert_eq!(snapshot.last_submission, Some(1_700_000_000));
        assert!(snapshot.available_reward.is_some_and(|trb| trb > 0.0));
        assert!(snapshot.estimated_earning.is_some());
    }

    #[test]
    fn test_available_reward_accrues_per_ten_minutes() {
        assert!((available_reward(1_700_000_600, 1_700_000_000) - 1.0).abs() < 1e-12);
        assert!((available_reward(1_700_003_000, 1_700_000_000) - 5.0).abs() < 1e-12);
        // A clock behind the chain accrues nothing
        assert!(available_reward(1_699_999_000, 1_700_000_000).abs() < f64::EPSILON);
    }

    #[test]
    fn test_estimated_earning_subtracts_report_gas() {
        let prices = SpotPrices {
            eth_usd: 2_000.0,
            trb_usd: 100.0,
        };

        // 20 gwei * 272954 gas = 0.00545908 ETH = 10.91816 USD
        let earning = estimated_earning(1.0, 20_000_000_000, prices);
        assert!((earning - 89.081_84).abs() < 1e-6);

        // Nothing accrued yet costs the gas
        assert!(estimated_earning(0.0, 20_000_000_000, prices) < 0.0);
    }

    #[test]
    fn test_ticker_payload() {
        let ticker: TickerPrice =
            serde_json::from_str(r#"{"symbol":"TRBUSDT","price":"105.23000000"}"#).expect("parse");
        assert_eq!(ticker.price, "105.23000000");
    }

    #[tokio::test]
    async fn test_unreachable_ticker_is_rpc_error() {
        let oracle = LiveOracle::new(
            "http://127.0.0.1:9",
            "http://127.0.0.1:9/api/v3/",
            Address::ZERO,
        )
        .expect("oracle");

        assert_eq!(oracle.price_api_url, "http://127.0.0.1:9/api/v3");
        assert!(matches!(
            oracle.spot_price("ETH").await,
            Err(LedgerError::RpcError { .. })
        ));
    }
}
