//! Read side: stored ledgers, earnings totals and recent rewards.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use crate::address::normalize_address;
use crate::db::models::LedgerRecord;
use crate::error::LedgerResult;
use crate::oracle::SpotPrices;
use crate::store::LedgerStore;

/// Default size of the recent earnings strip.
pub const DEFAULT_RECENT_LIMIT: u32 = 20;

/// Largest recent earnings page served.
pub const MAX_RECENT_LIMIT: u32 = 200;

/// Totals over a set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LedgerSummary {
    /// Σ fee (ETH)
    pub total_fee: f64,
    /// Σ reward (TRB)
    pub total_reward: f64,
    /// Σ (reward · TRB price − fee · ETH price), USD
    pub net_earning: f64,
    /// Records counted
    pub records: usize,
}

/// Aggregate `records` at `prices`.
///
/// ```
/// use oracle_ledger_sync::oracle::SpotPrices;
/// use oracle_ledger_sync::query::summary;
///
/// let totals = summary(&[], SpotPrices { eth_usd: 3_000.0, trb_usd: 100.0 });
/// assert_eq!(totals.records, 0);
/// ```
#[must_use]
pub fn summary(records: &[LedgerRecord], prices: SpotPrices) -> LedgerSummary {
    records.iter().fold(LedgerSummary::default(), |mut acc, record| {
        acc.total_fee += record.fee;
        acc.total_reward += record.reward_amount;
        acc.net_earning += record
            .reward_amount
            .mul_add(prices.trb_usd, -(record.fee * prices.eth_usd));
        acc.records += 1;
        acc
    })
}

/// Ledger reads over a [`LedgerStore`].
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn LedgerStore>,
}

impl QueryService {
    /// Service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Stored records of `address`, newest block first.
    ///
    /// # Errors
    ///
    /// Returns a decoding error for an invalid address, or the store error.
    #[instrument(skip(self))]
    pub async fn ledger(&self, address: &str, hide_failed: bool) -> LedgerResult<Vec<LedgerRecord>> {
        let address = normalize_address(address)?;
        self.store.ledger(&address, hide_failed).await
    }

    /// Most recent rewarded records across every address.
    ///
    /// `limit` is clamped to `1..=MAX_RECENT_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns the store error.
    pub async fn recent_earnings(&self, limit: u32) -> LedgerResult<Vec<LedgerRecord>> {
        self.store
            .recent_rewarded(limit.clamp(1, MAX_RECENT_LIMIT))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TxStatus;

    fn record(fee: f64, reward: f64) -> LedgerRecord {
        LedgerRecord {
            address: "0x01".to_string(),
            hash: format!("0x{fee}{reward}"),
            block_number: 1,
            block_timestamp: 0,
            fee,
            gas_price: "0".to_string(),
            gas_used: "0".to_string(),
            method_selector: "0x".to_string(),
            status: TxStatus::Success,
            reward_amount: reward,
            created_at: 0,
        }
    }

    #[test]
    fn test_summary_totals() {
        let records = vec![record(0.01, 0.0), record(0.02, 3.0), record(0.005, 1.5)];
        let prices = SpotPrices {
            eth_usd: 2_000.0,
            trb_usd: 100.0,
        };

        let totals = summary(&records, prices);

        assert!((totals.total_fee - 0.035).abs() < 1e-12);
        assert!((totals.total_reward - 4.5).abs() < 1e-12);
        // 450 - 70
        assert!((totals.net_earning - 380.0).abs() < 1e-9);
        assert_eq!(totals.records, 3);
    }

    #[test]
    fn test_summary_with_missing_prices() {
        let totals = summary(&[record(0.1, 2.0)], SpotPrices::default());

        assert!((totals.total_reward - 2.0).abs() < f64::EPSILON);
        assert!(totals.net_earning.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_ledger_rejects_invalid_address() {
        let pool = crate::db::create_pool("sqlite::memory:").await.expect("pool");
        let service = QueryService::new(Arc::new(crate::db::repository::Repository::new(pool)));

        assert!(service.ledger("nope", false).await.is_err());
        assert!(service.recent_earnings(0).await.expect("recent").is_empty());
    }
}
