//! Storage seams used by the sync engine and the registry task.
//!
//! [`Repository`] implements all three traits; tests substitute wrappers that
//! fail on demand.

use async_trait::async_trait;

use crate::db::models::LedgerRecord;
use crate::db::repository::Repository;
use crate::error::LedgerResult;
use crate::registry::ReporterEntry;

/// Per-address watermark.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Next block to fetch from, `None` if the address was never synced.
    async fn get(&self, address: &str) -> LedgerResult<Option<u64>>;

    /// Store `max(current, block)`; returns the stored value.
    async fn advance(&self, address: &str, block: u64) -> LedgerResult<u64>;
}

/// Enriched record storage.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All-or-nothing upsert keyed by `(address, hash)`.
    async fn upsert_records(&self, records: &[LedgerRecord]) -> LedgerResult<usize>;

    /// Records of `address`, newest block first.
    async fn ledger(&self, address: &str, hide_failed: bool) -> LedgerResult<Vec<LedgerRecord>>;

    /// Most recent rewarded records across all addresses.
    async fn recent_rewarded(&self, limit: u32) -> LedgerResult<Vec<LedgerRecord>>;
}

/// Reporter metadata persistence.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Every stored entry.
    async fn load_reporters(&self) -> LedgerResult<Vec<ReporterEntry>>;

    /// Single-row upsert.
    async fn save_reporter(&self, entry: &ReporterEntry) -> LedgerResult<()>;
}

#[async_trait]
impl CursorStore for Repository {
    #[allow(clippy::cast_sign_loss)]
    async fn get(&self, address: &str) -> LedgerResult<Option<u64>> {
        let cursor = self.get_cursor(address).await?;
        Ok(cursor.map(|c| c.last_synced_block.max(0) as u64))
    }

    async fn advance(&self, address: &str, block: u64) -> LedgerResult<u64> {
        self.advance_cursor(address, block).await
    }
}

#[async_trait]
impl LedgerStore for Repository {
    async fn upsert_records(&self, records: &[LedgerRecord]) -> LedgerResult<usize> {
        Self::upsert_records(self, records).await
    }

    async fn ledger(&self, address: &str, hide_failed: bool) -> LedgerResult<Vec<LedgerRecord>> {
        self.get_ledger(address, hide_failed).await
    }

    async fn recent_rewarded(&self, limit: u32) -> LedgerResult<Vec<LedgerRecord>> {
        Self::recent_rewarded(self, limit).await
    }
}

#[async_trait]
impl RegistryStore for Repository {
    async fn load_reporters(&self) -> LedgerResult<Vec<ReporterEntry>> {
        self.get_reporters().await
    }

    async fn save_reporter(&self, entry: &ReporterEntry) -> LedgerResult<()> {
        self.upsert_reporter(entry).await
    }
}
