//! Incremental sync orchestrator.
//!
//! A pass for one address:
//!
//! 1. snapshot the chain head (upper bound)
//! 2. read the cursor, or fall back to the genesis block
//! 3. fetch transactions and transfers concurrently
//! 4. reconcile rewards and fees
//! 5. upsert every record in one transaction
//! 6. advance the cursor past the newest fetched transaction
//!
//! The cursor only moves after the write succeeded. Any failure aborts the
//! pass and leaves the cursor where it was, so the next pass re-fetches the
//! same range and the upsert absorbs the overlap.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::address::{format_address, normalize_address};
use crate::config::Config;
use crate::error::LedgerResult;
use crate::feed::{FeedEvent, FeedSender};
use crate::indexer::{fetch_transactions, fetch_transfers, BlockOrdered, IndexerApi};
use crate::oracle::MarketOracle;
use crate::reconcile::{reconcile, RewardRule};
use crate::registry::RegistryHandle;
use crate::store::{CursorStore, LedgerStore};

/// Knobs of a sync pass.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Rows per indexer page
    pub page_size: u32,
    /// Floor for addresses never synced
    pub genesis_block: u64,
    /// Reward attribution
    pub rule: RewardRule,
}

impl SyncSettings {
    /// Settings taken from the loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.page_size(),
            genesis_block: config.genesis_block(),
            rule: RewardRule::new(
                &format_address(config.reward_contract()),
                config.reward_ceiling(),
            ),
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SyncReport {
    /// Synced address
    pub address: String,
    /// Inclusive floor of the fetched range
    pub from_block: u64,
    /// Inclusive ceiling of the fetched range (chain head snapshot)
    pub to_block: u64,
    /// Transactions fetched and written
    pub transactions: usize,
    /// Transfers fetched
    pub transfers: usize,
    /// Records with a non-zero reward
    pub rewarded: usize,
    /// Indexer page requests issued
    pub requests: u32,
    /// Cursor when the pass started
    pub cursor_before: Option<u64>,
    /// Cursor when the pass ended
    pub cursor_after: Option<u64>,
    /// Wall time of the pass
    pub duration_ms: u64,
}

impl SyncReport {
    /// Whether the pass moved the cursor.
    #[must_use]
    pub fn advanced(&self) -> bool {
        self.cursor_after != self.cursor_before
    }
}

/// Runs sync passes with at most one in flight per address.
pub struct SyncEngine {
    indexer: Arc<dyn IndexerApi>,
    oracle: Arc<dyn MarketOracle>,
    cursors: Arc<dyn CursorStore>,
    ledger: Arc<dyn LedgerStore>,
    settings: SyncSettings,
    registry: Option<RegistryHandle>,
    feed: Option<FeedSender>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncEngine {
    /// Engine over injected collaborators.
    #[must_use]
    pub fn new(
        indexer: Arc<dyn IndexerApi>,
        oracle: Arc<dyn MarketOracle>,
        cursors: Arc<dyn CursorStore>,
        ledger: Arc<dyn LedgerStore>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            indexer,
            oracle,
            cursors,
            ledger,
            settings,
            registry: None,
            feed: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Notify `registry` of sync progress.
    #[must_use]
    pub fn with_registry(mut self, registry: RegistryHandle) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Publish finished passes on `feed`.
    #[must_use]
    pub fn with_feed(mut self, feed: FeedSender) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Active settings.
    #[must_use]
    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run one pass for `address`.
    ///
    /// A second call for the same address waits for the first to finish, then
    /// runs its own pass.
    ///
    /// # Errors
    ///
    /// Returns a decoding error for an invalid address, otherwise whatever
    /// aborted the pass (chain head, cursor read, indexer, reconciliation,
    /// record write or cursor write). The cursor is unchanged in every case.
    #[instrument(skip(self, address), fields(address = tracing::field::Empty, duration_ms = tracing::field::Empty))]
    pub async fn sync_address(&self, address: &str) -> LedgerResult<SyncReport> {
        let address = normalize_address(address)?;
        tracing::Span::current().record("address", address.as_str());

        let lock = self.lock_for(&address);
        let guard = lock.lock().await;
        let outcome = self.run_pass(address.clone()).await;
        drop(guard);
        self.release_lock(&address, &lock);

        outcome
    }

    async fn run_pass(&self, address: String) -> LedgerResult<SyncReport> {
        let start = Instant::now();

        let to_block = self.oracle.chain_head_block().await?;
        let cursor_before = self.cursors.get(&address).await?;
        let from_block = cursor_before.unwrap_or(self.settings.genesis_block);
        let page_size = self.settings.page_size;

        let (transactions, transfers) = tokio::try_join!(
            fetch_transactions(self.indexer.as_ref(), &address, from_block, to_block, page_size),
            fetch_transfers(self.indexer.as_ref(), &address, from_block, to_block, page_size),
        )?;

        let reconciled = reconcile(
            &address,
            &transactions.items,
            &transfers.items,
            &self.settings.rule,
        )?;

        if !reconciled.records.is_empty() {
            self.ledger.upsert_records(&reconciled.records).await?;
        }

        let newest = transactions
            .items
            .iter()
            .map(BlockOrdered::block_number)
            .max();

        let cursor_after = match newest {
            Some(block) => Some(self.cursors.advance(&address, block.saturating_add(1)).await?),
            None => cursor_before,
        };

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::Span::current().record("duration_ms", duration_ms);

        let report = SyncReport {
            address: address.clone(),
            from_block,
            to_block,
            transactions: transactions.items.len(),
            transfers: transfers.items.len(),
            rewarded: reconciled.rewarded,
            requests: transactions.requests + transfers.requests,
            cursor_before,
            cursor_after,
            duration_ms,
        };

        info!(
            from_block,
            to_block,
            transactions = report.transactions,
            transfers = report.transfers,
            rewarded = report.rewarded,
            capped = reconciled.capped,
            requests = report.requests,
            cursor = ?cursor_after,
            duration_ms,
            "Sync pass complete"
        );

        if let (Some(registry), Some(block)) = (&self.registry, cursor_after) {
            registry.synced(&address, block).await;
        }
        if let Some(feed) = &self.feed {
            // No subscribers is fine
            let _ = feed.send(FeedEvent::Synced(report.clone()));
        }

        Ok(report)
    }

    /// Run passes for several addresses in parallel.
    ///
    /// Each address gets its own outcome; a failed address never affects the
    /// others.
    pub async fn sync_many(&self, addresses: &[String]) -> Vec<(String, LedgerResult<SyncReport>)> {
        let passes = addresses.iter().map(|address| async move {
            let outcome = self.sync_address(address).await;
            if let Err(e) = &outcome {
                warn!(address = %address, error = %e, "Sync pass failed");
            }
            (address.clone(), outcome)
        });

        join_all(passes).await
    }

    fn lock_for(&self, address: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(address.to_string()).or_default())
    }

    /// Forget the lock of `address` unless another caller is waiting on it.
    fn release_lock(&self, address: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map and `lock` hold the only two references
        if Arc::strong_count(lock) <= 2 {
            locks.remove(address);
        }
    }

    /// Addresses with a pass running or queued.
    #[must_use]
    pub fn active_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
