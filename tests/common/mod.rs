//! Shared fakes for integration tests: an in-memory indexer, a fixed market
//! oracle and store wrappers that fail on demand.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use oracle_ledger_sync::db::{self, models::LedgerRecord, repository::Repository};
use oracle_ledger_sync::error::{LedgerError, LedgerResult};
use oracle_ledger_sync::indexer::{IndexerApi, PageRequest, RawTransaction, RawTransfer};
use oracle_ledger_sync::oracle::MarketOracle;
use oracle_ledger_sync::reconcile::RewardRule;
use oracle_ledger_sync::store::{CursorStore, LedgerStore};
use oracle_ledger_sync::sync::{SyncEngine, SyncSettings};

pub const REPORTER: &str = "0xabc0000000000000000000000000000000000001";
pub const ORACLE: &str = "0x8cfc184c877154a8f9ffe0fe75649dbe5e2dbebf";
pub const STRANGER: &str = "0x2222222222222222222222222222222222222222";

/// Serves rows newest first within the requested bounds, like the real API.
#[derive(Default)]
pub struct FakeIndexer {
    pub txs: Mutex<Vec<RawTransaction>>,
    pub transfers: Mutex<Vec<RawTransfer>>,
    pub tx_requests: AtomicU32,
    pub transfer_requests: AtomicU32,
    pub fail_transfers: AtomicBool,
    pub delay: Option<Duration>,
    in_flight: AtomicU32,
    pub max_in_flight: AtomicU32,
}

impl FakeIndexer {
    pub fn new(txs: Vec<RawTransaction>, transfers: Vec<RawTransfer>) -> Self {
        Self {
            txs: Mutex::new(txs),
            transfers: Mutex::new(transfers),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn page<T: Clone>(rows: &[T], block: impl Fn(&T) -> u64, request: &PageRequest) -> Vec<T> {
        let mut page: Vec<T> = rows
            .iter()
            .filter(|row| block(row) >= request.from_block && block(row) <= request.to_block)
            .cloned()
            .collect();
        page.sort_by_key(|row| std::cmp::Reverse(block(row)));
        page.truncate(request.limit as usize);
        page
    }
}

#[async_trait]
impl IndexerApi for FakeIndexer {
    async fn transactions_page(&self, request: &PageRequest) -> LedgerResult<Vec<RawTransaction>> {
        self.tx_requests.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let page = {
            let txs = self.txs.lock().expect("lock");
            Self::page(&txs, |tx| tx.block_number, request)
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(page)
    }

    async fn transfers_page(&self, request: &PageRequest) -> LedgerResult<Vec<RawTransfer>> {
        self.transfer_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(LedgerError::indexer("HTTP 503 from indexer", None));
        }

        let transfers = self.transfers.lock().expect("lock");
        Ok(Self::page(&transfers, |t| t.block_number, request))
    }
}

/// Fixed prices and a settable chain head.
pub struct FakeOracle {
    pub head: AtomicU64,
}

impl FakeOracle {
    pub fn at(head: u64) -> Self {
        Self {
            head: AtomicU64::new(head),
        }
    }
}

#[async_trait]
impl MarketOracle for FakeOracle {
    async fn spot_price(&self, symbol: &str) -> LedgerResult<f64> {
        match symbol {
            "ETH" => Ok(2_000.0),
            "TRB" => Ok(100.0),
            other => Err(LedgerError::rpc(format!("no quote for {other}"), None)),
        }
    }

    async fn gas_price(&self) -> LedgerResult<u128> {
        Ok(20_000_000_000)
    }

    async fn chain_head_block(&self) -> LedgerResult<u64> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn chain_head_timestamp(&self) -> LedgerResult<u64> {
        Ok(1_700_000_000)
    }

    async fn is_contract(&self, address: &str) -> LedgerResult<bool> {
        Ok(address == ORACLE)
    }

    async fn last_submission_time(&self) -> LedgerResult<u64> {
        Ok(1_699_999_000)
    }
}

/// Ledger store whose writes always fail; reads go to the repository.
pub struct FailingWrites(pub Repository);

#[async_trait]
impl LedgerStore for FailingWrites {
    async fn upsert_records(&self, _records: &[LedgerRecord]) -> LedgerResult<usize> {
        Err(LedgerError::database("disk I/O error", None))
    }

    async fn ledger(&self, address: &str, hide_failed: bool) -> LedgerResult<Vec<LedgerRecord>> {
        self.0.get_ledger(address, hide_failed).await
    }

    async fn recent_rewarded(&self, limit: u32) -> LedgerResult<Vec<LedgerRecord>> {
        self.0.recent_rewarded(limit).await
    }
}

/// Cursor store pinned to one starting block, so a pass can be replayed.
pub struct PinnedCursor(pub u64);

#[async_trait]
impl CursorStore for PinnedCursor {
    async fn get(&self, _address: &str) -> LedgerResult<Option<u64>> {
        Ok(Some(self.0))
    }

    async fn advance(&self, _address: &str, block: u64) -> LedgerResult<u64> {
        Ok(block.max(self.0))
    }
}

pub async fn memory_repository() -> Repository {
    let pool = db::create_pool("sqlite::memory:").await.expect("pool");
    Repository::new(pool)
}

pub fn settings(page_size: u32) -> SyncSettings {
    SyncSettings {
        page_size,
        genesis_block: 0,
        rule: RewardRule::new(ORACLE, 10.0),
    }
}

pub fn engine(indexer: Arc<FakeIndexer>, head: u64, repo: &Repository) -> SyncEngine {
    let store = Arc::new(repo.clone());
    SyncEngine::new(
        indexer,
        Arc::new(FakeOracle::at(head)),
        store.clone(),
        store,
        settings(100),
    )
}

pub fn tx(block: u64) -> RawTransaction {
    RawTransaction {
        hash: tx_hash(block),
        block_number: block,
        block_timestamp: "2024-03-01T12:00:00.000Z".to_string(),
        gas_price: Some("20000000000".to_string()),
        receipt_gas_used: Some("150000".to_string()),
        transaction_fee: None,
        input: Some("0x5eaa9ced0000000000000000000000000000000000000000".to_string()),
        receipt_status: Some("1".to_string()),
        from_address: REPORTER.to_string(),
    }
}

pub fn failed_tx(block: u64) -> RawTransaction {
    RawTransaction {
        receipt_status: Some("0".to_string()),
        ..tx(block)
    }
}

pub fn transfer(block: u64, from: &str, value: &str) -> RawTransfer {
    RawTransfer {
        transaction_hash: tx_hash(block),
        from_address: from.to_string(),
        to_address: REPORTER.to_string(),
        value_decimal: Some(value.to_string()),
        value: None,
        token_decimals: None,
        block_number: block,
    }
}

pub fn tx_hash(block: u64) -> String {
    format!("0x{block:064x}")
}
