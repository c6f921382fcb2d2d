//! Reporter registry.
//!
//! One updater task owns the map of reporter entries. Everything else talks to
//! it through a cloneable [`RegistryHandle`]: report events, sync progress and
//! operator edits and staker refreshes arrive as commands, snapshots leave
//! through a oneshot reply. Each mutation is applied to a copy of the entry,
//! written back to the store as a single-row upsert, and only then replaces the
//! entry in the map: the map never shows a change the store rejected.
//!
//! ```text
//!  ReportListener ─┐
//!  SyncOrchestrator┤
//!  StakerSource ───┼─► mpsc ─► updater task ─► BTreeMap<address, ReporterEntry>
//!  REST / CLI ─────┘                     └──► RegistryStore (reporters table)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::address::normalize_address;
use crate::error::{LedgerError, LedgerResult};
use crate::events::ReportEvent;
use crate::feed::{FeedEvent, FeedSender};
use crate::oracle::MarketOracle;
use crate::stakers::{self, Staker};
use crate::store::RegistryStore;

/// Recent rewards kept per reporter.
pub const RECENT_REWARDS_CAP: usize = 10;

const COMMAND_BUFFER: usize = 256;

/// One reward as shown in a reporter's recent list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecentReward {
    /// Transaction that paid the reward
    pub tx_hash: String,
    /// Reward (TRB)
    pub reward: f64,
    /// Fee paid for the transaction (ETH)
    pub fee: f64,
    /// Report time (unix seconds)
    pub timestamp: i64,
}

/// Metadata tracked per reporter address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReporterEntry {
    /// Lower-case `0x` address
    pub address: String,
    /// Address holds contract code
    pub is_contract: bool,
    /// Operator flag, set again by every report
    pub is_working: bool,
    /// Mirror of the address cursor after the latest sync pass
    pub last_synced_block: Option<u64>,
    /// Most recent first, at most [`RECENT_REWARDS_CAP`]
    #[schema(value_type = Vec<RecentReward>)]
    pub recent_rewards: VecDeque<RecentReward>,
    /// Time of the latest report (unix seconds)
    pub last_report_at: Option<i64>,
    /// Operator label
    pub label: Option<String>,
    /// Staked balance (TRB), `None` when not a listed staker
    pub stake: Option<f64>,
    /// Balance locked for withdrawal (TRB)
    pub locked_balance: Option<f64>,
}

impl ReporterEntry {
    /// Fresh entry for a newly observed address.
    #[must_use]
    pub const fn new(address: String, is_contract: bool) -> Self {
        Self {
            address,
            is_contract,
            is_working: true,
            last_synced_block: None,
            recent_rewards: VecDeque::new(),
            last_report_at: None,
            label: None,
            stake: None,
            locked_balance: None,
        }
    }

    /// Put `reward` first, dropping the oldest beyond the cap.
    pub fn push_reward(&mut self, reward: RecentReward) {
        self.recent_rewards.push_front(reward);
        self.recent_rewards.truncate(RECENT_REWARDS_CAP);
    }

    /// Apply a report event.
    pub fn record_report(&mut self, event: &ReportEvent) {
        self.push_reward(RecentReward {
            tx_hash: event.tx_hash.clone(),
            reward: event.reward,
            fee: event.fee,
            timestamp: event.time,
        });
        self.last_report_at = Some(self.last_report_at.map_or(event.time, |t| t.max(event.time)));
        self.is_working = true;
    }

    /// Raise `last_synced_block`; never lowers it.
    pub fn record_sync(&mut self, block: u64) {
        self.last_synced_block = Some(self.last_synced_block.map_or(block, |b| b.max(block)));
    }

    /// Take stake and last report time from the staking contract's listing.
    pub fn apply_staker(&mut self, staker: &Staker) {
        self.stake = Some(staker.stake);
        self.locked_balance = Some(staker.locked_balance);
        if let Some(at) = staker.last_report_at {
            self.last_report_at = Some(self.last_report_at.map_or(at, |t| t.max(at)));
        }
    }

    /// Seconds between two reports at the current stake.
    #[must_use]
    pub fn cooldown_secs(&self) -> Option<u64> {
        self.stake.and_then(stakers::cooldown_secs)
    }

    /// Seconds until the next report is allowed; zero or negative once eligible.
    #[must_use]
    pub fn remaining_secs(&self, now: i64) -> Option<i64> {
        self.stake
            .and_then(|stake| stakers::remaining_secs(now, self.last_report_at, stake))
    }

    /// Whether the reporter may submit at `now`.
    #[must_use]
    pub fn is_eligible(&self, now: i64) -> bool {
        self.stake
            .is_some_and(|stake| stakers::is_eligible(now, self.last_report_at, stake))
    }
}

/// Snapshot of the whole registry keyed by address.
pub type RegistrySnapshot = BTreeMap<String, ReporterEntry>;

enum Command {
    Report(ReportEvent),
    Synced {
        address: String,
        block: u64,
    },
    SetWorking {
        address: String,
        working: bool,
        reply: oneshot::Sender<LedgerResult<ReporterEntry>>,
    },
    SetLabel {
        address: String,
        label: Option<String>,
        reply: oneshot::Sender<LedgerResult<ReporterEntry>>,
    },
    Stakers {
        stakers: Vec<Staker>,
        reply: oneshot::Sender<LedgerResult<usize>>,
    },
    Snapshot(oneshot::Sender<RegistrySnapshot>),
}

/// Cloneable sender side of the registry.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: mpsc::Sender<Command>,
}

impl RegistryHandle {
    /// Record a report.
    ///
    /// # Errors
    ///
    /// Returns a registry error if the updater task has stopped.
    pub async fn report(&self, event: ReportEvent) -> LedgerResult<()> {
        self.send(Command::Report(event)).await
    }

    /// Note sync progress. Never fails: a stopped registry is only logged.
    pub async fn synced(&self, address: &str, block: u64) {
        let command = Command::Synced {
            address: address.to_string(),
            block,
        };
        if self.send(command).await.is_err() {
            warn!(address, block, "Registry stopped, sync progress not recorded");
        }
    }

    /// Set the operator working flag.
    ///
    /// # Errors
    ///
    /// Returns a decoding error for an invalid address, a registry error if the
    /// updater task has stopped, or the store error if persisting failed.
    pub async fn set_working(&self, address: &str, working: bool) -> LedgerResult<ReporterEntry> {
        let address = normalize_address(address)?;
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetWorking {
            address,
            working,
            reply,
        })
        .await?;
        rx.await.map_err(|_| LedgerError::registry("Registry dropped the reply"))?
    }

    /// Set or clear the operator label.
    ///
    /// # Errors
    ///
    /// Same as [`RegistryHandle::set_working`].
    pub async fn set_label(
        &self,
        address: &str,
        label: Option<String>,
    ) -> LedgerResult<ReporterEntry> {
        let address = normalize_address(address)?;
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetLabel {
            address,
            label,
            reply,
        })
        .await?;
        rx.await.map_err(|_| LedgerError::registry("Registry dropped the reply"))?
    }

    /// Merge the current staker list; entries missing from it lose their stake.
    ///
    /// Returns the number of entries written.
    ///
    /// # Errors
    ///
    /// Returns a registry error if the updater task has stopped, or the store
    /// error if no entry could be persisted.
    pub async fn apply_stakers(&self, stakers: Vec<Staker>) -> LedgerResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stakers { stakers, reply }).await?;
        rx.await.map_err(|_| LedgerError::registry("Registry dropped the reply"))?
    }

    /// Copy of every entry.
    ///
    /// # Errors
    ///
    /// Returns a registry error if the updater task has stopped.
    pub async fn snapshot(&self) -> LedgerResult<RegistrySnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply)).await?;
        rx.await
            .map_err(|_| LedgerError::registry("Registry dropped the reply"))
    }

    async fn send(&self, command: Command) -> LedgerResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| LedgerError::registry("Registry task is not running"))
    }
}

/// The updater task's state.
struct Registry {
    entries: RegistrySnapshot,
    store: Arc<dyn RegistryStore>,
    oracle: Arc<dyn MarketOracle>,
    feed: Option<FeedSender>,
}

/// Load persisted entries and start the updater task.
///
/// The task runs until every [`RegistryHandle`] is dropped.
///
/// # Errors
///
/// Returns the store error if the initial load fails.
pub async fn spawn(
    store: Arc<dyn RegistryStore>,
    oracle: Arc<dyn MarketOracle>,
    feed: Option<FeedSender>,
) -> LedgerResult<(RegistryHandle, JoinHandle<()>)> {
    let entries: RegistrySnapshot = store
        .load_reporters()
        .await?
        .into_iter()
        .map(|entry| (entry.address.clone(), entry))
        .collect();

    info!(reporters = entries.len(), "Registry loaded");

    let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
    let mut registry = Registry {
        entries,
        store,
        oracle,
        feed,
    };

    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            registry.apply(command).await;
        }
        debug!("Registry task stopped");
    });

    Ok((RegistryHandle { tx }, task))
}

impl Registry {
    async fn apply(&mut self, command: Command) {
        match command {
            Command::Report(event) => {
                if let Err(e) = self.commit(&event.reporter, |entry| entry.record_report(&event)).await {
                    warn!(address = %event.reporter, error = %e, "Failed to persist report");
                }
                if let Some(feed) = &self.feed {
                    // No subscribers is fine
                    let _ = feed.send(FeedEvent::Report(event));
                }
            }
            Command::Synced { address, block } => {
                if let Err(e) = self.commit(&address, |entry| entry.record_sync(block)).await {
                    warn!(address = %address, error = %e, "Failed to persist sync progress");
                }
            }
            Command::SetWorking {
                address,
                working,
                reply,
            } => {
                let result = self.commit(&address, |entry| entry.is_working = working).await;
                let _ = reply.send(result);
            }
            Command::SetLabel {
                address,
                label,
                reply,
            } => {
                let label = label.filter(|l| !l.trim().is_empty());
                let result = self.commit(&address, |entry| entry.label = label).await;
                let _ = reply.send(result);
            }
            Command::Stakers { stakers, reply } => {
                let _ = reply.send(self.merge_stakers(stakers).await);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.entries.clone());
            }
        }
    }

    /// Apply `change` to a copy of the entry for `address`, persist the copy,
    /// then publish it in the map. A failed write leaves the map untouched.
    async fn commit(
        &mut self,
        address: &str,
        change: impl FnOnce(&mut ReporterEntry),
    ) -> LedgerResult<ReporterEntry> {
        let mut entry = match self.entries.get(address) {
            Some(existing) => existing.clone(),
            None => self.fresh_entry(address).await,
        };
        change(&mut entry);

        self.store.save_reporter(&entry).await?;
        self.entries.insert(address.to_string(), entry.clone());
        Ok(entry)
    }

    async fn merge_stakers(&mut self, stakers: Vec<Staker>) -> LedgerResult<usize> {
        let listed: BTreeMap<String, Staker> = stakers
            .into_iter()
            .map(|staker| (staker.address.clone(), staker))
            .collect();

        let unstaked: Vec<String> = self
            .entries
            .iter()
            .filter(|(address, entry)| entry.stake.is_some() && !listed.contains_key(*address))
            .map(|(address, _)| address.clone())
            .collect();

        let mut written = 0;
        let mut first_error = None;

        for (address, staker) in &listed {
            match self.commit(address, |entry| entry.apply_staker(staker)).await {
                Ok(_) => written += 1,
                Err(e) => {
                    warn!(address = %address, error = %e, "Failed to persist staker");
                    first_error.get_or_insert(e);
                }
            }
        }

        for address in &unstaked {
            let cleared = self
                .commit(address, |entry| {
                    entry.stake = None;
                    entry.locked_balance = None;
                })
                .await;
            match cleared {
                Ok(_) => {
                    info!(address = %address, "Reporter no longer staked");
                    written += 1;
                }
                Err(e) => {
                    warn!(address = %address, error = %e, "Failed to persist unstake");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if written == 0 => Err(e),
            _ => Ok(written),
        }
    }

    /// New entry with its contract flag read from the chain.
    async fn fresh_entry(&self, address: &str) -> ReporterEntry {
        let is_contract = match self.oracle.is_contract(address).await {
            Ok(is_contract) => is_contract,
            Err(e) => {
                warn!(address, error = %e, "Contract code lookup failed, assuming EOA");
                false
            }
        };

        info!(address, is_contract, "New reporter observed");
        ReporterEntry::new(address.to_string(), is_contract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const ALICE: &str = "0xa11ce00000000000000000000000000000000001";
    const BOB: &str = "0x1111111111111111111111111111111111111111";

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<BTreeMap<String, ReporterEntry>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl RegistryStore for MemoryStore {
        async fn load_reporters(&self) -> LedgerResult<Vec<ReporterEntry>> {
            Ok(self
                .rows
                .lock()
                .map_err(|_| LedgerError::database("poisoned", None))?
                .values()
                .cloned()
                .collect())
        }

        async fn save_reporter(&self, entry: &ReporterEntry) -> LedgerResult<()> {
            if self.fail_writes {
                return Err(LedgerError::database("disk full", None));
            }
            self.rows
                .lock()
                .map_err(|_| LedgerError::database("poisoned", None))?
                .insert(entry.address.clone(), entry.clone());
            Ok(())
        }
    }

    struct CodeOracle {
        contracts: Vec<&'static str>,
        lookup_fails: bool,
    }

    #[async_trait]
    impl MarketOracle for CodeOracle {
        async fn spot_price(&self, _symbol: &str) -> LedgerResult<f64> {
            Ok(1.0)
        }
        async fn gas_price(&self) -> LedgerResult<u128> {
            Ok(1)
        }
        async fn chain_head_block(&self) -> LedgerResult<u64> {
            Ok(1)
        }
        async fn chain_head_timestamp(&self) -> LedgerResult<u64> {
            Ok(1)
        }
        async fn is_contract(&self, address: &str) -> LedgerResult<bool> {
            if self.lookup_fails {
                return Err(LedgerError::rpc("node down", None));
            }
            Ok(self.contracts.contains(&address))
        }
        async fn last_submission_time(&self) -> LedgerResult<u64> {
            Ok(1)
        }
    }

    fn oracle() -> Arc<dyn MarketOracle> {
        Arc::new(CodeOracle {
            contracts: vec![BOB],
            lookup_fails: false,
        })
    }

    fn report(reporter: &str, n: i64) -> ReportEvent {
        ReportEvent {
            reporter: reporter.to_string(),
            tx_hash: format!("0x{n:064x}"),
            block_number: 19_000_000 + n as u64,
            time: 1_700_000_000 + n,
            reward: 1.0,
            fee: 0.01,
        }
    }

    #[tokio::test]
    async fn test_recent_rewards_bounded_most_recent_first() {
        let store = Arc::new(MemoryStore::default());
        let (handle, _task) = spawn(store.clone(), oracle(), None).await.expect("spawn");

        for n in 0..15 {
            handle.report(report(ALICE, n)).await.expect("report");
        }

        let snapshot = handle.snapshot().await.expect("snapshot");
        let entry = snapshot.get(ALICE).expect("entry");

        assert_eq!(entry.recent_rewards.len(), RECENT_REWARDS_CAP);
        assert_eq!(entry.recent_rewards[0].timestamp, 1_700_000_014);
        assert_eq!(entry.recent_rewards[9].timestamp, 1_700_000_005);
        assert_eq!(entry.last_report_at, Some(1_700_000_014));

        let persisted = store.load_reporters().await.expect("load");
        assert_eq!(persisted[0].recent_rewards.len(), RECENT_REWARDS_CAP);
    }

    #[tokio::test]
    async fn test_lazy_creation_checks_contract_code() {
        let store = Arc::new(MemoryStore::default());
        let (handle, _task) = spawn(store, oracle(), None).await.expect("spawn");

        handle.synced(ALICE, 100).await;
        handle.synced(BOB, 200).await;

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert!(!snapshot[ALICE].is_contract);
        assert!(snapshot[BOB].is_contract);
        assert_eq!(snapshot[BOB].last_synced_block, Some(200));
    }

    #[tokio::test]
    async fn test_failed_code_lookup_defaults_to_eoa() {
        let store = Arc::new(MemoryStore::default());
        let failing = Arc::new(CodeOracle {
            contracts: vec![ALICE],
            lookup_fails: true,
        });
        let (handle, _task) = spawn(store, failing, None).await.expect("spawn");

        handle.report(report(ALICE, 1)).await.expect("report");

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert!(!snapshot[ALICE].is_contract);
    }

    #[tokio::test]
    async fn test_synced_never_lowers() {
        let store = Arc::new(MemoryStore::default());
        let (handle, _task) = spawn(store, oracle(), None).await.expect("spawn");

        handle.synced(ALICE, 300).await;
        handle.synced(ALICE, 250).await;

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot[ALICE].last_synced_block, Some(300));
    }

    #[tokio::test]
    async fn test_operator_edits_persist() {
        let store = Arc::new(MemoryStore::default());
        let (handle, _task) = spawn(store.clone(), oracle(), None).await.expect("spawn");

        let upper = ALICE.to_uppercase().replace("0X", "0x");
        handle.set_working(&upper, false).await.expect("working");
        let entry = handle
            .set_label(ALICE, Some("node-1".to_string()))
            .await
            .expect("label");

        assert!(!entry.is_working);
        assert_eq!(entry.label.as_deref(), Some("node-1"));

        let persisted = store.load_reporters().await.expect("load");
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].label.as_deref(), Some("node-1"));

        // A report marks the reporter working again
        handle.report(report(ALICE, 1)).await.expect("report");
        let snapshot = handle.snapshot().await.expect("snapshot");
        assert!(snapshot[ALICE].is_working);
    }

    #[tokio::test]
    async fn test_edit_reports_store_failure() {
        let store = Arc::new(MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        });
        let (handle, _task) = spawn(store, oracle(), None).await.expect("spawn");

        let result = handle.set_working(ALICE, false).await;
        assert!(matches!(result, Err(LedgerError::DatabaseError { .. })));

        // Neither the edit nor the lazily created entry survives
        let snapshot = handle.snapshot().await.expect("snapshot");
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_entry() {
        let mut existing = ReporterEntry::new(ALICE.to_string(), false);
        existing.label = Some("before".to_string());
        let store = Arc::new(MemoryStore {
            rows: Mutex::new(BTreeMap::from([(ALICE.to_string(), existing.clone())])),
            fail_writes: true,
        });
        let (handle, _task) = spawn(store, oracle(), None).await.expect("spawn");

        assert!(handle.set_working(ALICE, false).await.is_err());
        assert!(handle
            .set_label(ALICE, Some("after".to_string()))
            .await
            .is_err());
        handle.report(report(ALICE, 1)).await.expect("queued");
        handle.synced(ALICE, 500).await;

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot[ALICE], existing);
    }

    fn staker(address: &str, stake: f64, last: Option<i64>) -> Staker {
        Staker {
            address: address.to_string(),
            stake,
            locked_balance: 10.0,
            last_report_at: last,
        }
    }

    #[tokio::test]
    async fn test_stakers_merged_into_registry() {
        let store = Arc::new(MemoryStore::default());
        let (handle, _task) = spawn(store.clone(), oracle(), None).await.expect("spawn");

        // A later report time from the listener is kept
        handle.report(report(ALICE, 500)).await.expect("report");

        let written = handle
            .apply_stakers(vec![
                staker(ALICE, 200.0, Some(1_700_000_000)),
                staker(BOB, 100.0, None),
            ])
            .await
            .expect("stakers");
        assert_eq!(written, 2);

        let snapshot = handle.snapshot().await.expect("snapshot");
        let alice = &snapshot[ALICE];
        assert_eq!(alice.stake, Some(200.0));
        assert_eq!(alice.locked_balance, Some(10.0));
        assert_eq!(alice.last_report_at, Some(1_700_000_500));
        assert_eq!(alice.cooldown_secs(), Some(21_600));
        assert_eq!(alice.remaining_secs(1_700_000_500 + 600), Some(21_000));
        assert!(!alice.is_eligible(1_700_000_500 + 600));
        assert!(alice.is_eligible(1_700_000_500 + 21_600));

        // Listed but never reported: eligible, and checked for code like any new entry
        assert!(snapshot[BOB].is_contract);
        assert!(snapshot[BOB].is_eligible(0));

        let persisted = store.load_reporters().await.expect("load");
        assert_eq!(persisted.len(), 2);
    }

    #[tokio::test]
    async fn test_unlisted_staker_loses_stake() {
        let store = Arc::new(MemoryStore::default());
        let (handle, _task) = spawn(store, oracle(), None).await.expect("spawn");

        handle
            .apply_stakers(vec![staker(ALICE, 300.0, None), staker(BOB, 100.0, None)])
            .await
            .expect("first");
        handle
            .apply_stakers(vec![staker(BOB, 100.0, None)])
            .await
            .expect("second");

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot[ALICE].stake, None);
        assert_eq!(snapshot[ALICE].locked_balance, None);
        assert_eq!(snapshot[ALICE].cooldown_secs(), None);
        assert!(!snapshot[ALICE].is_eligible(i64::MAX));
        assert_eq!(snapshot[BOB].stake, Some(100.0));
    }

    #[tokio::test]
    async fn test_stakers_fail_when_nothing_persists() {
        let store = Arc::new(MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        });
        let (handle, _task) = spawn(store, oracle(), None).await.expect("spawn");

        let result = handle.apply_stakers(vec![staker(ALICE, 100.0, None)]).await;

        assert!(matches!(result, Err(LedgerError::DatabaseError { .. })));
        assert!(handle.snapshot().await.expect("snapshot").is_empty());
    }

    #[tokio::test]
    async fn test_loads_existing_entries() {
        let store = Arc::new(MemoryStore::default());
        let mut existing = ReporterEntry::new(ALICE.to_string(), true);
        existing.label = Some("kept".to_string());
        store.save_reporter(&existing).await.expect("seed");

        let (handle, _task) = spawn(store, oracle(), None).await.expect("spawn");
        let snapshot = handle.snapshot().await.expect("snapshot");

        assert_eq!(snapshot[ALICE].label.as_deref(), Some("kept"));
        assert!(snapshot[ALICE].is_contract);
    }

    #[tokio::test]
    async fn test_report_published_to_feed() {
        let store = Arc::new(MemoryStore::default());
        let (feed, mut rx) = tokio::sync::broadcast::channel(8);
        let (handle, _task) = spawn(store, oracle(), Some(feed)).await.expect("spawn");

        handle.report(report(ALICE, 3)).await.expect("report");

        match rx.recv().await.expect("event") {
            FeedEvent::Report(event) => assert_eq!(event.reporter, ALICE),
            other @ FeedEvent::Synced(_) => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let store = Arc::new(MemoryStore::default());
        let (handle, _task) = spawn(store, oracle(), None).await.expect("spawn");

        assert!(matches!(
            handle.set_working("0x123", true).await,
            Err(LedgerError::DecodingError { .. })
        ));
    }

    #[tokio::test]
    async fn test_stopped_registry() {
        let store = Arc::new(MemoryStore::default());
        let (handle, task) = spawn(store, oracle(), None).await.expect("spawn");
        task.abort();
        let _ = task.await;

        assert!(matches!(
            handle.snapshot().await,
            Err(LedgerError::RegistryError { .. })
        ));
        // Fire-and-forget path only logs
        handle.synced(ALICE, 1).await;
    }
}
