//! Shared application state for the API server and the event stream.

use std::sync::{atomic::AtomicUsize, Arc};
use std::time::SystemTime;

use crate::db::repository::Repository;
use crate::feed::{FeedEvent, FeedSender};
use crate::oracle::MarketOracle;
use crate::query::QueryService;
use crate::registry::RegistryHandle;
use crate::sync::SyncEngine;

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository for database access.
    pub repository: Arc<Repository>,
    /// Sync passes, one in flight per address.
    pub engine: Arc<SyncEngine>,
    /// Ledger reads.
    pub query: QueryService,
    /// Reporter registry task.
    pub registry: RegistryHandle,
    /// Prices and chain reads.
    pub oracle: Arc<dyn MarketOracle>,
    /// Live sync and report events.
    pub feed: FeedSender,
    /// Open stream connections.
    pub stream_clients: Arc<AtomicUsize>,
    /// Application start time for uptime tracking.
    pub start_time: SystemTime,
}

impl AppState {
    /// Create a new `AppState` instance.
    #[must_use]
    pub fn new(
        repository: Repository,
        engine: Arc<SyncEngine>,
        registry: RegistryHandle,
        oracle: Arc<dyn MarketOracle>,
        feed: FeedSender,
    ) -> Self {
        let repository = Arc::new(repository);

        Self {
            query: QueryService::new(repository.clone()),
            repository,
            engine,
            registry,
            oracle,
            feed,
            stream_clients: Arc::new(AtomicUsize::new(0)),
            start_time: SystemTime::now(),
        }
    }

    /// Broadcast an event to all stream subscribers.
    pub fn publish(&self, event: FeedEvent) {
        let _ = self.feed.send(event);
    }
}
