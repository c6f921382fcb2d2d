//! API request and response models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use crate::db::models::LedgerRecord;
use crate::oracle::SpotPrices;
use crate::query::LedgerSummary;
use crate::registry::ReporterEntry;

/// Stored ledger of one address with totals at current prices.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerResponse {
    /// Lower-case address
    pub address: String,
    /// Records, newest block first
    pub records: Vec<LedgerRecord>,
    /// Totals over `records`
    pub summary: LedgerSummary,
    /// Prices used for `summary.net_earning`
    pub prices: SpotPrices,
}

/// Query parameters for the ledger endpoint.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct LedgerQuery {
    /// Leave out reverted transactions
    #[serde(default)]
    pub hide_failed: bool,
}

/// Query parameters for recent earnings.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct RecentQuery {
    /// Records to return (1-200, default 20)
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Most recent rewarded records across all reporters.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecentEarningsResponse {
    /// Rewarded records, newest first
    pub records: Vec<LedgerRecord>,
    /// Totals over `records`
    pub summary: LedgerSummary,
    /// Prices used for `summary.net_earning`
    pub prices: SpotPrices,
}

/// Registry entry with its reporting cooldown evaluated at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReporterView {
    /// Stored entry
    #[serde(flatten)]
    pub entry: ReporterEntry,
    /// Seconds between reports at the current stake
    pub cooldown_secs: Option<u64>,
    /// Seconds until the next report is accepted; zero or negative when eligible
    pub remaining_secs: Option<i64>,
    /// Whether a report would be accepted now
    pub eligible: bool,
}

impl ReporterView {
    /// Evaluate `entry` at `now` (unix seconds).
    #[must_use]
    pub fn at(entry: ReporterEntry, now: i64) -> Self {
        Self {
            cooldown_secs: entry.cooldown_secs(),
            remaining_secs: entry.remaining_secs(now),
            eligible: entry.is_eligible(now),
            entry,
        }
    }
}

/// Every known reporter.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportersResponse {
    /// Number of reporters
    pub count: usize,
    /// Time the cooldowns were evaluated at (unix seconds)
    pub now: i64,
    /// Entries keyed by address
    pub reporters: BTreeMap<String, ReporterView>,
}

/// Operator edit of a reporter entry. Absent fields stay as they are.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateReporterRequest {
    /// Working flag
    #[serde(default)]
    pub is_working: Option<bool>,
    /// Label; an empty string clears it
    #[serde(default)]
    pub label: Option<String>,
}

/// Health status response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Overall service status
    pub status: HealthStatus,
    /// Application version
    pub version: String,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Database connectivity status
    pub database_status: HealthStatus,
    /// Registry task status
    pub registry_status: HealthStatus,
    /// JSON-RPC status
    pub rpc_status: HealthStatus,
    /// Latest block seen by the node
    pub head_block: Option<u64>,
    /// Known reporters
    pub reporters: usize,
    /// Open stream connections
    pub stream_clients: usize,
}

/// Health status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational
    Healthy,
    /// Partial degradation
    Degraded,
    /// Service unavailable
    Unhealthy,
}

/// Error response model.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type identifier
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Query parameters for the event stream.
#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct StreamQuery {
    /// Only forward events of this address
    #[serde(default)]
    pub address: Option<String>,
}

/// First message on a stream connection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StreamHello {
    /// Always `connected`
    pub event_type: String,
    /// Address filter in effect
    pub address: Option<String>,
    /// Server time (unix seconds)
    pub timestamp: i64,
}
