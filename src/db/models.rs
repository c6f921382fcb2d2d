//! Database models that map to SQL tables.
//!
//! These structures represent rows in the database and the conversions
//! between them and the in-memory registry types.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use utoipa::ToSchema;

use crate::error::{LedgerError, LedgerResult};
use crate::registry::{RecentReward, ReporterEntry};

/// Per-address sync watermark.
///
/// Maps to the `address_cursors` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AddressCursor {
    /// Lower-case `0x` address
    pub address: String,
    /// Next block to fetch from (inclusive)
    pub last_synced_block: i64,
    /// Unix timestamp of the last advance
    pub updated_at: i64,
}

/// Receipt status of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TxStatus {
    /// Receipt status 1
    Success,
    /// Anything else, including missing receipts
    Failed,
}

impl TxStatus {
    /// Map the indexer's `receipt_status` string.
    #[must_use]
    pub fn from_receipt(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("1") => Self::Success,
            _ => Self::Failed,
        }
    }
}

/// One enriched transaction of a tracked wallet.
///
/// Maps to the `ledger_records` table; `(address, hash)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct LedgerRecord {
    /// Tracked wallet (lower-case `0x` hex)
    pub address: String,
    /// Transaction hash
    pub hash: String,
    /// Block number
    pub block_number: i64,
    /// Block timestamp (unix seconds)
    pub block_timestamp: i64,
    /// Fee paid in ETH
    pub fee: f64,
    /// Gas price in wei, decimal string
    pub gas_price: String,
    /// Gas used, decimal string
    pub gas_used: String,
    /// `0x` + first 4 bytes of call data, or `0x` for plain transfers
    pub method_selector: String,
    /// Receipt status
    pub status: TxStatus,
    /// Reward received in this transaction (TRB)
    pub reward_amount: f64,
    /// Unix timestamp when the row was first written
    pub created_at: i64,
}

impl LedgerRecord {
    /// Block number as stored upstream.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn block(&self) -> u64 {
        self.block_number as u64
    }

    /// Whether the transaction executed successfully.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == TxStatus::Success
    }
}

/// Raw `reporters` row. `recent_rewards` is JSON text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReporterRow {
    /// Lower-case `0x` address
    pub address: String,
    /// Address holds contract code
    pub is_contract: bool,
    /// Operator flag
    pub is_working: bool,
    /// Cursor mirror, updated after each sync pass
    pub last_synced_block: Option<i64>,
    /// JSON array of [`RecentReward`], most recent first
    pub recent_rewards: String,
    /// Unix timestamp of the latest report
    pub last_report_at: Option<i64>,
    /// Operator label
    pub label: Option<String>,
    /// Staked balance (TRB)
    pub stake: Option<f64>,
    /// Balance locked for withdrawal (TRB)
    pub locked_balance: Option<f64>,
    /// Unix timestamp of the last write
    pub updated_at: i64,
}

impl ReporterRow {
    /// Flatten an entry for storage.
    ///
    /// # Errors
    ///
    /// Returns a decoding error if the reward list cannot be serialized.
    #[allow(clippy::cast_possible_wrap)]
    pub fn from_entry(entry: &ReporterEntry) -> LedgerResult<Self> {
        let recent_rewards = serde_json::to_string(&entry.recent_rewards).map_err(|e| {
            LedgerError::decoding("Failed to encode recent rewards", Some(Box::new(e)))
        })?;

        Ok(Self {
            address: entry.address.clone(),
            is_contract: entry.is_contract,
            is_working: entry.is_working,
            last_synced_block: entry.last_synced_block.map(|b| b as i64),
            recent_rewards,
            last_report_at: entry.last_report_at,
            label: entry.label.clone(),
            stake: entry.stake,
            locked_balance: entry.locked_balance,
            updated_at: chrono::Utc::now().timestamp(),
        })
    }

    /// Rebuild the registry entry.
    ///
    /// # Errors
    ///
    /// Returns a decoding error if `recent_rewards` is not a valid JSON list.
    #[allow(clippy::cast_sign_loss)]
    pub fn into_entry(self) -> LedgerResult<ReporterEntry> {
        let recent_rewards: VecDeque<RecentReward> = serde_json::from_str(&self.recent_rewards)
            .map_err(|e| {
                LedgerError::decoding(
                    format!("Corrupt recent rewards for reporter {}", self.address),
                    Some(Box::new(e)),
                )
            })?;

        Ok(ReporterEntry {
            address: self.address,
            is_contract: self.is_contract,
            is_working: self.is_working,
            last_synced_block: self.last_synced_block.map(|b| b.max(0) as u64),
            recent_rewards,
            last_report_at: self.last_report_at,
            label: self.label,
            stake: self.stake,
            locked_balance: self.locked_balance,
        })
    }
}
