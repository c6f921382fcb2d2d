//! Wire types of the chain-indexing API.

use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Anything the pager can walk newest-to-oldest.
pub trait BlockOrdered {
    /// Block the row was included in.
    fn block_number(&self) -> u64;
}

/// One page of results, `{ "result": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    /// Rows in the page, newest first
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
}

/// Bounds of a single page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Wallet being paged
    pub address: String,
    /// Inclusive floor
    pub from_block: u64,
    /// Inclusive ceiling
    pub to_block: u64,
    /// Maximum rows
    pub limit: u32,
}

/// Native transaction of a wallet as returned by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Transaction hash
    pub hash: String,
    /// Including block
    #[serde(deserialize_with = "block_number_from_any")]
    pub block_number: u64,
    /// ISO 8601 block time
    pub block_timestamp: String,
    /// Gas price in wei
    #[serde(default)]
    pub gas_price: Option<String>,
    /// Gas used by the receipt
    #[serde(default)]
    pub receipt_gas_used: Option<String>,
    /// Precomputed fee in ETH, when the indexer supplies it
    #[serde(default)]
    pub transaction_fee: Option<String>,
    /// Call data
    #[serde(default)]
    pub input: Option<String>,
    /// `"1"` for success
    #[serde(default)]
    pub receipt_status: Option<String>,
    /// Sender
    #[serde(default)]
    pub from_address: String,
}

impl RawTransaction {
    /// `0x` + first 4 bytes of the call data, `0x` for plain value transfers.
    #[must_use]
    pub fn method_selector(&self) -> String {
        method_selector(self.input.as_deref().unwrap_or_default())
    }

    /// Block time as unix seconds.
    ///
    /// # Errors
    ///
    /// Returns a decoding error if the timestamp is not RFC 3339.
    pub fn timestamp(&self) -> LedgerResult<i64> {
        parse_timestamp(&self.block_timestamp)
    }
}

impl BlockOrdered for RawTransaction {
    fn block_number(&self) -> u64 {
        self.block_number
    }
}

/// ERC20 transfer touching a wallet as returned by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransfer {
    /// Hash of the transaction that emitted the transfer
    pub transaction_hash: String,
    /// Token sender
    pub from_address: String,
    /// Token receiver
    #[serde(default)]
    pub to_address: String,
    /// Amount already scaled by the token decimals
    #[serde(default)]
    pub value_decimal: Option<String>,
    /// Raw integer amount
    #[serde(default)]
    pub value: Option<String>,
    /// Token decimals, used with `value` when `value_decimal` is absent
    #[serde(default)]
    pub token_decimals: Option<String>,
    /// Including block
    #[serde(deserialize_with = "block_number_from_any")]
    pub block_number: u64,
}

impl RawTransfer {
    /// Token amount in whole units, if it can be determined.
    #[must_use]
    pub fn amount(&self) -> Option<f64> {
        if let Some(value) = self
            .value_decimal
            .as_deref()
            .and_then(|v| v.trim().parse::<f64>().ok())
        {
            return Some(value);
        }

        let raw = self.value.as_deref()?.trim().parse::<f64>().ok()?;
        let decimals = self.token_decimals.as_deref()?.trim().parse::<i32>().ok()?;
        Some(raw / 10f64.powi(decimals))
    }
}

impl BlockOrdered for RawTransfer {
    fn block_number(&self) -> u64 {
        self.block_number
    }
}

/// First 4 bytes of hex call data, lower-cased.
///
/// ```
/// use oracle_ledger_sync::indexer::method_selector;
///
/// assert_eq!(method_selector("0x5EAA9CED000000"), "0x5eaa9ced");
/// assert_eq!(method_selector("0x"), "0x");
/// ```
#[must_use]
pub fn method_selector(input: &str) -> String {
    let hex = input.trim().trim_start_matches("0x");
    if hex.len() >= 8 && hex.is_char_boundary(8) {
        format!("0x{}", hex[..8].to_lowercase())
    } else {
        "0x".to_string()
    }
}

/// RFC 3339 timestamp to unix seconds.
///
/// # Errors
///
/// Returns a decoding error if `raw` does not parse.
pub fn parse_timestamp(raw: &str) -> LedgerResult<i64> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.timestamp())
        .map_err(|e| {
            LedgerError::decoding(format!("Invalid block timestamp: {raw}"), Some(Box::new(e)))
        })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

// The indexer sends block numbers as strings.
fn block_number_from_any<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
