//! Transaction and transfer reconciliation.
//!
//! The indexer serves native transactions and ERC20 transfers as two unrelated
//! streams. A reward is the transfer sent by the oracle contract inside one of
//! the wallet's transactions; this module joins the two streams on the
//! transaction hash and produces one [`LedgerRecord`] per transaction.
//!
//! Rules:
//! - only transfers whose sender is the reward contract count
//! - the first such transfer in list order wins; extra matches are logged
//! - amounts above the ceiling are treated as misattributed and zeroed
//! - fee is the indexer's `transaction_fee` when present, otherwise
//!   `gas_used * gas_price` in wei scaled to ETH

use alloy::primitives::U256;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::db::models::{LedgerRecord, TxStatus};
use crate::error::{LedgerError, LedgerResult};
use crate::indexer::{RawTransaction, RawTransfer};

const WEI_PER_ETH: f64 = 1e18;

/// Which transfers count as rewards.
#[derive(Debug, Clone)]
pub struct RewardRule {
    contract: String,
    ceiling: f64,
}

impl RewardRule {
    /// `contract` is compared case-insensitively.
    #[must_use]
    pub fn new(contract: &str, ceiling: f64) -> Self {
        Self {
            contract: contract.trim().to_lowercase(),
            ceiling,
        }
    }

    /// Lower-case reward contract address.
    #[must_use]
    pub fn contract(&self) -> &str {
        &self.contract
    }

    /// Largest amount accepted as a single reward.
    #[must_use]
    pub const fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Reward for a matched transfer amount: the amount itself when plausible,
    /// otherwise 0.
    #[must_use]
    pub fn apply_ceiling(&self, amount: f64) -> f64 {
        if amount.is_finite() && amount >= 0.0 && amount <= self.ceiling {
            amount
        } else {
            0.0
        }
    }
}

/// Output of one reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    /// One record per transaction, input order preserved
    pub records: Vec<LedgerRecord>,
    /// Records with a non-zero reward
    pub rewarded: usize,
    /// Matches dropped by the ceiling
    pub capped: usize,
    /// Transactions with more than one candidate transfer
    pub ambiguous: usize,
}

/// Join `transactions` with `transfers` for `address`.
///
/// # Errors
///
/// Returns a decoding error if a transaction carries an unparseable block
/// timestamp.
pub fn reconcile(
    address: &str,
    transactions: &[RawTransaction],
    transfers: &[RawTransfer],
    rule: &RewardRule,
) -> LedgerResult<Reconciled> {
    let index = reward_index(transfers, rule);
    let created_at = chrono::Utc::now().timestamp();
    let mut out = Reconciled {
        records: Vec::with_capacity(transactions.len()),
        ..Reconciled::default()
    };

    for tx in transactions {
        let hash = tx.hash.to_lowercase();
        let candidates = index.get(hash.as_str()).map_or(&[][..], Vec::as_slice);

        if candidates.len() > 1 {
            out.ambiguous += 1;
            warn!(
                tx_hash = %hash,
                matches = candidates.len(),
                "Multiple reward transfers for one transaction, using the first"
            );
        }

        let reward = match candidates.first() {
            Some(transfer) => {
                let amount = transfer.amount().unwrap_or_else(|| {
                    warn!(tx_hash = %hash, "Reward transfer without a readable amount");
                    0.0
                });
                let reward = rule.apply_ceiling(amount);
                if reward <= 0.0 && amount > 0.0 {
                    out.capped += 1;
                    debug!(tx_hash = %hash, amount, ceiling = rule.ceiling, "Reward above ceiling ignored");
                }
                reward
            }
            None => 0.0,
        };

        if reward > 0.0 {
            out.rewarded += 1;
        }

        out.records.push(enrich(address, tx, &hash, reward, created_at)?);
    }

    Ok(out)
}

/// Transfers from the reward contract grouped by transaction hash, list order
/// kept inside each group.
fn reward_index<'a>(
    transfers: &'a [RawTransfer],
    rule: &RewardRule,
) -> HashMap<String, Vec<&'a RawTransfer>> {
    let mut index: HashMap<String, Vec<&RawTransfer>> = HashMap::new();
    for transfer in transfers
        .iter()
        .filter(|t| t.from_address.trim().eq_ignore_ascii_case(&rule.contract))
    {
        index
            .entry(transfer.transaction_hash.to_lowercase())
            .or_default()
            .push(transfer);
    }
    index
}

#[allow(clippy::cast_possible_wrap)]
fn enrich(
    address: &str,
    tx: &RawTransaction,
    hash: &str,
    reward: f64,
    created_at: i64,
) -> LedgerResult<LedgerRecord> {
    Ok(LedgerRecord {
        address: address.to_string(),
        hash: hash.to_string(),
        block_number: tx.block_number as i64,
        block_timestamp: tx.timestamp()?,
        fee: transaction_fee(tx),
        gas_price: tx.gas_price.clone().unwrap_or_else(|| "0".to_string()),
        gas_used: tx.receipt_gas_used.clone().unwrap_or_else(|| "0".to_string()),
        method_selector: tx.method_selector(),
        status: TxStatus::from_receipt(tx.receipt_status.as_deref()),
        reward_amount: reward,
        created_at,
    })
}

/// Fee paid by `tx` in ETH.
///
/// Falls back to 0 with a warning when neither the precomputed fee nor the
/// gas fields are usable.
#[must_use]
pub fn transaction_fee(tx: &RawTransaction) -> f64 {
    if let Some(fee) = tx
        .transaction_fee
        .as_deref()
        .and_then(|f| f.trim().parse::<f64>().ok())
        .filter(|f| f.is_finite() && *f >= 0.0)
    {
        return fee;
    }

    let gas_used = tx.receipt_gas_used.as_deref().unwrap_or("0");
    let gas_price = tx.gas_price.as_deref().unwrap_or("0");

    fee_from_gas(gas_used, gas_price).unwrap_or_else(|e| {
        warn!(tx_hash = %tx.hash, error = %e, "Could not derive transaction fee");
        0.0
    })
}

/// `gas_used * gas_price` wei as ETH.
///
/// # Errors
///
/// Returns a decoding error if either input is not a decimal integer or the
/// product overflows.
pub fn fee_from_gas(gas_used: &str, gas_price: &str) -> LedgerResult<f64> {
    let parse = |raw: &str, what: &str| {
        U256::from_str_radix(raw.trim(), 10).map_err(|e| {
            LedgerError::decoding(format!("Invalid {what}: {raw}"), Some(Box::new(e)))
        })
    };

    let wei = parse(gas_used, "gas used")?
        .checked_mul(parse(gas_price, "gas price")?)
        .ok_or_else(|| LedgerError::decoding("Overflow computing transaction fee", None))?;

    from_wei(wei)
}

/// 18-decimal integer amount (wei, or TRB base units) in whole units.
///
/// # Errors
///
/// Returns a decoding error if the amount does not fit in 128 bits.
pub fn from_wei(amount: U256) -> LedgerResult<f64> {
    let amount = u128::try_from(amount)
        .map_err(|e| LedgerError::decoding("Amount too large", Some(Box::new(e))))?;

    #[allow(clippy::cast_precision_loss)]
    let units = amount as f64 / WEI_PER_ETH;
    Ok(units)
}
