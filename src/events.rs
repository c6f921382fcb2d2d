//! Oracle contract bindings and report decoding.
//!
//! `NewReport` is emitted by the Tellor Flex oracle for every accepted value.
//! The reward for that report is paid in the same transaction as an ERC20
//! `Transfer` from the oracle contract to the reporter, so a report's earning
//! is read back from the transaction receipt.

use alloy::primitives::{Address, Log, LogData, U256};
use alloy::rpc::types::Filter;
use alloy::sol;
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::address::format_address;
use crate::error::{LedgerError, LedgerResult};
use crate::reconcile::{from_wei, RewardRule};

sol! {
    #[sol(rpc)]
    interface ITellorFlex {
        event NewReport(
            bytes32 indexed _queryId,
            uint256 indexed _time,
            bytes _value,
            uint256 _nonce,
            bytes _queryData,
            address indexed _reporter
        );

        function getTimeOfLastNewValue() external view returns (uint256);
    }

    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 value);
    }
}

pub use IERC20::Transfer;
pub use ITellorFlex::NewReport;

/// A report accepted by the oracle, with the earning it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReportEvent {
    /// Reporter (lower-case `0x` hex)
    pub reporter: String,
    /// Transaction that carried the report
    pub tx_hash: String,
    /// Including block
    pub block_number: u64,
    /// Report time as stamped by the oracle (unix seconds)
    pub time: i64,
    /// Reward paid to the reporter in this transaction (TRB)
    pub reward: f64,
    /// Fee paid for the transaction (ETH)
    pub fee: f64,
}

/// Indexed fields of a decoded `NewReport` log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLog {
    /// Reporter that submitted the value
    pub reporter: Address,
    /// Oracle report time
    pub time: U256,
}

/// Subscription filter for `NewReport` logs of `oracle`.
#[must_use]
pub fn new_report_filter(oracle: Address) -> Filter {
    Filter::new()
        .address(oracle)
        .event_signature(NewReport::SIGNATURE_HASH)
}

/// Decode a `NewReport` log.
///
/// # Errors
///
/// Returns a decoding error if the topics or data do not match the event.
pub fn decode_new_report(log: &LogData) -> LedgerResult<ReportLog> {
    let event = NewReport::decode_log_data(log, true).map_err(|e| {
        LedgerError::decoding("Failed to decode NewReport log", Some(Box::new(e)))
    })?;

    Ok(ReportLog {
        reporter: event._reporter,
        time: event._time,
    })
}

/// Reward paid by the oracle to `reporter` among `logs`.
///
/// The first `Transfer` from the oracle contract to the reporter counts; the
/// ceiling of `rule` applies.
#[must_use]
pub fn reward_from_logs<'a>(
    logs: impl IntoIterator<Item = &'a Log>,
    reporter: Address,
    rule: &RewardRule,
) -> f64 {
    for log in logs {
        let Ok(transfer) = Transfer::decode_log_data(&log.data, true) else {
            continue;
        };
        if !format_address(transfer.from).eq_ignore_ascii_case(rule.contract())
            || transfer.to != reporter
        {
            continue;
        }

        return match from_wei(transfer.value) {
            Ok(amount) => rule.apply_ceiling(amount),
            Err(e) => {
                debug!(error = %e, "Unreadable reward amount");
                0.0
            }
        };
    }

    0.0
}

/// `gas_used * effective_gas_price` as ETH.
///
/// # Errors
///
/// Returns a decoding error on overflow.
pub fn receipt_fee(gas_used: U256, effective_gas_price: U256) -> LedgerResult<f64> {
    let wei = gas_used
        .checked_mul(effective_gas_price)
        .ok_or_else(|| LedgerError::decoding("Overflow computing receipt fee", None))?;
    from_wei(wei)
}
