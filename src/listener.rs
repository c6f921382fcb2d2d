//! Report listener: `NewReport` logs in, registry updates out.
//!
//! Every accepted report is followed up with a receipt lookup. The reward is
//! the oracle's TRB transfer to the reporter inside that receipt, the fee is
//! `gas_used * effective_gas_price`. A stream that ends is a disconnection:
//! the socket reconnects and the subscription is renewed.

use alloy::primitives::{Address, Log, TxHash, U256};
use alloy::rpc::types::Log as RpcLog;
use futures_util::StreamExt;
use tracing::{debug, error, info, instrument, warn};

use crate::address::format_address;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{decode_new_report, receipt_fee, reward_from_logs, ReportEvent, ReportLog};
use crate::reconcile::RewardRule;
use crate::registry::RegistryHandle;
use crate::rpc::{get_receipt, Provider, ReconnectingWebSocket};

/// Subscribes to oracle reports and feeds the registry.
pub struct ReportListener {
    ws: ReconnectingWebSocket,
    provider: Provider,
    oracle: Address,
    rule: RewardRule,
    registry: RegistryHandle,
}

impl ReportListener {
    /// Listener over a WebSocket endpoint for logs and an HTTP provider for
    /// receipts.
    #[must_use]
    pub const fn new(
        ws: ReconnectingWebSocket,
        provider: Provider,
        oracle: Address,
        rule: RewardRule,
        registry: RegistryHandle,
    ) -> Self {
        Self {
            ws,
            provider,
            oracle,
            rule,
            registry,
        }
    }

    /// Listen until reconnection gives up or the registry stops.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::MaxReconnectAttemptsExceeded`] once the socket
    /// cannot be re-established, or a registry error if the registry task is
    /// gone.
    pub async fn run(mut self) -> LedgerResult<()> {
        self.ws.connect().await.map_err(|e| {
            LedgerError::max_reconnect_exceeded(self.ws.max_attempts(), e.to_string())
        })?;

        loop {
            match self.listen().await {
                Err(e @ LedgerError::RegistryError { .. }) => {
                    error!(error = %e, "Registry stopped, listener exiting");
                    return Err(e);
                }
                Err(e) => warn!(error = %e, "Report stream interrupted"),
                Ok(()) => {}
            }

            self.ws.reconnect().await.map_err(|e| {
                LedgerError::max_reconnect_exceeded(self.ws.max_attempts(), e.to_string())
            })?;
        }
    }

    /// One subscription lifetime. Returns when the stream ends.
    async fn listen(&self) -> LedgerResult<()> {
        let ws = self
            .ws
            .provider()
            .ok_or_else(|| LedgerError::subscription("WebSocket not connected", None))?;

        let stream = ws.subscribe_reports(self.oracle).await?;
        let mut stream = std::pin::pin!(stream);
        info!(oracle = %self.oracle, "Listening for reports");

        while let Some(log) = stream.next().await {
            match self.handle_log(&log).await {
                Ok(event) => self.registry.report(event).await?,
                Err(e) => warn!(
                    tx_hash = ?log.transaction_hash,
                    error = %e,
                    "Skipping report"
                ),
            }
        }

        Err(LedgerError::subscription("NewReport stream ended", None))
    }

    #[instrument(skip(self, log), fields(tx_hash = ?log.transaction_hash))]
    async fn handle_log(&self, log: &RpcLog) -> LedgerResult<ReportEvent> {
        let report = decode_new_report(&log.inner.data)?;
        let tx_hash = log
            .transaction_hash
            .ok_or_else(|| LedgerError::decoding("Report log without transaction hash", None))?;

        let receipt = get_receipt(&self.provider, tx_hash)
            .await?
            .ok_or_else(|| LedgerError::rpc(format!("Receipt {tx_hash} not available"), None))?;

        let logs: Vec<&Log> = receipt.inner.logs().iter().map(|l| &l.inner).collect();

        let event = assemble_event(
            &report,
            tx_hash,
            log.block_number.or(receipt.block_number).unwrap_or_default(),
            logs,
            U256::from(receipt.gas_used),
            U256::from(receipt.effective_gas_price),
            &self.rule,
        )?;

        debug!(
            reporter = %event.reporter,
            reward = event.reward,
            fee = event.fee,
            "Report received"
        );
        Ok(event)
    }
}

/// Build the registry event for one report from its receipt data.
///
/// # Errors
///
/// Returns a decoding error if the report time or the fee is out of range.
pub fn assemble_event<'a>(
    report: &ReportLog,
    tx_hash: TxHash,
    block_number: u64,
    receipt_logs: impl IntoIterator<Item = &'a Log>,
    gas_used: U256,
    effective_gas_price: U256,
    rule: &RewardRule,
) -> LedgerResult<ReportEvent> {
    let time = u64::try_from(report.time)
        .ok()
        .and_then(|t| i64::try_from(t).ok())
        .ok_or_else(|| LedgerError::decoding(format!("Report time out of range: {}", report.time), None))?;

    Ok(ReportEvent {
        reporter: format_address(report.reporter),
        tx_hash: format!("{tx_hash:#x}"),
        block_number,
        time,
        reward: reward_from_logs(receipt_logs, report.reporter, rule),
        fee: receipt_fee(gas_used, effective_gas_price)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Transfer;
    use alloy::primitives::{address, b256};
    use alloy::sol_types::SolEvent;

    const ORACLE: Address = address!("8cFc184c877154a8F9ffE0fe75649dbe5e2DBEbf");
    const TRB: Address = address!("88dF592F8eb5D7Bd38bFeF7dEb0fBc02cf3778a0");
    const REPORTER: Address = address!("AbC0000000000000000000000000000000000001");

    fn rule() -> RewardRule {
        RewardRule::new(&format_address(ORACLE), 10.0)
    }

    fn reward_log(value: U256) -> Log {
        Log {
            address: TRB,
            data: Transfer {
                from: ORACLE,
                to: REPORTER,
                value,
            }
            .encode_log_data(),
        }
    }

    #[test]
    fn test_assemble_event() {
        let report = ReportLog {
            reporter: REPORTER,
            time: U256::from(1_700_000_000u64),
        };
        let hash = b256!("00000000000000000000000000000000000000000000000000000000000000aa");
        // 1.5 TRB
        let logs = vec![reward_log(U256::from(1_500_000_000_000_000_000u128))];

        let event = assemble_event(
            &report,
            hash,
            19_000_000,
            &logs,
            U256::from(200_000u64),
            U256::from(10_000_000_000u64),
            &rule(),
        )
        .expect("event");

        assert_eq!(event.reporter, "0xabc0000000000000000000000000000000000001");
        assert_eq!(event.tx_hash, format!("{hash:#x}"));
        assert_eq!(event.time, 1_700_000_000);
        assert!((event.reward - 1.5).abs() < 1e-9);
        assert!((event.fee - 0.002).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_time() {
        let report = ReportLog {
            reporter: REPORTER,
            time: U256::MAX,
        };

        let result = assemble_event(
            &report,
            TxHash::ZERO,
            1,
            std::iter::empty(),
            U256::ZERO,
            U256::ZERO,
            &rule(),
        );
        assert!(matches!(result, Err(LedgerError::DecodingError { .. })));
    }
}
