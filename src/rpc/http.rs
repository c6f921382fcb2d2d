//! HTTP JSON-RPC reads: chain head, gas price, contract code and receipts.
//!
//! ## Example
//!
//! ```no_run
//! use oracle_ledger_sync::rpc::{create_provider, get_latest_block};
//! use oracle_ledger_sync::error::LedgerResult;
//!
//! # async fn example() -> LedgerResult<()> {
//! let provider = create_provider("https://eth-mainnet.g.alchemy.com/v2/API_KEY")?;
//! let head = get_latest_block(&provider).await?;
//! println!("Head block: {head}");
//! # Ok(())
//! # }
//! ```

use crate::error::{LedgerError, LedgerResult};
use alloy::primitives::{Address, TxHash};
use alloy::providers::{Provider as _, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockNumberOrTag, BlockTransactionsKind, TransactionReceipt};
use alloy::transports::http::{Client, Http};
use tracing::{debug, info, instrument, warn};

/// HTTP provider type used throughout the crate.
pub type Provider = RootProvider<Http<Client>>;

/// Create an HTTP JSON-RPC provider.
///
/// # Errors
///
/// Returns an RPC error if the URL does not parse.
#[instrument(skip(rpc_url), fields(rpc_host = tracing::field::Empty))]
pub fn create_provider(rpc_url: &str) -> LedgerResult<Provider> {
    // Keep API keys out of the logs
    let host = rpc_url.split("/v2/").next().unwrap_or("unknown");
    tracing::Span::current().record("rpc_host", host);

    let url = rpc_url.parse().map_err(|e| {
        let msg = if rpc_url.starts_with("http") {
            format!("Failed to parse RPC URL: '{host}'")
        } else {
            format!(
                "Invalid RPC URL: '{host}'. Expected format: 'https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY'"
            )
        };
        LedgerError::rpc(msg, Some(Box::new(e)))
    })?;

    let provider = ProviderBuilder::new().on_http(url);
    info!("RPC provider initialized");

    Ok(provider)
}

/// Latest block number.
///
/// # Errors
///
/// Returns an RPC error if the request fails.
#[instrument(skip(provider), fields(block = tracing::field::Empty, duration_ms = tracing::field::Empty))]
pub async fn get_latest_block(provider: &Provider) -> LedgerResult<u64> {
    let start = std::time::Instant::now();
    let block_number = provider
        .get_block_number()
        .await
        .map_err(|e| LedgerError::rpc("Failed to fetch latest block number", Some(Box::new(e))))?;

    #[allow(clippy::cast_possible_truncation)]
    let elapsed_ms = start.elapsed().as_millis() as u64;
    tracing::Span::current().record("block", block_number);
    tracing::Span::current().record("duration_ms", elapsed_ms);

    debug!(block = block_number, duration_ms = elapsed_ms, "Latest block fetched");
    Ok(block_number)
}

/// Timestamp of the latest block, unix seconds.
///
/// # Errors
///
/// Returns an RPC error if the request fails or the node has no latest block.
pub async fn get_head_timestamp(provider: &Provider) -> LedgerResult<u64> {
    let block = provider
        .get_block_by_number(BlockNumberOrTag::Latest, BlockTransactionsKind::Hashes)
        .await
        .map_err(|e| LedgerError::rpc("Failed to fetch latest block", Some(Box::new(e))))?
        .ok_or_else(|| LedgerError::rpc("Node returned no latest block", None))?;

    Ok(block.header.timestamp)
}

/// Current gas price in wei.
///
/// # Errors
///
/// Returns an RPC error if the request fails.
pub async fn get_gas_price(provider: &Provider) -> LedgerResult<u128> {
    provider
        .get_gas_price()
        .await
        .map_err(|e| LedgerError::rpc("Failed to fetch gas price", Some(Box::new(e))))
}

/// Whether `address` holds contract code.
///
/// # Errors
///
/// Returns an RPC error if the request fails.
pub async fn has_code(provider: &Provider, address: Address) -> LedgerResult<bool> {
    let code = provider.get_code_at(address).await.map_err(|e| {
        LedgerError::rpc(format!("Failed to fetch code of {address}"), Some(Box::new(e)))
    })?;

    Ok(!code.is_empty())
}

/// Receipt of `tx_hash`, `None` while pending.
///
/// # Errors
///
/// Returns an RPC error if the request fails.
pub async fn get_receipt(
    provider: &Provider,
    tx_hash: TxHash,
) -> LedgerResult<Option<TransactionReceipt>> {
    provider.get_transaction_receipt(tx_hash).await.map_err(|e| {
        LedgerError::rpc(format!("Failed to fetch receipt {tx_hash}"), Some(Box::new(e)))
    })
}

/// Check that the node answers.
///
/// # Errors
///
/// Returns an RPC error if the node is unreachable.
#[instrument(skip(provider))]
pub async fn check_connection(provider: &Provider) -> LedgerResult<()> {
    match get_latest_block(provider).await {
        Ok(block) => {
            info!(block, "Connection check successful");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Connection check failed");
            Err(LedgerError::rpc(
                format!("Provider connection health check failed: {e}"),
                None,
            ))
        }
    }
}
