//! Chain-indexing API integration.
//!
//! The indexer serves a wallet's native transactions and ERC20 transfers,
//! newest first, bounded by a block range. [`IndexerApi`] is the seam the sync
//! engine depends on; [`MoralisClient`] is the live implementation and
//! [`pager`] walks a range page by page.

use async_trait::async_trait;

use crate::error::LedgerResult;

mod client;
pub mod pager;
mod types;

pub use client::MoralisClient;
pub use pager::{fetch_descending, fetch_transactions, fetch_transfers, Paged};
pub use types::{
    method_selector, parse_timestamp, BlockOrdered, Page, PageRequest, RawTransaction, RawTransfer,
};

/// Single-page access to a wallet's history.
#[async_trait]
pub trait IndexerApi: Send + Sync {
    /// Up to `request.limit` native transactions, newest first.
    async fn transactions_page(&self, request: &PageRequest) -> LedgerResult<Vec<RawTransaction>>;

    /// Up to `request.limit` ERC20 transfers touching the address, newest first.
    async fn transfers_page(&self, request: &PageRequest) -> LedgerResult<Vec<RawTransfer>>;
}
