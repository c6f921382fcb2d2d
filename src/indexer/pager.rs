//! Reverse-chronological pagination over a bounded block range.
//!
//! Pages are requested newest first with a moving ceiling: after each page the
//! next ceiling is one block below the oldest row seen. Pagination ends on an
//! empty page, on a page shorter than the requested size, or when the ceiling
//! drops below the floor.

use std::future::Future;
use tracing::debug;

use super::types::{BlockOrdered, PageRequest, RawTransaction, RawTransfer};
use super::IndexerApi;
use crate::error::LedgerResult;

/// Rows collected by one pagination run.
#[derive(Debug, Clone)]
pub struct Paged<T> {
    /// Every row, in the order pages were served
    pub items: Vec<T>,
    /// Page requests issued
    pub requests: u32,
}

/// Walk `[from_block, to_block]` from the top down, one page at a time.
///
/// Any page error aborts the run and is returned unchanged; partial results are
/// discarded.
///
/// # Errors
///
/// Propagates the first error returned by `fetch_page`.
pub async fn fetch_descending<T, F, Fut>(
    address: &str,
    from_block: u64,
    to_block: u64,
    page_size: u32,
    mut fetch_page: F,
) -> LedgerResult<Paged<T>>
where
    T: BlockOrdered,
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = LedgerResult<Vec<T>>>,
{
    let page_size = page_size.max(1);
    let mut items = Vec::new();
    let mut requests = 0_u32;
    let mut ceiling = to_block;

    while ceiling >= from_block {
        let page = fetch_page(PageRequest {
            address: address.to_string(),
            from_block,
            to_block: ceiling,
            limit: page_size,
        })
        .await?;
        requests += 1;

        let Some(oldest) = page.iter().map(BlockOrdered::block_number).min() else {
            break;
        };

        let short_page = page.len() < page_size as usize;
        debug!(rows = page.len(), ceiling, oldest, "Fetched page");
        items.extend(page);

        if short_page {
            break;
        }

        match oldest.checked_sub(1) {
            Some(next) => ceiling = next,
            None => break,
        }
    }

    Ok(Paged { items, requests })
}

/// All transactions of `address` in `[from_block, to_block]`.
///
/// # Errors
///
/// Propagates any page error.
pub async fn fetch_transactions(
    api: &dyn IndexerApi,
    address: &str,
    from_block: u64,
    to_block: u64,
    page_size: u32,
) -> LedgerResult<Paged<RawTransaction>> {
    fetch_descending(address, from_block, to_block, page_size, |request| async move {
        api.transactions_page(&request).await
    })
    .await
}

/// All ERC20 transfers touching `address` in `[from_block, to_block]`.
///
/// # Errors
///
/// Propagates any page error.
pub async fn fetch_transfers(
    api: &dyn IndexerApi,
    address: &str,
    from_block: u64,
    to_block: u64,
    page_size: u32,
) -> LedgerResult<Paged<RawTransfer>> {
    fetch_descending(address, from_block, to_block, page_size, |request| async move {
        api.transfers_page(&request).await
    })
    .await
}
