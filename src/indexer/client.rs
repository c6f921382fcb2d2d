//! HTTP client for a Moralis-style wallet history API.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use super::types::{Page, PageRequest, RawTransaction, RawTransfer};
use super::IndexerApi;
use crate::error::{LedgerError, LedgerResult};

/// REST client for the chain-indexing API.
///
/// Built once at start and shared; `reqwest::Client` pools connections
/// internally.
#[derive(Debug, Clone)]
pub struct MoralisClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    chain: String,
}

impl MoralisClient {
    /// Create a new indexer client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        chain: impl Into<String>,
    ) -> LedgerResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LedgerError::config("Failed to build HTTP client", Some(Box::new(e))))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chain: chain.into(),
        })
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: String,
        request: &PageRequest,
    ) -> LedgerResult<Vec<T>> {
        let response = self
            .http_client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .header("Accept", "application/json")
            .query(&[
                ("chain", self.chain.clone()),
                ("limit", request.limit.to_string()),
                ("order", "DESC".to_string()),
                ("from_block", request.from_block.to_string()),
                ("to_block", request.to_block.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                LedgerError::indexer(format!("Request to {url} failed"), Some(Box::new(e)))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::indexer(
                format!("HTTP error {status} from {url}: {body}"),
                None,
            ));
        }

        let page: Page<T> = response.json().await.map_err(|e| {
            LedgerError::decoding(format!("Malformed page from {url}"), Some(Box::new(e)))
        })?;

        debug!(rows = page.result.len(), "Page received");
        Ok(page.result)
    }
}

#[async_trait]
impl IndexerApi for MoralisClient {
    #[instrument(skip(self), fields(address = %request.address, from = request.from_block, to = request.to_block))]
    async fn transactions_page(&self, request: &PageRequest) -> LedgerResult<Vec<RawTransaction>> {
        let url = format!("{}/{}", self.base_url, request.address);
        self.get_page(url, request).await
    }

    #[instrument(skip(self), fields(address = %request.address, from = request.from_block, to = request.to_block))]
    async fn transfers_page(&self, request: &PageRequest) -> LedgerResult<Vec<RawTransfer>> {
        let url = format!("{}/{}/erc20/transfers", self.base_url, request.address);
        self.get_page(url, request).await
    }
}
