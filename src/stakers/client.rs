//! GraphQL client for the oracle's staking subgraph.

use alloy::primitives::U256;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{Staker, StakerSource, MIN_STAKE_TRB};
use crate::address::normalize_address;
use crate::error::{LedgerError, LedgerResult};
use crate::reconcile::from_wei;

/// Stakers with at least 100 TRB (in base units).
const STAKERS_QUERY: &str = r#"{
  newStakers(first: 1000, where: {_amount_gte: "100000000000000000000"}) {
    id
    _staker
    _amount
    _lockedBalance
    lastTimestamp
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphResponse {
    data: Option<StakersData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StakersData {
    new_stakers: Vec<StakerRow>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

/// Subgraph row; big integers arrive as decimal strings.
#[derive(Debug, Deserialize)]
struct StakerRow {
    id: String,
    #[serde(rename = "_staker")]
    staker: Option<String>,
    #[serde(rename = "_amount")]
    amount: String,
    #[serde(rename = "_lockedBalance")]
    locked_balance: Option<String>,
    #[serde(rename = "lastTimestamp")]
    last_timestamp: Option<String>,
}

impl StakerRow {
    fn into_staker(self) -> LedgerResult<Staker> {
        let address = normalize_address(self.staker.as_deref().unwrap_or(&self.id))?;
        let stake = base_units(&self.amount)?;
        let locked_balance = self
            .locked_balance
            .as_deref()
            .map_or(Ok(0.0), base_units)?;
        let last_report_at = match self.last_timestamp.as_deref().map(str::trim) {
            None | Some("" | "0") => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|e| {
                LedgerError::decoding(format!("Invalid lastTimestamp: {raw}"), Some(Box::new(e)))
            })?),
        };

        Ok(Staker {
            address,
            stake,
            locked_balance,
            last_report_at,
        })
    }
}

fn base_units(raw: &str) -> LedgerResult<f64> {
    let amount = U256::from_str_radix(raw.trim(), 10).map_err(|e| {
        LedgerError::decoding(format!("Invalid token amount: {raw}"), Some(Box::new(e)))
    })?;
    from_wei(amount)
}

/// Parse a subgraph response body into stakers.
///
/// Rows that fail to decode or fall below the minimum stake are skipped.
fn parse_stakers(response: GraphResponse) -> LedgerResult<Vec<Staker>> {
    if let Some(error) = response.errors.first() {
        return Err(LedgerError::indexer(
            format!("Subgraph error: {}", error.message),
            None,
        ));
    }
    let data = response
        .data
        .ok_or_else(|| LedgerError::decoding("Subgraph response without data", None))?;

    let mut stakers = Vec::with_capacity(data.new_stakers.len());
    for row in data.new_stakers {
        let id = row.id.clone();
        match row.into_staker() {
            Ok(staker) if staker.stake >= MIN_STAKE_TRB => stakers.push(staker),
            Ok(staker) => debug!(address = %staker.address, stake = staker.stake, "Below minimum stake"),
            Err(e) => warn!(id = %id, error = %e, "Skipping malformed staker row"),
        }
    }
    Ok(stakers)
}

/// Staking subgraph over HTTP.
#[derive(Debug, Clone)]
pub struct SubgraphClient {
    http_client: Client,
    url: String,
}

impl SubgraphClient {
    /// Client for the subgraph at `url`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>) -> LedgerResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LedgerError::config("Failed to build HTTP client", Some(Box::new(e))))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl StakerSource for SubgraphClient {
    #[instrument(skip(self))]
    async fn stakers(&self) -> LedgerResult<Vec<Staker>> {
        let response = self
            .http_client
            .post(&self.url)
            .json(&json!({ "query": STAKERS_QUERY }))
            .send()
            .await
            .map_err(|e| LedgerError::indexer("Subgraph request failed", Some(Box::new(e))))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::indexer(
                format!("HTTP error {status} from subgraph: {body}"),
                None,
            ));
        }

        let body: GraphResponse = response.json().await.map_err(|e| {
            LedgerError::decoding("Malformed subgraph response", Some(Box::new(e)))
        })?;

        let stakers = parse_stakers(body)?;
        debug!(stakers = stakers.len(), "Stakers received");
        Ok(stakers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(json: &str) -> GraphResponse {
        serde_json::from_str(json).expect("parse")
    }

    #[test]
    fn test_parse_staker_rows() {
        let body = response(
            r#"{"data":{"newStakers":[
                {"id":"0xAbC0000000000000000000000000000000000001",
                 "_staker":"0xabc0000000000000000000000000000000000001",
                 "_amount":"300000000000000000000",
                 "_lockedBalance":"50000000000000000000",
                 "lastTimestamp":"1700000000"},
                {"id":"0x2222222222222222222222222222222222222222",
                 "_staker":null,
                 "_amount":"100000000000000000000",
                 "_lockedBalance":null,
                 "lastTimestamp":"0"}
            ]}}"#,
        );

        let stakers = parse_stakers(body).expect("stakers");

        assert_eq!(stakers.len(), 2);
        assert_eq!(stakers[0].address, "0xabc0000000000000000000000000000000000001");
        assert!((stakers[0].stake - 300.0).abs() < 1e-9);
        assert!((stakers[0].locked_balance - 50.0).abs() < 1e-9);
        assert_eq!(stakers[0].last_report_at, Some(1_700_000_000));

        // Falls back to the entity id; "0" means never reported
        assert_eq!(stakers[1].address, "0x2222222222222222222222222222222222222222");
        assert_eq!(stakers[1].last_report_at, None);
    }

    #[test]
    fn test_bad_rows_and_small_stakes_skipped() {
        let body = response(
            r#"{"data":{"newStakers":[
                {"id":"not-an-address","_amount":"100000000000000000000"},
                {"id":"0x3333333333333333333333333333333333333333","_amount":"99000000000000000000"},
                {"id":"0x4444444444444444444444444444444444444444","_amount":"1e20"}
            ]}}"#,
        );

        assert!(parse_stakers(body).expect("stakers").is_empty());
    }

    #[test]
    fn test_graphql_error_is_indexer_error() {
        let body = response(r#"{"data":null,"errors":[{"message":"indexing failed"}]}"#);

        assert!(matches!(
            parse_stakers(body),
            Err(LedgerError::IndexerError { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_subgraph_is_transient() {
        let client = SubgraphClient::new("http://127.0.0.1:9/subgraphs/name/tellor").expect("client");

        let err = client.stakers().await.expect_err("nothing listens on port 9");
        assert!(err.is_transient());
    }
}
