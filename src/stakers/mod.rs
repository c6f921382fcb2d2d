//! Staked reporters and the stake-based reporting cooldown.
//!
//! The oracle accepts one report per `12h / floor(stake / 100 TRB)` from each
//! reporter, so a 300 TRB stake may report every 4 hours. Reporters below
//! 100 TRB cannot report at all. [`StakerSource`] is the seam that lists the
//! current stakers; [`SubgraphClient`] reads them from the staking subgraph.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::error::{LedgerError, LedgerResult};
use crate::registry::RegistryHandle;

mod client;

pub use client::SubgraphClient;

/// Smallest stake that may report (TRB).
pub const MIN_STAKE_TRB: f64 = 100.0;

/// Cooldown of a reporter staking exactly [`MIN_STAKE_TRB`].
pub const BASE_COOLDOWN_SECS: u64 = 12 * 3600;

/// One staked reporter as listed by the staking contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Staker {
    /// Lower-case `0x` address
    pub address: String,
    /// Staked balance (TRB)
    pub stake: f64,
    /// Balance locked for withdrawal (TRB)
    pub locked_balance: f64,
    /// Time of the latest accepted report (unix seconds)
    pub last_report_at: Option<i64>,
}

/// Lists the oracle's current stakers.
#[async_trait]
pub trait StakerSource: Send + Sync {
    /// Every staker holding at least [`MIN_STAKE_TRB`].
    async fn stakers(&self) -> LedgerResult<Vec<Staker>>;
}

/// Seconds between two reports for `stake`, `None` below the minimum stake.
#[must_use]
pub fn cooldown_secs(stake: f64) -> Option<u64> {
    if !stake.is_finite() {
        return None;
    }
    let units = (stake / MIN_STAKE_TRB).floor();
    if units < 1.0 {
        return None;
    }

    // Past BASE_COOLDOWN_SECS units the cooldown bottoms out at one second
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let units = units.min(BASE_COOLDOWN_SECS as f64) as u64;
    Some(BASE_COOLDOWN_SECS / units)
}

/// Seconds left until `stake` may report again at `now`.
///
/// Zero or negative once eligible; a reporter that never reported is eligible
/// right away. `None` below the minimum stake.
#[must_use]
pub fn remaining_secs(now: i64, last_report_at: Option<i64>, stake: f64) -> Option<i64> {
    let cooldown = i64::try_from(cooldown_secs(stake)?).ok()?;
    Some(last_report_at.map_or(0, |last| last.saturating_add(cooldown).saturating_sub(now)))
}

/// Whether `stake` may report at `now`.
#[must_use]
pub fn is_eligible(now: i64, last_report_at: Option<i64>, stake: f64) -> bool {
    remaining_secs(now, last_report_at, stake).is_some_and(|left| left <= 0)
}

/// Pull the staker list once and merge it into the registry.
///
/// # Errors
///
/// Returns the source error, or a registry error if the registry is gone or
/// could not persist any staker.
pub async fn refresh(source: &dyn StakerSource, registry: &RegistryHandle) -> LedgerResult<usize> {
    let stakers = source.stakers().await?;
    let listed = stakers.len();
    let updated = registry.apply_stakers(stakers).await?;

    info!(listed, updated, "Staker set refreshed");
    Ok(updated)
}

/// Refresh the staker set every `every` until the registry stops.
pub fn spawn_refresh(
    source: Arc<dyn StakerSource>,
    registry: RegistryHandle,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match refresh(source.as_ref(), &registry).await {
                Ok(_) => {}
                Err(e @ LedgerError::RegistryError { .. }) => {
                    warn!(error = %e, "Registry stopped, staker refresh exiting");
                    return;
                }
                Err(e) => warn!(error = %e, "Staker refresh failed"),
            }
        }
    })
}
