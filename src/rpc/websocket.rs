//! WebSocket provider for the oracle's `NewReport` log subscription.
//!
//! Push-based: the node forwards matching logs as they are mined. A dropped
//! connection ends the stream; [`ReconnectingWebSocket`] re-establishes it with
//! exponential backoff and jitter.

use alloy::{
    primitives::Address,
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::Log,
    transports::BoxTransport,
};
use eyre::Result;
use futures_util::stream::StreamExt;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::events::new_report_filter;

/// Alloy WebSocket provider plus the URL it was opened with.
pub struct WebSocketProvider {
    provider: RootProvider<BoxTransport>,
    url: String,
}

impl WebSocketProvider {
    /// Connects to a WebSocket RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the handshake fails.
    #[instrument(skip(ws_url), fields(ws_host = tracing::field::Empty, duration_ms = tracing::field::Empty))]
    pub async fn connect(ws_url: String) -> Result<Self> {
        let host = ws_url.split("/v2/").next().unwrap_or("unknown").to_string();
        tracing::Span::current().record("ws_host", host.as_str());

        info!(ws_host = %host, "Connecting to WebSocket");
        let start = std::time::Instant::now();

        let provider = ProviderBuilder::new()
            .on_builtin(&ws_url)
            .await
            .map_err(|e| {
                error!(error = %e, ws_host = %host, "WebSocket connection failed");
                eyre::eyre!("WebSocket connection failed: {}", e)
            })?;

        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::Span::current().record("duration_ms", elapsed_ms);
        info!(ws_host = %host, duration_ms = elapsed_ms, "WebSocket connected");

        Ok(Self {
            provider,
            url: ws_url,
        })
    }

    /// Underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &RootProvider<BoxTransport> {
        &self.provider
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stream of `NewReport` logs emitted by `oracle`.
    ///
    /// Ends when the connection drops.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription request fails.
    #[instrument(skip(self), fields(oracle = %oracle))]
    pub async fn subscribe_reports(
        &self,
        oracle: Address,
    ) -> Result<impl StreamExt<Item = Log> + use<'_>> {
        let filter = new_report_filter(oracle);

        let sub = self
            .provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| eyre::eyre!("Log subscription failed: {}", e))?;

        info!("NewReport subscription active");
        Ok(sub.into_stream())
    }
}

/// WebSocket connection that retries with exponential backoff.
pub struct ReconnectingWebSocket {
    url: String,
    provider: Option<WebSocketProvider>,
    max_reconnect_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl ReconnectingWebSocket {
    /// Defaults: 10 attempts, 1s initial delay, 60s cap, ±12.5% jitter.
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self::with_settings(url, 10, Duration::from_secs(1), Duration::from_secs(60))
    }

    /// Custom retry settings.
    #[must_use]
    pub const fn with_settings(
        url: String,
        max_reconnect_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            url,
            provider: None,
            max_reconnect_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// Connect, retrying until `max_reconnect_attempts` is reached.
    ///
    /// # Errors
    ///
    /// Returns the last connection error once attempts are exhausted.
    pub async fn connect(&mut self) -> Result<()> {
        let mut attempt = 0;
        let mut delay = self.initial_delay;

        loop {
            match WebSocketProvider::connect(self.url.clone()).await {
                Ok(provider) => {
                    self.provider = Some(provider);
                    return Ok(());
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_reconnect_attempts {
                        error!(attempts = attempt, "Max reconnection attempts reached");
                        return Err(eyre::eyre!(
                            "Failed to connect after {} attempts: {}",
                            attempt,
                            e
                        ));
                    }

                    warn!(
                        attempt,
                        max = self.max_reconnect_attempts,
                        error = %e,
                        delay_ms = delay.as_millis(),
                        "WebSocket connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;

                    delay = next_delay(delay, self.max_delay, rand::random::<f64>());
                    debug!(delay_ms = delay.as_millis(), "Next retry delay");
                }
            }
        }
    }

    /// Drop the current connection and connect again.
    ///
    /// # Errors
    ///
    /// Returns an error if reconnecting fails.
    pub async fn reconnect(&mut self) -> Result<()> {
        warn!("Reconnecting WebSocket after disconnection");
        self.provider = None;
        self.connect().await
    }

    /// Current connection, if any.
    #[must_use]
    pub const fn provider(&self) -> Option<&WebSocketProvider> {
        self.provider.as_ref()
    }

    /// Whether a connection is held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.provider.is_some()
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connection attempts made before giving up.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }
}

/// Doubled delay capped at `max`, with jitter drawn from `unit` in `[0, 1)`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn next_delay(current: Duration, max: Duration, unit: f64) -> Duration {
    let doubled = std::cmp::min(current * 2, max);
    let jitter_factor = 0.25 * (unit - 0.5);
    let base_ms = doubled.as_millis() as f64;
    Duration::from_millis((base_ms * (1.0 + jitter_factor)).max(0.0).round() as u64)
}
