//! Live event feed shared by the sync engine, the registry and the API stream.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::events::ReportEvent;
use crate::sync::SyncReport;

/// Buffered events per subscriber before the slowest one starts lagging.
pub const FEED_CAPACITY: usize = 1000;

/// Something worth pushing to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A sync pass finished
    Synced(SyncReport),
    /// The oracle accepted a report
    Report(ReportEvent),
}

/// Sending side of the feed.
pub type FeedSender = broadcast::Sender<FeedEvent>;

/// New feed with [`FEED_CAPACITY`] buffered events.
#[must_use]
pub fn channel() -> FeedSender {
    let (tx, _rx) = broadcast::channel(FEED_CAPACITY);
    tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_envelope() {
        let event = FeedEvent::Report(ReportEvent {
            reporter: "0x01".to_string(),
            tx_hash: "0xaa".to_string(),
            block_number: 7,
            time: 1_700_000_000,
            reward: 1.5,
            fee: 0.01,
        });

        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "report");
        assert_eq!(json["data"]["block_number"], 7);
    }

    #[test]
    fn test_send_without_subscribers_is_harmless() {
        let feed = channel();
        let event = FeedEvent::Report(ReportEvent {
            reporter: "0x01".to_string(),
            tx_hash: "0xaa".to_string(),
            block_number: 1,
            time: 0,
            reward: 0.0,
            fee: 0.0,
        });
        assert!(feed.send(event).is_err());
        assert_eq!(feed.receiver_count(), 0);
    }
}
