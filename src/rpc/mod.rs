//! Ethereum JSON-RPC access.
//!
//! - [`http`]: request/response reads (head block, gas price, code, receipts)
//! - [`websocket`]: push subscription to the oracle's `NewReport` logs
//!
//! ```text
//!   MarketOracle ──► http::Provider ──► head / gas / code / oracle calls
//!   ReportListener ─► ReconnectingWebSocket ──► NewReport logs
//!                 └─► http::Provider ──► receipts
//! ```

pub mod http;
pub mod websocket;

pub use http::{
    check_connection, create_provider, get_gas_price, get_head_timestamp, get_latest_block,
    get_receipt, has_code, Provider,
};
pub use websocket::{ReconnectingWebSocket, WebSocketProvider};
