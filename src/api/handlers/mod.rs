//! HTTP handlers for API endpoints.

pub mod health;
pub mod ledger;
pub mod market;
pub mod reporters;
pub mod stream;
pub mod sync;
