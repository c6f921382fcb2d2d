//! REST API over the sync engine, the ledger and the reporter registry.
//!
//! Routes live under `/api/v1`; OpenAPI docs are served at `/swagger-ui`.

pub mod docs;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;

pub use server::{router, run_server};
