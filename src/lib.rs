//! # Oracle Ledger Sync
//!
//! Incremental transaction sync and reward reconciliation for Tellor oracle
//! reporters, built on [Alloy](https://github.com/alloy-rs/alloy), `sqlx` and
//! `axum`.
//!
//! For every tracked wallet the engine keeps a per-address block cursor,
//! pages the wallet's transactions and ERC20 transfers from a chain-indexing
//! API, attributes oracle rewards to the transactions that earned them and
//! stores one enriched ledger record per transaction.
//!
//! ## Architecture
//!
//! 1. **Cursor store** ([`store`], [`db`]) - monotonic per-address watermark
//! 2. **Paginated fetcher** ([`indexer`]) - newest-first pages over a block range
//! 3. **Reconciler** ([`reconcile`]) - rewards and fees per transaction
//! 4. **Sync orchestrator** ([`sync`]) - fetch, reconcile, persist, advance
//! 5. **Query service** ([`query`]) - ledgers and totals at spot prices
//! 6. **Reporter registry** ([`registry`]) - single-owner task behind a channel
//! 7. **Report listener** ([`listener`]) - `NewReport` subscription
//! 8. **Market oracle** ([`oracle`]) - prices, gas and chain head
//! 9. **Staker source** ([`stakers`]) - stakes and reporting cooldowns
//!
//! The [`api`] and [`cli`] modules expose all of it.
//!
//! ## Quick Start
//!
//! ```bash
//! # One pass for a reporter
//! cargo run --release -- sync 0x...
//!
//! # REST API + report listener
//! cargo run --release -- serve
//! ```
//!
//! ## Environment Setup
//!
//! ```text
//! MORALIS_API_KEY=your_key_here
//! ALCHEMY_API_KEY=your_key_here
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::LedgerResult<T>`](error::LedgerResult):
//!
//! ```rust
//! use oracle_ledger_sync::error::LedgerResult;
//!
//! fn example() -> LedgerResult<()> {
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod address;
pub mod api;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod feed;
pub mod indexer;
pub mod listener;
pub mod observability;
pub mod oracle;
pub mod query;
pub mod reconcile;
pub mod registry;
pub mod rpc;
pub mod stakers;
pub mod store;
pub mod sync;
