//! ProductSync server - webhooks, sync API, and reconciliation execution.
//!
//! The pure planning logic lives in `product-sync-core`; this crate owns
//! everything with a side effect: the HTTP surface, the `PostgreSQL`
//! repositories, the Shopify Admin API client, and the workflows that
//! execute reconciliation plans.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod shopify;
pub mod state;
pub mod sync;

pub use config::ServerConfig;
pub use error::AppError;
pub use state::AppState;
