//! Sync workflows: reconciliation, duplication, and teardown.
//!
//! The pure planning logic lives in `product-sync-core`; this module is
//! the I/O half that loads sync records, calls the platform API, and
//! persists the refreshed cache.

pub mod delete;
pub mod duplicate;
pub mod engine;

pub use delete::{handle_app_uninstalled, handle_product_delete, stop_sync};
pub use duplicate::duplicate_product;
pub use engine::handle_product_update;
