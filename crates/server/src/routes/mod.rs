//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! # Sync API (consumed by the embedded app UI)
//! GET    /api/database/get          - List synced pairs for the shop
//! GET    /api/database/get/{id}     - Get the pair tracking a product id
//! POST   /api/database/insert       - Duplicate-and-sync a batch of products
//! DELETE /api/database/delete/{id}  - Stop sync and delete the copy
//! DELETE /api/database/delete-all   - Stop sync for every pair
//! GET    /api/shop                  - Shop info for the calling shop
//!
//! # Webhooks (platform-signed)
//! POST   /api/webhooks              - products/update, products/delete,
//!                                     app/uninstalled, customer redaction
//! ```

pub mod api;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the application router (health endpoints are added in `main`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(api::routes())
        .merge(webhooks::routes())
}
