//! Sync API consumed by the embedded app UI.
//!
//! Every endpoint returns a `{success, error, result}` envelope so the
//! UI can render partial failures (e.g. one product in a duplication
//! batch) without special cases.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use product_sync_core::CanonicalProduct;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::{SessionRepository, ShopSession, SyncRecord, SyncRecordRepository};
use crate::error::AppError;
use crate::state::AppState;
use crate::sync;

/// Build the API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/database/get", get(list_records))
        .route("/api/database/get/{id}", get(get_record))
        .route("/api/database/insert", post(insert_records))
        .route("/api/database/delete/{id}", delete(delete_record))
        .route("/api/database/delete-all", delete(delete_all_records))
        .route("/api/shop", get(shop_info))
}

// =============================================================================
// Envelope and wire types
// =============================================================================

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> ApiResponse<T> {
    fn ok(result: T) -> Json<Self> {
        Json(Self {
            success: true,
            error: None,
            result: Some(result),
        })
    }

    fn empty() -> Json<Self> {
        Json(Self {
            success: true,
            error: None,
            result: None,
        })
    }
}

/// A sync record as exposed over the API.
#[derive(Debug, Serialize)]
pub struct ApiSyncRecord {
    pub id: i32,
    pub original_id: i64,
    pub copy_id: i64,
    pub price_multiplier: f64,
    pub marker_tag: String,
    pub cached_product: CanonicalProduct,
    pub last_synced: DateTime<Utc>,
}

impl From<SyncRecord> for ApiSyncRecord {
    fn from(record: SyncRecord) -> Self {
        Self {
            id: record.id,
            original_id: record.original_id,
            copy_id: record.copy_id,
            price_multiplier: record.price_multiplier,
            marker_tag: record.marker_tag,
            cached_product: record.cached_product,
            last_synced: record.last_synced,
        }
    }
}

/// Per-product outcome of a duplication batch.
#[derive(Debug, Serialize)]
pub struct BatchItemResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ApiSyncRecord>,
}

#[derive(Debug, Deserialize)]
struct ShopQuery {
    shop: Option<String>,
}

// =============================================================================
// Shop resolution
// =============================================================================

/// Resolve the calling shop's session from the `shop` query parameter or
/// the `X-Shopify-Shop-Domain` header.
async fn resolve_session(
    state: &AppState,
    headers: &HeaderMap,
    query: &ShopQuery,
) -> Result<ShopSession, AppError> {
    let shop = query
        .shop
        .clone()
        .or_else(|| {
            headers
                .get("X-Shopify-Shop-Domain")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .ok_or_else(|| AppError::BadRequest("missing shop identifier".to_string()))?;

    SessionRepository::new(state.pool())
        .get_by_shop(&shop)
        .await?
        .ok_or_else(|| AppError::Unauthorized(format!("no session for shop {shop}")))
}

// =============================================================================
// Handlers
// =============================================================================

/// List all synced pairs for the shop.
async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<ApiSyncRecord>>>, AppError> {
    let session = resolve_session(&state, &headers, &query).await?;
    let records = SyncRecordRepository::new(state.pool())
        .list(&session.shop)
        .await?;

    Ok(ApiResponse::ok(
        records.into_iter().map(ApiSyncRecord::from).collect(),
    ))
}

/// Get the pair tracking a product id (either side).
async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<ApiSyncRecord>>, AppError> {
    let session = resolve_session(&state, &headers, &query).await?;
    let record = SyncRecordRepository::new(state.pool())
        .find_by_product(&session.shop, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(ApiResponse::ok(record.into()))
}

/// Duplicate-and-sync a batch of products. One failed product is
/// reported in its slot and does not abort the rest of the batch.
async fn insert_records(
    State(state): State<AppState>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
    Json(products): Json<Vec<Value>>,
) -> Result<Json<ApiResponse<Vec<BatchItemResult>>>, AppError> {
    let session = resolve_session(&state, &headers, &query).await?;

    let mut results = Vec::with_capacity(products.len());
    for product in &products {
        match sync::duplicate_product(&state, &session, product).await {
            Ok(record) => results.push(BatchItemResult {
                success: true,
                error: None,
                record: Some(record.into()),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "duplication failed for batch item");
                results.push(BatchItemResult {
                    success: false,
                    error: Some(e.to_string()),
                    record: None,
                });
            }
        }
    }

    Ok(ApiResponse::ok(results))
}

/// Stop syncing a product and delete its copy. Unknown ids are a no-op
/// success, not an error.
async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<ApiSyncRecord>>, AppError> {
    let session = resolve_session(&state, &headers, &query).await?;

    match sync::stop_sync(&state, &session, id).await? {
        Some(record) => Ok(ApiResponse::ok(record.into())),
        None => Ok(ApiResponse::empty()),
    }
}

/// Stop syncing every pair for the shop.
async fn delete_all_records(
    State(state): State<AppState>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<ApiSyncRecord>>>, AppError> {
    let session = resolve_session(&state, &headers, &query).await?;
    let records = SyncRecordRepository::new(state.pool())
        .list(&session.shop)
        .await?;

    let mut removed = Vec::with_capacity(records.len());
    for record in records {
        if let Some(record) = sync::stop_sync(&state, &session, record.original_id).await? {
            removed.push(record.into());
        }
    }

    Ok(ApiResponse::ok(removed))
}

#[derive(Debug, Serialize)]
struct ShopInfo {
    shop: String,
    scopes: Vec<String>,
}

/// Shop info for the calling shop.
async fn shop_info(
    State(state): State<AppState>,
    Query(query): Query<ShopQuery>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<ShopInfo>>, AppError> {
    let session = resolve_session(&state, &headers, &query).await?;

    Ok(ApiResponse::ok(ShopInfo {
        shop: session.shop,
        scopes: session.scopes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_delete_of_untracked_id_serializes_as_bare_success() {
        let Json(envelope) = ApiResponse::<ApiSyncRecord>::empty();
        assert_eq!(
            serde_json::to_value(&envelope).expect("serialize"),
            json!({ "success": true })
        );
    }

    #[test]
    fn test_ok_envelope_omits_the_error_key() {
        let Json(envelope) = ApiResponse::ok(ShopInfo {
            shop: "test.myshopify.com".to_string(),
            scopes: vec!["read_products".to_string()],
        });

        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["success"], true);
        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["shop"], "test.myshopify.com");
    }

    #[test]
    fn test_failed_batch_item_keeps_its_slot() {
        let item = BatchItemResult {
            success: false,
            error: Some("Product 42 is already syncing".to_string()),
            record: None,
        };

        assert_eq!(
            serde_json::to_value(&item).expect("serialize"),
            json!({ "success": false, "error": "Product 42 is already syncing" })
        );
    }
}
