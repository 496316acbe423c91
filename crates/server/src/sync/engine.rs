//! The reconciliation engine.
//!
//! Handles one `products/update` webhook delivery end to end: look up the
//! sync record, plan the reconciliation, and execute the plan against the
//! platform. Counterpart writes are best-effort per sub-step; a failed
//! inventory sync must not block the category, metafield, or cache steps.

use chrono::{TimeDelta, Utc};
use product_sync_core::normalize::{normalize_value, parse_gid_tail};
use product_sync_core::reconcile::{Outcome, ReconcilePlan, plan};
use serde_json::Value;
use tracing::instrument;

use crate::db::{ShopSession, SyncRecord, SyncRecordRepository};
use crate::error::AppError;
use crate::state::AppState;

/// Extract the numeric product id from a raw webhook payload.
fn payload_product_id(payload: &Value) -> Option<i64> {
    match payload.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_gid_tail(s),
        _ => None,
    }
}

/// Handle a `products/update` webhook delivery.
///
/// # Errors
///
/// Returns an error when the payload cannot be normalized, the sync
/// record lookup fails, or the final cache write fails. Counterpart
/// write failures are logged and do not abort the remaining steps.
#[instrument(skip(state, session, payload), fields(shop = %session.shop))]
pub async fn handle_product_update(
    state: &AppState,
    session: &ShopSession,
    payload: &Value,
) -> Result<(), AppError> {
    let Some(updated_id) = payload_product_id(payload) else {
        return Err(AppError::BadRequest(
            "product payload has no id".to_string(),
        ));
    };

    let repo = SyncRecordRepository::new(state.pool());
    let Some(record) = repo.find_by_product(&session.shop, updated_id).await? else {
        tracing::debug!(product_id = updated_id, "product not tracked, ignoring");
        return Ok(());
    };

    let pair = record.to_pair();
    let Some(direction) = pair.direction_of(updated_id) else {
        // Unreachable given the lookup query, but don't panic on it.
        return Ok(());
    };

    let incoming = normalize_value(payload)?;
    let debounce = TimeDelta::seconds(state.config().sync.debounce_secs);

    match plan(&pair, &incoming, direction, Utc::now(), debounce) {
        Outcome::Suppressed => {
            tracing::debug!(
                product_id = updated_id,
                "update within debounce window, suppressed"
            );
            Ok(())
        }
        Outcome::NoChange => {
            tracing::debug!(product_id = updated_id, "no changes, skipping");
            Ok(())
        }
        Outcome::Apply(reconcile_plan) => {
            execute_plan(state, session, &record, &reconcile_plan).await
        }
    }
}

/// Execute a reconciliation plan: dual product writes, inventory,
/// category, metafields, then the cache update.
async fn execute_plan(
    state: &AppState,
    session: &ShopSession,
    record: &SyncRecord,
    reconcile_plan: &ReconcilePlan,
) -> Result<(), AppError> {
    let platform = state.platform();
    let pair = record.to_pair();
    let updated_id = reconcile_plan.direction.updated_id(&pair);
    let counterpart_id = reconcile_plan.direction.counterpart_id(&pair);

    tracing::info!(
        original_id = record.original_id,
        copy_id = record.copy_id,
        edited = ?reconcile_plan.direction,
        "applying reconciliation"
    );

    let original_fields = serde_json::to_value(&reconcile_plan.original_update)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if let Err(e) = platform
        .update_product(session, record.original_id, &original_fields)
        .await
    {
        tracing::warn!(error = %e, product_id = record.original_id, "original update failed");
    }

    let copy_fields = serde_json::to_value(&reconcile_plan.copy_update)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if let Err(e) = platform
        .update_product(session, record.copy_id, &copy_fields)
        .await
    {
        tracing::warn!(error = %e, product_id = record.copy_id, "copy update failed");
    }

    if let Err(e) = reconcile_inventory(state, session, counterpart_id, reconcile_plan).await {
        tracing::warn!(error = %e, "inventory reconciliation failed");
    }

    if let Err(e) = reconcile_category(state, session, updated_id, counterpart_id).await {
        tracing::warn!(error = %e, "category reconciliation failed");
    }

    if let Err(e) = platform
        .set_counterpart_metafield(session, record.original_id, record.copy_id)
        .await
    {
        tracing::warn!(error = %e, "original counterpart metafield failed");
    }
    if let Err(e) = platform
        .set_counterpart_metafield(session, record.copy_id, record.original_id)
        .await
    {
        tracing::warn!(error = %e, "copy counterpart metafield failed");
    }

    let repo = SyncRecordRepository::new(state.pool());
    repo.update_cache(record.id, &reconcile_plan.new_cache, Utc::now())
        .await?;

    tracing::info!(
        original_id = record.original_id,
        copy_id = record.copy_id,
        "reconciliation complete"
    );
    Ok(())
}

/// Push the edited side's inventory quantities onto the counterpart.
///
/// Quantities are matched to counterpart variants by position. A variant
/// whose stock location cannot be resolved is skipped with a warning
/// rather than failing the pass.
async fn reconcile_inventory(
    state: &AppState,
    session: &ShopSession,
    counterpart_id: i64,
    reconcile_plan: &ReconcilePlan,
) -> Result<(), AppError> {
    if reconcile_plan.inventory_quantities.is_empty() {
        return Ok(());
    }

    let platform = state.platform();
    let raw = platform.get_product(session, counterpart_id).await?;
    let counterpart = normalize_value(&raw)?;

    let item_ids: Vec<i64> = counterpart
        .variants
        .iter()
        .filter_map(|v| v.inventory_item_id)
        .collect();

    let locations = platform.list_locations(session).await?;
    let levels = platform.list_inventory_levels(session, &item_ids).await?;

    for (variant, quantity) in counterpart
        .variants
        .iter()
        .zip(&reconcile_plan.inventory_quantities)
    {
        let Some(item_id) = variant.inventory_item_id else {
            continue;
        };

        let location_id = levels
            .iter()
            .find(|level| level.inventory_item_id == item_id)
            .map(|level| level.location_id)
            .or_else(|| locations.first().map(|location| location.id));

        let Some(location_id) = location_id else {
            tracing::warn!(
                inventory_item_id = item_id,
                "no stock location resolved, skipping variant"
            );
            continue;
        };

        if let Err(e) = platform
            .set_inventory_level(session, item_id, location_id, *quantity)
            .await
        {
            tracing::warn!(error = %e, inventory_item_id = item_id, "inventory level set failed");
        }
    }

    Ok(())
}

/// Copy the edited product's taxonomy category to the counterpart, or
/// clear the counterpart's category when the edited side has none.
async fn reconcile_category(
    state: &AppState,
    session: &ShopSession,
    updated_id: i64,
    counterpart_id: i64,
) -> Result<(), AppError> {
    let platform = state.platform();
    let category = platform.get_category(session, updated_id).await?;
    platform
        .set_category(session, counterpart_id, category.as_deref())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_product_id_numeric() {
        assert_eq!(payload_product_id(&json!({ "id": 42 })), Some(42));
    }

    #[test]
    fn test_payload_product_id_gid() {
        assert_eq!(
            payload_product_id(&json!({ "id": "gid://shopify/Product/42" })),
            Some(42)
        );
    }

    #[test]
    fn test_payload_product_id_missing() {
        assert_eq!(payload_product_id(&json!({ "title": "Widget" })), None);
    }
}
