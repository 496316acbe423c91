//! The duplication workflow: create the wholesale copy of a product and
//! seed its sync record.

use product_sync_core::CanonicalProduct;
use product_sync_core::normalize::normalize_value;
use product_sync_core::product::{append_marker, strip_marker};
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::{ShopSession, SyncRecord, SyncRecordRepository};
use crate::error::AppError;
use crate::state::AppState;

/// Suffix appended to the copy's handle so the two listings never
/// collide on URL.
const COPY_HANDLE_SUFFIX: &str = "-productsync-copy";

/// Duplicate a product into a discounted wholesale copy and start
/// tracking the pair.
///
/// The copy carries the marker tag, the configured price multiplier, a
/// suffixed handle, and a counterpart metafield pointing back at the
/// original. The sync record caches the original's canonical form.
///
/// # Errors
///
/// Returns `AppError::AlreadySyncing` when the product is already part
/// of a pair, `AppError::Normalize` for malformed payloads, and
/// platform/database errors otherwise.
#[instrument(skip(state, session, raw_product), fields(shop = %session.shop))]
pub async fn duplicate_product(
    state: &AppState,
    session: &ShopSession,
    raw_product: &Value,
) -> Result<SyncRecord, AppError> {
    let mut original = normalize_value(raw_product)?;
    let Some(original_id) = original.id else {
        return Err(AppError::BadRequest(
            "product payload has no id".to_string(),
        ));
    };

    let repo = SyncRecordRepository::new(state.pool());
    if repo
        .find_by_product(&session.shop, original_id)
        .await?
        .is_some()
    {
        return Err(AppError::AlreadySyncing(original_id));
    }

    let sync = &state.config().sync;
    original.tags = strip_marker(&original.tags, &sync.marker_tag);

    let platform = state.platform();
    let copy_id = platform
        .duplicate_product(session, original_id, &original.title, true)
        .await?;

    tracing::info!(original_id, copy_id, "copy product created");

    // The duplicate starts as a clone; re-fetch it for its own variant
    // ids, then apply the copy-side transformations.
    let raw_copy = platform.get_product(session, copy_id).await?;
    let copy = normalize_value(&raw_copy)?;

    platform
        .update_product(
            session,
            copy_id,
            &copy_update_payload(&original, &copy, sync.price_multiplier, &sync.marker_tag),
        )
        .await?;

    if let Err(e) = platform
        .set_counterpart_metafield(session, original_id, copy_id)
        .await
    {
        tracing::warn!(error = %e, "original counterpart metafield failed");
    }
    if let Err(e) = platform
        .set_counterpart_metafield(session, copy_id, original_id)
        .await
    {
        tracing::warn!(error = %e, "copy counterpart metafield failed");
    }

    let record = repo
        .insert(
            &session.shop,
            original_id,
            copy_id,
            sync.price_multiplier,
            &sync.marker_tag,
            &original,
        )
        .await?;

    tracing::info!(original_id, copy_id, "sync pair established");
    Ok(record)
}

/// Build the update that turns a fresh duplicate into the wholesale
/// copy: marker tag, suffixed handle, and multiplied per-variant prices
/// keyed by the duplicate's own variant ids.
fn copy_update_payload(
    original: &CanonicalProduct,
    copy: &CanonicalProduct,
    price_multiplier: f64,
    marker_tag: &str,
) -> Value {
    let variants: Vec<Value> = copy
        .variants
        .iter()
        .zip(&original.variants)
        .map(|(copy_variant, original_variant)| {
            json!({
                "id": copy_variant.id,
                "price": round_cents(original_variant.price * price_multiplier),
            })
        })
        .collect();

    json!({
        "tags": append_marker(&original.tags, marker_tag),
        "handle": format!("{}{COPY_HANDLE_SUFFIX}", original.handle),
        "variants": variants,
    })
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use product_sync_core::CanonicalVariant;

    fn product(variant_id: i64, price: f64) -> CanonicalProduct {
        CanonicalProduct {
            title: "Widget".to_string(),
            handle: "widget".to_string(),
            tags: "blue".to_string(),
            variants: vec![CanonicalVariant {
                id: Some(variant_id),
                price,
                ..CanonicalVariant::default()
            }],
            ..CanonicalProduct::default()
        }
    }

    #[test]
    fn test_copy_update_scales_prices_and_marks_the_copy() {
        let original = product(1001, 10.0);
        let copy = product(2001, 10.0);

        let payload = copy_update_payload(&original, &copy, 0.5, "ProductSync Copy");

        assert_eq!(payload["tags"], "blue, ProductSync Copy");
        assert_eq!(payload["handle"], "widget-productsync-copy");
        // Prices key off the duplicate's own variant ids.
        assert_eq!(payload["variants"][0]["id"], 2001);
        let price = payload["variants"][0]["price"].as_f64().expect("price");
        assert!((price - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_copy_update_is_idempotent_on_marked_tags() {
        let mut original = product(1001, 10.0);
        original.tags = "blue, ProductSync Copy".to_string();
        original.tags = strip_marker(&original.tags, "ProductSync Copy");

        let payload = copy_update_payload(&original, &product(2001, 10.0), 0.5, "ProductSync Copy");
        assert_eq!(payload["tags"], "blue, ProductSync Copy");
    }

    #[test]
    fn test_round_cents() {
        assert!((round_cents(4.995) - 5.0).abs() < f64::EPSILON);
        assert!((round_cents(5.0) - 5.0).abs() < f64::EPSILON);
    }
}
