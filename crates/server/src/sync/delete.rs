//! Teardown workflows: product deletion, explicit stop-sync, and app
//! uninstall.

use tracing::instrument;

use crate::db::{SessionRepository, ShopSession, SyncRecord, SyncRecordRepository};
use crate::error::AppError;
use crate::shopify::PlatformError;
use crate::state::AppState;

/// The platform delete to issue when a tracked product is deleted, if
/// any. Deleting the original takes its copy down too; deleting the
/// copy leaves the original alone.
fn counterpart_to_delete(record: &SyncRecord, deleted_id: i64) -> Option<i64> {
    (record.original_id == deleted_id).then_some(record.copy_id)
}

/// Handle a `products/delete` webhook delivery.
///
/// If the deleted product was the original, its copy is deleted from the
/// platform too. Either way the sync record is removed. Untracked
/// products are a no-op.
///
/// # Errors
///
/// Returns an error when the sync record lookup or removal fails.
#[instrument(skip(state, session), fields(shop = %session.shop))]
pub async fn handle_product_delete(
    state: &AppState,
    session: &ShopSession,
    product_id: i64,
) -> Result<(), AppError> {
    let repo = SyncRecordRepository::new(state.pool());
    let Some(record) = repo.find_by_product(&session.shop, product_id).await? else {
        tracing::debug!(product_id, "deleted product not tracked, ignoring");
        return Ok(());
    };

    if let Some(copy_id) = counterpart_to_delete(&record, product_id) {
        delete_counterpart(state, session, copy_id).await;
    }

    repo.delete_by_product(&session.shop, product_id).await?;
    tracing::info!(
        original_id = record.original_id,
        copy_id = record.copy_id,
        "sync pair torn down"
    );
    Ok(())
}

/// Stop syncing a product on request: delete the copy from the platform
/// and remove the sync record.
///
/// Returns the removed record, or `None` when the product was not
/// tracked (a no-op, not an error).
///
/// # Errors
///
/// Returns an error when the sync record lookup or removal fails.
#[instrument(skip(state, session), fields(shop = %session.shop))]
pub async fn stop_sync(
    state: &AppState,
    session: &ShopSession,
    product_id: i64,
) -> Result<Option<SyncRecord>, AppError> {
    let repo = SyncRecordRepository::new(state.pool());
    let Some(record) = repo.find_by_product(&session.shop, product_id).await? else {
        return Ok(None);
    };

    delete_counterpart(state, session, record.copy_id).await;
    repo.delete_by_product(&session.shop, product_id).await?;

    tracing::info!(
        original_id = record.original_id,
        copy_id = record.copy_id,
        "sync stopped"
    );
    Ok(Some(record))
}

/// Handle an `app/uninstalled` webhook: drop every sync record for the
/// shop and forget its session.
///
/// # Errors
///
/// Returns an error when the database cleanup fails.
#[instrument(skip(state))]
pub async fn handle_app_uninstalled(state: &AppState, shop: &str) -> Result<(), AppError> {
    let removed = SyncRecordRepository::new(state.pool())
        .delete_all(shop)
        .await?;
    SessionRepository::new(state.pool()).delete(shop).await?;

    tracing::info!(shop, removed, "shop data cleared after uninstall");
    Ok(())
}

/// Best-effort platform delete of a copy product. A copy that is already
/// gone is fine; other failures are logged.
async fn delete_counterpart(state: &AppState, session: &ShopSession, copy_id: i64) {
    match state.platform().delete_product(session, copy_id).await {
        Ok(()) => {}
        Err(PlatformError::NotFound(_)) => {
            tracing::debug!(copy_id, "copy already deleted");
        }
        Err(e) => {
            tracing::warn!(error = %e, copy_id, "copy delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use product_sync_core::CanonicalProduct;

    fn record() -> SyncRecord {
        SyncRecord {
            id: 1,
            shop: "test.myshopify.com".to_string(),
            original_id: 100,
            copy_id: 200,
            price_multiplier: 0.5,
            marker_tag: "ProductSync Copy".to_string(),
            cached_product: CanonicalProduct::default(),
            last_synced: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_deleting_the_original_takes_the_copy_down() {
        assert_eq!(counterpart_to_delete(&record(), 100), Some(200));
    }

    #[test]
    fn test_deleting_the_copy_leaves_the_original_alone() {
        assert_eq!(counterpart_to_delete(&record(), 200), None);
    }
}
