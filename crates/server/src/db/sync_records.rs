//! Sync record repository.
//!
//! One row per synced original/copy pair, scoped by shop. The cached
//! canonical snapshot is stored as JSONB and always reflects original
//! scale (see the reconciliation planner for the invariant).

use chrono::{DateTime, Utc};
use product_sync_core::CanonicalProduct;
use product_sync_core::reconcile::SyncPair;
use sqlx::PgPool;

use super::RepositoryError;

// =============================================================================
// Types
// =============================================================================

/// A tracked original/copy pair.
#[derive(Debug, Clone)]
pub struct SyncRecord {
    pub id: i32,
    /// Shop domain (e.g., your-store.myshopify.com).
    pub shop: String,
    pub original_id: i64,
    pub copy_id: i64,
    /// Factor in (0, 1] applied to copy prices relative to the original.
    pub price_multiplier: f64,
    /// Marker tag this pair was created with.
    pub marker_tag: String,
    /// Canonical snapshot as of the last completed sync.
    pub cached_product: CanonicalProduct,
    pub last_synced: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncRecord {
    /// View this record as a reconciliation sync pair.
    #[must_use]
    pub fn to_pair(&self) -> SyncPair {
        SyncPair {
            original_id: self.original_id,
            copy_id: self.copy_id,
            price_multiplier: self.price_multiplier,
            marker_tag: self.marker_tag.clone(),
            cached_product: self.cached_product.clone(),
            last_synced: self.last_synced,
        }
    }
}

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct SyncRecordRow {
    id: i32,
    shop: String,
    original_id: i64,
    copy_id: i64,
    price_multiplier: f64,
    marker_tag: String,
    cached_product: serde_json::Value,
    last_synced: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SyncRecordRow {
    fn into_record(self) -> Result<SyncRecord, RepositoryError> {
        let cached_product = serde_json::from_value(self.cached_product).map_err(|e| {
            RepositoryError::DataCorruption(format!("sync record {} snapshot: {e}", self.id))
        })?;

        Ok(SyncRecord {
            id: self.id,
            shop: self.shop,
            original_id: self.original_id,
            copy_id: self.copy_id,
            price_multiplier: self.price_multiplier,
            marker_tag: self.marker_tag,
            cached_product,
            last_synced: self.last_synced,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const COLUMNS: &str = "id, shop, original_id, copy_id, price_multiplier, marker_tag, \
                       cached_product, last_synced, created_at, updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for sync record database operations.
pub struct SyncRecordRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SyncRecordRepository<'a> {
    /// Create a new sync record repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all sync records for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, shop: &str) -> Result<Vec<SyncRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, SyncRecordRow>(&format!(
            "SELECT {COLUMNS} FROM sync_records WHERE shop = $1 ORDER BY created_at"
        ))
        .bind(shop)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(SyncRecordRow::into_record).collect()
    }

    /// Find the record tracking a product id, matching either side of the
    /// pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InconsistentState` if more than one record
    /// tracks the id, and `RepositoryError::Database` if the query fails.
    pub async fn find_by_product(
        &self,
        shop: &str,
        product_id: i64,
    ) -> Result<Option<SyncRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, SyncRecordRow>(&format!(
            "SELECT {COLUMNS} FROM sync_records \
             WHERE shop = $1 AND (original_id = $2 OR copy_id = $2)"
        ))
        .bind(shop)
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        if rows.len() > 1 {
            return Err(RepositoryError::InconsistentState(format!(
                "multiple sync records for product {product_id}"
            )));
        }

        rows.into_iter().next().map(SyncRecordRow::into_record).transpose()
    }

    /// Insert a new sync record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails (including
    /// unique violations on either product id).
    pub async fn insert(
        &self,
        shop: &str,
        original_id: i64,
        copy_id: i64,
        price_multiplier: f64,
        marker_tag: &str,
        cached_product: &CanonicalProduct,
    ) -> Result<SyncRecord, RepositoryError> {
        let snapshot = serde_json::to_value(cached_product)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        let row = sqlx::query_as::<_, SyncRecordRow>(&format!(
            "INSERT INTO sync_records \
             (shop, original_id, copy_id, price_multiplier, marker_tag, cached_product, last_synced) \
             VALUES ($1, $2, $3, $4, $5, $6, now()) \
             RETURNING {COLUMNS}"
        ))
        .bind(shop)
        .bind(original_id)
        .bind(copy_id)
        .bind(price_multiplier)
        .bind(marker_tag)
        .bind(snapshot)
        .fetch_one(self.pool)
        .await?;

        row.into_record()
    }

    /// Replace the cached snapshot and stamp `last_synced` after a
    /// completed reconciliation.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the record no longer exists
    /// and `RepositoryError::Database` if the update fails.
    pub async fn update_cache(
        &self,
        record_id: i32,
        cached_product: &CanonicalProduct,
        last_synced: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let snapshot = serde_json::to_value(cached_product)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE sync_records \
             SET cached_product = $2, last_synced = $3, updated_at = now() \
             WHERE id = $1",
        )
        .bind(record_id)
        .bind(snapshot)
        .bind(last_synced)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Delete the record tracking a product id. Returns `false` when no
    /// record matched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_by_product(
        &self,
        shop: &str,
        product_id: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM sync_records WHERE shop = $1 AND (original_id = $2 OR copy_id = $2)",
        )
        .bind(shop)
        .bind(product_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every sync record for a shop. Returns the number of records
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete_all(&self, shop: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM sync_records WHERE shop = $1")
            .bind(shop)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
