//! Shop session repository.
//!
//! Stores the offline access token for each shop that installed the app.
//! Rows are provisioned out of band by the deployment's install tooling;
//! this service only reads tokens and revokes them on uninstall. Every
//! request-scoped platform operation receives a [`ShopSession`]
//! explicitly; there is no ambient per-shop state.

use secrecy::SecretString;
use sqlx::PgPool;

use super::RepositoryError;

// =============================================================================
// Types
// =============================================================================

/// An installed shop's API session.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopSession {
    /// Shop domain (e.g., your-store.myshopify.com).
    pub shop: String,
    /// Offline access token (HIGH PRIVILEGE - redacted in debug output).
    pub access_token: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for ShopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSession")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct ShopSessionRow {
    shop: String,
    access_token: String,
    scope: String,
}

impl From<ShopSessionRow> for ShopSession {
    fn from(row: ShopSessionRow) -> Self {
        let scopes = row
            .scope
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            shop: row.shop,
            access_token: SecretString::from(row.access_token),
            scopes,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for shop session database operations.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_shop(&self, shop: &str) -> Result<Option<ShopSession>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopSessionRow>(
            "SELECT shop, access_token, scope FROM shop_sessions WHERE shop = $1",
        )
        .bind(shop)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ShopSession::from))
    }

    /// Delete the session for a shop. Returns `false` when no session
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, shop: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop_sessions WHERE shop = $1")
            .bind(shop)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
