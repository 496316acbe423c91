//! Inventory operations: locations, level listing, and level set.

use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::db::ShopSession;

use super::{PlatformClient, PlatformError};

/// A stock location.
#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// An inventory level: how much of one item is available at one location.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryLevel {
    pub inventory_item_id: i64,
    pub location_id: i64,
    #[serde(default)]
    pub available: Option<i64>,
}

impl PlatformClient {
    /// List the shop's stock locations.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` if the request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop))]
    pub async fn list_locations(
        &self,
        session: &ShopSession,
    ) -> Result<Vec<Location>, PlatformError> {
        let body = self.rest_get(session, "locations.json").await?;
        Ok(serde_json::from_value(body["locations"].clone())?)
    }

    /// List inventory levels for a set of inventory items.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` if the request fails.
    #[instrument(skip(self, session, item_ids), fields(shop = %session.shop))]
    pub async fn list_inventory_levels(
        &self,
        session: &ShopSession,
        item_ids: &[i64],
    ) -> Result<Vec<InventoryLevel>, PlatformError> {
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = item_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let body = self
            .rest_get(
                session,
                &format!("inventory_levels.json?inventory_item_ids={ids}"),
            )
            .await?;

        Ok(serde_json::from_value(body["inventory_levels"].clone())?)
    }

    /// Set the available quantity for an item at a location.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` if the request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop))]
    pub async fn set_inventory_level(
        &self,
        session: &ShopSession,
        inventory_item_id: i64,
        location_id: i64,
        available: i64,
    ) -> Result<(), PlatformError> {
        self.rest_post(
            session,
            "inventory_levels/set.json",
            &json!({
                "inventory_item_id": inventory_item_id,
                "location_id": location_id,
                "available": available,
            }),
        )
        .await?;

        Ok(())
    }
}
