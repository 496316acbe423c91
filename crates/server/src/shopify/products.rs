//! Product operations: REST resource access plus the GraphQL mutations
//! REST does not cover (duplication, taxonomy category, metafields).

use product_sync_core::normalize::parse_gid_tail;
use serde_json::{Value, json};
use tracing::instrument;

use crate::db::ShopSession;

use super::{GraphQLError, PlatformClient, PlatformError};

/// Metafield namespace/key linking each side of a pair to its counterpart.
pub const COUNTERPART_NAMESPACE: &str = "productsync";
pub const COUNTERPART_KEY: &str = "counterpart";

const PRODUCT_DUPLICATE: &str = "\
mutation productDuplicate($productId: ID!, $newTitle: String!, $includeImages: Boolean) {
  productDuplicate(productId: $productId, newTitle: $newTitle, includeImages: $includeImages) {
    newProduct { id }
    userErrors { field message }
  }
}";

const GET_CATEGORY: &str = "\
query getCategory($id: ID!) {
  product(id: $id) { category { id } }
}";

const SET_CATEGORY: &str = "\
mutation setCategory($input: ProductInput!) {
  productUpdate(input: $input) {
    product { id }
    userErrors { field message }
  }
}";

const METAFIELDS_SET: &str = "\
mutation metafieldsSet($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields { id }
    userErrors { field message }
  }
}";

/// Build a product global identifier from a numeric id.
#[must_use]
pub fn product_gid(id: i64) -> String {
    format!("gid://shopify/Product/{id}")
}

impl PlatformClient {
    /// Fetch a product as raw REST JSON, ready for normalization.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::NotFound` if the product does not exist,
    /// or another `PlatformError` if the request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop))]
    pub async fn get_product(
        &self,
        session: &ShopSession,
        id: i64,
    ) -> Result<Value, PlatformError> {
        let body = self
            .rest_get(session, &format!("products/{id}.json"))
            .await?;

        body.get("product")
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("product {id}")))
    }

    /// Update a product with a partial REST payload. Only the fields
    /// present in `fields` are touched.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` if the request fails.
    #[instrument(skip(self, session, fields), fields(shop = %session.shop))]
    pub async fn update_product(
        &self,
        session: &ShopSession,
        id: i64,
        fields: &Value,
    ) -> Result<(), PlatformError> {
        let mut product = fields.clone();
        if let Some(object) = product.as_object_mut() {
            object.insert("id".to_string(), json!(id));
        }

        self.rest_put(
            session,
            &format!("products/{id}.json"),
            &json!({ "product": product }),
        )
        .await?;

        Ok(())
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` if the request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop))]
    pub async fn delete_product(
        &self,
        session: &ShopSession,
        id: i64,
    ) -> Result<(), PlatformError> {
        self.rest_delete(session, &format!("products/{id}.json"))
            .await
    }

    /// Duplicate a product, returning the new product's numeric id.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::UserError` if the mutation reports user
    /// errors, or another `PlatformError` if the request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop))]
    pub async fn duplicate_product(
        &self,
        session: &ShopSession,
        product_id: i64,
        new_title: &str,
        include_images: bool,
    ) -> Result<i64, PlatformError> {
        let data = self
            .graphql(
                session,
                PRODUCT_DUPLICATE,
                json!({
                    "productId": product_gid(product_id),
                    "newTitle": new_title,
                    "includeImages": include_images,
                }),
            )
            .await?;

        let payload = &data["productDuplicate"];
        if let Some(err) = Self::user_errors(payload) {
            return Err(err);
        }

        payload["newProduct"]["id"]
            .as_str()
            .and_then(parse_gid_tail)
            .ok_or_else(|| {
                PlatformError::GraphQL(vec![GraphQLError {
                    message: "No product returned from duplicate".to_string(),
                    path: vec![],
                }])
            })
    }

    /// Read a product's taxonomy category id, if one is assigned.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` if the request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop))]
    pub async fn get_category(
        &self,
        session: &ShopSession,
        product_id: i64,
    ) -> Result<Option<String>, PlatformError> {
        let data = self
            .graphql(
                session,
                GET_CATEGORY,
                json!({ "id": product_gid(product_id) }),
            )
            .await?;

        Ok(data["product"]["category"]["id"]
            .as_str()
            .map(String::from))
    }

    /// Assign or clear a product's taxonomy category.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::UserError` if the mutation reports user
    /// errors, or another `PlatformError` if the request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop))]
    pub async fn set_category(
        &self,
        session: &ShopSession,
        product_id: i64,
        category: Option<&str>,
    ) -> Result<(), PlatformError> {
        let data = self
            .graphql(
                session,
                SET_CATEGORY,
                json!({
                    "input": {
                        "id": product_gid(product_id),
                        "category": category,
                    }
                }),
            )
            .await?;

        if let Some(err) = Self::user_errors(&data["productUpdate"]) {
            return Err(err);
        }
        Ok(())
    }

    /// Upsert the counterpart-reference metafield on a product.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::UserError` if the mutation reports user
    /// errors, or another `PlatformError` if the request fails.
    #[instrument(skip(self, session), fields(shop = %session.shop))]
    pub async fn set_counterpart_metafield(
        &self,
        session: &ShopSession,
        product_id: i64,
        counterpart_id: i64,
    ) -> Result<(), PlatformError> {
        let data = self
            .graphql(
                session,
                METAFIELDS_SET,
                json!({
                    "metafields": [{
                        "ownerId": product_gid(product_id),
                        "namespace": COUNTERPART_NAMESPACE,
                        "key": COUNTERPART_KEY,
                        "type": "product_reference",
                        "value": product_gid(counterpart_id),
                    }]
                }),
            )
            .await?;

        if let Some(err) = Self::user_errors(&data["metafieldsSet"]) {
            return Err(err);
        }
        Ok(())
    }
}
