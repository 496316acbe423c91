//! Product normalization.
//!
//! The platform hands us products in two shapes: the snake_case REST
//! resource (webhook payloads, cached snapshots) and the camelCase GraphQL
//! node (the product picker in the embedded UI). [`RawProduct`] is the
//! tagged union of the two; [`normalize`] is the single place both are
//! converted into [`CanonicalProduct`]. No other module looks at
//! shape-specific field names.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::product::{CanonicalOption, CanonicalProduct, CanonicalVariant};

/// Errors produced while normalizing a raw product payload.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// A field the canonical schema cannot do without was absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The payload did not deserialize as either known product shape.
    #[error("unrecognized product shape: {0}")]
    Shape(String),
}

/// A raw product payload in one of the two platform shapes.
#[derive(Debug, Deserialize)]
pub enum RawProduct {
    /// snake_case REST resource (webhooks, cached snapshots).
    Rest(RestProduct),
    /// camelCase GraphQL node (product picker payloads).
    Graphql(GraphqlProduct),
}

/// GraphQL-only keys used to tell the two shapes apart. The REST shape
/// never carries any of these at the top level.
const GRAPHQL_KEYS: [&str; 5] = [
    "bodyHtml",
    "descriptionHtml",
    "productType",
    "publishedScope",
    "templateSuffix",
];

impl RawProduct {
    /// Detect the shape of a JSON product payload and deserialize it.
    ///
    /// Resolution is REST-first: a payload is only treated as GraphQL when
    /// it carries a camelCase top-level key or a `gid://` string id.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::MissingField`] when `status`, `variants`,
    /// or `options` is absent, and [`NormalizeError::Shape`] when the
    /// payload does not deserialize as the detected shape.
    pub fn from_value(value: &Value) -> Result<Self, NormalizeError> {
        for field in ["status", "variants", "options"] {
            if value.get(field).is_none_or(Value::is_null) {
                return Err(match field {
                    "status" => NormalizeError::MissingField("status"),
                    "variants" => NormalizeError::MissingField("variants"),
                    _ => NormalizeError::MissingField("options"),
                });
            }
        }

        if looks_graphql(value) {
            serde_json::from_value(value.clone())
                .map(RawProduct::Graphql)
                .map_err(|e| NormalizeError::Shape(e.to_string()))
        } else {
            serde_json::from_value(value.clone())
                .map(RawProduct::Rest)
                .map_err(|e| NormalizeError::Shape(e.to_string()))
        }
    }
}

fn looks_graphql(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    GRAPHQL_KEYS.iter().any(|key| object.contains_key(*key))
        || matches!(object.get("id"), Some(Value::String(_)))
}

/// Normalize a JSON product payload of either shape.
///
/// # Errors
///
/// See [`RawProduct::from_value`].
pub fn normalize_value(value: &Value) -> Result<CanonicalProduct, NormalizeError> {
    Ok(normalize(RawProduct::from_value(value)?))
}

/// Convert an already-deserialized raw product into canonical form.
#[must_use]
pub fn normalize(raw: RawProduct) -> CanonicalProduct {
    match raw {
        RawProduct::Rest(product) => product.into_canonical(),
        RawProduct::Graphql(product) => product.into_canonical(),
    }
}

/// Parse the trailing integer out of a platform global identifier
/// (`gid://shopify/Product/123` -> 123). Plain numeric strings pass
/// through unchanged.
#[must_use]
pub fn parse_gid_tail(id: &str) -> Option<i64> {
    id.rsplit('/').next()?.parse().ok()
}

/// Map platform weight-unit names onto the canonical abbreviations.
/// Unknown values pass through lower-cased.
#[must_use]
pub fn normalize_weight_unit(unit: &str) -> String {
    let lower = unit.to_lowercase();
    match lower.as_str() {
        "pounds" => "lb".to_string(),
        "kilograms" => "kg".to_string(),
        "grams" => "g".to_string(),
        "ounces" => "oz".to_string(),
        _ => lower,
    }
}

// =============================================================================
// Shared field unions
// =============================================================================

/// An id that may arrive as an integer or as a global-identifier string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Text(String),
}

impl RawId {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(id) => Some(*id),
            Self::Text(id) => parse_gid_tail(id),
        }
    }
}

fn raw_id(id: Option<&RawId>) -> Option<i64> {
    id.and_then(RawId::as_i64)
}

/// A price that may arrive as a number or a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Num(f64),
    Text(String),
}

impl RawPrice {
    fn as_f64(&self) -> f64 {
        match self {
            Self::Num(price) => *price,
            Self::Text(price) => price.parse().unwrap_or_default(),
        }
    }
}

/// Tags arrive as a joined string (REST) or a list (GraphQL).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawTags {
    Text(String),
    List(Vec<String>),
}

impl RawTags {
    fn into_joined(self) -> String {
        match self {
            Self::Text(tags) => tags,
            Self::List(tags) => tags.join(", "),
        }
    }
}

// =============================================================================
// REST shape
// =============================================================================

/// snake_case REST product resource.
#[derive(Debug, Deserialize)]
pub struct RestProduct {
    body_html: Option<String>,
    handle: Option<String>,
    id: Option<RawId>,
    product_type: Option<String>,
    published_scope: Option<String>,
    status: Option<String>,
    template_suffix: Option<String>,
    title: Option<String>,
    vendor: Option<String>,
    tags: Option<RawTags>,
    #[serde(default)]
    options: Vec<RestOption>,
    #[serde(default)]
    variants: Vec<RestVariant>,
    images: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RestOption {
    id: Option<RawId>,
    name: Option<String>,
    position: Option<i64>,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RestVariant {
    id: Option<RawId>,
    product_id: Option<RawId>,
    barcode: Option<String>,
    price: Option<RawPrice>,
    compare_at_price: Option<String>,
    sku: Option<String>,
    position: Option<i64>,
    option1: Option<String>,
    option2: Option<String>,
    option3: Option<String>,
    inventory_item_id: Option<RawId>,
    inventory_management: Option<String>,
    inventory_policy: Option<String>,
    inventory_quantity: Option<i64>,
    weight: Option<f64>,
    weight_unit: Option<String>,
    requires_shipping: Option<bool>,
    taxable: Option<bool>,
    fulfillment_service: Option<String>,
    title: Option<String>,
}

impl RestProduct {
    fn into_canonical(self) -> CanonicalProduct {
        CanonicalProduct {
            body_html: self.body_html.unwrap_or_default(),
            handle: self.handle.unwrap_or_default(),
            id: raw_id(self.id.as_ref()),
            product_type: self.product_type.unwrap_or_default(),
            published_scope: self.published_scope.unwrap_or_else(|| "web".to_string()),
            status: self.status.unwrap_or_default().to_lowercase(),
            template_suffix: self.template_suffix.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            vendor: self.vendor.unwrap_or_default(),
            tags: self.tags.map(RawTags::into_joined).unwrap_or_default(),
            options: self
                .options
                .into_iter()
                .map(|option| CanonicalOption {
                    id: raw_id(option.id.as_ref()),
                    name: option.name.unwrap_or_default(),
                    position: option.position,
                    values: option.values,
                })
                .collect(),
            variants: self.variants.into_iter().map(RestVariant::into_canonical).collect(),
            images: self.images.unwrap_or_default(),
        }
    }
}

impl RestVariant {
    fn into_canonical(self) -> CanonicalVariant {
        CanonicalVariant {
            id: raw_id(self.id.as_ref()),
            product_id: raw_id(self.product_id.as_ref()),
            barcode: self.barcode,
            price: self.price.map(|price| price.as_f64()).unwrap_or_default(),
            compare_at_price: self.compare_at_price,
            sku: self.sku,
            position: self.position,
            option1: self.option1,
            option2: self.option2,
            option3: self.option3,
            inventory_item_id: raw_id(self.inventory_item_id.as_ref()),
            inventory_management: self.inventory_management.map(|m| m.to_lowercase()),
            inventory_policy: self.inventory_policy.map(|p| p.to_lowercase()),
            inventory_quantity: self.inventory_quantity.unwrap_or_default(),
            weight: self.weight,
            weight_unit: self.weight_unit.map(|u| normalize_weight_unit(&u)),
            requires_shipping: self.requires_shipping,
            taxable: self.taxable,
            fulfillment_service: self.fulfillment_service.map(|s| s.to_lowercase()),
            title: self.title,
        }
    }
}

// =============================================================================
// GraphQL shape
// =============================================================================

/// camelCase GraphQL product node (flattened connections).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlProduct {
    body_html: Option<String>,
    description_html: Option<String>,
    handle: Option<String>,
    id: Option<RawId>,
    product_type: Option<String>,
    published_scope: Option<String>,
    status: Option<String>,
    template_suffix: Option<String>,
    title: Option<String>,
    vendor: Option<String>,
    tags: Option<RawTags>,
    #[serde(default)]
    options: Vec<GraphqlOption>,
    #[serde(default)]
    variants: Vec<GraphqlVariant>,
    images: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlOption {
    id: Option<RawId>,
    name: Option<String>,
    position: Option<i64>,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlVariant {
    id: Option<RawId>,
    barcode: Option<String>,
    price: Option<RawPrice>,
    compare_at_price: Option<String>,
    sku: Option<String>,
    position: Option<i64>,
    selected_options: Option<Vec<GraphqlSelectedOption>>,
    inventory_item: Option<GraphqlInventoryItem>,
    inventory_management: Option<String>,
    inventory_policy: Option<String>,
    inventory_quantity: Option<i64>,
    weight: Option<f64>,
    weight_unit: Option<String>,
    requires_shipping: Option<bool>,
    taxable: Option<bool>,
    fulfillment_service: Option<GraphqlFulfillmentService>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlSelectedOption {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphqlInventoryItem {
    id: Option<RawId>,
}

#[derive(Debug, Deserialize)]
struct GraphqlFulfillmentService {
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl GraphqlProduct {
    fn into_canonical(self) -> CanonicalProduct {
        CanonicalProduct {
            // descriptionHtml is the current field name, bodyHtml the legacy one
            body_html: self.description_html.or(self.body_html).unwrap_or_default(),
            handle: self.handle.unwrap_or_default(),
            id: raw_id(self.id.as_ref()),
            product_type: self.product_type.unwrap_or_default(),
            published_scope: self.published_scope.unwrap_or_else(|| "web".to_string()),
            status: self.status.unwrap_or_default().to_lowercase(),
            template_suffix: self.template_suffix.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            vendor: self.vendor.unwrap_or_default(),
            tags: self.tags.map(RawTags::into_joined).unwrap_or_default(),
            options: self
                .options
                .into_iter()
                .map(|option| CanonicalOption {
                    id: raw_id(option.id.as_ref()),
                    name: option.name.unwrap_or_default(),
                    position: option.position,
                    values: option.values,
                })
                .collect(),
            variants: self
                .variants
                .into_iter()
                .map(GraphqlVariant::into_canonical)
                .collect(),
            images: self.images.unwrap_or_default(),
        }
    }
}

impl GraphqlVariant {
    fn into_canonical(self) -> CanonicalVariant {
        let mut selected = self
            .selected_options
            .unwrap_or_default()
            .into_iter()
            .map(|option| option.value);

        let option1 = selected.next().flatten();
        let option2 = selected.next().flatten();
        let option3 = selected.next().flatten();

        CanonicalVariant {
            id: raw_id(self.id.as_ref()),
            product_id: None,
            barcode: self.barcode,
            price: self.price.map(|price| price.as_f64()).unwrap_or_default(),
            compare_at_price: self.compare_at_price,
            sku: self.sku,
            position: self.position,
            option1,
            option2,
            option3,
            inventory_item_id: self
                .inventory_item
                .and_then(|item| raw_id(item.id.as_ref())),
            inventory_management: self.inventory_management.map(|m| m.to_lowercase()),
            inventory_policy: self.inventory_policy.map(|p| p.to_lowercase()),
            inventory_quantity: self.inventory_quantity.unwrap_or_default(),
            weight: self.weight,
            weight_unit: self.weight_unit.map(|u| normalize_weight_unit(&u)),
            requires_shipping: self.requires_shipping,
            taxable: self.taxable,
            fulfillment_service: self
                .fulfillment_service
                .and_then(|service| service.kind)
                .map(|kind| kind.to_lowercase()),
            title: self.title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rest_payload() -> Value {
        json!({
            "id": 632_910_392,
            "title": "IPod Nano - 8GB",
            "body_html": "<p>It's the small iPod.</p>",
            "vendor": "Apple",
            "product_type": "Cult Products",
            "handle": "ipod-nano",
            "status": "ACTIVE",
            "published_scope": "global",
            "template_suffix": null,
            "tags": "Emotive, Flash Memory",
            "options": [
                { "id": 594_680_422, "name": "Color", "position": 1, "values": ["Pink"] }
            ],
            "variants": [
                {
                    "id": 808_950_810,
                    "product_id": 632_910_392,
                    "title": "Pink",
                    "price": "199.00",
                    "sku": "IPOD2008PINK",
                    "position": 1,
                    "option1": "Pink",
                    "inventory_item_id": 808_950_810,
                    "inventory_management": "SHOPIFY",
                    "inventory_policy": "CONTINUE",
                    "inventory_quantity": 10,
                    "weight": 1.25,
                    "weight_unit": "pounds",
                    "requires_shipping": true,
                    "taxable": true,
                    "fulfillment_service": "manual"
                }
            ],
            "images": [{ "id": 850_703_190, "src": "http://example.com/ipod.png" }]
        })
    }

    fn graphql_payload() -> Value {
        json!({
            "id": "gid://shopify/Product/632910392",
            "title": "IPod Nano - 8GB",
            "descriptionHtml": "<p>It's the small iPod.</p>",
            "vendor": "Apple",
            "productType": "Cult Products",
            "handle": "ipod-nano",
            "status": "ACTIVE",
            "tags": ["Emotive", "Flash Memory"],
            "options": [
                { "id": "gid://shopify/ProductOption/594680422", "name": "Color", "position": 1, "values": ["Pink"] }
            ],
            "variants": [
                {
                    "id": "gid://shopify/ProductVariant/808950810",
                    "title": "Pink",
                    "price": "199.00",
                    "sku": "IPOD2008PINK",
                    "position": 1,
                    "selectedOptions": [{ "name": "Color", "value": "Pink" }],
                    "inventoryItem": { "id": "gid://shopify/InventoryItem/808950810" },
                    "inventoryManagement": "SHOPIFY",
                    "inventoryPolicy": "CONTINUE",
                    "inventoryQuantity": 10,
                    "weight": 1.25,
                    "weightUnit": "POUNDS",
                    "requiresShipping": true,
                    "taxable": true,
                    "fulfillmentService": { "type": "MANUAL" }
                }
            ]
        })
    }

    #[test]
    fn test_normalize_rest_shape() {
        let product = normalize_value(&rest_payload()).expect("normalize");

        assert_eq!(product.id, Some(632_910_392));
        assert_eq!(product.status, "active");
        assert_eq!(product.published_scope, "global");
        assert_eq!(product.tags, "Emotive, Flash Memory");
        assert_eq!(product.template_suffix, "");

        let variant = &product.variants[0];
        assert!((variant.price - 199.0).abs() < f64::EPSILON);
        assert_eq!(variant.weight_unit.as_deref(), Some("lb"));
        assert_eq!(variant.inventory_management.as_deref(), Some("shopify"));
        assert_eq!(variant.inventory_item_id, Some(808_950_810));
    }

    #[test]
    fn test_normalize_graphql_shape() {
        let product = normalize_value(&graphql_payload()).expect("normalize");

        assert_eq!(product.id, Some(632_910_392));
        assert_eq!(product.body_html, "<p>It's the small iPod.</p>");
        assert_eq!(product.product_type, "Cult Products");
        assert_eq!(product.published_scope, "web");
        assert_eq!(product.tags, "Emotive, Flash Memory");

        let variant = &product.variants[0];
        assert_eq!(variant.id, Some(808_950_810));
        assert_eq!(variant.option1.as_deref(), Some("Pink"));
        assert_eq!(variant.inventory_item_id, Some(808_950_810));
        assert_eq!(variant.weight_unit.as_deref(), Some("lb"));
        assert_eq!(variant.fulfillment_service.as_deref(), Some("manual"));
    }

    #[test]
    fn test_both_shapes_normalize_identically_where_shared() {
        let rest = normalize_value(&rest_payload()).expect("rest");
        let graphql = normalize_value(&graphql_payload()).expect("graphql");

        assert_eq!(rest.id, graphql.id);
        assert_eq!(rest.title, graphql.title);
        assert_eq!(rest.tags, graphql.tags);
        assert_eq!(rest.status, graphql.status);
        assert_eq!(rest.variants[0].id, graphql.variants[0].id);
        assert!((rest.variants[0].price - graphql.variants[0].price).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_is_idempotent_on_canonical_output() {
        let first = normalize_value(&rest_payload()).expect("first pass");
        let as_json = serde_json::to_value(&first).expect("serialize");
        let second = normalize_value(&as_json).expect("second pass");

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_status_is_rejected() {
        let mut payload = rest_payload();
        payload.as_object_mut().expect("object").remove("status");

        let err = normalize_value(&payload).expect_err("should fail");
        assert!(matches!(err, NormalizeError::MissingField("status")));
    }

    #[test]
    fn test_missing_variants_is_rejected() {
        let mut payload = graphql_payload();
        payload.as_object_mut().expect("object").remove("variants");

        let err = normalize_value(&payload).expect_err("should fail");
        assert!(matches!(err, NormalizeError::MissingField("variants")));
    }

    #[test]
    fn test_parse_gid_tail() {
        assert_eq!(parse_gid_tail("gid://shopify/Product/123"), Some(123));
        assert_eq!(parse_gid_tail("123"), Some(123));
        assert_eq!(parse_gid_tail("gid://shopify/Product/abc"), None);
    }

    #[test]
    fn test_weight_unit_table() {
        assert_eq!(normalize_weight_unit("POUNDS"), "lb");
        assert_eq!(normalize_weight_unit("kilograms"), "kg");
        assert_eq!(normalize_weight_unit("grams"), "g");
        assert_eq!(normalize_weight_unit("ounces"), "oz");
        assert_eq!(normalize_weight_unit("Stone"), "stone");
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let payload = json!({
            "status": "draft",
            "options": [],
            "variants": []
        });

        let product = normalize_value(&payload).expect("normalize");
        assert_eq!(product.published_scope, "web");
        assert_eq!(product.product_type, "");
        assert_eq!(product.tags, "");
    }
}
