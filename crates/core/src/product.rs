//! Canonical product representation.
//!
//! Shopify returns products in two shapes (snake_case REST resources and
//! camelCase GraphQL nodes). Everything downstream of the normalizer works
//! exclusively with the canonical types in this module, which mirror the
//! REST resource schema. The canonical form also serializes back to the
//! REST shape, so a cached snapshot can be re-normalized on the next pass.

use serde::{Deserialize, Serialize};

/// A product in canonical form.
///
/// Scalar text fields default to the empty string when the source omits
/// them, so two products can always be compared field for field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    #[serde(default)]
    pub body_html: String,
    #[serde(default)]
    pub handle: String,
    /// Platform product id. `None` for not-yet-created products.
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub published_scope: String,
    /// Lower-cased status (`active`, `draft`, `archived`).
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub template_suffix: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub vendor: String,
    /// Comma-and-space joined tag list, regardless of source shape.
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub options: Vec<CanonicalOption>,
    #[serde(default)]
    pub variants: Vec<CanonicalVariant>,
    /// Raw image objects, kept only so the cached snapshot can be shown in
    /// the UI. Images are never diffed and never written to a counterpart.
    #[serde(default)]
    pub images: Vec<serde_json::Value>,
}

/// A product option (e.g. Size, Color) in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOption {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A product variant in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalVariant {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub barcode: Option<String>,
    /// Price in shop currency. Stored original-scale in the cache; the
    /// copy-side multiplier is applied at write time only.
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub compare_at_price: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default)]
    pub option3: Option<String>,
    #[serde(default)]
    pub inventory_item_id: Option<i64>,
    #[serde(default)]
    pub inventory_management: Option<String>,
    #[serde(default)]
    pub inventory_policy: Option<String>,
    #[serde(default)]
    pub inventory_quantity: i64,
    #[serde(default)]
    pub weight: Option<f64>,
    /// Normalized to one of `lb` / `kg` / `g` / `oz` where recognized.
    #[serde(default)]
    pub weight_unit: Option<String>,
    #[serde(default)]
    pub requires_shipping: Option<bool>,
    #[serde(default)]
    pub taxable: Option<bool>,
    #[serde(default)]
    pub fulfillment_service: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Remove every occurrence of the marker tag from a comma-joined tag list.
///
/// The marker comparison is exact (after trimming), so a product legitimately
/// tagged "Copy Paper" is untouched by a "Copy" marker.
#[must_use]
pub fn strip_marker(tags: &str, marker: &str) -> String {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && *tag != marker)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append the marker tag to a comma-joined tag list.
///
/// Idempotent: a list that already carries the marker is returned unchanged.
#[must_use]
pub fn append_marker(tags: &str, marker: &str) -> String {
    if tags.split(',').map(str::trim).any(|tag| tag == marker) {
        return tags.to_string();
    }
    if tags.trim().is_empty() {
        marker.to_string()
    } else {
        format!("{tags}, {marker}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_marker_middle() {
        assert_eq!(
            strip_marker("blue, ProductSync Copy, sale", "ProductSync Copy"),
            "blue, sale"
        );
    }

    #[test]
    fn test_strip_marker_only_tag() {
        assert_eq!(strip_marker("ProductSync Copy", "ProductSync Copy"), "");
    }

    #[test]
    fn test_strip_marker_absent() {
        assert_eq!(strip_marker("blue, sale", "ProductSync Copy"), "blue, sale");
    }

    #[test]
    fn test_strip_marker_is_exact_match() {
        assert_eq!(strip_marker("Copy Paper", "Copy"), "Copy Paper");
    }

    #[test]
    fn test_append_marker_empty() {
        assert_eq!(append_marker("", "ProductSync Copy"), "ProductSync Copy");
    }

    #[test]
    fn test_append_marker_nonempty() {
        assert_eq!(
            append_marker("blue", "ProductSync Copy"),
            "blue, ProductSync Copy"
        );
    }

    #[test]
    fn test_append_marker_idempotent() {
        let once = append_marker("blue", "ProductSync Copy");
        assert_eq!(append_marker(&once, "ProductSync Copy"), once);
    }

    #[test]
    fn test_canonical_round_trips_through_json() {
        let product = CanonicalProduct {
            title: "Widget".to_string(),
            status: "active".to_string(),
            tags: "blue".to_string(),
            variants: vec![CanonicalVariant {
                price: 10.0,
                ..CanonicalVariant::default()
            }],
            ..CanonicalProduct::default()
        };

        let json = serde_json::to_value(&product).expect("serialize");
        let back: CanonicalProduct = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, product);
    }
}
