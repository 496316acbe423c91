//! Field-level diffing between canonical products.
//!
//! A diff answers one question: which fields changed between the cached
//! snapshot and the incoming product. Collections (options, variants) are
//! compared wholesale; a change anywhere inside a collection reports the
//! entire new collection.

use serde::{Deserialize, Serialize};

use crate::product::{CanonicalOption, CanonicalProduct, CanonicalVariant};

/// The set of fields that changed between two canonical products.
///
/// `None` means unchanged; `Some` carries the new value. A field that is
/// present on the new product but absent (defaulted) on the cached one
/// counts as changed, so first-sync updates propagate everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<CanonicalOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<CanonicalVariant>>,
}

impl ProductDiff {
    /// True when no field differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn changed<T: PartialEq + Clone>(before: &T, after: &T) -> Option<T> {
    (before != after).then(|| after.clone())
}

/// Compute the field-level difference between two canonical products.
///
/// Ids are intentionally not compared; callers scrub identity fields from
/// both sides before diffing so a diff can be replayed against either
/// member of a sync pair.
#[must_use]
pub fn diff(before: &CanonicalProduct, after: &CanonicalProduct) -> ProductDiff {
    ProductDiff {
        body_html: changed(&before.body_html, &after.body_html),
        handle: changed(&before.handle, &after.handle),
        product_type: changed(&before.product_type, &after.product_type),
        published_scope: changed(&before.published_scope, &after.published_scope),
        status: changed(&before.status, &after.status),
        template_suffix: changed(&before.template_suffix, &after.template_suffix),
        title: changed(&before.title, &after.title),
        vendor: changed(&before.vendor, &after.vendor),
        tags: changed(&before.tags, &after.tags),
        options: changed(&before.options, &after.options),
        variants: changed(&before.variants, &after.variants),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> CanonicalProduct {
        CanonicalProduct {
            title: "Widget".to_string(),
            body_html: "<p>A widget.</p>".to_string(),
            status: "active".to_string(),
            tags: "blue, sale".to_string(),
            vendor: "Acme".to_string(),
            variants: vec![CanonicalVariant {
                price: 10.0,
                sku: Some("W-1".to_string()),
                ..CanonicalVariant::default()
            }],
            options: vec![CanonicalOption {
                name: "Title".to_string(),
                values: vec!["Default Title".to_string()],
                ..CanonicalOption::default()
            }],
            ..CanonicalProduct::default()
        }
    }

    #[test]
    fn test_diff_of_identical_products_is_empty() {
        let product = widget();
        assert!(diff(&product, &product).is_empty());
    }

    #[test]
    fn test_diff_reports_only_changed_fields() {
        let before = widget();
        let mut after = widget();
        after.title = "Gadget".to_string();

        let differences = diff(&before, &after);
        assert_eq!(differences.title.as_deref(), Some("Gadget"));
        assert!(differences.body_html.is_none());
        assert!(differences.tags.is_none());
        assert!(differences.variants.is_none());
    }

    #[test]
    fn test_variant_price_change_reports_whole_collection() {
        let before = widget();
        let mut after = widget();
        after.variants[0].price = 12.0;

        let differences = diff(&before, &after);
        let variants = differences.variants.expect("variants changed");
        assert_eq!(variants.len(), 1);
        assert!((variants[0].price - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_field_absent_on_cached_side_counts_as_changed() {
        let before = CanonicalProduct {
            title: "Widget".to_string(),
            ..CanonicalProduct::default()
        };
        let after = widget();

        let differences = diff(&before, &after);
        assert!(differences.title.is_none());
        assert_eq!(differences.vendor.as_deref(), Some("Acme"));
        assert_eq!(differences.body_html.as_deref(), Some("<p>A widget.</p>"));
        assert!(differences.variants.is_some());
    }

    #[test]
    fn test_is_empty_on_default() {
        assert!(ProductDiff::default().is_empty());
    }
}
