//! Reconciliation planning.
//!
//! Given a sync pair and an incoming product change, [`plan`] decides what
//! to write to each side of the pair and what to cache afterwards. The
//! planner is pure: it never touches the database or the platform API, it
//! only produces a [`ReconcilePlan`] for the server to execute. That split
//! keeps the loop-prevention and price/tag transformation rules testable
//! without any network.

use chrono::{DateTime, TimeDelta, Utc};

use crate::diff::{ProductDiff, diff};
use crate::product::{CanonicalProduct, append_marker, strip_marker};

/// Default factor applied to copy-side prices relative to the original.
pub const DEFAULT_PRICE_MULTIPLIER: f64 = 0.5;

/// Default marker tag carried by every copy product.
pub const DEFAULT_MARKER_TAG: &str = "ProductSync Copy";

/// Default debounce window in seconds. An inbound webhook arriving within
/// this window of the last completed sync is treated as the echo of our
/// own counterpart write and dropped.
pub const DEFAULT_DEBOUNCE_SECS: i64 = 10;

/// A tracked original/copy pair, loaded from its sync record.
#[derive(Debug, Clone)]
pub struct SyncPair {
    pub original_id: i64,
    pub copy_id: i64,
    /// Factor in (0, 1] applied to copy prices relative to the original.
    pub price_multiplier: f64,
    /// Marker tag recorded at duplication time. Stored per pair so records
    /// created under an older marker convention still strip correctly.
    pub marker_tag: String,
    /// Canonical snapshot as of the last completed sync. Always original
    /// scale and marker-free, regardless of which side was last edited.
    pub cached_product: CanonicalProduct,
    pub last_synced: DateTime<Utc>,
}

impl SyncPair {
    /// Which side of the pair a product id belongs to, if either.
    #[must_use]
    pub fn direction_of(&self, product_id: i64) -> Option<Direction> {
        if product_id == self.original_id {
            Some(Direction::Original)
        } else if product_id == self.copy_id {
            Some(Direction::Copy)
        } else {
            None
        }
    }
}

/// Which side of a sync pair an incoming change was made on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Original,
    Copy,
}

impl Direction {
    /// The id of the side that was edited.
    #[must_use]
    pub fn updated_id(self, pair: &SyncPair) -> i64 {
        match self {
            Self::Original => pair.original_id,
            Self::Copy => pair.copy_id,
        }
    }

    /// The id of the side that must now be brought up to date.
    #[must_use]
    pub fn counterpart_id(self, pair: &SyncPair) -> i64 {
        match self {
            Self::Original => pair.copy_id,
            Self::Copy => pair.original_id,
        }
    }
}

/// The result of planning a reconciliation pass.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The change arrived within the debounce window of the last sync;
    /// treated as the echo of our own write.
    Suppressed,
    /// Nothing differs from the cached snapshot. The cache and the
    /// debounce clock are left untouched so a genuinely new change
    /// arriving moments later is not suppressed.
    NoChange,
    /// Writes are required; execute the plan.
    Apply(Box<ReconcilePlan>),
}

/// Everything the server needs to bring a pair back in sync.
#[derive(Debug, Clone)]
pub struct ReconcilePlan {
    pub direction: Direction,
    /// Update for the original product. Tags are marker-free, prices are
    /// original scale.
    pub original_update: ProductDiff,
    /// Update for the copy product. Tags carry the marker and prices are
    /// scaled by the pair's multiplier. Per-variant identity fields are
    /// absent, so the copy keeps its own.
    pub copy_update: ProductDiff,
    /// Per-variant inventory quantities from the edited side, in variant
    /// order, for inventory-level reconciliation on the counterpart.
    pub inventory_quantities: Vec<i64>,
    /// The snapshot to persist once the writes land. Original scale,
    /// marker-free, identity-scrubbed, with the edited payload's images
    /// retained for display.
    pub new_cache: CanonicalProduct,
}

/// Round a price to cents after scaling to keep float dust out of the
/// platform payloads.
fn scale_price(price: f64, factor: f64) -> f64 {
    (price * factor * 100.0).round() / 100.0
}

/// Clear identity fields and images before diffing, so a diff computed
/// from either side can be replayed against the other. Inventory item
/// ids are identity too: each side owns its own.
fn scrub(product: &CanonicalProduct) -> CanonicalProduct {
    let mut scrubbed = product.clone();
    scrubbed.id = None;
    scrubbed.images = Vec::new();
    for option in &mut scrubbed.options {
        option.id = None;
    }
    for variant in &mut scrubbed.variants {
        variant.id = None;
        variant.product_id = None;
        variant.inventory_item_id = None;
    }
    scrubbed
}

/// Plan one reconciliation pass for an incoming change.
///
/// `payload` is the normalized product from the webhook; `direction` says
/// which side of the pair it belongs to (see [`SyncPair::direction_of`]).
#[must_use]
pub fn plan(
    pair: &SyncPair,
    payload: &CanonicalProduct,
    direction: Direction,
    now: DateTime<Utc>,
    debounce: TimeDelta,
) -> Outcome {
    if now - pair.last_synced < debounce {
        return Outcome::Suppressed;
    }

    // Bring the incoming product to original scale. The cache invariant is
    // that snapshots are original-scale and marker-free, so copy-side
    // edits are reversed before diffing.
    let mut incoming = payload.clone();
    incoming.tags = strip_marker(&incoming.tags, &pair.marker_tag);
    if direction == Direction::Copy {
        for variant in &mut incoming.variants {
            variant.price = scale_price(variant.price, 1.0 / pair.price_multiplier);
        }
    }

    let mut differences = diff(&scrub(&pair.cached_product), &scrub(&incoming));
    if differences.is_empty() {
        return Outcome::NoChange;
    }

    // Tags are always reconciled even when unchanged, because the marker
    // suffix differs per side.
    differences.tags = Some(incoming.tags.clone());

    let original_update = differences.clone();

    // Diffed variants come out of the scrub with identity fields already
    // cleared, so the copy write cannot clobber the copy's own ids.
    let mut copy_update = differences.clone();
    copy_update.tags = copy_update
        .tags
        .map(|tags| append_marker(&tags, &pair.marker_tag));
    if let Some(variants) = &mut copy_update.variants {
        for variant in variants {
            variant.price = scale_price(variant.price, pair.price_multiplier);
        }
    }

    let inventory_quantities = payload
        .variants
        .iter()
        .map(|variant| variant.inventory_quantity)
        .collect();

    // The cache stores no platform identity fields, so an echo from
    // either side diffs clean once the debounce window has passed.
    let mut new_cache = scrub(&incoming);
    new_cache.id = Some(pair.original_id);
    new_cache.images = incoming.images;

    Outcome::Apply(Box::new(ReconcilePlan {
        direction,
        original_update,
        copy_update,
        inventory_quantities,
        new_cache,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::CanonicalVariant;

    fn widget(price: f64, tags: &str) -> CanonicalProduct {
        CanonicalProduct {
            id: Some(100),
            title: "Widget".to_string(),
            status: "active".to_string(),
            tags: tags.to_string(),
            variants: vec![CanonicalVariant {
                id: Some(1001),
                product_id: Some(100),
                price,
                inventory_quantity: 5,
                ..CanonicalVariant::default()
            }],
            ..CanonicalProduct::default()
        }
    }

    fn pair() -> SyncPair {
        SyncPair {
            original_id: 100,
            copy_id: 200,
            price_multiplier: DEFAULT_PRICE_MULTIPLIER,
            marker_tag: DEFAULT_MARKER_TAG.to_string(),
            cached_product: widget(10.0, "blue"),
            last_synced: DateTime::<Utc>::MIN_UTC,
        }
    }

    fn debounce() -> TimeDelta {
        TimeDelta::seconds(DEFAULT_DEBOUNCE_SECS)
    }

    fn apply(outcome: Outcome) -> Box<ReconcilePlan> {
        match outcome {
            Outcome::Apply(plan) => plan,
            other => panic!("expected Apply, got {other:?}"),
        }
    }

    #[test]
    fn test_change_within_debounce_window_is_suppressed() {
        let mut pair = pair();
        pair.last_synced = Utc::now();

        let mut payload = widget(10.0, "blue");
        payload.title = "Widget Pro".to_string();

        let outcome = plan(&pair, &payload, Direction::Original, Utc::now(), debounce());
        assert!(matches!(outcome, Outcome::Suppressed));
    }

    #[test]
    fn test_unchanged_payload_is_no_change() {
        let outcome = plan(
            &pair(),
            &widget(10.0, "blue"),
            Direction::Original,
            Utc::now(),
            debounce(),
        );
        assert!(matches!(outcome, Outcome::NoChange));
    }

    #[test]
    fn test_echo_of_counterpart_write_terminates_the_loop() {
        // An original edit lands, the copy is rewritten, and the copy's
        // own webhook comes back. Inside the window it is suppressed;
        // after the window it matches the refreshed cache and is a
        // no-change pass. Either way no third write happens.
        let edited = widget(12.0, "blue");
        let plan_out = apply(plan(
            &pair(),
            &edited,
            Direction::Original,
            Utc::now(),
            debounce(),
        ));

        let refreshed = SyncPair {
            cached_product: plan_out.new_cache.clone(),
            last_synced: Utc::now(),
            ..pair()
        };

        // The copy webhook echoes back what we just wrote: scaled price,
        // marker tag appended.
        let mut echo = widget(6.0, "blue, ProductSync Copy");
        echo.id = Some(200);

        let within = plan(&refreshed, &echo, Direction::Copy, Utc::now(), debounce());
        assert!(matches!(within, Outcome::Suppressed));

        let later = Utc::now() + TimeDelta::seconds(DEFAULT_DEBOUNCE_SECS + 1);
        let after = plan(&refreshed, &echo, Direction::Copy, later, debounce());
        assert!(matches!(after, Outcome::NoChange));
    }

    #[test]
    fn test_title_change_on_original() {
        let mut payload = widget(10.0, "blue");
        payload.title = "Widget Pro".to_string();

        let plan_out = apply(plan(
            &pair(),
            &payload,
            Direction::Original,
            Utc::now(),
            debounce(),
        ));

        assert_eq!(plan_out.original_update.title.as_deref(), Some("Widget Pro"));
        assert_eq!(plan_out.copy_update.title.as_deref(), Some("Widget Pro"));
        // Tags are always present, marker-free on the original side and
        // marker-tagged on the copy side.
        assert_eq!(plan_out.original_update.tags.as_deref(), Some("blue"));
        assert_eq!(
            plan_out.copy_update.tags.as_deref(),
            Some("blue, ProductSync Copy")
        );
        assert!(plan_out.original_update.variants.is_none());
        assert_eq!(plan_out.new_cache.title, "Widget Pro");
        assert_eq!(plan_out.new_cache.id, Some(100));
    }

    #[test]
    fn test_copy_price_edit_is_reversed_to_original_scale() {
        // Copy price goes 5.00 -> 6.00 under a 0.5 multiplier, so the
        // original must land at 12.00 and the copy write confirms 6.00.
        let mut payload = widget(6.0, "blue, ProductSync Copy");
        payload.id = Some(200);

        let plan_out = apply(plan(
            &pair(),
            &payload,
            Direction::Copy,
            Utc::now(),
            debounce(),
        ));

        let original_variants = plan_out
            .original_update
            .variants
            .as_ref()
            .expect("price changed");
        assert!((original_variants[0].price - 12.0).abs() < f64::EPSILON);

        let copy_variants = plan_out.copy_update.variants.as_ref().expect("price changed");
        assert!((copy_variants[0].price - 6.0).abs() < f64::EPSILON);
        assert!(copy_variants[0].id.is_none());
        assert!(copy_variants[0].product_id.is_none());
        assert!(copy_variants[0].inventory_item_id.is_none());

        // The cache stays original scale, marker free, and carries none
        // of the copy's identity fields.
        assert!((plan_out.new_cache.variants[0].price - 12.0).abs() < f64::EPSILON);
        assert_eq!(plan_out.new_cache.tags, "blue");
        assert!(plan_out.new_cache.variants[0].id.is_none());
        assert!(plan_out.new_cache.variants[0].inventory_item_id.is_none());
    }

    #[test]
    fn test_echo_with_copy_identity_fields_is_no_change_after_window() {
        // The copy's variants carry their own variant and inventory item
        // ids; none of them may defeat no-change detection once the
        // window has passed.
        let edited = widget(12.0, "blue");
        let plan_out = apply(plan(
            &pair(),
            &edited,
            Direction::Original,
            Utc::now(),
            debounce(),
        ));

        let refreshed = SyncPair {
            cached_product: plan_out.new_cache.clone(),
            last_synced: Utc::now(),
            ..pair()
        };

        let mut echo = widget(6.0, "blue, ProductSync Copy");
        echo.id = Some(200);
        echo.variants[0].id = Some(2001);
        echo.variants[0].product_id = Some(200);
        echo.variants[0].inventory_item_id = Some(9002);

        let later = Utc::now() + TimeDelta::seconds(DEFAULT_DEBOUNCE_SECS + 1);
        let after = plan(&refreshed, &echo, Direction::Copy, later, debounce());
        assert!(matches!(after, Outcome::NoChange));
    }

    #[test]
    fn test_direction_symmetry() {
        // Editing the original to 12.00 and editing the copy to 6.00 (its
        // scaled equivalent) must produce the same counterpart writes.
        let from_original = apply(plan(
            &pair(),
            &widget(12.0, "blue"),
            Direction::Original,
            Utc::now(),
            debounce(),
        ));

        let mut copy_payload = widget(6.0, "blue, ProductSync Copy");
        copy_payload.id = Some(200);
        let from_copy = apply(plan(
            &pair(),
            &copy_payload,
            Direction::Copy,
            Utc::now(),
            debounce(),
        ));

        assert_eq!(from_original.original_update, from_copy.original_update);
        assert_eq!(from_original.copy_update, from_copy.copy_update);
    }

    #[test]
    fn test_inventory_quantities_come_from_the_edited_side() {
        let mut payload = widget(10.0, "blue");
        payload.variants[0].inventory_quantity = 42;

        let plan_out = apply(plan(
            &pair(),
            &payload,
            Direction::Original,
            Utc::now(),
            debounce(),
        ));
        assert_eq!(plan_out.inventory_quantities, vec![42]);
    }

    #[test]
    fn test_direction_lookup() {
        let pair = pair();
        assert_eq!(pair.direction_of(100), Some(Direction::Original));
        assert_eq!(pair.direction_of(200), Some(Direction::Copy));
        assert_eq!(pair.direction_of(300), None);

        assert_eq!(Direction::Original.counterpart_id(&pair), 200);
        assert_eq!(Direction::Copy.counterpart_id(&pair), 100);
        assert_eq!(Direction::Copy.updated_id(&pair), 200);
    }

    #[test]
    fn test_scaled_prices_round_to_cents() {
        assert!((scale_price(9.99, 0.5) - 5.0).abs() < f64::EPSILON);
        assert!((scale_price(5.0, 1.0 / 0.5) - 10.0).abs() < f64::EPSILON);
        assert!((scale_price(0.1, 0.5) - 0.05).abs() < f64::EPSILON);
    }
}
