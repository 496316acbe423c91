//! ProductSync Core - canonical product model and reconciliation logic.
//!
//! This crate holds the pure heart of the sync engine:
//! - [`product`] - the canonical product representation shared by every
//!   other component, plus marker-tag string handling
//! - [`normalize`] - conversion of the two Shopify product shapes
//!   (REST webhooks, GraphQL picker payloads) into the canonical form
//! - [`diff`] - field-level diffing between two canonical products
//! - [`reconcile`] - the reconciliation planner: given a sync pair and an
//!   incoming change, decide what to write to each side and what to cache
//!
//! # Architecture
//!
//! The core crate contains no I/O - no database access, no HTTP clients.
//! The server crate executes the plans this crate produces, which keeps
//! the loop-prevention and transformation logic testable in isolation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod diff;
pub mod normalize;
pub mod product;
pub mod reconcile;

pub use diff::{ProductDiff, diff};
pub use normalize::{NormalizeError, RawProduct, normalize, normalize_value};
pub use product::{CanonicalOption, CanonicalProduct, CanonicalVariant};
pub use reconcile::{Direction, Outcome, ReconcilePlan, SyncPair, plan};
