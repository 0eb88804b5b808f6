//! Category routing.
//!
//! This module is **pure selection logic**: it performs no network calls and never mutates
//! provider health. [`RoutingTable`] holds the per-category preference lists,
//! [`RoutingPolicy`] keeps the live table behind an `ArcSwap` and turns a category (plus an
//! optional provider override) into a [`RoutePlan`] for the executor.

mod policy;
mod table;

pub use policy::{RouteCandidate, RoutePlan, RoutingPolicy};
pub use table::{default_routes, RoutingTable};
