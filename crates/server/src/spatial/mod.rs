//! Spatial indexing.
//!
//! A uniform hash grid over the world: entity count grows, query cost
//! stays proportional to the entities near the queried region.

mod grid;

pub use grid::{Bounds, SpatialGrid};
