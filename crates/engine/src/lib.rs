//! # Cartolabel Engine
//!
//! Automated map-label placement. Features are registered per layer with
//! caller-measured label metrics, the engine generates weighted candidate
//! positions (around points, along or bending with lines, inside polygons),
//! builds a conflict graph over overlapping candidates, and selects a
//! non-overlapping assignment by local search.
//!
//! ## Quick start
//!
//! ```
//! use cartolabel_engine::{Aabb, Arrangement, EngineConfig, LabelInfo, Layer, Pal};
//! use geo::{point, Geometry};
//!
//! let mut pal = Pal::with_config(EngineConfig::new().with_seed(1));
//!
//! let layer = Layer::new("poi", Arrangement::AroundPoint);
//! layer.register_feature(
//!     LabelInfo::new("cafe", "Cafe", 12.0, 4.0).with_distance(1.0),
//!     &Geometry::Point(point!(x: 50.0, y: 50.0)),
//! )?;
//! pal.add_layer(layer);
//!
//! let result = pal.compute_labeling(&Aabb::new(0.0, 0.0, 100.0, 100.0))?;
//! assert_eq!(result.placed_count(), 1);
//! # Ok::<(), cartolabel_engine::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod candidates;
pub mod engine;
pub mod feature;
pub mod label;
pub mod layer;
pub mod pointset;
pub mod polylabel;
pub mod problem;
pub mod spatial_index;

// Re-exports
pub use cartolabel_core::{
    Aabb, CharPosition, EngineConfig, Error, LabelingResult, LabelingSummary, PlacedLabel,
    Result, SearchMethod,
};
pub use engine::Pal;
pub use feature::{FeaturePart, GeomKind, LabelInfo, Quadrant};
pub use label::{CharBox, LabelPosition};
pub use layer::{Arrangement, Layer, ObstacleKind};
pub use pointset::{Point, PointSet};
pub use problem::Problem;
pub use spatial_index::{IndexEntry, SpatialIndex};
