//! # Cartolabel Core
//!
//! Shared foundation for the cartolabel automated label placement engine.
//!
//! This crate provides the types that are independent of any particular
//! geometry kind: the error taxonomy, axis-aligned bounding boxes, engine
//! configuration, the labeling result model and the local-search framework
//! used by the selection phase.
//!
//! ## Core Components
//!
//! - **Errors**: [`Error`], [`Result`]
//! - **Bounding boxes**: [`Aabb`]
//! - **Configuration**: [`EngineConfig`], [`SearchMethod`]
//! - **Results**: [`LabelingResult`], [`PlacedLabel`], [`CharPosition`]
//! - **Search framework**: [`SearchProblem`], [`SearchRunner`], [`SearchConfig`]
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod bbox;
pub mod config;
pub mod error;
pub mod result;
pub mod search;

// Re-exports
pub use bbox::Aabb;
pub use config::{EngineConfig, SearchMethod};
pub use error::{Error, Result};
pub use result::{CharPosition, LabelingResult, LabelingSummary, PlacedLabel};
pub use search::{SearchConfig, SearchOutcome, SearchProblem, SearchRunner};
