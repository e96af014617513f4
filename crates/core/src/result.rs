//! Labeling result representation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position of one character of a curved label.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CharPosition {
    /// Character box origin x.
    pub x: f64,
    /// Character box origin y.
    pub y: f64,
    /// Character rotation in radians.
    pub angle: f64,
    /// Character advance width.
    pub width: f64,
}

/// An accepted label placement.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlacedLabel {
    /// Feature id this label belongs to.
    pub feature: String,

    /// Name of the layer the feature was registered in.
    pub layer: String,

    /// Label box origin x (lower-left corner before rotation).
    pub x: f64,

    /// Label box origin y.
    pub y: f64,

    /// Label box width.
    pub width: f64,

    /// Label box height.
    pub height: f64,

    /// Rotation in radians, counter-clockwise around the origin.
    pub angle: f64,

    /// Cost of the chosen candidate (0 = ideal).
    pub cost: f64,

    /// Per-character sub-positions for curved labels (empty otherwise).
    pub chars: Vec<CharPosition>,
}

/// Result of one labeling pass.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelingResult {
    /// Accepted placements.
    pub labels: Vec<PlacedLabel>,

    /// Ids of features that could not be labeled.
    pub unplaced: Vec<String>,

    /// Total candidates generated during the pass.
    pub candidates_generated: usize,

    /// Conflict edges found between candidates.
    pub conflicts: usize,

    /// Selection search iterations performed.
    pub iterations: u64,

    /// Wall-clock time of the pass in milliseconds.
    pub computation_time_ms: u64,

    /// True if the pass was aborted and the assignment is partial.
    pub cancelled: bool,

    /// Selection method used.
    pub method: Option<String>,
}

impl LabelingResult {
    /// Creates a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if every feature received a label.
    pub fn all_placed(&self) -> bool {
        self.unplaced.is_empty()
    }

    /// Returns the number of accepted placements.
    pub fn placed_count(&self) -> usize {
        self.labels.len()
    }

    /// Returns the number of unlabeled features.
    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }

    /// Sets the method name.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Removes duplicate ids from the unplaced list.
    ///
    /// Useful when several parts of the same feature failed independently.
    pub fn deduplicate_unplaced(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.unplaced.retain(|id| seen.insert(id.clone()));
    }

    /// Computes summary statistics.
    pub fn summary(&self) -> LabelingSummary {
        LabelingSummary::from(self)
    }
}

/// Summary statistics for a labeling pass.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelingSummary {
    /// Features requested (placed + unplaced).
    pub total_requested: usize,
    /// Labels placed.
    pub total_placed: usize,
    /// Conflict edges in the candidate graph.
    pub conflicts: usize,
    /// Wall-clock time in milliseconds.
    pub time_ms: u64,
    /// Selection method.
    pub method: String,
}

impl From<&LabelingResult> for LabelingSummary {
    fn from(result: &LabelingResult) -> Self {
        Self {
            total_requested: result.labels.len() + result.unplaced.len(),
            total_placed: result.labels.len(),
            conflicts: result.conflicts,
            time_ms: result.computation_time_ms,
            method: result
                .method
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}
