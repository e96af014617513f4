//! R*-tree spatial index.
//!
//! Broad-phase overlap queries for two workloads: feature-part bounding
//! boxes inside a layer, and candidate label boxes during conflict-graph
//! construction. A bounding-box hit is a pre-filter only; callers confirm
//! with an exact geometric test.

use cartolabel_core::Aabb;
use rstar::{RTree, RTreeObject, AABB};

/// An indexed bounding box referring back to an arena slot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Arena index of the part or candidate.
    pub index: usize,
    /// Bounding box (min_x, min_y, max_x, max_y).
    pub bbox: [f64; 4],
}

impl IndexEntry {
    /// Creates an entry from an arena index and a bounding box.
    pub fn new(index: usize, bbox: &Aabb) -> Self {
        Self {
            index,
            bbox: [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y],
        }
    }
}

impl RTreeObject for IndexEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.bbox[0], self.bbox[1]], [self.bbox[2], self.bbox[3]])
    }
}

/// 2D spatial index over arena slots.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    tree: RTree<IndexEntry>,
}

impl SpatialIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Bulk-loads an index from entries.
    pub fn with_entries(entries: Vec<IndexEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Inserts one entry.
    pub fn insert(&mut self, entry: IndexEntry) {
        self.tree.insert(entry);
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns true if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Lazily yields entries whose boxes intersect the query box.
    pub fn query<'a>(&'a self, bbox: &Aabb) -> impl Iterator<Item = &'a IndexEntry> + 'a {
        let envelope = AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y]);
        self.tree.locate_in_envelope_intersecting(&envelope)
    }

    /// Arena indices of entries intersecting the query box grown by `margin`.
    pub fn query_with_margin(&self, bbox: &Aabb, margin: f64) -> Vec<usize> {
        self.query(&bbox.expanded(margin)).map(|e| e.index).collect()
    }

    /// Iterates over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.tree.iter()
    }
}
