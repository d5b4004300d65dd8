use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geometry::{BBox, Point};

/// An entry in the R-tree spatial index, referencing a shape by its slot on
/// the indexed layer.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    /// Slot index into the cell's per-layer shape list.
    pub shape_index: usize,
    /// Bounding box of the shape, in database units.
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.left, self.bbox.bottom],
            [self.bbox.right, self.bbox.top],
        )
    }
}

impl PointDistance for SpatialEntry {
    fn distance_2(&self, point: &[i64; 2]) -> i64 {
        self.envelope().distance_2(point)
    }
}

/// Spatial index over one layer of a cell, for region-restricted lookups.
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    /// Build the index from a list of shape bounding boxes.
    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Insert a single entry.
    pub fn insert(&mut self, entry: SpatialEntry) {
        self.tree.insert(entry);
    }

    /// Find all entries whose bounding box contains the given point.
    pub fn query_point(&self, point: &Point) -> Vec<&SpatialEntry> {
        self.tree.locate_all_at_point(&[point.x, point.y]).collect()
    }

    /// Find all entries whose bounding box touches the given region.
    pub fn query_region(&self, region: &BBox) -> Vec<&SpatialEntry> {
        let envelope = AABB::from_corners(
            [region.left, region.bottom],
            [region.right, region.top],
        );
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::geometry::{Rect, Shape};

    #[test]
    fn test_spatial_query() {
        let entries = vec![
            SpatialEntry {
                shape_index: 0,
                bbox: BBox::new(0, 0, 10, 10),
            },
            SpatialEntry {
                shape_index: 1,
                bbox: BBox::new(20, 20, 30, 30),
            },
        ];
        let index = SpatialIndex::build(entries);

        let results = index.query_point(&Point::new(5, 5));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].shape_index, 0);

        let results = index.query_point(&Point::new(25, 25));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].shape_index, 1);

        let region = BBox::new(-5, -5, 15, 15);
        assert_eq!(index.query_region(&region).len(), 1);
    }

    #[test]
    fn test_index_built_from_cell_layer() {
        let mut cell = Cell::new("unit");
        cell.add_shape(0, Shape::Rect(Rect::new(0, 0, 10, 10)));
        cell.add_shape(0, Shape::Rect(Rect::new(100, 100, 110, 110)));
        cell.add_shape(1, Shape::Rect(Rect::new(0, 0, 1, 1)));

        let index = cell.spatial_index(0);
        assert_eq!(index.len(), 2);
        let hits = index.query_region(&BBox::new(90, 90, 120, 120));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].shape_index, 1);
    }
}
