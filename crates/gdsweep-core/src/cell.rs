use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{BBox, Point, Shape};
use crate::spatial::{SpatialEntry, SpatialIndex};
use crate::LayerIndex;

/// Unique cell identifier.
pub type CellId = Uuid;

/// A transformation for placing subcell instances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Transform {
    /// Translation offset in database units.
    pub offset: Point,
    /// Rotation in degrees (0, 90, 180, 270).
    pub rotation: f64,
    /// Mirror about the X axis.
    pub mirror_x: bool,
    /// Magnification (typically 1.0).
    pub mag: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset: Point::new(0, 0),
            rotation: 0.0,
            mirror_x: false,
            mag: 1.0,
        }
    }
}

impl Transform {
    pub fn translate(x: i64, y: i64) -> Self {
        Self {
            offset: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn apply(&self, point: &Point) -> Point {
        let mut x = point.x as f64 * self.mag;
        let mut y = point.y as f64 * self.mag;

        if self.mirror_x {
            y = -y;
        }

        let rad = self.rotation.to_radians();
        let (sin_r, cos_r) = rad.sin_cos();
        let rx = x * cos_r - y * sin_r;
        let ry = x * sin_r + y * cos_r;
        x = rx;
        y = ry;

        Point::new(
            x.round() as i64 + self.offset.x,
            y.round() as i64 + self.offset.y,
        )
    }
}

/// A reference to a subcell placed within a parent cell.
///
/// The target is referenced by name, like a GDS-II SREF; it is resolved
/// against the layout's cell set when the hierarchy is walked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellInstance {
    pub id: Uuid,
    pub cell_name: String,
    pub transform: Transform,
}

impl CellInstance {
    pub fn new(cell_name: &str, transform: Transform) -> Self {
        Self {
            id: Uuid::new_v4(),
            cell_name: cell_name.to_string(),
            transform,
        }
    }
}

/// A layout cell holding, per layer index, a list of shapes, plus subcell
/// references.
///
/// Each layer's shape list keeps insertion order, and removals preserve the
/// relative order of the surviving shapes. Code that picks a survivor among
/// duplicates therefore gets a deterministic "first in storage order" answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
    shapes: BTreeMap<LayerIndex, Vec<Shape>>,
    pub instances: Vec<CellInstance>,
    pub modified: bool,
}

impl Cell {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            shapes: BTreeMap::new(),
            instances: Vec::new(),
            modified: false,
        }
    }

    pub fn add_shape(&mut self, layer: LayerIndex, shape: Shape) {
        self.shapes.entry(layer).or_default().push(shape);
        self.modified = true;
    }

    /// Shapes on a layer, in insertion order. Empty for an untouched layer.
    pub fn shapes(&self, layer: LayerIndex) -> &[Shape] {
        self.shapes.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn shape_count(&self, layer: LayerIndex) -> usize {
        self.shapes.get(&layer).map(Vec::len).unwrap_or(0)
    }

    pub fn total_shape_count(&self) -> usize {
        self.shapes.values().map(Vec::len).sum()
    }

    /// Remove one shape by its slot index on a layer.
    pub fn remove_shape(&mut self, layer: LayerIndex, index: usize) -> Option<Shape> {
        let list = self.shapes.get_mut(&layer)?;
        if index < list.len() {
            self.modified = true;
            Some(list.remove(index))
        } else {
            None
        }
    }

    /// Remove several shapes from a layer at once.
    ///
    /// Slots are removed in descending order so the remaining indices stay
    /// valid; the returned pairs are the original slot and its shape, in
    /// ascending slot order.
    pub fn remove_shapes(&mut self, layer: LayerIndex, indices: &[usize]) -> Vec<(usize, Shape)> {
        let Some(list) = self.shapes.get_mut(&layer) else {
            return Vec::new();
        };
        let mut sorted: Vec<usize> = indices.iter().copied().filter(|&i| i < list.len()).collect();
        sorted.sort_unstable();
        sorted.dedup();
        let mut removed = Vec::with_capacity(sorted.len());
        for &index in sorted.iter().rev() {
            removed.push((index, list.remove(index)));
        }
        if !removed.is_empty() {
            self.modified = true;
        }
        removed.reverse();
        removed
    }

    /// Re-insert a shape at a specific slot on a layer.
    pub fn insert_shape(&mut self, layer: LayerIndex, index: usize, shape: Shape) {
        let list = self.shapes.entry(layer).or_default();
        let index = index.min(list.len());
        list.insert(index, shape);
        self.modified = true;
    }

    pub fn add_instance(&mut self, instance: CellInstance) {
        self.instances.push(instance);
        self.modified = true;
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Layer indices that currently hold at least one shape.
    pub fn layers_used(&self) -> impl Iterator<Item = LayerIndex> + '_ {
        self.shapes
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(&layer, _)| layer)
    }

    /// Bounding box of all shapes in this cell (not including subcells).
    pub fn local_bbox(&self) -> Option<BBox> {
        let mut result: Option<BBox> = None;
        for list in self.shapes.values() {
            for shape in list {
                if let Some(bb) = shape.bbox() {
                    result = Some(match result {
                        Some(acc) => acc.union(&bb),
                        None => bb,
                    });
                }
            }
        }
        result
    }

    /// Bounding box of the shapes on one layer.
    pub fn bbox_on_layer(&self, layer: LayerIndex) -> Option<BBox> {
        let mut result: Option<BBox> = None;
        for shape in self.shapes(layer) {
            if let Some(bb) = shape.bbox() {
                result = Some(match result {
                    Some(acc) => acc.union(&bb),
                    None => bb,
                });
            }
        }
        result
    }

    /// Build a spatial index over one layer's shapes for region queries.
    pub fn spatial_index(&self, layer: LayerIndex) -> SpatialIndex {
        let entries: Vec<SpatialEntry> = self
            .shapes(layer)
            .iter()
            .enumerate()
            .filter_map(|(i, shape)| {
                shape.bbox().map(|bbox| SpatialEntry {
                    shape_index: i,
                    bbox,
                })
            })
            .collect();
        SpatialIndex::build(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn test_cell_add_shape() {
        let mut cell = Cell::new("test_cell");
        cell.add_shape(0, Shape::Rect(Rect::new(0, 0, 100, 50)));
        assert_eq!(cell.shape_count(0), 1);
        assert_eq!(cell.shape_count(1), 0);
        assert!(cell.modified);
    }

    #[test]
    fn test_cell_bbox_spans_layers() {
        let mut cell = Cell::new("test_cell");
        cell.add_shape(0, Shape::Rect(Rect::new(0, 0, 100, 50)));
        cell.add_shape(1, Shape::Rect(Rect::new(50, 25, 200, 75)));
        assert_eq!(cell.local_bbox(), Some(BBox::new(0, 0, 200, 75)));
        assert_eq!(cell.bbox_on_layer(0), Some(BBox::new(0, 0, 100, 50)));
    }

    #[test]
    fn test_remove_shapes_preserves_survivor_order() {
        let mut cell = Cell::new("test_cell");
        for i in 0..5 {
            cell.add_shape(0, Shape::Rect(Rect::new(i, 0, i + 1, 1)));
        }
        let removed = cell.remove_shapes(0, &[3, 1]);
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].0, 1);
        assert_eq!(removed[1].0, 3);
        let survivors: Vec<i64> = cell
            .shapes(0)
            .iter()
            .map(|s| s.bbox().unwrap().left)
            .collect();
        assert_eq!(survivors, vec![0, 2, 4]);
    }

    #[test]
    fn test_remove_shapes_ignores_out_of_range() {
        let mut cell = Cell::new("test_cell");
        cell.add_shape(0, Shape::Rect(Rect::new(0, 0, 1, 1)));
        let removed = cell.remove_shapes(0, &[0, 7, 7]);
        assert_eq!(removed.len(), 1);
        assert_eq!(cell.shape_count(0), 0);
    }

    #[test]
    fn test_transform_translate() {
        let t = Transform::translate(10, 20);
        let p = Point::new(5, 5);
        assert_eq!(t.apply(&p), Point::new(15, 25));
    }

    #[test]
    fn test_transform_rotate_90() {
        let t = Transform {
            rotation: 90.0,
            ..Default::default()
        };
        assert_eq!(t.apply(&Point::new(10, 0)), Point::new(0, 10));
    }
}
