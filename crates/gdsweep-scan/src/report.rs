use std::fmt;

use serde::{Deserialize, Serialize};

use gdsweep_core::{BBox, LayerKey};

/// One group of shapes sharing an identical bounding box on one layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// The (layer, datatype) pair the group was found on.
    pub layer: LayerKey,
    /// Shared bounding box, in database units.
    pub bbox: BBox,
    /// Area of the first shape in the group, in database units².
    pub area: i64,
    /// Total number of coincident shapes, survivor included.
    pub copies: usize,
    /// How many of them were erased (0 on a detection-only run).
    pub deleted: usize,
    /// Slot indices of the members at scan time, first-encountered first.
    /// Slots refer to the pre-deletion shape list.
    pub shape_indices: Vec<usize>,
}

impl DuplicateGroup {
    /// Bounding box in microns: `[x_min, y_min, x_max, y_max]`.
    pub fn bbox_um(&self, dbu: f64) -> [f64; 4] {
        [
            dbu * self.bbox.left as f64,
            dbu * self.bbox.bottom as f64,
            dbu * self.bbox.right as f64,
            dbu * self.bbox.top as f64,
        ]
    }

    /// Area in µm².
    pub fn area_um2(&self, dbu: f64) -> f64 {
        dbu * dbu * self.area as f64
    }
}

/// Scan result for one cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellReport {
    pub cell_name: String,
    /// Database unit of the scanned layout, microns per coordinate step.
    pub dbu: f64,
    pub groups: Vec<DuplicateGroup>,
    /// Requested (layer, datatype) pairs absent from the layout.
    pub skipped_layers: Vec<LayerKey>,
}

impl CellReport {
    pub fn duplicates_found(&self) -> bool {
        !self.groups.is_empty()
    }

    pub fn total_deleted(&self) -> usize {
        self.groups.iter().map(|g| g.deleted).sum()
    }
}

impl fmt::Display for CellReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in &self.skipped_layers {
            writeln!(
                f,
                "Layer {}, Datatype {} not found in the layout.",
                key.layer, key.datatype
            )?;
        }
        if self.groups.is_empty() {
            return writeln!(
                f,
                "No overlapping identical shapes were found in the specified layers."
            );
        }
        writeln!(f, "Overlapping identical shapes found:")?;
        for group in &self.groups {
            let [x_min, y_min, x_max, y_max] = group.bbox_um(self.dbu);
            writeln!(f, "Layer {}, Datatype {}:", group.layer.layer, group.layer.datatype)?;
            writeln!(
                f,
                "  Duplicate shape at ({:.5}, {:.5}; {:.5}, {:.5}) with area {:.5} µm²",
                x_min,
                y_min,
                x_max,
                y_max,
                group.area_um2(self.dbu)
            )?;
            writeln!(f, "  Number of copies: {}", group.copies)?;
            if group.deleted > 0 {
                writeln!(f, "  Deleted {} duplicate(s)", group.deleted)?;
            }
        }
        Ok(())
    }
}

/// Scan result across several cells (multi-cell variant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub cells: Vec<CellReport>,
}

impl ScanReport {
    pub fn duplicates_found(&self) -> bool {
        self.cells.iter().any(|c| c.duplicates_found())
    }

    pub fn total_deleted(&self) -> usize {
        self.cells.iter().map(|c| c.total_deleted()).sum()
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cell in &self.cells {
            writeln!(f, "Cell '{}':", cell.cell_name)?;
            write!(f, "{}", cell)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_group() -> DuplicateGroup {
        DuplicateGroup {
            layer: LayerKey::new(1, 0),
            bbox: BBox::new(0, 0, 10000, 10000),
            area: 100_000_000,
            copies: 3,
            deleted: 2,
            shape_indices: vec![0, 2, 5],
        }
    }

    #[test]
    fn test_physical_conversion_uses_dbu() {
        let group = sample_group();
        let bbox = group.bbox_um(0.001);
        assert_eq!(bbox, [0.0, 0.0, 10.0, 10.0]);
        assert!((group.area_um2(0.001) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_rendering() {
        let report = CellReport {
            cell_name: "top".to_string(),
            dbu: 0.001,
            groups: vec![sample_group()],
            skipped_layers: vec![LayerKey::new(99, 0)],
        };
        let text = report.to_string();
        assert!(text.contains("Layer 99, Datatype 0 not found in the layout."));
        assert!(text.contains("Overlapping identical shapes found:"));
        assert!(text.contains("Layer 1, Datatype 0:"));
        assert!(text.contains(
            "  Duplicate shape at (0.00000, 0.00000; 10.00000, 10.00000) with area 100.00000 µm²"
        ));
        assert!(text.contains("  Number of copies: 3"));
        assert!(text.contains("  Deleted 2 duplicate(s)"));
    }

    #[test]
    fn test_empty_report_renders_none_found() {
        let report = CellReport {
            cell_name: "top".to_string(),
            dbu: 0.001,
            groups: vec![],
            skipped_layers: vec![],
        };
        assert_eq!(
            report.to_string(),
            "No overlapping identical shapes were found in the specified layers.\n"
        );
        assert!(!report.duplicates_found());
        assert_eq!(report.total_deleted(), 0);
    }
}
