use std::collections::HashMap;

use thiserror::Error;

use gdsweep_core::commands::RemoveShapesCommand;
use gdsweep_core::{BBox, CellId, LayerIndex, LayerKey, Layout};

use crate::report::{CellReport, DuplicateGroup, ScanReport};

/// Configuration for a duplicate-shape scan.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// (layer, datatype) pairs to check. `None` checks every layer registered
    /// in the layout's layer table.
    pub layers: Option<Vec<LayerKey>>,
    /// Erase all but the first shape of each duplicate group.
    pub delete_duplicates: bool,
    /// Restrict the multi-cell scan to one named cell. `None` scans every
    /// top cell.
    pub cell: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            layers: None,
            delete_duplicates: true,
            cell: None,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScanError {
    #[error("No cell is selected or open.")]
    NoCell,

    #[error("Cell '{0}' not found.")]
    CellNotFound(String),

    #[error("Layout has no top-level cells.")]
    NoTopCells,
}

/// Scan one cell for shapes with identical bounding boxes.
///
/// For every requested layer present in the layout, box/polygon/path shapes
/// are grouped by bounding box; a group of two or more is a duplicate group.
/// With `delete_duplicates` set, every member except the first-encountered
/// one is erased. Erasure is deferred until grouping has finished and goes
/// through the layout's command journal, so the scan never mutates a shape
/// list it is iterating and the cleanup stays undoable from the outside.
///
/// Requested layers absent from the layout are skipped and recorded on the
/// report; they never fail the scan.
pub fn scan_cell(
    layout: &mut Layout,
    cell_id: CellId,
    config: &ScanConfig,
) -> Result<CellReport, ScanError> {
    let requested: Vec<LayerKey> = match &config.layers {
        Some(keys) => keys.clone(),
        None => layout.layers.keys().collect(),
    };
    let dbu = layout.dbu;

    let cell = layout
        .get_cell(&cell_id)
        .ok_or_else(|| ScanError::CellNotFound(cell_id.to_string()))?;
    let cell_name = cell.name.clone();

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut skipped_layers: Vec<LayerKey> = Vec::new();
    let mut pending_deletes: Vec<(LayerIndex, Vec<usize>)> = Vec::new();

    for key in requested {
        let Some(layer_index) = layout.layers.find(key) else {
            log::warn!(
                "Layer {}, Datatype {} not found in the layout.",
                key.layer,
                key.datatype
            );
            skipped_layers.push(key);
            continue;
        };

        // Group shape slots by bounding box. The box itself is the map key;
        // coincident boxes count as duplicates even when the underlying
        // geometry differs.
        let mut by_bbox: HashMap<BBox, Vec<usize>> = HashMap::new();
        for (slot, shape) in cell.shapes(layer_index).iter().enumerate() {
            if !(shape.is_box() || shape.is_polygon() || shape.is_path()) {
                continue;
            }
            if let Some(bbox) = shape.bbox() {
                by_bbox.entry(bbox).or_default().push(slot);
            }
        }

        let mut layer_groups: Vec<(BBox, Vec<usize>)> = by_bbox
            .into_iter()
            .filter(|(_, slots)| slots.len() > 1)
            .collect();
        // HashMap iteration is unordered; report groups in the order their
        // first member appears on the layer.
        layer_groups.sort_by_key(|(_, slots)| slots[0]);

        let mut doomed: Vec<usize> = Vec::new();
        for (bbox, slots) in layer_groups {
            let copies = slots.len();
            let area = cell.shapes(layer_index)[slots[0]].area();
            let deleted = if config.delete_duplicates { copies - 1 } else { 0 };
            log::info!(
                "cell '{}', layer {}: {} coincident shapes at ({}, {}; {}, {})",
                cell_name,
                key,
                copies,
                bbox.left,
                bbox.bottom,
                bbox.right,
                bbox.top
            );
            if config.delete_duplicates {
                doomed.extend_from_slice(&slots[1..]);
            }
            groups.push(DuplicateGroup {
                layer: key,
                bbox,
                area,
                copies,
                deleted,
                shape_indices: slots,
            });
        }
        if !doomed.is_empty() {
            pending_deletes.push((layer_index, doomed));
        }
    }

    for (layer_index, slots) in pending_deletes {
        let count = slots.len();
        layout.execute_command(Box::new(RemoveShapesCommand::new(
            cell_id,
            layer_index,
            slots,
        )));
        log::info!("cell '{}': deleted {} duplicate shape(s)", cell_name, count);
    }

    Ok(CellReport {
        cell_name,
        dbu,
        groups,
        skipped_layers,
    })
}

/// Scan the layout's top cell (single-cell variant).
pub fn scan_top_cell(layout: &mut Layout, config: &ScanConfig) -> Result<CellReport, ScanError> {
    let cell_id = layout.top_cell().ok_or(ScanError::NoCell)?;
    scan_cell(layout, cell_id, config)
}

/// Multi-cell variant: scan the named cell when `config.cell` is set, or
/// every top cell otherwise.
///
/// A named cell missing from the layout aborts the whole operation before
/// any layer is scanned.
pub fn scan_layout(layout: &mut Layout, config: &ScanConfig) -> Result<ScanReport, ScanError> {
    let targets: Vec<CellId> = match &config.cell {
        Some(name) => {
            let id = layout
                .cell_id_by_name(name)
                .ok_or_else(|| ScanError::CellNotFound(name.clone()))?;
            vec![id]
        }
        None => {
            let tops = layout.top_cells();
            if tops.is_empty() {
                return Err(ScanError::NoTopCells);
            }
            tops
        }
    };

    let mut cells = Vec::with_capacity(targets.len());
    for cell_id in targets {
        if let Some(cell) = layout.get_cell(&cell_id) {
            log::info!("scanning cell '{}'", cell.name);
        }
        cells.push(scan_cell(layout, cell_id, config)?);
    }
    Ok(ScanReport { cells })
}
