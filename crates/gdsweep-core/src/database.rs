use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cell::{Cell, CellId};
use crate::commands::{Command, CommandHistory};
use crate::layer::LayerTable;

/// The central layout database: layer table, cells, and the database unit.
#[derive(Debug, Serialize, Deserialize)]
pub struct Layout {
    /// Database identifier.
    pub id: Uuid,
    /// Library / project name.
    pub name: String,
    /// The (layer, datatype) table.
    pub layers: LayerTable,
    /// All cells indexed by ID.
    cells: HashMap<CellId, Cell>,
    /// Database unit: microns per integer coordinate step.
    pub dbu: f64,
    /// Command history for undo/redo.
    #[serde(skip)]
    command_history: CommandHistory,
}

impl Layout {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            layers: LayerTable::new(),
            cells: HashMap::new(),
            dbu: 0.001, // 1 nm
            command_history: CommandHistory::new(),
        }
    }

    // ── Cell management ──────────────────────────────────────────────

    pub fn add_cell(&mut self, cell: Cell) -> CellId {
        let id = cell.id;
        self.cells.insert(id, cell);
        id
    }

    pub fn get_cell(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn get_cell_mut(&mut self, id: &CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    pub fn remove_cell(&mut self, id: &CellId) -> Option<Cell> {
        self.cells.remove(id)
    }

    pub fn find_cell_by_name(&self, name: &str) -> Option<&Cell> {
        self.cells.values().find(|c| c.name == name)
    }

    pub fn cell_id_by_name(&self, name: &str) -> Option<CellId> {
        self.find_cell_by_name(name).map(|c| c.id)
    }

    pub fn cell_names(&self) -> Vec<&str> {
        self.cells.values().map(|c| c.name.as_str()).collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn all_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }

    // ── Hierarchy ────────────────────────────────────────────────────

    /// Cells not placed as an instance inside any other cell, sorted by name
    /// so enumeration order is stable.
    pub fn top_cells(&self) -> Vec<CellId> {
        let referenced: HashSet<&str> = self
            .cells
            .values()
            .flat_map(|c| c.instances.iter())
            .map(|inst| inst.cell_name.as_str())
            .collect();
        let mut tops: Vec<&Cell> = self
            .cells
            .values()
            .filter(|c| !referenced.contains(c.name.as_str()))
            .collect();
        tops.sort_by(|a, b| a.name.cmp(&b.name));
        tops.into_iter().map(|c| c.id).collect()
    }

    /// The first top cell in name order, or `None` for an empty layout.
    pub fn top_cell(&self) -> Option<CellId> {
        self.top_cells().into_iter().next()
    }

    // ── Undo / Redo ──────────────────────────────────────────────────

    // The history is detached while a command runs so the command can take
    // `&mut Layout` without aliasing it.

    pub fn execute_command(&mut self, command: Box<dyn Command>) {
        let mut history = std::mem::take(&mut self.command_history);
        history.execute(command, self);
        self.command_history = history;
    }

    pub fn undo(&mut self) -> bool {
        let mut history = std::mem::take(&mut self.command_history);
        let undone = history.undo(self);
        self.command_history = history;
        undone
    }

    pub fn redo(&mut self) -> bool {
        let mut history = std::mem::take(&mut self.command_history);
        let redone = history.redo(self);
        self.command_history = history;
        redone
    }

    pub fn can_undo(&self) -> bool {
        self.command_history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.command_history.can_redo()
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellInstance, Transform};
    use crate::geometry::{Rect, Shape};
    use crate::layer::{LayerInfo, LayerKey};

    #[test]
    fn test_layout_create() {
        let db = Layout::new("test_project");
        assert_eq!(db.name, "test_project");
        assert_eq!(db.cell_count(), 0);
        assert!(db.top_cell().is_none());
        assert!((db.dbu - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_add_and_find_cell() {
        let mut db = Layout::new("test");
        let id = db.add_cell(Cell::new("inverter"));
        assert_eq!(db.cell_count(), 1);
        assert!(db.get_cell(&id).is_some());
        assert_eq!(db.cell_id_by_name("inverter"), Some(id));
        assert_eq!(db.cell_id_by_name("nand2"), None);
    }

    #[test]
    fn test_top_cells_excludes_referenced() {
        let mut db = Layout::new("test");
        let mut top = Cell::new("chip_top");
        top.add_instance(CellInstance::new("inverter", Transform::default()));
        let top_id = db.add_cell(top);
        db.add_cell(Cell::new("inverter"));
        let other_id = db.add_cell(Cell::new("analog_block"));

        let tops = db.top_cells();
        assert_eq!(tops, vec![other_id, top_id]); // name order
        assert_eq!(db.top_cell(), Some(other_id));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut db = Layout::new("rt");
        db.dbu = 0.005;
        let metal1 = db.layers.insert(LayerInfo::new(LayerKey::new(1, 0)));
        let mut cell = Cell::new("unit");
        cell.add_shape(metal1, Shape::Rect(Rect::new(0, 0, 10, 10)));
        db.add_cell(cell);

        let json = db.to_json().unwrap();
        let back = Layout::from_json(&json).unwrap();
        assert_eq!(back.cell_count(), 1);
        assert!((back.dbu - 0.005).abs() < 1e-12);
        let cell = back.find_cell_by_name("unit").unwrap();
        assert_eq!(cell.shape_count(metal1), 1);
    }
}
