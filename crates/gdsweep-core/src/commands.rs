use crate::cell::CellId;
use crate::database::Layout;
use crate::geometry::Shape;
use crate::LayerIndex;

/// A reversible command for the undo/redo system.
pub trait Command: std::fmt::Debug + Send {
    /// Execute the command (apply changes to the layout).
    fn execute(&mut self, db: &mut Layout);
    /// Reverse the command (undo changes).
    fn undo(&mut self, db: &mut Layout);
    /// Human-readable description for the undo/redo history.
    fn description(&self) -> &str;
}

// ══════════════════════════════════════════════════════════════════════
// Concrete Commands
// ══════════════════════════════════════════════════════════════════════

/// Add a shape to a cell on a given layer.
#[derive(Debug)]
pub struct AddShapeCommand {
    pub cell_id: CellId,
    pub layer: LayerIndex,
    pub shape: Shape,
    /// Slot at which the shape was inserted (set on execute).
    inserted_index: Option<usize>,
}

impl AddShapeCommand {
    pub fn new(cell_id: CellId, layer: LayerIndex, shape: Shape) -> Self {
        Self {
            cell_id,
            layer,
            shape,
            inserted_index: None,
        }
    }
}

impl Command for AddShapeCommand {
    fn execute(&mut self, db: &mut Layout) {
        if let Some(cell) = db.get_cell_mut(&self.cell_id) {
            cell.add_shape(self.layer, self.shape.clone());
            self.inserted_index = Some(cell.shape_count(self.layer) - 1);
        }
    }

    fn undo(&mut self, db: &mut Layout) {
        if let Some(idx) = self.inserted_index {
            if let Some(cell) = db.get_cell_mut(&self.cell_id) {
                cell.remove_shape(self.layer, idx);
            }
        }
    }

    fn description(&self) -> &str {
        "Add shape"
    }
}

/// Remove a set of shapes from one layer of a cell in a single journal entry.
#[derive(Debug)]
pub struct RemoveShapesCommand {
    pub cell_id: CellId,
    pub layer: LayerIndex,
    pub indices: Vec<usize>,
    /// Removed shapes with their original slots (saved for undo).
    removed: Vec<(usize, Shape)>,
}

impl RemoveShapesCommand {
    pub fn new(cell_id: CellId, layer: LayerIndex, indices: Vec<usize>) -> Self {
        Self {
            cell_id,
            layer,
            indices,
            removed: Vec::new(),
        }
    }
}

impl Command for RemoveShapesCommand {
    fn execute(&mut self, db: &mut Layout) {
        if let Some(cell) = db.get_cell_mut(&self.cell_id) {
            self.removed = cell.remove_shapes(self.layer, &self.indices);
        }
    }

    fn undo(&mut self, db: &mut Layout) {
        if let Some(cell) = db.get_cell_mut(&self.cell_id) {
            // Ascending slot order puts every shape back where it was.
            for (index, shape) in self.removed.drain(..) {
                cell.insert_shape(self.layer, index, shape);
            }
        }
    }

    fn description(&self) -> &str {
        "Remove shapes"
    }
}

/// Manages the undo/redo history stack.
#[derive(Debug, Default)]
pub struct CommandHistory {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn execute(&mut self, mut command: Box<dyn Command>, db: &mut Layout) {
        log::debug!("execute: {}", command.description());
        command.execute(db);
        self.undo_stack.push(command);
        // Executing a new command clears the redo stack.
        self.redo_stack.clear();
    }

    pub fn undo(&mut self, db: &mut Layout) -> bool {
        if let Some(mut command) = self.undo_stack.pop() {
            log::debug!("undo: {}", command.description());
            command.undo(db);
            self.redo_stack.push(command);
            true
        } else {
            false
        }
    }

    pub fn redo(&mut self, db: &mut Layout) -> bool {
        if let Some(mut command) = self.redo_stack.pop() {
            log::debug!("redo: {}", command.description());
            command.execute(db);
            self.undo_stack.push(command);
            true
        } else {
            false
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.description())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
