//! # GDSweep Core
//!
//! Layout database in integer database units: hierarchical cells with
//! per-layer shape stores, a (layer, datatype) layer table, spatial indexing
//! (R-tree), and undo/redo via command-pattern journal.
//!
//! This crate is the in-memory layout model the GDSweep scanner operates on.

pub mod geometry;
pub mod layer;
pub mod cell;
pub mod database;
pub mod commands;
pub mod spatial;

pub use database::Layout;
pub use cell::{Cell, CellId};
pub use layer::{LayerIndex, LayerInfo, LayerKey, LayerTable};
pub use geometry::{BBox, Path, Point, Polygon, Rect, Shape, Text};
