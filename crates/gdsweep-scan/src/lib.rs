//! # GDSweep Scan
//!
//! Duplicate-shape detection for layout cells: shapes on a layer are grouped
//! by identical bounding box, groups with more than one member are reported,
//! and optionally all but the first-encountered member are erased.
//!
//! Bounding-box equality is an approximation of true geometric equality: two
//! different shapes with coincident boxes land in the same group. Callers
//! that need vertex-exact matching must filter the reported groups.

pub mod report;
pub mod scanner;

pub use report::{CellReport, DuplicateGroup, ScanReport};
pub use scanner::{scan_cell, scan_layout, scan_top_cell, ScanConfig, ScanError};
