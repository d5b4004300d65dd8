//! # GDSweep I/O
//!
//! GDS-II stream reader and writer for the GDSweep layout database.
//! Coordinates are kept in raw integer database units; the stream's UNITS
//! record sets the layout's micron-per-unit scale factor.

pub mod gds;

pub use gds::{GdsError, GdsReader, GdsWriter};
