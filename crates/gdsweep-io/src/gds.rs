//! GDS-II binary format reader and writer.
//!
//! GDS-II (Graphic Data System II) is the industry-standard binary format
//! used by semiconductor fabs. Each record is `[2-byte length][2-byte record
//! type][payload]`; the record stream nests BGNLIB → BGNSTR →
//! BOUNDARY/PATH/SREF/TEXT → ENDSTR → ENDLIB.
//!
//! Coordinates are read and written as raw integer database units. The UNITS
//! record carries the physical scale and lands in [`Layout::dbu`].

use std::collections::HashSet;
use std::io::{self, Read, Seek, Write};

use thiserror::Error;

use gdsweep_core::cell::{Cell, CellInstance, Transform};
use gdsweep_core::geometry::{Path as LayoutPath, Point, Polygon, Rect, Shape, Text};
use gdsweep_core::layer::{LayerInfo, LayerKey};
use gdsweep_core::Layout;

// ── GDS-II Record Types ──────────────────────────────────────────────

#[allow(dead_code)]
mod record_type {
    pub const HEADER: u16     = 0x0002;
    pub const BGNLIB: u16     = 0x0102;
    pub const LIBNAME: u16    = 0x0206;
    pub const UNITS: u16      = 0x0305;
    pub const ENDLIB: u16     = 0x0400;
    pub const BGNSTR: u16     = 0x0502;
    pub const STRNAME: u16    = 0x0606;
    pub const ENDSTR: u16     = 0x0700;
    pub const BOUNDARY: u16   = 0x0800;
    pub const PATH: u16       = 0x0900;
    pub const SREF: u16       = 0x0A00;
    pub const AREF: u16       = 0x0B00;
    pub const TEXT: u16       = 0x0C00;
    pub const LAYER: u16      = 0x0D02;
    pub const DATATYPE: u16   = 0x0E02;
    pub const WIDTH: u16      = 0x0F03;
    pub const XY: u16         = 0x1003;
    pub const ENDEL: u16      = 0x1100;
    pub const SNAME: u16      = 0x1206;
    pub const COLROW: u16     = 0x1302;
    pub const NODE: u16       = 0x1500;
    pub const TEXTTYPE: u16   = 0x1602;
    pub const PRESENTATION: u16 = 0x1701;
    pub const STRING: u16     = 0x1906;
    pub const STRANS: u16     = 0x1A01;
    pub const MAG: u16        = 0x1B05;
    pub const ANGLE: u16      = 0x1C05;
    pub const PATHTYPE: u16   = 0x2102;
    pub const BOX: u16        = 0x2D00;
    pub const BOXTYPE: u16    = 0x2E02;
}

// ── Errors ────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum GdsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid GDS-II record at offset {offset}: {message}")]
    InvalidRecord { offset: u64, message: String },

    #[error("Unexpected record type 0x{record_type:04X}, expected 0x{expected:04X}")]
    UnexpectedRecord { record_type: u16, expected: u16 },
}

// ── GDS-II Record ─────────────────────────────────────────────────────

#[derive(Debug)]
struct GdsRecord {
    record_type: u16,
    data: Vec<u8>,
}

impl GdsRecord {
    /// First payload value as a 16-bit integer.
    fn first_i16(&self) -> Option<i16> {
        self.data
            .get(..2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
    }

    /// Parse payload as coordinate pairs in database units.
    fn as_points(&self) -> Vec<Point> {
        self.data
            .chunks_exact(8)
            .map(|c| {
                let x = i32::from_be_bytes([c[0], c[1], c[2], c[3]]);
                let y = i32::from_be_bytes([c[4], c[5], c[6], c[7]]);
                Point::new(x as i64, y as i64)
            })
            .collect()
    }

    fn first_i32(&self) -> Option<i32> {
        self.data
            .get(..4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
    }

    /// Parse payload as ASCII string, stripping padding.
    fn as_string(&self) -> String {
        let s: String = self.data.iter().map(|&b| b as char).collect();
        s.trim_end_matches('\0').to_string()
    }

    /// Parse payload as GDS-II 8-byte reals (excess-64 floating point).
    fn as_f64_vec(&self) -> Vec<f64> {
        self.data
            .chunks_exact(8)
            .map(|c| gds_real8_to_f64(c.try_into().unwrap_or([0u8; 8])))
            .collect()
    }
}

/// Convert GDS-II excess-64 real format to IEEE 754 f64.
fn gds_real8_to_f64(bytes: [u8; 8]) -> f64 {
    if bytes.iter().all(|&b| b == 0) {
        return 0.0;
    }

    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (bytes[0] & 0x7F) as i32 - 64;

    let mut mantissa_bytes = [0u8; 8];
    mantissa_bytes[1..].copy_from_slice(&bytes[1..]);
    let mantissa = u64::from_be_bytes(mantissa_bytes) as f64 / (1u64 << 56) as f64;

    sign * mantissa * 16.0_f64.powi(exponent)
}

/// Convert IEEE 754 f64 to GDS-II excess-64 real format.
fn f64_to_gds_real8(value: f64) -> [u8; 8] {
    if value == 0.0 {
        return [0u8; 8];
    }

    let sign_bit: u8 = if value < 0.0 { 0x80 } else { 0x00 };
    let mut val = value.abs();

    // Normalize the mantissa into [1/16, 1).
    let mut exponent: i32 = 0;
    while val >= 1.0 && exponent < 63 {
        val /= 16.0;
        exponent += 1;
    }
    while val < 1.0 / 16.0 && exponent > -64 {
        val *= 16.0;
        exponent -= 1;
    }

    let mantissa = (val * (1u64 << 56) as f64) as u64;
    let mut result = mantissa.to_be_bytes();
    result[0] = sign_bit | ((exponent + 64) as u8 & 0x7F);
    result
}

// ── GDS-II Reader ─────────────────────────────────────────────────────

pub struct GdsReader<R: Read + Seek> {
    reader: R,
}

impl<R: Read + Seek> GdsReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the entire GDS-II stream into a [`Layout`].
    pub fn read(&mut self) -> Result<Layout, GdsError> {
        let mut db = Layout::new("imported");

        self.read_header()?;
        self.read_lib(&mut db)?;

        Ok(db)
    }

    fn read_record(&mut self) -> Result<Option<GdsRecord>, GdsError> {
        let mut len_buf = [0u8; 2];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(GdsError::Io(e)),
        }

        let total_len = u16::from_be_bytes(len_buf) as usize;
        if total_len < 4 {
            let offset = self.reader.stream_position().unwrap_or(0);
            return Err(GdsError::InvalidRecord {
                offset,
                message: format!("record length {} is too small", total_len),
            });
        }

        let mut type_buf = [0u8; 2];
        self.reader.read_exact(&mut type_buf)?;
        let record_type = u16::from_be_bytes(type_buf);

        let data_len = total_len - 4;
        let mut data = vec![0u8; data_len];
        if data_len > 0 {
            self.reader.read_exact(&mut data)?;
        }

        Ok(Some(GdsRecord { record_type, data }))
    }

    fn read_header(&mut self) -> Result<(), GdsError> {
        let rec = self.read_record()?.ok_or(GdsError::InvalidRecord {
            offset: 0,
            message: "empty file".into(),
        })?;

        if rec.record_type != record_type::HEADER {
            return Err(GdsError::UnexpectedRecord {
                record_type: rec.record_type,
                expected: record_type::HEADER,
            });
        }

        if let Some(version) = rec.first_i16() {
            log::debug!("GDS-II version: {}", version);
        }

        Ok(())
    }

    fn read_lib(&mut self, db: &mut Layout) -> Result<(), GdsError> {
        loop {
            let rec = match self.read_record()? {
                Some(r) => r,
                None => break,
            };

            match rec.record_type {
                record_type::BGNLIB => {
                    // Begin library; timestamp payload, skip.
                }
                record_type::LIBNAME => {
                    db.name = rec.as_string();
                    log::info!("library name: {}", db.name);
                }
                record_type::UNITS => {
                    // [dbu in user units, dbu in meters]; the meters value is
                    // the authoritative physical scale.
                    let units = rec.as_f64_vec();
                    if units.len() >= 2 {
                        db.dbu = units[1] * 1e6;
                        log::info!("database unit: {} µm", db.dbu);
                    }
                }
                record_type::BGNSTR => {
                    self.read_structure(db)?;
                }
                record_type::ENDLIB => {
                    log::info!("end of library, {} cells read", db.cell_count());
                    break;
                }
                _ => {
                    // Skip unknown records.
                }
            }
        }

        Ok(())
    }

    fn read_structure(&mut self, db: &mut Layout) -> Result<(), GdsError> {
        let mut cell = Cell::new("unnamed");

        loop {
            let rec = match self.read_record()? {
                Some(r) => r,
                None => break,
            };

            match rec.record_type {
                record_type::STRNAME => {
                    cell.name = rec.as_string();
                    log::debug!("reading cell: {}", cell.name);
                }
                record_type::BOUNDARY => {
                    if let Some((key, shape)) = self.read_boundary()? {
                        let layer = db.layers.insert(LayerInfo::new(key));
                        cell.add_shape(layer, shape);
                    }
                }
                record_type::PATH => {
                    if let Some((key, shape)) = self.read_path()? {
                        let layer = db.layers.insert(LayerInfo::new(key));
                        cell.add_shape(layer, shape);
                    }
                }
                record_type::BOX => {
                    if let Some((key, shape)) = self.read_box()? {
                        let layer = db.layers.insert(LayerInfo::new(key));
                        cell.add_shape(layer, shape);
                    }
                }
                record_type::TEXT => {
                    if let Some((key, shape)) = self.read_text()? {
                        let layer = db.layers.insert(LayerInfo::new(key));
                        cell.add_shape(layer, shape);
                    }
                }
                record_type::SREF => {
                    if let Some(inst) = self.read_sref()? {
                        cell.add_instance(inst);
                    }
                }
                record_type::AREF | record_type::NODE => {
                    self.skip_to_endel()?;
                }
                record_type::ENDSTR => {
                    break;
                }
                _ => {}
            }
        }

        cell.modified = false;
        db.add_cell(cell);
        Ok(())
    }

    fn read_boundary(&mut self) -> Result<Option<(LayerKey, Shape)>, GdsError> {
        let mut layer: u16 = 0;
        let mut datatype: u16 = 0;
        let mut points: Vec<Point> = Vec::new();

        loop {
            let rec = match self.read_record()? {
                Some(r) => r,
                None => break,
            };

            match rec.record_type {
                record_type::LAYER => {
                    if let Some(v) = rec.first_i16() {
                        layer = v as u16;
                    }
                }
                record_type::DATATYPE => {
                    if let Some(v) = rec.first_i16() {
                        datatype = v as u16;
                    }
                }
                record_type::XY => {
                    points = rec.as_points();
                }
                record_type::ENDEL => break,
                _ => {}
            }
        }

        // GDS boundaries repeat the first point; drop the closing vertex.
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        if points.is_empty() {
            return Ok(None);
        }

        let key = LayerKey::new(layer, datatype);

        // An axis-aligned 4-vertex boundary is stored as a rectangle.
        if points.len() == 4 && is_axis_aligned_rect(&points) {
            if let Some(bbox) = gdsweep_core::BBox::from_points(&points) {
                return Ok(Some((
                    key,
                    Shape::Rect(Rect::new(bbox.left, bbox.bottom, bbox.right, bbox.top)),
                )));
            }
        }

        Ok(Some((key, Shape::Polygon(Polygon::new(points)))))
    }

    fn read_path(&mut self) -> Result<Option<(LayerKey, Shape)>, GdsError> {
        let mut layer: u16 = 0;
        let mut datatype: u16 = 0;
        let mut width: i64 = 0;
        let mut points: Vec<Point> = Vec::new();

        loop {
            let rec = match self.read_record()? {
                Some(r) => r,
                None => break,
            };

            match rec.record_type {
                record_type::LAYER => {
                    if let Some(v) = rec.first_i16() {
                        layer = v as u16;
                    }
                }
                record_type::DATATYPE => {
                    if let Some(v) = rec.first_i16() {
                        datatype = v as u16;
                    }
                }
                record_type::PATHTYPE => {}
                record_type::WIDTH => {
                    if let Some(v) = rec.first_i32() {
                        width = v as i64;
                    }
                }
                record_type::XY => {
                    points = rec.as_points();
                }
                record_type::ENDEL => break,
                _ => {}
            }
        }

        if points.is_empty() {
            return Ok(None);
        }

        Ok(Some((
            LayerKey::new(layer, datatype),
            Shape::Path(LayoutPath::new(points, width)),
        )))
    }

    fn read_box(&mut self) -> Result<Option<(LayerKey, Shape)>, GdsError> {
        // BOX is shaped like BOUNDARY but carries BOXTYPE instead of DATATYPE.
        let mut layer: u16 = 0;
        let mut boxtype: u16 = 0;
        let mut points: Vec<Point> = Vec::new();

        loop {
            let rec = match self.read_record()? {
                Some(r) => r,
                None => break,
            };

            match rec.record_type {
                record_type::LAYER => {
                    if let Some(v) = rec.first_i16() {
                        layer = v as u16;
                    }
                }
                record_type::BOXTYPE => {
                    if let Some(v) = rec.first_i16() {
                        boxtype = v as u16;
                    }
                }
                record_type::XY => {
                    points = rec.as_points();
                }
                record_type::ENDEL => break,
                _ => {}
            }
        }

        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }

        let Some(bbox) = gdsweep_core::BBox::from_points(&points) else {
            return Ok(None);
        };

        Ok(Some((
            LayerKey::new(layer, boxtype),
            Shape::Rect(Rect::new(bbox.left, bbox.bottom, bbox.right, bbox.top)),
        )))
    }

    fn read_text(&mut self) -> Result<Option<(LayerKey, Shape)>, GdsError> {
        let mut layer: u16 = 0;
        let mut texttype: u16 = 0;
        let mut position = Point::new(0, 0);
        let mut string = String::new();

        loop {
            let rec = match self.read_record()? {
                Some(r) => r,
                None => break,
            };

            match rec.record_type {
                record_type::LAYER => {
                    if let Some(v) = rec.first_i16() {
                        layer = v as u16;
                    }
                }
                record_type::TEXTTYPE => {
                    if let Some(v) = rec.first_i16() {
                        texttype = v as u16;
                    }
                }
                record_type::PRESENTATION | record_type::STRANS | record_type::MAG => {}
                record_type::XY => {
                    if let Some(p) = rec.as_points().first() {
                        position = *p;
                    }
                }
                record_type::STRING => {
                    string = rec.as_string();
                }
                record_type::ENDEL => break,
                _ => {}
            }
        }

        if string.is_empty() {
            return Ok(None);
        }

        Ok(Some((
            LayerKey::new(layer, texttype),
            Shape::Text(Text::new(position, &string)),
        )))
    }

    fn read_sref(&mut self) -> Result<Option<CellInstance>, GdsError> {
        let mut cell_name = String::new();
        let mut transform = Transform::default();

        loop {
            let rec = match self.read_record()? {
                Some(r) => r,
                None => break,
            };

            match rec.record_type {
                record_type::SNAME => {
                    cell_name = rec.as_string();
                }
                record_type::STRANS => {
                    if let Some(v) = rec.first_i16() {
                        transform.mirror_x = (v as u16 & 0x8000) != 0;
                    }
                }
                record_type::MAG => {
                    if let Some(&v) = rec.as_f64_vec().first() {
                        transform.mag = v;
                    }
                }
                record_type::ANGLE => {
                    if let Some(&v) = rec.as_f64_vec().first() {
                        transform.rotation = v;
                    }
                }
                record_type::XY => {
                    if let Some(p) = rec.as_points().first() {
                        transform.offset = *p;
                    }
                }
                record_type::ENDEL => break,
                _ => {}
            }
        }

        if cell_name.is_empty() {
            return Ok(None);
        }

        Ok(Some(CellInstance::new(&cell_name, transform)))
    }

    fn skip_to_endel(&mut self) -> Result<(), GdsError> {
        loop {
            let rec = match self.read_record()? {
                Some(r) => r,
                None => break,
            };
            if rec.record_type == record_type::ENDEL {
                break;
            }
        }
        Ok(())
    }
}

/// Check if 4 points form an axis-aligned rectangle.
fn is_axis_aligned_rect(points: &[Point]) -> bool {
    if points.len() != 4 {
        return false;
    }
    let unique_x: HashSet<i64> = points.iter().map(|p| p.x).collect();
    let unique_y: HashSet<i64> = points.iter().map(|p| p.y).collect();
    unique_x.len() == 2 && unique_y.len() == 2
}

// ── GDS-II Writer ─────────────────────────────────────────────────────

/// Fixed timestamp payload for BGNLIB/BGNSTR; keeps output byte-stable.
const TIMESTAMP: [i16; 12] = [1970, 1, 1, 0, 0, 0, 1970, 1, 1, 0, 0, 0];

pub struct GdsWriter<W: Write> {
    writer: W,
}

impl<W: Write> GdsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write a [`Layout`] as a GDS-II stream.
    pub fn write(&mut self, db: &Layout) -> Result<(), GdsError> {
        self.write_i16_record(record_type::HEADER, &[600])?; // GDS version 6
        self.write_i16_record(record_type::BGNLIB, &TIMESTAMP)?;
        self.write_string_record(record_type::LIBNAME, &db.name)?;
        // [dbu in user units (user unit = 1 µm), dbu in meters]
        self.write_real8_record(record_type::UNITS, &[db.dbu, db.dbu * 1e-6])?;

        for cell in db.all_cells() {
            self.write_cell(db, cell)?;
        }

        self.write_record(record_type::ENDLIB, &[])?;
        Ok(())
    }

    fn write_record(&mut self, record_type: u16, data: &[u8]) -> Result<(), GdsError> {
        let total_len = (data.len() + 4) as u16;
        self.writer.write_all(&total_len.to_be_bytes())?;
        self.writer.write_all(&record_type.to_be_bytes())?;
        if !data.is_empty() {
            self.writer.write_all(data)?;
        }
        Ok(())
    }

    fn write_i16_record(&mut self, record_type: u16, values: &[i16]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_i32_record(&mut self, record_type: u16, values: &[i32]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_string_record(&mut self, record_type: u16, s: &str) -> Result<(), GdsError> {
        let mut data: Vec<u8> = s.bytes().collect();
        // GDS strings must be even length.
        if data.len() % 2 != 0 {
            data.push(0);
        }
        self.write_record(record_type, &data)
    }

    fn write_real8_record(&mut self, record_type: u16, values: &[f64]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| f64_to_gds_real8(*v)).collect();
        self.write_record(record_type, &data)
    }

    fn write_xy_record(&mut self, points: &[Point]) -> Result<(), GdsError> {
        let coords: Vec<i32> = points
            .iter()
            .flat_map(|p| [p.x as i32, p.y as i32])
            .collect();
        self.write_i32_record(record_type::XY, &coords)
    }

    fn write_cell(&mut self, db: &Layout, cell: &Cell) -> Result<(), GdsError> {
        self.write_i16_record(record_type::BGNSTR, &TIMESTAMP)?;
        self.write_string_record(record_type::STRNAME, &cell.name)?;

        for layer_index in cell.layers_used() {
            let Some(info) = db.layers.get(layer_index) else {
                log::warn!(
                    "cell '{}' has shapes on unregistered layer index {}, skipping",
                    cell.name,
                    layer_index
                );
                continue;
            };
            for shape in cell.shapes(layer_index) {
                match shape {
                    Shape::Rect(rect) => self.write_rect(info.key, rect)?,
                    Shape::Polygon(poly) => self.write_polygon(info.key, poly)?,
                    Shape::Path(path) => self.write_path(info.key, path)?,
                    Shape::Text(text) => self.write_text(info.key, text)?,
                }
            }
        }

        for inst in &cell.instances {
            self.write_sref(inst)?;
        }

        self.write_record(record_type::ENDSTR, &[])?;
        Ok(())
    }

    fn write_rect(&mut self, key: LayerKey, rect: &Rect) -> Result<(), GdsError> {
        let ll = rect.lower_left;
        let ur = rect.upper_right;

        self.write_record(record_type::BOUNDARY, &[])?;
        self.write_i16_record(record_type::LAYER, &[key.layer as i16])?;
        self.write_i16_record(record_type::DATATYPE, &[key.datatype as i16])?;
        // 5 points: closed rectangle.
        self.write_xy_record(&[
            ll,
            Point::new(ur.x, ll.y),
            ur,
            Point::new(ll.x, ur.y),
            ll,
        ])?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_polygon(&mut self, key: LayerKey, poly: &Polygon) -> Result<(), GdsError> {
        self.write_record(record_type::BOUNDARY, &[])?;
        self.write_i16_record(record_type::LAYER, &[key.layer as i16])?;
        self.write_i16_record(record_type::DATATYPE, &[key.datatype as i16])?;

        let mut points = poly.vertices.clone();
        // Close the polygon.
        if let Some(&first) = poly.vertices.first() {
            points.push(first);
        }
        self.write_xy_record(&points)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_path(&mut self, key: LayerKey, path: &LayoutPath) -> Result<(), GdsError> {
        self.write_record(record_type::PATH, &[])?;
        self.write_i16_record(record_type::LAYER, &[key.layer as i16])?;
        self.write_i16_record(record_type::DATATYPE, &[key.datatype as i16])?;
        self.write_i32_record(record_type::WIDTH, &[path.width as i32])?;
        self.write_xy_record(&path.points)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_text(&mut self, key: LayerKey, text: &Text) -> Result<(), GdsError> {
        self.write_record(record_type::TEXT, &[])?;
        self.write_i16_record(record_type::LAYER, &[key.layer as i16])?;
        self.write_i16_record(record_type::TEXTTYPE, &[key.datatype as i16])?;
        self.write_xy_record(&[text.position])?;
        self.write_string_record(record_type::STRING, &text.string)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_sref(&mut self, inst: &CellInstance) -> Result<(), GdsError> {
        self.write_record(record_type::SREF, &[])?;
        self.write_string_record(record_type::SNAME, &inst.cell_name)?;

        if inst.transform.mirror_x {
            self.write_i16_record(record_type::STRANS, &[i16::MIN])?; // 0x8000
        } else if inst.transform.rotation != 0.0 || inst.transform.mag != 1.0 {
            self.write_i16_record(record_type::STRANS, &[0])?;
        }

        if inst.transform.mag != 1.0 {
            self.write_real8_record(record_type::MAG, &[inst.transform.mag])?;
        }

        if inst.transform.rotation != 0.0 {
            self.write_real8_record(record_type::ANGLE, &[inst.transform.rotation])?;
        }

        self.write_xy_record(&[inst.transform.offset])?;
        self.write_record(record_type::ENDEL, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip(db: &Layout) -> Layout {
        let mut buffer: Vec<u8> = Vec::new();
        GdsWriter::new(&mut buffer).write(db).unwrap();
        GdsReader::new(Cursor::new(buffer)).read().unwrap()
    }

    #[test]
    fn test_gds_real8_roundtrip() {
        let values = [0.0, 1.0, -1.0, 0.001, 1e-9, 3.14159, 1000.0];
        for &v in &values {
            let bytes = f64_to_gds_real8(v);
            let result = gds_real8_to_f64(bytes);
            assert!(
                (result - v).abs() < v.abs() * 1e-10 + 1e-15,
                "roundtrip failed for {}: got {}",
                v,
                result
            );
        }
    }

    #[test]
    fn test_roundtrip_preserves_shapes_and_layers() {
        let mut db = Layout::new("test_lib");
        db.dbu = 0.001;
        let metal1 = db.layers.insert(LayerInfo::new(LayerKey::new(1, 0)));
        let via1 = db.layers.insert(LayerInfo::new(LayerKey::new(2, 5)));

        let mut cell = Cell::new("test_cell");
        cell.add_shape(metal1, Shape::Rect(Rect::new(0, 0, 1000, 500)));
        cell.add_shape(
            metal1,
            Shape::Polygon(Polygon::new(vec![
                Point::new(0, 0),
                Point::new(200, 0),
                Point::new(200, 100),
                Point::new(100, 100),
                Point::new(100, 200),
                Point::new(0, 200),
            ])),
        );
        cell.add_shape(
            via1,
            Shape::Path(LayoutPath::new(
                vec![Point::new(0, 0), Point::new(0, 900)],
                60,
            )),
        );
        cell.add_shape(via1, Shape::Text(Text::new(Point::new(40, 40), "via_label")));
        db.add_cell(cell);

        let back = roundtrip(&db);
        assert_eq!(back.name, "test_lib");
        assert!((back.dbu - 0.001).abs() < 1e-12);

        let m1 = back.layers.find(LayerKey::new(1, 0)).unwrap();
        let v1 = back.layers.find(LayerKey::new(2, 5)).unwrap();
        let cell = back.find_cell_by_name("test_cell").unwrap();
        assert_eq!(cell.shape_count(m1), 2);
        assert_eq!(cell.shape_count(v1), 2);

        assert!(cell.shapes(m1)[0].is_box());
        assert!(cell.shapes(m1)[1].is_polygon());
        let Shape::Path(path) = &cell.shapes(v1)[0] else {
            panic!("expected a path");
        };
        assert_eq!(path.width, 60);
        let Shape::Text(text) = &cell.shapes(v1)[1] else {
            panic!("expected a text");
        };
        assert_eq!(text.string, "via_label");
        assert_eq!(text.position, Point::new(40, 40));
    }

    #[test]
    fn test_roundtrip_keeps_hierarchy() {
        let mut db = Layout::new("hier");
        let layer = db.layers.insert(LayerInfo::new(LayerKey::new(1, 0)));

        let mut child = Cell::new("child");
        child.add_shape(layer, Shape::Rect(Rect::new(0, 0, 10, 10)));
        db.add_cell(child);

        let mut parent = Cell::new("parent");
        parent.add_instance(CellInstance::new("child", Transform::translate(500, 0)));
        db.add_cell(parent);

        let back = roundtrip(&db);
        assert_eq!(back.cell_count(), 2);
        let parent = back.find_cell_by_name("parent").unwrap();
        assert_eq!(parent.instance_count(), 1);
        assert_eq!(parent.instances[0].cell_name, "child");
        assert_eq!(parent.instances[0].transform.offset, Point::new(500, 0));

        // The SREF makes "child" a non-top cell.
        let tops = back.top_cells();
        assert_eq!(tops.len(), 1);
        assert_eq!(back.get_cell(&tops[0]).unwrap().name, "parent");
    }

    #[test]
    fn test_codec_never_dedupes() {
        let mut db = Layout::new("dups");
        let layer = db.layers.insert(LayerInfo::new(LayerKey::new(1, 0)));
        let mut cell = Cell::new("top");
        for _ in 0..3 {
            cell.add_shape(layer, Shape::Rect(Rect::new(0, 0, 10, 10)));
        }
        db.add_cell(cell);

        let back = roundtrip(&db);
        let layer = back.layers.find(LayerKey::new(1, 0)).unwrap();
        let cell = back.find_cell_by_name("top").unwrap();
        assert_eq!(cell.shape_count(layer), 3);
    }

    #[test]
    fn test_load_scan_clean_save() {
        use gdsweep_scan::{scan_top_cell, ScanConfig};

        let mut db = Layout::new("dirty");
        db.dbu = 0.001;
        let layer = db.layers.insert(LayerInfo::new(LayerKey::new(1, 0)));
        let mut cell = Cell::new("top");
        for _ in 0..3 {
            cell.add_shape(layer, Shape::Rect(Rect::new(0, 0, 10000, 10000)));
        }
        cell.add_shape(layer, Shape::Rect(Rect::new(0, 0, 5000, 5000)));
        db.add_cell(cell);

        // Simulate a real session: load from a stream, clean, save, reload.
        let mut loaded = roundtrip(&db);
        let report = scan_top_cell(&mut loaded, &ScanConfig::default()).unwrap();
        assert_eq!(report.total_deleted(), 2);

        let cleaned = roundtrip(&loaded);
        let layer = cleaned.layers.find(LayerKey::new(1, 0)).unwrap();
        let cell = cleaned.find_cell_by_name("top").unwrap();
        assert_eq!(cell.shape_count(layer), 2);
    }

    #[test]
    fn test_empty_stream_is_invalid() {
        let mut reader = GdsReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(matches!(
            reader.read(),
            Err(GdsError::InvalidRecord { .. })
        ));
    }
}
