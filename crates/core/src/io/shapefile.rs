//! Native ESRI shapefile polygon reading and writing
//!
//! Parses the `.shp` binary layout directly: a 100-byte file header
//! followed by records, each with a big-endian record header and a
//! little-endian shape body. Only polygon shapes (type 5) are accepted,
//! since the boundary is the only vector geometry this pipeline reads.
//! Ring winding follows the ESRI convention: outer rings clockwise,
//! holes counter-clockwise.
//!
//! The CRS is taken from the sidecar `.prj` (WKT) when present.
//!
//! Reference:
//! ESRI (1998). ESRI Shapefile Technical Description.

use byteorder::{BigEndian, ByteOrder, LittleEndian, WriteBytesExt};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use std::fs;
use std::path::Path;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::io::atomic_write;
use crate::vector::Boundary;

const FILE_CODE: i32 = 9994;
const VERSION: i32 = 1000;
const SHAPE_NULL: i32 = 0;
const SHAPE_POLYGON: i32 = 5;
const HEADER_LEN: usize = 100;

/// Read a polygon shapefile into a [`Boundary`].
///
/// Null records are skipped; any non-polygon record is a schema error.
/// If a sibling `.prj` file exists its WKT becomes the boundary CRS.
pub fn read_polygon_shapefile(path: &Path) -> Result<Boundary> {
    let data = fs::read(path)?;
    if data.len() < HEADER_LEN {
        return Err(Error::Schema(format!(
            "{}: truncated shapefile header ({} bytes)",
            path.display(),
            data.len()
        )));
    }

    let code = BigEndian::read_i32(&data[0..4]);
    if code != FILE_CODE {
        return Err(Error::Schema(format!(
            "{}: not a shapefile (file code {})",
            path.display(),
            code
        )));
    }

    let shape_type = LittleEndian::read_i32(&data[32..36]);
    if shape_type != SHAPE_POLYGON && shape_type != SHAPE_NULL {
        return Err(Error::Schema(format!(
            "{}: unsupported shape type {} (expected polygon)",
            path.display(),
            shape_type
        )));
    }

    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    let mut offset = HEADER_LEN;

    while offset + 8 <= data.len() {
        let content_words = BigEndian::read_i32(&data[offset + 4..offset + 8]);
        if content_words < 0 {
            return Err(Error::Schema(format!(
                "{}: negative record length at byte {}",
                path.display(),
                offset
            )));
        }
        let content_len = content_words as usize * 2;
        offset += 8;
        if offset + content_len > data.len() {
            return Err(Error::Schema(format!(
                "{}: truncated record at byte {}",
                path.display(),
                offset
            )));
        }
        let record = &data[offset..offset + content_len];
        offset += content_len;

        parse_polygon_record(path, record, &mut polygons)?;
    }

    if polygons.is_empty() {
        return Err(Error::Schema(format!(
            "{}: no polygon records",
            path.display()
        )));
    }

    let crs = read_prj(path)?;
    Ok(Boundary::new(MultiPolygon(polygons), crs))
}

fn parse_polygon_record(
    path: &Path,
    record: &[u8],
    polygons: &mut Vec<Polygon<f64>>,
) -> Result<()> {
    if record.len() < 4 {
        return Err(Error::Schema(format!(
            "{}: record too short",
            path.display()
        )));
    }
    let record_type = LittleEndian::read_i32(&record[0..4]);
    if record_type == SHAPE_NULL {
        return Ok(());
    }
    if record_type != SHAPE_POLYGON {
        return Err(Error::Schema(format!(
            "{}: record of shape type {} (expected polygon)",
            path.display(),
            record_type
        )));
    }

    // type(4) + bbox(32) + num_parts(4) + num_points(4)
    if record.len() < 44 {
        return Err(Error::Schema(format!(
            "{}: truncated polygon record",
            path.display()
        )));
    }
    let num_parts = LittleEndian::read_i32(&record[36..40]) as usize;
    let num_points = LittleEndian::read_i32(&record[40..44]) as usize;

    let parts_off = 44;
    let points_off = parts_off + 4 * num_parts;
    if record.len() < points_off + 16 * num_points {
        return Err(Error::Schema(format!(
            "{}: polygon record shorter than its part/point counts",
            path.display()
        )));
    }

    let mut parts: Vec<usize> = (0..num_parts)
        .map(|i| {
            let at = parts_off + 4 * i;
            LittleEndian::read_i32(&record[at..at + 4]) as usize
        })
        .collect();
    parts.push(num_points);

    for window in parts.windows(2) {
        let (start, end) = (window[0], window[1]);
        if start >= end || end > num_points {
            return Err(Error::Schema(format!(
                "{}: invalid ring range {}..{}",
                path.display(),
                start,
                end
            )));
        }

        let ring: Vec<Coord<f64>> = (start..end)
            .map(|i| {
                let at = points_off + 16 * i;
                Coord {
                    x: LittleEndian::read_f64(&record[at..at + 8]),
                    y: LittleEndian::read_f64(&record[at + 8..at + 16]),
                }
            })
            .collect();

        if ring.len() < 4 {
            // Degenerate ring, nothing to keep
            continue;
        }

        if signed_area(&ring) <= 0.0 {
            // Clockwise: outer ring
            polygons.push(Polygon::new(LineString::from(ring), vec![]));
        } else if let Some(last) = polygons.last_mut() {
            // Counter-clockwise: hole in the most recent outer ring
            last.interiors_push(LineString::from(ring));
        } else {
            // Hole before any outer ring: some writers flip winding,
            // keep the geometry rather than dropping it
            polygons.push(Polygon::new(LineString::from(ring), vec![]));
        }
    }

    Ok(())
}

/// Write a [`Boundary`] as a polygon shapefile.
///
/// One record per polygon, exterior ring first (clockwise) followed by
/// holes (counter-clockwise). Writes a sibling `.prj` when the boundary
/// carries a WKT CRS. Intended for fixture generation and round-trip
/// tests; no `.shx` index sidecar is produced.
pub fn write_polygon_shapefile(path: &Path, boundary: &Boundary) -> Result<()> {
    let mut records: Vec<u8> = Vec::new();
    let mut bbox = Bbox::empty();

    for (i, polygon) in boundary.geometry().0.iter().enumerate() {
        let mut rings: Vec<Vec<Coord<f64>>> = Vec::new();
        rings.push(oriented(closed_coords(polygon.exterior()), true));
        for hole in polygon.interiors() {
            rings.push(oriented(closed_coords(hole), false));
        }

        let num_points: usize = rings.iter().map(|r| r.len()).sum();
        let mut rec_bbox = Bbox::empty();
        for ring in &rings {
            for c in ring {
                rec_bbox.grow(c);
                bbox.grow(c);
            }
        }

        let content_len = 44 + 4 * rings.len() + 16 * num_points;

        records.write_i32::<BigEndian>((i + 1) as i32)?;
        records.write_i32::<BigEndian>((content_len / 2) as i32)?;

        records.write_i32::<LittleEndian>(SHAPE_POLYGON)?;
        rec_bbox.write(&mut records)?;
        records.write_i32::<LittleEndian>(rings.len() as i32)?;
        records.write_i32::<LittleEndian>(num_points as i32)?;
        let mut part_start = 0usize;
        for ring in &rings {
            records.write_i32::<LittleEndian>(part_start as i32)?;
            part_start += ring.len();
        }
        for ring in &rings {
            for c in ring {
                records.write_f64::<LittleEndian>(c.x)?;
                records.write_f64::<LittleEndian>(c.y)?;
            }
        }
    }

    let mut out: Vec<u8> = Vec::with_capacity(HEADER_LEN + records.len());
    out.write_i32::<BigEndian>(FILE_CODE)?;
    for _ in 0..5 {
        out.write_i32::<BigEndian>(0)?;
    }
    out.write_i32::<BigEndian>(((HEADER_LEN + records.len()) / 2) as i32)?;
    out.write_i32::<LittleEndian>(VERSION)?;
    out.write_i32::<LittleEndian>(SHAPE_POLYGON)?;
    bbox.write(&mut out)?;
    for _ in 0..4 {
        out.write_f64::<LittleEndian>(0.0)?; // Z and M ranges
    }
    out.extend_from_slice(&records);

    atomic_write(path, &out)?;

    if let Some(crs) = boundary.crs() {
        if let Some(wkt) = crs.wkt() {
            atomic_write(&path.with_extension("prj"), wkt.as_bytes())?;
        }
    }

    Ok(())
}

fn read_prj(shp_path: &Path) -> Result<Option<CRS>> {
    let prj = shp_path.with_extension("prj");
    if !prj.exists() {
        return Ok(None);
    }
    let wkt = fs::read_to_string(prj)?;
    let wkt = wkt.trim();
    if wkt.is_empty() {
        Ok(None)
    } else {
        Ok(Some(CRS::from_wkt(wkt)))
    }
}

/// Shoelace signed area: positive for counter-clockwise rings.
fn signed_area(ring: &[Coord<f64>]) -> f64 {
    let mut sum = 0.0;
    for pair in ring.windows(2) {
        sum += pair[0].x * pair[1].y - pair[1].x * pair[0].y;
    }
    sum / 2.0
}

fn closed_coords(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut coords = ring.0.clone();
    if coords.first() != coords.last() {
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
    }
    coords
}

/// Force a ring into ESRI winding: clockwise for outer, counter-clockwise
/// for holes.
fn oriented(mut ring: Vec<Coord<f64>>, outer: bool) -> Vec<Coord<f64>> {
    let ccw = signed_area(&ring) > 0.0;
    if (outer && ccw) || (!outer && !ccw) {
        ring.reverse();
    }
    ring
}

struct Bbox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Bbox {
    fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    fn grow(&mut self, c: &Coord<f64>) {
        self.min_x = self.min_x.min(c.x);
        self.min_y = self.min_y.min(c.y);
        self.max_x = self.max_x.max(c.x);
        self.max_y = self.max_y.max(c.y);
    }

    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        out.write_f64::<LittleEndian>(self.min_x)?;
        out.write_f64::<LittleEndian>(self.min_y)?;
        out.write_f64::<LittleEndian>(self.max_x)?;
        out.write_f64::<LittleEndian>(self.max_y)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;

    fn square(side: f64) -> Boundary {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: side, y: 0.0),
            (x: side, y: side),
            (x: 0.0, y: side),
        ];
        Boundary::new(MultiPolygon(vec![poly]), None)
    }

    #[test]
    fn test_roundtrip_square() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area.shp");

        write_polygon_shapefile(&path, &square(10.0)).unwrap();
        let boundary = read_polygon_shapefile(&path).unwrap();

        assert_eq!(boundary.polygon_count(), 1);
        let exterior = boundary.geometry().0[0].exterior();
        assert_eq!(exterior.0.len(), 5); // closed square
    }

    #[test]
    fn test_roundtrip_with_hole() {
        let outer = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ];
        let mut with_hole = outer.clone();
        with_hole.interiors_push(LineString::from(vec![
            Coord { x: 4.0, y: 4.0 },
            Coord { x: 6.0, y: 4.0 },
            Coord { x: 6.0, y: 6.0 },
            Coord { x: 4.0, y: 6.0 },
            Coord { x: 4.0, y: 4.0 },
        ]));
        let boundary = Boundary::new(MultiPolygon(vec![with_hole]), None);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holed.shp");
        write_polygon_shapefile(&path, &boundary).unwrap();
        let read_back = read_polygon_shapefile(&path).unwrap();

        assert_eq!(read_back.polygon_count(), 1);
        assert_eq!(read_back.geometry().0[0].interiors().len(), 1);
    }

    #[test]
    fn test_prj_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("area.shp");
        let boundary = Boundary::new(
            square(5.0).geometry().clone(),
            Some(CRS::from_wkt("PROJCS[\"ETRS89 / UTM zone 30N\"]")),
        );

        write_polygon_shapefile(&path, &boundary).unwrap();
        let read_back = read_polygon_shapefile(&path).unwrap();

        assert!(read_back.crs().is_some());
        assert!(read_back.crs().unwrap().wkt().unwrap().contains("UTM"));
    }

    #[test]
    fn test_bad_file_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.shp");
        fs::write(&path, vec![0u8; 200]).unwrap();

        let err = read_polygon_shapefile(&path).unwrap_err();
        assert!(matches!(err, Error::Schema(_)), "got {err:?}");
    }

    #[test]
    fn test_truncated_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.shp");
        fs::write(&path, vec![0u8; 40]).unwrap();

        assert!(read_polygon_shapefile(&path).is_err());
    }

    #[test]
    fn test_point_shapefile_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.shp");

        let mut out: Vec<u8> = Vec::new();
        out.write_i32::<BigEndian>(FILE_CODE).unwrap();
        for _ in 0..5 {
            out.write_i32::<BigEndian>(0).unwrap();
        }
        out.write_i32::<BigEndian>(50).unwrap();
        out.write_i32::<LittleEndian>(VERSION).unwrap();
        out.write_i32::<LittleEndian>(1).unwrap(); // point type
        for _ in 0..8 {
            out.write_f64::<LittleEndian>(0.0).unwrap();
        }
        fs::write(&path, &out).unwrap();

        let err = read_polygon_shapefile(&path).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
