//! Vector inputs of the pipeline: study-area boundary and point dataset

use geo_types::MultiPolygon;

use crate::crs::CRS;
use crate::error::{Error, Result};

/// Study-area boundary: a polygon or multipolygon with an optional CRS.
///
/// Read once, used only to derive the prediction grid; immutable after load.
#[derive(Debug, Clone)]
pub struct Boundary {
    geometry: MultiPolygon<f64>,
    crs: Option<CRS>,
}

impl Boundary {
    /// Create a boundary from a multipolygon geometry
    pub fn new(geometry: MultiPolygon<f64>, crs: Option<CRS>) -> Self {
        Self { geometry, crs }
    }

    /// The boundary geometry
    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// The boundary CRS, if known
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Number of polygons in the boundary
    pub fn polygon_count(&self) -> usize {
        self.geometry.0.len()
    }
}

/// An ordered collection of observations: 2D coordinates plus named
/// numeric attribute columns.
///
/// Column access is schema-checked: asking for a column that does not
/// exist is an [`Error::Schema`], raised before any interpolation runs.
#[derive(Debug, Clone)]
pub struct PointSet {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Attribute columns in file order, each with as many rows as there
    /// are coordinates.
    columns: Vec<(String, Vec<f64>)>,
    crs: Option<CRS>,
}

impl PointSet {
    /// Create a point set from parallel coordinate and column vectors.
    ///
    /// Every column must have the same length as the coordinate vectors.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(Error::Schema(format!(
                "X and Y column lengths differ: {} vs {}",
                xs.len(),
                ys.len()
            )));
        }
        for (name, values) in &columns {
            if values.len() != xs.len() {
                return Err(Error::Schema(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    values.len(),
                    xs.len()
                )));
            }
        }
        Ok(Self {
            xs,
            ys,
            columns,
            crs: None,
        })
    }

    /// Number of observations
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Whether the point set holds no observations
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// X coordinates
    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// Y coordinates
    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    /// Attribute column names, in file order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Whether a named column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n.as_str() == name)
    }

    /// Values of a named column.
    ///
    /// # Errors
    /// [`Error::Schema`] if no column with that name exists.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v.as_slice())
            .ok_or_else(|| {
                Error::Schema(format!(
                    "target column '{}' not found (available: {})",
                    name,
                    self.column_names().join(", ")
                ))
            })
    }

    /// The point set CRS, if known
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS directly
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Align this point set's CRS with the boundary's.
    ///
    /// If the point set has no CRS, the boundary's is assigned. If both
    /// are known and disagree, that is a fatal [`Error::CrsMismatch`].
    pub fn align_crs(&mut self, boundary: &Boundary) -> Result<()> {
        match (&self.crs, boundary.crs()) {
            (None, Some(b)) => {
                self.crs = Some(b.clone());
                Ok(())
            }
            (Some(p), Some(b)) if !p.is_equivalent(b) => Err(Error::CrsMismatch(
                p.identifier(),
                b.identifier(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, MultiPolygon};

    fn unit_boundary(crs: Option<CRS>) -> Boundary {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        Boundary::new(MultiPolygon(vec![poly]), crs)
    }

    fn small_points() -> PointSet {
        PointSet::new(
            vec![0.1, 0.5, 0.9],
            vec![0.2, 0.5, 0.8],
            vec![("layer5".to_string(), vec![1.0, 2.0, 3.0])],
        )
        .unwrap()
    }

    #[test]
    fn test_column_access() {
        let points = small_points();
        assert_eq!(points.len(), 3);
        assert!(points.has_column("layer5"));
        assert_eq!(points.column("layer5").unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let points = small_points();
        let err = points.column("layer9").unwrap_err();
        assert!(matches!(err, Error::Schema(_)), "got {err:?}");
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = PointSet::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![("v".to_string(), vec![1.0])],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_align_crs_assigns_boundary_crs() {
        let boundary = unit_boundary(Some(CRS::from_epsg(25830)));
        let mut points = small_points();
        points.align_crs(&boundary).unwrap();
        assert_eq!(points.crs().unwrap().epsg(), Some(25830));
    }

    #[test]
    fn test_align_crs_mismatch() {
        let boundary = unit_boundary(Some(CRS::from_epsg(25830)));
        let mut points = small_points();
        points.set_crs(Some(CRS::from_epsg(4326)));
        assert!(matches!(
            points.align_crs(&boundary),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
