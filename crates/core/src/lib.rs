//! # variokit Core
//!
//! Core types and I/O for the variokit geostatistics library.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced raster grid type
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling
//! - `Boundary` / `PointSet`: the two vector inputs of the pipeline
//! - I/O for shapefile boundaries, delimited point tables, and GeoTIFF

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, Raster, RasterElement};
pub use vector::{Boundary, PointSet};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::vector::{Boundary, PointSet};
}
