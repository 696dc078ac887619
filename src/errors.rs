use std::path::PathBuf;

use snafu::prelude::*;

use crate::array::ElementKind;

/// Error type for every fallible operation in the crate.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("file enumeration failed for '{path}': {detail}"))]
    EnumerationFailed { path: String, detail: String },

    #[snafu(display("failed to open '{}': {source}", path.display()))]
    OpenFailed { path: PathBuf, source: netcdf::Error },

    #[snafu(display("schema query failed for '{name}': {detail}"))]
    SchemaQueryFailed { name: String, detail: String },

    #[snafu(display("failed to read coordinate axis '{name}': {source}"))]
    AxisReadFailed { name: String, source: netcdf::Error },

    #[snafu(display("time axis of first file '{file}' is empty"))]
    TimeAxisRead { file: String },

    #[snafu(display("required metadata key '{key}' is missing"))]
    MetadataMissing { key: String },

    #[snafu(display("metadata key '{key}' is not a {expected}"))]
    MetadataType { key: String, expected: String },

    #[snafu(display("element kind mismatch: {left:?} vs {right:?}"))]
    KindMismatch { left: ElementKind, right: ElementKind },

    #[snafu(display("unsupported element kind: {kind}"))]
    UnsupportedKind { kind: String },

    #[snafu(display("index range {lo}..={hi} out of bounds for length {len}"))]
    OutOfBounds { lo: usize, hi: usize, len: usize },

    #[snafu(display("hyperslab read of '{name}' failed: {source}"))]
    HyperslabReadFailed { name: String, source: netcdf::Error },

    #[snafu(display(
        "'{name}' dimensions {actual:?} do not match mesh dimensions {expected:?}"
    ))]
    DimensionMismatch {
        name: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[snafu(display("broadcast failed: {reason}"))]
    BroadcastFailed { reason: String },

    #[snafu(display("handle cache has no entry for '{file}'"))]
    CacheMiss { file: String },

    #[snafu(display("point array '{name}' has length {len}, mesh needs {expected}"))]
    PointArrayLength {
        name: String,
        len: usize,
        expected: usize,
    },

    #[snafu(display("serialization failed: {source}"))]
    Serialization { source: bincode::Error },

    #[snafu(display("failed to build worker pool: {source}"))]
    PoolBuild { source: rayon::ThreadPoolBuildError },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
