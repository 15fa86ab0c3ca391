//! Error types for the parcel pipeline.

use thiserror::Error;

/// Errors that can occur while acquiring, loading, filtering, caching or rendering parcels.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error while downloading the archive.
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// The server answered the download with a non-success status.
    #[error("Download of {url} failed with HTTP {status}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Status code returned.
        status: u16,
    },

    /// The archive is not a readable zip file.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The shapefile inside the archive is malformed.
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    /// The archive lacks a member the loader needs.
    #[error("Archive is missing a {0} member")]
    MissingArchiveMember(&'static str),

    /// The cache file is not valid GeoJSON.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// PROJ could not build a transformation between the two CRS definitions.
    #[error("Cannot create transformation: {0}")]
    ProjCreate(#[from] proj::ProjCreateError),

    /// PROJ failed to transform a coordinate.
    #[error("Reprojection failed: {0}")]
    Proj(#[from] proj::ProjError),

    /// The dataset carries no coordinate reference system.
    #[error("Dataset has no coordinate reference system")]
    MissingCrs,

    /// A required attribute is absent from a record.
    #[error("Record {record} is missing column {column}")]
    MissingColumn {
        /// Column name.
        column: &'static str,
        /// Zero-based record index.
        record: usize,
    },

    /// A required attribute has the wrong type.
    #[error("Record {record} has invalid column {column} (expected {expected})")]
    InvalidColumn {
        /// Column name.
        column: &'static str,
        /// Zero-based record index.
        record: usize,
        /// Expected type.
        expected: &'static str,
    },

    /// A record has no geometry or a geometry that is not a (multi-)polygon.
    #[error("Record {record} has an unsupported geometry: {reason}")]
    UnsupportedGeometry {
        /// Zero-based record index.
        record: usize,
        /// What was found instead.
        reason: String,
    },

    /// Zero shape area under the guarded numeric policy.
    #[error("Record {record} has zero shape area")]
    ZeroArea {
        /// Zero-based record index.
        record: usize,
    },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
