//! Error types for the reconstruction engine.
//!
//! Only genuinely malformed inputs produce errors. Heuristic failure
//! states ("no table found", "detector discarded") are ordinary results
//! carrying warnings, never errors.

/// Result type alias for reconstruction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during reconstruction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Page dimensions are zero or negative
    #[error("Invalid page size: {width}x{height}")]
    InvalidPageSize {
        /// Page width in pixels
        width: f32,
        /// Page height in pixels
        height: f32,
    },

    /// The analysis rectangle does not intersect the page
    #[error("Analysis rect ({0:?}) lies outside the page")]
    InvalidAnalysisRect(crate::geometry::Rect),

    /// Raster image processing error
    #[error("Image error: {0}")]
    Image(String),
}
