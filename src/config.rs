//! Configuration for structure reconstruction.
//!
//! All the heuristic thresholds live here with their production defaults.
//! The precise values are load-bearing for the heuristics' behavior and
//! are kept as-is rather than re-derived.

/// Tunable thresholds for the reconstruction pipeline.
#[derive(Debug, Clone)]
pub struct ReconstructConfig {
    // --- Line observation ---
    /// Maximum perpendicular deviation (pixels) for a primitive to count
    /// as axis-aligned. Default: 2.0.
    pub max_axis_skew: f32,
    /// Tolerance (pixels) for clustering collinear segments into one line.
    /// Default: 3.0.
    pub collinear_tolerance: f32,
    /// Minimum ink-coverage ratio for a line to be styled `Solid`.
    /// Default: 0.75.
    pub solid_coverage_min: f32,
    /// Vector→image scale skew between axes that triggers a warning.
    /// Default: 0.15 (15%).
    pub scale_skew_warn: f32,

    // --- Raster observation ---
    /// Minimum run length (pixels) kept by the directional morphological
    /// opening, as a fraction of the image dimension. Default: 1/40.
    pub morph_open_ratio: f32,
    /// Absolute floor for the morphological opening length. Default: 20.
    pub morph_open_min: u32,
    /// Hough vote threshold as a fraction of the relevant image dimension.
    /// Default: 0.3.
    pub hough_vote_ratio: f32,
    /// Angular tolerance (degrees) around 0°/90° for Hough lines.
    /// Default: 2.
    pub hough_angle_tolerance: u32,

    // --- Separators and panels ---
    /// Minimum span ratio (line span / table height) for a vertical line
    /// to qualify as a strong separator. Default: 0.6.
    pub separator_span_ratio_min: f32,
    /// Minimum strength for a separator to be flagged strong. Default: 0.5.
    pub separator_strong_min: f32,
    /// Absolute noise floor below which candidates are not retained.
    /// Default: 0.05.
    pub separator_noise_floor: f32,
    /// Margin (fraction of table width) within which a separator is
    /// considered a border rather than an internal divider. Default: 0.05.
    pub border_margin_ratio: f32,
    /// Ink-density fraction of the column mean under which a column of the
    /// image counts as gutter whitespace. Default: 0.35.
    pub gutter_density_ceiling: f32,
    /// Minimum gutter width as a fraction of the table width. Default: 0.04.
    pub gutter_min_width_ratio: f32,
    /// Positional tolerance (pixels) when clustering separator candidates
    /// into panel boundaries. Default: 12.0.
    pub panel_cluster_tolerance: f32,

    // --- Row structure ---
    /// Minimum number of token bands for generic-density row detection.
    /// Default: 4.
    pub row_band_min: usize,
    /// Maximum coefficient of variation among inter-band gaps for the bands
    /// to count as evenly spaced. Default: 0.35.
    pub row_gap_cv_max: f32,
    /// Base tolerance (pixels) for clustering token y-centers into bands.
    /// Default: 6.0.
    pub row_cluster_tolerance: f32,
    /// Snap radius for outer row boundaries, in units of the median row
    /// pitch. Default: 1.5.
    pub row_snap_pitch_ratio: f32,

    // --- Column structure ---
    /// Tolerance (pixels) for merging column boundary candidates.
    /// Default: 8.0.
    pub col_merge_tolerance: f32,
    /// Minimum width (pixels) between accepted column boundaries.
    /// Default: 12.0.
    pub min_col_width: f32,

    // --- Grid validity ---
    /// Minimum row count for a valid grid. Default: 3.
    pub min_rows: usize,
    /// Minimum column count for a valid grid. Default: 2.
    pub min_cols: usize,

    // --- Cell assignment ---
    /// Token area (px²) under which assignment is by centroid containment
    /// only. Default: 150.0 (roughly a single digit).
    pub small_token_area: f32,
    /// Minimum `intersection / token area` ratio for a cell to become an
    /// assignment candidate. Default: 0.30.
    pub overlap_ratio_min: f32,
    /// Candidate-cell count above which a spanning token is flagged
    /// `is_large_span`. Default: 3.
    pub large_span_count: usize,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconstructConfig {
    /// Create a configuration with the production defaults.
    pub fn new() -> Self {
        Self {
            max_axis_skew: 2.0,
            collinear_tolerance: 3.0,
            solid_coverage_min: 0.75,
            scale_skew_warn: 0.15,
            morph_open_ratio: 1.0 / 40.0,
            morph_open_min: 20,
            hough_vote_ratio: 0.3,
            hough_angle_tolerance: 2,
            separator_span_ratio_min: 0.6,
            separator_strong_min: 0.5,
            separator_noise_floor: 0.05,
            border_margin_ratio: 0.05,
            gutter_density_ceiling: 0.35,
            gutter_min_width_ratio: 0.04,
            panel_cluster_tolerance: 12.0,
            row_band_min: 4,
            row_gap_cv_max: 0.35,
            row_cluster_tolerance: 6.0,
            row_snap_pitch_ratio: 1.5,
            col_merge_tolerance: 8.0,
            min_col_width: 12.0,
            min_rows: 3,
            min_cols: 2,
            small_token_area: 150.0,
            overlap_ratio_min: 0.30,
            large_span_count: 3,
        }
    }

    /// Set the minimum row/column counts for a valid grid.
    pub fn with_grid_minimums(mut self, min_rows: usize, min_cols: usize) -> Self {
        self.min_rows = min_rows;
        self.min_cols = min_cols;
        self
    }

    /// Set the minimum gutter width ratio used for panel detection.
    pub fn with_gutter_min_width_ratio(mut self, ratio: f32) -> Self {
        self.gutter_min_width_ratio = ratio;
        self
    }

    /// Set the minimum overlap ratio for span candidacy.
    pub fn with_overlap_ratio_min(mut self, ratio: f32) -> Self {
        self.overlap_ratio_min = ratio;
        self
    }

    /// Set the candidate-cell count that triggers the large-span flag.
    pub fn with_large_span_count(mut self, count: usize) -> Self {
        self.large_span_count = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ReconstructConfig::default();
        assert_eq!(cfg.solid_coverage_min, 0.75);
        assert_eq!(cfg.overlap_ratio_min, 0.30);
        assert_eq!(cfg.min_rows, 3);
        assert_eq!(cfg.min_cols, 2);
    }

    #[test]
    fn test_builder_methods() {
        let cfg = ReconstructConfig::new()
            .with_grid_minimums(2, 2)
            .with_overlap_ratio_min(0.5)
            .with_large_span_count(5);
        assert_eq!(cfg.min_rows, 2);
        assert_eq!(cfg.overlap_ratio_min, 0.5);
        assert_eq!(cfg.large_span_count, 5);
    }
}
