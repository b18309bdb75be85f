//! Row structure detection.
//!
//! Rows are derived once per page and shared by every panel. Two
//! strategies: generic-density clustering of token y-centers when the
//! tokens form dense, evenly-spaced bands on their own, and horizontal
//! ruling lines otherwise.

use crate::config::ReconstructConfig;
use crate::geometry::{median, safe_float_cmp, Rect};
use crate::observer::{LineCandidate, LineStyle};
use crate::token::Token;
use serde::Serialize;

/// How the row centers were derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSource {
    /// Clustered token y-centers (evenly-spaced band evidence).
    Density,
    /// Midpoints between horizontal ruling lines.
    Lines,
}

/// A detected row center.
#[derive(Debug, Clone, Serialize)]
pub struct RowCenter {
    /// Y position of the row's center.
    pub y: f32,
    /// Score in [0, 1].
    pub score: f32,
    /// Which strategy produced it.
    pub source: RowSource,
}

/// Detect row centers from tokens and horizontal lines.
pub fn detect_row_centers(
    tokens: &[Token],
    data_rect: Option<&Rect>,
    horizontal: &[LineCandidate],
    cfg: &ReconstructConfig,
) -> Vec<RowCenter> {
    if let Some(centers) = density_row_centers(tokens, data_rect, cfg) {
        log::debug!("analyzer: {} row centers from token density", centers.len());
        return centers;
    }
    let centers = line_row_centers(horizontal, cfg);
    log::debug!("analyzer: {} row centers from horizontal lines", centers.len());
    centers
}

/// Generic-density strategy: cluster token y-centers into bands.
///
/// Succeeds only when enough bands exist and their gaps are even (low
/// coefficient of variation). No restriction is placed on the tokens'
/// content.
fn density_row_centers(
    tokens: &[Token],
    data_rect: Option<&Rect>,
    cfg: &ReconstructConfig,
) -> Option<Vec<RowCenter>> {
    let mut centers: Vec<(f32, f32)> = Vec::new(); // (y_center, height)
    for token in tokens {
        let Some(bbox) = token.bbox else { continue };
        let c = bbox.center();
        if let Some(rect) = data_rect {
            if !rect.contains_point(&c) {
                continue;
            }
        }
        centers.push((c.y, bbox.height));
    }
    if centers.len() < cfg.row_band_min {
        return None;
    }

    let heights: Vec<f32> = centers.iter().map(|(_, h)| *h).collect();
    let tolerance = cfg.row_cluster_tolerance.max(0.6 * median(&heights));

    centers.sort_by(|a, b| safe_float_cmp(a.0, b.0));

    // Greedy 1-D clustering against the running band mean.
    let mut bands: Vec<Vec<f32>> = Vec::new();
    for (y, _) in centers {
        match bands.last_mut() {
            Some(band) => {
                let mean = band.iter().sum::<f32>() / band.len() as f32;
                if (y - mean).abs() <= tolerance {
                    band.push(y);
                } else {
                    bands.push(vec![y]);
                }
            },
            None => bands.push(vec![y]),
        }
    }

    if bands.len() < cfg.row_band_min {
        return None;
    }

    let band_ys: Vec<f32> = bands
        .iter()
        .map(|band| band.iter().sum::<f32>() / band.len() as f32)
        .collect();

    // Even spacing gate: coefficient of variation among inter-band gaps.
    let gaps: Vec<f32> = band_ys.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_gap = gaps.iter().sum::<f32>() / gaps.len() as f32;
    if mean_gap <= 0.0 {
        return None;
    }
    let variance = gaps
        .iter()
        .map(|g| (g - mean_gap).powi(2))
        .sum::<f32>()
        / gaps.len() as f32;
    let cv = variance.sqrt() / mean_gap;
    if cv > cfg.row_gap_cv_max {
        log::trace!("analyzer: density rows rejected, gap cv {:.2}", cv);
        return None;
    }

    let max_population = bands.iter().map(|b| b.len()).max().unwrap_or(1) as f32;
    Some(
        band_ys
            .iter()
            .zip(bands.iter())
            .map(|(y, band)| RowCenter {
                y: *y,
                score: (band.len() as f32 / max_population).clamp(0.0, 1.0),
                source: RowSource::Density,
            })
            .collect(),
    )
}

/// Line strategy: row centers are the midpoints between consecutive
/// horizontal rules (solid or dashed).
fn line_row_centers(horizontal: &[LineCandidate], cfg: &ReconstructConfig) -> Vec<RowCenter> {
    let mut positions: Vec<(f32, f32)> = horizontal
        .iter()
        .map(|l| (l.position, l.score))
        .collect();
    positions.sort_by(|a, b| safe_float_cmp(a.0, b.0));
    positions.dedup_by(|a, b| (a.0 - b.0).abs() <= cfg.collinear_tolerance);

    positions
        .windows(2)
        .map(|w| RowCenter {
            y: (w[0].0 + w[1].0) / 2.0,
            score: ((w[0].1 + w[1].1) / 2.0).clamp(0.0, 1.0),
            source: RowSource::Lines,
        })
        .collect()
}

/// Derive row boundaries from row centers.
///
/// Boundaries are the midpoints between consecutive centers; the first
/// and last are snapped to the nearest solid horizontal line within
/// 1.5 × pitch, else extrapolated by half the median pitch.
pub fn row_boundaries(
    centers: &[RowCenter],
    solid_lines: &[f32],
    cfg: &ReconstructConfig,
) -> Vec<f32> {
    if centers.len() < 2 {
        return Vec::new();
    }

    let ys: Vec<f32> = centers.iter().map(|c| c.y).collect();
    let gaps: Vec<f32> = ys.windows(2).map(|w| w[1] - w[0]).collect();
    let pitch = median(&gaps);
    if pitch <= 0.0 {
        return Vec::new();
    }
    let snap_radius = pitch * cfg.row_snap_pitch_ratio;

    let mut boundaries = Vec::with_capacity(ys.len() + 1);

    let first = ys[0] - pitch / 2.0;
    boundaries.push(snap_outer(first, ys[0], solid_lines, snap_radius, true));

    for w in ys.windows(2) {
        boundaries.push((w[0] + w[1]) / 2.0);
    }

    let last = ys[ys.len() - 1] + pitch / 2.0;
    boundaries.push(snap_outer(last, ys[ys.len() - 1], solid_lines, snap_radius, false));

    // Keep the sequence strictly increasing.
    boundaries.sort_by(|a, b| safe_float_cmp(*a, *b));
    boundaries.dedup_by(|a, b| (*a - *b).abs() < 0.01);
    boundaries
}

/// Snap an extrapolated outer boundary to the nearest solid line that
/// stays on the outer side of the outermost row center.
fn snap_outer(proposed: f32, outer_center: f32, solid_lines: &[f32], radius: f32, above: bool) -> f32 {
    let mut best = proposed;
    let mut best_dist = radius;
    for &line in solid_lines {
        let outside = if above {
            line < outer_center
        } else {
            line > outer_center
        };
        if !outside {
            continue;
        }
        let dist = (line - proposed).abs();
        if dist <= best_dist {
            best = line;
            best_dist = dist;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{LineSource, Orientation};

    fn cfg() -> ReconstructConfig {
        ReconstructConfig::default()
    }

    fn hline(y: f32) -> LineCandidate {
        LineCandidate {
            orientation: Orientation::Horizontal,
            position: y,
            span_start: 0.0,
            span_end: 500.0,
            coverage: 1.0,
            style: LineStyle::Solid,
            score: 0.9,
            source: LineSource::Vector,
            segment_count: 1,
        }
    }

    fn token_at(x: f32, y: f32) -> Token {
        Token::new("x", Rect::new(x, y, 30.0, 12.0))
    }

    #[test]
    fn test_density_rows_from_even_bands() {
        // Five evenly spaced bands of three tokens each.
        let mut tokens = Vec::new();
        for row in 0..5 {
            let y = 100.0 + row as f32 * 30.0;
            for col in 0..3 {
                tokens.push(token_at(50.0 + col as f32 * 120.0, y));
            }
        }

        let centers = detect_row_centers(&tokens, None, &[], &cfg());
        assert_eq!(centers.len(), 5);
        assert!(centers.iter().all(|c| c.source == RowSource::Density));
        let gap = centers[1].y - centers[0].y;
        assert!((gap - 30.0).abs() < 1.0);
    }

    #[test]
    fn test_uneven_bands_rejected() {
        // Wildly uneven spacing: density strategy must decline.
        let ys = [100.0, 110.0, 250.0, 258.0, 500.0];
        let tokens: Vec<Token> = ys.iter().map(|&y| token_at(50.0, y)).collect();

        let centers = detect_row_centers(&tokens, None, &[], &cfg());
        assert!(centers.is_empty());
    }

    #[test]
    fn test_line_rows_are_midpoints() {
        let lines: Vec<LineCandidate> = [100.0, 150.0, 200.0, 250.0]
            .iter()
            .map(|&y| hline(y))
            .collect();

        let centers = detect_row_centers(&[], None, &lines, &cfg());
        assert_eq!(centers.len(), 3);
        assert!((centers[0].y - 125.0).abs() < 0.01);
        assert!(centers.iter().all(|c| c.source == RowSource::Lines));
    }

    #[test]
    fn test_boundaries_snap_to_solid_lines() {
        let lines: Vec<LineCandidate> = [100.0, 150.0, 200.0, 250.0]
            .iter()
            .map(|&y| hline(y))
            .collect();
        let centers = detect_row_centers(&[], None, &lines, &cfg());
        let solids: Vec<f32> = lines.iter().map(|l| l.position).collect();

        let boundaries = row_boundaries(&centers, &solids, &cfg());

        // P ruling lines recover exactly P boundaries (P-1 rows).
        assert_eq!(boundaries.len(), 4);
        for (b, expected) in boundaries.iter().zip([100.0, 150.0, 200.0, 250.0]) {
            assert!((b - expected).abs() < 0.01);
        }
    }

    #[test]
    fn test_boundaries_extrapolate_without_lines() {
        let centers: Vec<RowCenter> = [100.0, 130.0, 160.0, 190.0]
            .iter()
            .map(|&y| RowCenter {
                y,
                score: 1.0,
                source: RowSource::Density,
            })
            .collect();

        let boundaries = row_boundaries(&centers, &[], &cfg());

        assert_eq!(boundaries.len(), 5);
        assert!((boundaries[0] - 85.0).abs() < 0.01);
        assert!((boundaries[4] - 205.0).abs() < 0.01);
        for w in boundaries.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn test_too_few_centers_no_boundaries() {
        let centers = vec![RowCenter {
            y: 50.0,
            score: 1.0,
            source: RowSource::Density,
        }];
        assert!(row_boundaries(&centers, &[], &cfg()).is_empty());
    }
}
