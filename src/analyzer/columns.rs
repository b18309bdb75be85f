//! Per-panel column boundary detection.
//!
//! Three candidate sources are merged within a small tolerance: vertical
//! line candidates inside the panel, separator candidates from the
//! observer, and density valleys in the panel's own token x-center
//! histogram. Merging uses a score-weighted centroid; the panel's edges
//! are appended when no boundary lies near them.

use crate::config::ReconstructConfig;
use crate::geometry::{safe_float_cmp, Rect};
use crate::observer::{LineCandidate, SeparatorCandidate};
use crate::token::Token;
use serde::Serialize;

/// Which signal a column boundary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySource {
    /// A vertical line candidate.
    Line,
    /// A separator candidate from the observer.
    Separator,
    /// A valley in the panel's token x-center histogram.
    TokenGap,
    /// The panel's own left or right edge.
    PanelEdge,
}

/// A column boundary candidate or accepted boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnBoundary {
    /// X position of the boundary.
    pub x: f32,
    /// Merged score.
    pub score: f32,
    /// Dominant source among the merged candidates.
    pub source: BoundarySource,
    /// How many raw candidates merged into this boundary.
    pub cluster_size: usize,
}

/// Detect column boundaries for one panel.
///
/// Returns `(accepted, candidates)`: the accepted boundaries sorted by x,
/// and every merged candidate that was considered — including rejected
/// ones — for downstream inspection.
pub fn detect_columns(
    panel: &Rect,
    vertical: &[LineCandidate],
    separators: &[SeparatorCandidate],
    tokens: &[Token],
    cfg: &ReconstructConfig,
) -> (Vec<ColumnBoundary>, Vec<ColumnBoundary>) {
    let mut raw: Vec<(f32, f32, BoundarySource)> = Vec::new();

    let margin = cfg.col_merge_tolerance;
    for line in vertical {
        if line.position >= panel.left() - margin && line.position <= panel.right() + margin {
            let overlap = line.span_overlap(panel.top(), panel.bottom());
            if panel.height <= 0.0 || overlap <= 0.0 {
                continue;
            }
            let score = ((overlap / panel.height) * line.coverage).clamp(0.0, 1.0);
            raw.push((line.position, score, BoundarySource::Line));
        }
    }

    for sep in separators {
        if sep.x >= panel.left() - margin && sep.x <= panel.right() + margin {
            raw.push((sep.x, sep.strength, BoundarySource::Separator));
        }
    }

    raw.extend(token_gap_boundaries(panel, tokens, cfg));

    let candidates = merge_candidates(raw, cfg);
    let accepted = accept_boundaries(&candidates, panel, cfg);
    (accepted, candidates)
}

/// Density valleys in the panel's token x-center histogram.
fn token_gap_boundaries(
    panel: &Rect,
    tokens: &[Token],
    cfg: &ReconstructConfig,
) -> Vec<(f32, f32, BoundarySource)> {
    if panel.width <= 0.0 {
        return Vec::new();
    }
    let bin_width = (panel.width / 128.0).max(2.0);
    let bins = (panel.width / bin_width).ceil() as usize;
    if bins < 4 {
        return Vec::new();
    }

    let mut histogram = vec![0u32; bins];
    let mut counted = 0u32;
    for token in tokens {
        let Some(bbox) = token.bbox else { continue };
        let c = bbox.center();
        if !panel.contains_point(&c) {
            continue;
        }
        // Project the token's x extent, not just its center, so wide
        // tokens suppress spurious valleys inside themselves.
        let b0 = (((bbox.left() - panel.left()) / bin_width).floor().max(0.0) as usize).min(bins - 1);
        let b1 = (((bbox.right() - panel.left()) / bin_width).floor().max(0.0) as usize).min(bins - 1);
        for bin in &mut histogram[b0..=b1] {
            *bin += 1;
        }
        counted += 1;
    }
    if counted < 2 {
        return Vec::new();
    }

    // Interior runs of empty bins wide enough to be a column gap.
    let min_gap_bins = ((cfg.min_col_width / bin_width).ceil() as usize).max(1);
    let mut boundaries = Vec::new();
    let mut run_start: Option<usize> = None;
    for i in 0..=bins {
        let empty = i < bins && histogram[i] == 0;
        match (empty, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                run_start = None;
                // Edge-touching runs are panel padding, not gaps.
                if start == 0 || i == bins {
                    continue;
                }
                if i - start < min_gap_bins {
                    continue;
                }
                let center_bin = (start + i) as f32 / 2.0;
                boundaries.push((
                    panel.left() + center_bin * bin_width,
                    0.3,
                    BoundarySource::TokenGap,
                ));
            },
            _ => {},
        }
    }
    boundaries
}

/// Merge raw candidates within the tolerance window into one boundary at
/// their score-weighted centroid.
fn merge_candidates(
    mut raw: Vec<(f32, f32, BoundarySource)>,
    cfg: &ReconstructConfig,
) -> Vec<ColumnBoundary> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.sort_by(|a, b| safe_float_cmp(a.0, b.0));

    let mut merged = Vec::new();
    let mut cluster: Vec<(f32, f32, BoundarySource)> = Vec::new();

    let flush = |cluster: &[(f32, f32, BoundarySource)], merged: &mut Vec<ColumnBoundary>| {
        if cluster.is_empty() {
            return;
        }
        let weight: f32 = cluster.iter().map(|c| c.1).sum();
        let x = if weight > 0.0 {
            cluster.iter().map(|c| c.0 * c.1).sum::<f32>() / weight
        } else {
            cluster[0].0
        };
        let dominant = cluster
            .iter()
            .max_by(|a, b| safe_float_cmp(a.1, b.1))
            .unwrap();
        merged.push(ColumnBoundary {
            x,
            score: weight.clamp(0.0, 1.0),
            source: dominant.2,
            cluster_size: cluster.len(),
        });
    };

    for candidate in raw {
        match cluster.last() {
            Some(last) if (candidate.0 - last.0).abs() <= cfg.col_merge_tolerance => {
                cluster.push(candidate)
            },
            Some(_) => {
                flush(&cluster, &mut merged);
                cluster = vec![candidate];
            },
            None => cluster.push(candidate),
        }
    }
    flush(&cluster, &mut merged);
    merged
}

/// Accept boundaries strongest-first, rejecting any that would create a
/// column narrower than the minimum; add panel edges when nothing sits
/// near them.
fn accept_boundaries(
    candidates: &[ColumnBoundary],
    panel: &Rect,
    cfg: &ReconstructConfig,
) -> Vec<ColumnBoundary> {
    let mut by_score: Vec<&ColumnBoundary> = candidates.iter().collect();
    by_score.sort_by(|a, b| safe_float_cmp(b.score, a.score).then(safe_float_cmp(a.x, b.x)));

    let mut accepted: Vec<ColumnBoundary> = Vec::new();
    for candidate in by_score {
        if candidate.score < cfg.separator_noise_floor {
            continue;
        }
        if candidate.x < panel.left() - cfg.col_merge_tolerance
            || candidate.x > panel.right() + cfg.col_merge_tolerance
        {
            continue;
        }
        if accepted
            .iter()
            .all(|a| (a.x - candidate.x).abs() >= cfg.min_col_width)
        {
            accepted.push(candidate.clone());
        }
    }

    // Panel edges close the outermost columns when no boundary is nearby.
    let edge_radius = cfg.col_merge_tolerance.max(cfg.min_col_width);
    for edge in [panel.left(), panel.right()] {
        if accepted.iter().all(|a| (a.x - edge).abs() >= edge_radius) {
            accepted.push(ColumnBoundary {
                x: edge,
                score: 0.5,
                source: BoundarySource::PanelEdge,
                cluster_size: 1,
            });
        }
    }

    accepted.sort_by(|a, b| safe_float_cmp(a.x, b.x));
    accepted.dedup_by(|a, b| (a.x - b.x).abs() < 0.01);
    accepted
}
