//! Separator candidate detection.
//!
//! Two of the three panel signals live here: vertical lines that span
//! most of the table height, and whitespace gutters — sustained
//! low-ink-density bands of the rendered image. The third signal
//! (token-gap analysis) belongs to the structure analyzer.
//!
//! Every candidate above the absolute noise floor is retained, weak and
//! border-adjacent ones included; filtering is downstream policy.

use crate::config::ReconstructConfig;
use crate::geometry::{safe_float_cmp, Rect};
use crate::observer::{LineCandidate, SeparatorCandidate, SeparatorEvidence, SeparatorSource};
use image::GrayImage;

/// Derive separator candidates from vertical line candidates.
///
/// Strength is `span_ratio × coverage` with a bonus for candidates merged
/// from many raw fragments (dashed rules broken by cell text).
pub fn from_vertical_lines(
    vertical: &[LineCandidate],
    table: &Rect,
    cfg: &ReconstructConfig,
) -> Vec<SeparatorCandidate> {
    let border_margin = table.width * cfg.border_margin_ratio;
    let mut candidates = Vec::new();

    for line in vertical {
        if line.position < table.left() - border_margin
            || line.position > table.right() + border_margin
        {
            continue;
        }
        if table.height <= 0.0 {
            continue;
        }

        let overlap = line.span_overlap(table.top(), table.bottom());
        let span_ratio = (overlap / table.height).clamp(0.0, 1.0);
        let fragment_bonus = 1.0 + 0.08 * (line.segment_count.saturating_sub(1)).min(5) as f32;
        let strength = (span_ratio * line.coverage * fragment_bonus).clamp(0.0, 1.0);

        if strength < cfg.separator_noise_floor {
            continue;
        }

        candidates.push(SeparatorCandidate {
            x: line.position,
            strength,
            source: SeparatorSource::VerticalLine,
            is_strong: strength >= cfg.separator_strong_min
                && span_ratio >= cfg.separator_span_ratio_min,
            is_border: is_border(line.position, table, border_margin),
            evidence: SeparatorEvidence::Line {
                span_ratio,
                coverage: line.coverage,
            },
        });
    }

    candidates
}

/// Derive separator candidates from whitespace gutters.
///
/// A gutter is a maximal run of image columns whose ink density stays
/// below the weak threshold for at least the configured width. Strength
/// is valley width × depth.
pub fn from_gutters(
    ink: &GrayImage,
    table: &Rect,
    cfg: &ReconstructConfig,
) -> Vec<SeparatorCandidate> {
    let profile = column_density(ink, table);
    if profile.is_empty() {
        return Vec::new();
    }
    let mean = profile.iter().sum::<f32>() / profile.len() as f32;
    if mean <= 0.0 {
        return Vec::new();
    }

    let threshold = mean * cfg.gutter_density_ceiling;
    let min_width = (table.width * cfg.gutter_min_width_ratio).max(1.0);
    let border_margin = table.width * cfg.border_margin_ratio;
    let x0 = table.left();

    let mut candidates = Vec::new();
    let mut run_start: Option<usize> = None;

    for i in 0..=profile.len() {
        let in_valley = i < profile.len() && profile[i] < threshold;
        match (in_valley, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                run_start = None;
                let width = (i - start) as f32;
                if width < min_width {
                    continue;
                }
                let avg: f32 = profile[start..i].iter().sum::<f32>() / width;
                let depth = ((mean - avg) / mean).clamp(0.0, 1.0);
                // Saturate the width factor at 15% of the table width.
                let width_norm = (width / (table.width * 0.15)).min(1.0);
                let strength = (width_norm * depth).clamp(0.0, 1.0);
                if strength < cfg.separator_noise_floor {
                    continue;
                }
                let x = x0 + (start as f32 + width / 2.0);
                candidates.push(SeparatorCandidate {
                    x,
                    strength,
                    source: SeparatorSource::WhitespaceGutter,
                    is_strong: strength >= cfg.separator_strong_min,
                    is_border: is_border(x, table, border_margin),
                    evidence: SeparatorEvidence::Gutter { width, depth },
                });
            },
            _ => {},
        }
    }

    candidates
}

/// Sort candidates by strength descending (x ascending as tie-break).
///
/// The result is a permutation of the input.
pub fn rank(candidates: &[SeparatorCandidate]) -> Vec<SeparatorCandidate> {
    let mut ranked = candidates.to_vec();
    ranked.sort_by(|a, b| {
        safe_float_cmp(b.strength, a.strength).then(safe_float_cmp(a.x, b.x))
    });
    ranked
}

fn is_border(x: f32, table: &Rect, margin: f32) -> bool {
    (x - table.left()).abs() <= margin || (x - table.right()).abs() <= margin
}

/// Per-column ink density (fraction of inked rows) within the table bbox.
fn column_density(ink: &GrayImage, table: &Rect) -> Vec<f32> {
    let (width, height) = ink.dimensions();
    let x0 = table.left().max(0.0) as u32;
    let x1 = (table.right().min(width as f32) as u32).min(width);
    let y0 = table.top().max(0.0) as u32;
    let y1 = (table.bottom().min(height as f32) as u32).min(height);
    if x1 <= x0 || y1 <= y0 {
        return Vec::new();
    }

    let rows = (y1 - y0) as f32;
    (x0..x1)
        .map(|x| {
            let mut count = 0u32;
            for y in y0..y1 {
                if ink.get_pixel(x, y).0[0] > 0 {
                    count += 1;
                }
            }
            count as f32 / rows
        })
        .collect()
}
