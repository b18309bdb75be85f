//! Table bounding box estimation and panel candidate clustering.

use crate::config::ReconstructConfig;
use crate::geometry::{percentile, safe_float_cmp, Rect};
use crate::observer::{
    LineCandidate, LineStyle, PanelCandidate, PanelSource, SeparatorCandidate, SeparatorSource,
};

/// Estimate the table bounding box from line candidates.
///
/// Prefers the extent of the longest solid lines; when those are too few,
/// falls back to the 5th/95th percentile of all line positions. Returns
/// `None` only when there are no lines at all.
pub fn estimate_table_bbox(
    horizontal: &[LineCandidate],
    vertical: &[LineCandidate],
    page_width: f32,
    page_height: f32,
) -> Option<Rect> {
    if horizontal.is_empty() && vertical.is_empty() {
        return None;
    }

    let h_solid = longest_solid(horizontal);
    let v_solid = longest_solid(vertical);

    let from_h = bounds_from_lines(&h_solid);
    let from_v = bounds_from_lines(&v_solid);

    // Horizontal solids give the y-range from positions and the x-range
    // from spans; vertical solids the converse. Use whichever is present,
    // intersecting the evidence when both are.
    let (x_bounds, y_bounds) = match (from_h, from_v) {
        (Some((hx, hy)), Some((vx, vy))) => {
            (Some((hx.0.min(vy.0), hx.1.max(vy.1))), Some((hy.0.min(vx.0), hy.1.max(vx.1))))
        },
        (Some((hx, hy)), None) => (Some(hx), Some(hy)),
        (None, Some((vx, vy))) => (Some(vy), Some(vx)),
        (None, None) => (None, None),
    };

    let (x0, x1) = x_bounds.unwrap_or_else(|| percentile_bounds_x(horizontal, vertical));
    let (y0, y1) = y_bounds.unwrap_or_else(|| percentile_bounds_y(horizontal, vertical));

    let x0 = x0.max(0.0);
    let y0 = y0.max(0.0);
    let x1 = x1.min(page_width);
    let y1 = y1.min(page_height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(Rect::from_points(x0, y0, x1, y1))
}

/// Solid lines whose span is at least half of the longest solid span.
fn longest_solid(lines: &[LineCandidate]) -> Vec<&LineCandidate> {
    let solids: Vec<&LineCandidate> = lines
        .iter()
        .filter(|l| l.style == LineStyle::Solid)
        .collect();
    let max_span = solids.iter().map(|l| l.span()).fold(0.0f32, f32::max);
    solids
        .into_iter()
        .filter(|l| l.span() >= max_span * 0.5)
        .collect()
}

/// `((span_min, span_max), (pos_min, pos_max))` over a line set,
/// requiring at least two lines so a range exists.
fn bounds_from_lines(lines: &[&LineCandidate]) -> Option<((f32, f32), (f32, f32))> {
    if lines.len() < 2 {
        return None;
    }
    let span_min = lines
        .iter()
        .map(|l| l.span_start)
        .fold(f32::INFINITY, f32::min);
    let span_max = lines
        .iter()
        .map(|l| l.span_end)
        .fold(f32::NEG_INFINITY, f32::max);
    let pos_min = lines
        .iter()
        .map(|l| l.position)
        .fold(f32::INFINITY, f32::min);
    let pos_max = lines
        .iter()
        .map(|l| l.position)
        .fold(f32::NEG_INFINITY, f32::max);
    Some(((span_min, span_max), (pos_min, pos_max)))
}

fn percentile_bounds_x(horizontal: &[LineCandidate], vertical: &[LineCandidate]) -> (f32, f32) {
    let mut xs: Vec<f32> = vertical.iter().map(|l| l.position).collect();
    for line in horizontal {
        xs.push(line.span_start);
        xs.push(line.span_end);
    }
    (percentile(&xs, 5.0), percentile(&xs, 95.0))
}

fn percentile_bounds_y(horizontal: &[LineCandidate], vertical: &[LineCandidate]) -> (f32, f32) {
    let mut ys: Vec<f32> = horizontal.iter().map(|l| l.position).collect();
    for line in vertical {
        ys.push(line.span_start);
        ys.push(line.span_end);
    }
    (percentile(&ys, 5.0), percentile(&ys, 95.0))
}

/// Cluster separator candidates into panel boundaries and slice the table
/// bbox into panel candidates.
///
/// Candidates within the positional tolerance merge into one boundary at
/// their strength-weighted centroid. Returns an empty vector when no
/// internal boundary emerges (the whole table is then one implicit
/// panel, decided downstream).
pub fn cluster_into_panels(
    separators: &[&SeparatorCandidate],
    table: &Rect,
    cfg: &ReconstructConfig,
) -> Vec<PanelCandidate> {
    if separators.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&SeparatorCandidate> = separators.to_vec();
    sorted.sort_by(|a, b| safe_float_cmp(a.x, b.x));

    // Greedy 1-D clustering by positional proximity.
    struct Boundary {
        x: f32,
        strength: f32,
        line_evidence: bool,
        gutter_evidence: bool,
    }
    let mut boundaries: Vec<Boundary> = Vec::new();
    let mut cluster: Vec<&SeparatorCandidate> = Vec::new();

    let mut flush = |cluster: &[&SeparatorCandidate], boundaries: &mut Vec<Boundary>| {
        if cluster.is_empty() {
            return;
        }
        let weight: f32 = cluster.iter().map(|s| s.strength).sum();
        let x = if weight > 0.0 {
            cluster.iter().map(|s| s.x * s.strength).sum::<f32>() / weight
        } else {
            cluster[0].x
        };
        boundaries.push(Boundary {
            x,
            strength: cluster
                .iter()
                .map(|s| s.strength)
                .fold(0.0f32, f32::max),
            line_evidence: cluster
                .iter()
                .any(|s| s.source == SeparatorSource::VerticalLine),
            gutter_evidence: cluster
                .iter()
                .any(|s| s.source == SeparatorSource::WhitespaceGutter),
        });
    };

    for sep in sorted {
        match cluster.last() {
            Some(last) if (sep.x - last.x).abs() <= cfg.panel_cluster_tolerance => {
                cluster.push(sep)
            },
            Some(_) => {
                flush(&cluster, &mut boundaries);
                cluster = vec![sep];
            },
            None => cluster.push(sep),
        }
    }
    flush(&cluster, &mut boundaries);

    // Keep only boundaries strictly inside the table.
    boundaries.retain(|b| b.x > table.left() && b.x < table.right());
    if boundaries.is_empty() {
        return Vec::new();
    }

    let mut edges = vec![table.left()];
    edges.extend(boundaries.iter().map(|b| b.x));
    edges.push(table.right());

    let mut panels = Vec::new();
    for i in 0..edges.len() - 1 {
        let left = edges[i];
        let right = edges[i + 1];
        if right - left <= 1.0 {
            continue;
        }

        // Confidence from the internal boundaries adjacent to this slice.
        let mut strengths = Vec::new();
        let mut line_evidence = false;
        let mut gutter_evidence = false;
        if i > 0 {
            let b = &boundaries[i - 1];
            strengths.push(b.strength);
            line_evidence |= b.line_evidence;
            gutter_evidence |= b.gutter_evidence;
        }
        if i < boundaries.len() {
            let b = &boundaries[i];
            strengths.push(b.strength);
            line_evidence |= b.line_evidence;
            gutter_evidence |= b.gutter_evidence;
        }
        let confidence = if strengths.is_empty() {
            0.5
        } else {
            strengths.iter().sum::<f32>() / strengths.len() as f32
        };
        let source = match (line_evidence, gutter_evidence) {
            (true, true) => PanelSource::Mixed,
            (false, true) => PanelSource::WhitespaceGutters,
            _ => PanelSource::VerticalSeparators,
        };

        panels.push(PanelCandidate {
            bbox: Rect::from_points(left, table.top(), right, table.bottom()),
            confidence: confidence.clamp(0.0, 1.0),
            source,
            left_x: left,
            right_x: right,
        });
    }

    panels
}
