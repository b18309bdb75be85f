//! Vector-path line observation.
//!
//! Collects line and rectangle-edge primitives from a document's native
//! vector graphics, classifies them as horizontal or vertical, clusters
//! collinear segments, and rescales the result into image coordinates
//! when the vector page uses a different scale.

use crate::config::ReconstructConfig;
use crate::geometry::{safe_float_cmp, Rect};
use crate::observer::{LineCandidate, LineSource, LineStyle, Orientation};

/// A raw line segment from the vector graphics stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Start x
    pub x0: f32,
    /// Start y
    pub y0: f32,
    /// End x
    pub x1: f32,
    /// End y
    pub y1: f32,
}

impl Segment {
    /// Create a segment from two endpoints.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// A handle to one page's vector graphics.
///
/// The page carries its own dimensions because vector coordinates may be
/// in a different scale than the rendered image the rest of the pipeline
/// operates in.
#[derive(Debug, Clone, Default)]
pub struct VectorPage {
    /// Page width in vector units.
    pub width: f32,
    /// Page height in vector units.
    pub height: f32,
    /// Stroked line primitives.
    pub segments: Vec<Segment>,
    /// Rectangle primitives; each contributes four edges.
    pub rects: Vec<Rect>,
}

impl VectorPage {
    /// Create an empty vector page with the given dimensions.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            segments: Vec::new(),
            rects: Vec::new(),
        }
    }
}

/// An axis-aligned segment after classification.
#[derive(Debug, Clone, Copy)]
struct AxisSegment {
    /// Perpendicular coordinate.
    position: f32,
    /// Span start along the orientation.
    start: f32,
    /// Span end along the orientation.
    end: f32,
}

/// Observe line candidates from vector graphics.
///
/// Returns `(horizontal, vertical, warnings)` with every candidate
/// already rescaled into image coordinates.
pub fn observe_lines(
    page: &VectorPage,
    image_width: f32,
    image_height: f32,
    cfg: &ReconstructConfig,
) -> (Vec<LineCandidate>, Vec<LineCandidate>, Vec<String>) {
    let mut warnings = Vec::new();
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();

    for seg in collect_segments(page) {
        let dx = (seg.x1 - seg.x0).abs();
        let dy = (seg.y1 - seg.y0).abs();

        if dy <= cfg.max_axis_skew && dx > 0.0 {
            horizontal.push(AxisSegment {
                position: (seg.y0 + seg.y1) / 2.0,
                start: seg.x0.min(seg.x1),
                end: seg.x0.max(seg.x1),
            });
        } else if dx <= cfg.max_axis_skew && dy > 0.0 {
            vertical.push(AxisSegment {
                position: (seg.x0 + seg.x1) / 2.0,
                start: seg.y0.min(seg.y1),
                end: seg.y0.max(seg.y1),
            });
        }
        // Oblique segments carry no tabular structure.
    }

    let mut h_lines = cluster_collinear(
        horizontal,
        Orientation::Horizontal,
        page.width.max(1.0),
        cfg,
    );
    let mut v_lines = cluster_collinear(vertical, Orientation::Vertical, page.height.max(1.0), cfg);

    // Rescale into image coordinates when the vector page was laid out at
    // a different scale than the rendered image.
    if page.width > 0.0 && page.height > 0.0 {
        let sx = image_width / page.width;
        let sy = image_height / page.height;

        let skew = if sy.abs() > f32::EPSILON {
            (sx / sy - 1.0).abs()
        } else {
            0.0
        };
        if skew > cfg.scale_skew_warn {
            let msg = format!(
                "vector/image scale skew {:.0}% exceeds {:.0}% tolerance (sx={:.3}, sy={:.3})",
                skew * 100.0,
                cfg.scale_skew_warn * 100.0,
                sx,
                sy
            );
            log::warn!("observer: {}", msg);
            warnings.push(msg);
        }

        if (sx - 1.0).abs() > f32::EPSILON || (sy - 1.0).abs() > f32::EPSILON {
            for line in &mut h_lines {
                line.position *= sy;
                line.span_start *= sx;
                line.span_end *= sx;
            }
            for line in &mut v_lines {
                line.position *= sx;
                line.span_start *= sy;
                line.span_end *= sy;
            }
        }
    }

    h_lines.sort_by(|a, b| safe_float_cmp(a.position, b.position));
    v_lines.sort_by(|a, b| safe_float_cmp(a.position, b.position));

    (h_lines, v_lines, warnings)
}

/// Explode rectangles into edges and merge with the stroked segments.
fn collect_segments(page: &VectorPage) -> Vec<Segment> {
    let mut all = page.segments.clone();
    for rect in &page.rects {
        all.push(Segment::new(rect.left(), rect.top(), rect.right(), rect.top()));
        all.push(Segment::new(
            rect.left(),
            rect.bottom(),
            rect.right(),
            rect.bottom(),
        ));
        all.push(Segment::new(rect.left(), rect.top(), rect.left(), rect.bottom()));
        all.push(Segment::new(
            rect.right(),
            rect.top(),
            rect.right(),
            rect.bottom(),
        ));
    }
    all
}

/// Cluster collinear axis segments into line candidates.
///
/// Segments within `collinear_tolerance` of each other's position are
/// merged; coverage is the merged ink length over the cluster span.
fn cluster_collinear(
    mut segments: Vec<AxisSegment>,
    orientation: Orientation,
    full_extent: f32,
    cfg: &ReconstructConfig,
) -> Vec<LineCandidate> {
    if segments.is_empty() {
        return Vec::new();
    }

    segments.sort_by(|a, b| safe_float_cmp(a.position, b.position));

    let mut candidates = Vec::new();
    let mut cluster: Vec<AxisSegment> = vec![segments[0]];

    for seg in segments.into_iter().skip(1) {
        let anchor = cluster.last().map(|s| s.position).unwrap_or(seg.position);
        if (seg.position - anchor).abs() <= cfg.collinear_tolerance {
            cluster.push(seg);
        } else {
            if let Some(candidate) = finish_cluster(&cluster, orientation, full_extent, cfg) {
                candidates.push(candidate);
            }
            cluster = vec![seg];
        }
    }
    if let Some(candidate) = finish_cluster(&cluster, orientation, full_extent, cfg) {
        candidates.push(candidate);
    }

    candidates
}

/// Build one candidate from a cluster of collinear segments.
fn finish_cluster(
    cluster: &[AxisSegment],
    orientation: Orientation,
    full_extent: f32,
    cfg: &ReconstructConfig,
) -> Option<LineCandidate> {
    let span_start = cluster
        .iter()
        .map(|s| s.start)
        .fold(f32::INFINITY, f32::min);
    let span_end = cluster
        .iter()
        .map(|s| s.end)
        .fold(f32::NEG_INFINITY, f32::max);
    let span = span_end - span_start;
    if span <= 0.0 {
        return None;
    }

    // Merge overlapping intervals to measure real ink length and count
    // the distinct fragments.
    let mut intervals: Vec<(f32, f32)> = cluster.iter().map(|s| (s.start, s.end)).collect();
    intervals.sort_by(|a, b| safe_float_cmp(a.0, b.0));
    let mut merged: Vec<(f32, f32)> = Vec::new();
    for (start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start <= last.1 + 0.5 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    let covered: f32 = merged.iter().map(|(s, e)| e - s).sum();
    let coverage = (covered / span).clamp(0.0, 1.0);

    // Length-weighted mean position.
    let total_len: f32 = cluster.iter().map(|s| s.end - s.start).sum();
    let position = if total_len > 0.0 {
        cluster
            .iter()
            .map(|s| s.position * (s.end - s.start))
            .sum::<f32>()
            / total_len
    } else {
        cluster[0].position
    };

    let style = if coverage >= cfg.solid_coverage_min {
        LineStyle::Solid
    } else {
        LineStyle::Dashed
    };

    Some(LineCandidate {
        orientation,
        position,
        span_start,
        span_end,
        coverage,
        style,
        score: ((span / full_extent) * coverage).clamp(0.0, 1.0),
        source: LineSource::Vector,
        segment_count: merged.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ReconstructConfig {
        ReconstructConfig::default()
    }

    #[test]
    fn test_classify_and_cluster_solid_line() {
        let mut page = VectorPage::new(600.0, 800.0);
        page.segments.push(Segment::new(10.0, 100.0, 590.0, 100.0));

        let (h, v, warnings) = observe_lines(&page, 600.0, 800.0, &cfg());

        assert_eq!(h.len(), 1);
        assert!(v.is_empty());
        assert!(warnings.is_empty());
        assert_eq!(h[0].style, LineStyle::Solid);
        assert_eq!(h[0].segment_count, 1);
        assert!((h[0].position - 100.0).abs() < 0.01);
        assert!((h[0].coverage - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_dashed_line_from_fragments() {
        let mut page = VectorPage::new(600.0, 800.0);
        // Five short dashes covering half the span.
        for i in 0..5 {
            let x = 100.0 + i as f32 * 80.0;
            page.segments.push(Segment::new(x, 200.0, x + 40.0, 200.0));
        }

        let (h, _, _) = observe_lines(&page, 600.0, 800.0, &cfg());

        assert_eq!(h.len(), 1);
        assert_eq!(h[0].style, LineStyle::Dashed);
        assert_eq!(h[0].segment_count, 5);
        assert!(h[0].coverage < 0.75);
    }

    #[test]
    fn test_rect_contributes_four_edges() {
        let mut page = VectorPage::new(600.0, 800.0);
        page.rects.push(Rect::new(50.0, 50.0, 500.0, 300.0));

        let (h, v, _) = observe_lines(&page, 600.0, 800.0, &cfg());

        assert_eq!(h.len(), 2);
        assert_eq!(v.len(), 2);
    }

    #[test]
    fn test_oblique_segments_dropped() {
        let mut page = VectorPage::new(600.0, 800.0);
        page.segments.push(Segment::new(0.0, 0.0, 100.0, 100.0));

        let (h, v, _) = observe_lines(&page, 600.0, 800.0, &cfg());

        assert!(h.is_empty());
        assert!(v.is_empty());
    }

    #[test]
    fn test_rescale_to_image_coordinates() {
        let mut page = VectorPage::new(300.0, 400.0);
        page.segments.push(Segment::new(0.0, 100.0, 300.0, 100.0));

        // Image rendered at 2x.
        let (h, _, warnings) = observe_lines(&page, 600.0, 800.0, &cfg());

        assert!(warnings.is_empty());
        assert!((h[0].position - 200.0).abs() < 0.01);
        assert!((h[0].span_end - 600.0).abs() < 0.01);
    }

    #[test]
    fn test_scale_skew_warning() {
        let mut page = VectorPage::new(300.0, 400.0);
        page.segments.push(Segment::new(0.0, 100.0, 300.0, 100.0));

        // 2x horizontally, 1x vertically: 100% skew.
        let (h, _, warnings) = observe_lines(&page, 600.0, 400.0, &cfg());

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("scale skew"));
        // Still rescaled, not dropped.
        assert!((h[0].span_end - 600.0).abs() < 0.01);
    }

    #[test]
    fn test_collinear_fragments_merge() {
        let mut page = VectorPage::new(600.0, 800.0);
        // Two fragments 2px apart vertically, same logical rule.
        page.segments.push(Segment::new(0.0, 100.0, 280.0, 100.0));
        page.segments.push(Segment::new(320.0, 102.0, 600.0, 102.0));

        let (h, _, _) = observe_lines(&page, 600.0, 800.0, &cfg());

        assert_eq!(h.len(), 1);
        assert_eq!(h[0].segment_count, 2);
        assert!(h[0].coverage > 0.9);
    }
}
