//! Raster-path line observation.
//!
//! Fallback for pages without native vector graphics: binarize the
//! rendered image, extract horizontal and vertical ink masks with a
//! directional morphological opening, convert mask blobs into line
//! candidates, and run a supplementary Hough pass restricted to the
//! interior of the morphological mask.

use crate::config::ReconstructConfig;
use crate::geometry::{safe_float_cmp, Rect};
use crate::observer::{LineCandidate, LineSource, LineStyle, Orientation};
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::hough::{detect_lines, LineDetectionOptions};

/// Result of raster line observation.
#[derive(Debug, Default)]
pub struct RasterLines {
    /// Horizontal line candidates, sorted by position.
    pub horizontal: Vec<LineCandidate>,
    /// Vertical line candidates, sorted by position.
    pub vertical: Vec<LineCandidate>,
    /// Warnings (discarded detectors, empty masks).
    pub warnings: Vec<String>,
}

/// Binarize the page image into an ink mask (255 = ink).
///
/// Areas outside the analysis rect are physically blanked before
/// thresholding, so masked-off content can never leak into the line
/// detectors.
pub fn ink_mask(image: &GrayImage, analysis_rect: Option<Rect>) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut masked = image.clone();

    if let Some(rect) = analysis_rect {
        for y in 0..height {
            for x in 0..width {
                let inside = (x as f32) >= rect.left()
                    && (x as f32) <= rect.right()
                    && (y as f32) >= rect.top()
                    && (y as f32) <= rect.bottom();
                if !inside {
                    masked.put_pixel(x, y, Luma([255u8]));
                }
            }
        }
    }

    // Foreground is `p <= level`: imageproc's threshold maps `p > level`
    // to white, and on a mostly-white page the Otsu level can be 0.
    let level = otsu_level(&masked);
    let mut ink = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            if masked.get_pixel(x, y).0[0] <= level {
                ink.put_pixel(x, y, Luma([255u8]));
            }
        }
    }
    ink
}

/// Observe line candidates from a rendered page image.
pub fn observe_lines(
    image: &GrayImage,
    analysis_rect: Option<Rect>,
    cfg: &ReconstructConfig,
) -> RasterLines {
    let (width, height) = image.dimensions();
    let mut result = RasterLines::default();
    if width == 0 || height == 0 {
        result.warnings.push("raster image is empty".to_string());
        return result;
    }

    let ink = ink_mask(image, analysis_rect);

    let h_open = (width as f32 * cfg.morph_open_ratio) as u32;
    let h_open = h_open.max(cfg.morph_open_min);
    let v_open = (height as f32 * cfg.morph_open_ratio) as u32;
    let v_open = v_open.max(cfg.morph_open_min);

    let h_mask = open_rows(&ink, h_open);
    let v_mask = open_cols(&ink, v_open);

    result.horizontal = rows_to_lines(&h_mask);
    result.vertical = cols_to_lines(&v_mask);

    // Supplementary Hough pass on the morphological mask interior only;
    // the raw image is never fed to the transform.
    hough_supplement(&h_mask, &v_mask, cfg, &mut result);

    result
        .horizontal
        .sort_by(|a, b| safe_float_cmp(a.position, b.position));
    result
        .vertical
        .sort_by(|a, b| safe_float_cmp(a.position, b.position));
    result
}

/// Morphological opening with a horizontal 1×k structuring element,
/// implemented as a per-row run-length filter: ink runs shorter than
/// `min_len` are erased.
fn open_rows(mask: &GrayImage, min_len: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        let mut run_start = 0u32;
        let mut in_run = false;
        for x in 0..=width {
            let ink = x < width && mask.get_pixel(x, y).0[0] > 0;
            if ink && !in_run {
                in_run = true;
                run_start = x;
            } else if !ink && in_run {
                in_run = false;
                if x - run_start >= min_len {
                    for xi in run_start..x {
                        out.put_pixel(xi, y, Luma([255u8]));
                    }
                }
            }
        }
    }
    out
}

/// Morphological opening with a vertical k×1 structuring element.
fn open_cols(mask: &GrayImage, min_len: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);

    for x in 0..width {
        let mut run_start = 0u32;
        let mut in_run = false;
        for y in 0..=height {
            let ink = y < height && mask.get_pixel(x, y).0[0] > 0;
            if ink && !in_run {
                in_run = true;
                run_start = y;
            } else if !ink && in_run {
                in_run = false;
                if y - run_start >= min_len {
                    for yi in run_start..y {
                        out.put_pixel(x, yi, Luma([255u8]));
                    }
                }
            }
        }
    }
    out
}

/// Per-scanline ink statistics.
#[derive(Debug, Clone, Copy)]
struct ScanStats {
    index: u32,
    min: u32,
    max: u32,
    covered: u32,
    runs: usize,
}

fn scan_row(mask: &GrayImage, y: u32) -> Option<ScanStats> {
    let width = mask.width();
    let mut stats = ScanStats {
        index: y,
        min: u32::MAX,
        max: 0,
        covered: 0,
        runs: 0,
    };
    let mut prev_ink = false;
    for x in 0..width {
        let ink = mask.get_pixel(x, y).0[0] > 0;
        if ink {
            stats.min = stats.min.min(x);
            stats.max = stats.max.max(x);
            stats.covered += 1;
            if !prev_ink {
                stats.runs += 1;
            }
        }
        prev_ink = ink;
    }
    (stats.covered > 0).then_some(stats)
}

fn scan_col(mask: &GrayImage, x: u32) -> Option<ScanStats> {
    let height = mask.height();
    let mut stats = ScanStats {
        index: x,
        min: u32::MAX,
        max: 0,
        covered: 0,
        runs: 0,
    };
    let mut prev_ink = false;
    for y in 0..height {
        let ink = mask.get_pixel(x, y).0[0] > 0;
        if ink {
            stats.min = stats.min.min(y);
            stats.max = stats.max.max(y);
            stats.covered += 1;
            if !prev_ink {
                stats.runs += 1;
            }
        }
        prev_ink = ink;
    }
    (stats.covered > 0).then_some(stats)
}

/// Group consecutive inked scanlines into bands and emit one line
/// candidate per band.
fn bands_to_lines(
    scans: Vec<ScanStats>,
    orientation: Orientation,
    full_extent: f32,
) -> Vec<LineCandidate> {
    let mut lines = Vec::new();
    let mut band: Vec<ScanStats> = Vec::new();

    let mut flush = |band: &[ScanStats], lines: &mut Vec<LineCandidate>| {
        if band.is_empty() {
            return;
        }
        let span_start = band.iter().map(|s| s.min).min().unwrap() as f32;
        let span_end = band.iter().map(|s| s.max).max().unwrap() as f32 + 1.0;
        let span = span_end - span_start;
        if span <= 1.0 {
            return;
        }
        // The densest scanline is the band's representative.
        let best = band.iter().max_by_key(|s| s.covered).unwrap();
        let weight_sum: f32 = band.iter().map(|s| s.covered as f32).sum();
        let position = band
            .iter()
            .map(|s| s.index as f32 * s.covered as f32)
            .sum::<f32>()
            / weight_sum;
        let coverage = (best.covered as f32 / span).clamp(0.0, 1.0);
        let style = if coverage >= 0.75 {
            LineStyle::Solid
        } else {
            LineStyle::Dashed
        };
        lines.push(LineCandidate {
            orientation,
            position,
            span_start,
            span_end,
            coverage,
            style,
            score: ((span / full_extent) * coverage).clamp(0.0, 1.0),
            source: LineSource::Raster,
            segment_count: best.runs,
        });
    };

    for stats in scans {
        match band.last() {
            Some(last) if stats.index == last.index + 1 => band.push(stats),
            Some(_) => {
                flush(&band, &mut lines);
                band = vec![stats];
            },
            None => band.push(stats),
        }
    }
    flush(&band, &mut lines);
    lines
}

fn rows_to_lines(mask: &GrayImage) -> Vec<LineCandidate> {
    let scans: Vec<ScanStats> = (0..mask.height()).filter_map(|y| scan_row(mask, y)).collect();
    bands_to_lines(scans, Orientation::Horizontal, mask.width().max(1) as f32)
}

fn cols_to_lines(mask: &GrayImage) -> Vec<LineCandidate> {
    let scans: Vec<ScanStats> = (0..mask.width()).filter_map(|x| scan_col(mask, x)).collect();
    bands_to_lines(scans, Orientation::Vertical, mask.height().max(1) as f32)
}

/// Edge-detector + line-transform supplement over the morphological
/// masks.
///
/// The result set is discarded wholesale when the candidate count
/// explodes past a size-dependent ceiling; that is a detector failure,
/// not valid data.
fn hough_supplement(
    h_mask: &GrayImage,
    v_mask: &GrayImage,
    cfg: &ReconstructConfig,
    result: &mut RasterLines,
) {
    let (width, height) = h_mask.dimensions();

    let mut combined = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            if h_mask.get_pixel(x, y).0[0] > 0 || v_mask.get_pixel(x, y).0[0] > 0 {
                combined.put_pixel(x, y, Luma([255u8]));
            }
        }
    }

    let edges = canny(&combined, 50.0, 100.0);
    let vote_threshold = ((width.min(height) as f32 * cfg.hough_vote_ratio) as u32).max(40);
    let detected = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold,
            suppression_radius: 8,
        },
    );

    let ceiling = 64usize.max(width.max(height) as usize / 4);
    if detected.len() > ceiling {
        let msg = format!(
            "hough detector discarded: {} lines exceeds ceiling {}",
            detected.len(),
            ceiling
        );
        log::warn!("observer: {}", msg);
        result.warnings.push(msg);
        return;
    }

    let tol = cfg.hough_angle_tolerance;
    for line in detected {
        if line.angle_in_degrees <= tol {
            // Near-vertical: x = r.
            let x = line.r.round();
            if x < 0.0 || x >= width as f32 {
                continue;
            }
            if result
                .vertical
                .iter()
                .any(|c| (c.position - x).abs() <= cfg.collinear_tolerance * 2.0)
            {
                continue;
            }
            if let Some(candidate) =
                mask_supported_line(v_mask, Orientation::Vertical, x as u32, height)
            {
                result.vertical.push(candidate);
            }
        } else if line.angle_in_degrees.abs_diff(90) <= tol {
            // Near-horizontal: y = r.
            let y = line.r.round();
            if y < 0.0 || y >= height as f32 {
                continue;
            }
            if result
                .horizontal
                .iter()
                .any(|c| (c.position - y).abs() <= cfg.collinear_tolerance * 2.0)
            {
                continue;
            }
            if let Some(candidate) =
                mask_supported_line(h_mask, Orientation::Horizontal, y as u32, width)
            {
                result.horizontal.push(candidate);
            }
        }
    }
}

/// Build a candidate for a Hough line, but only where the morphological
/// mask actually carries ink within two pixels of the line.
fn mask_supported_line(
    mask: &GrayImage,
    orientation: Orientation,
    position: u32,
    extent: u32,
) -> Option<LineCandidate> {
    let mut min = u32::MAX;
    let mut max = 0u32;
    let mut covered = 0u32;

    for along in 0..extent {
        let mut ink = false;
        for offset in -2i64..=2 {
            let perp = position as i64 + offset;
            if perp < 0 {
                continue;
            }
            let perp = perp as u32;
            let hit = match orientation {
                Orientation::Horizontal => perp < mask.height() && mask.get_pixel(along, perp).0[0] > 0,
                Orientation::Vertical => perp < mask.width() && mask.get_pixel(perp, along).0[0] > 0,
            };
            if hit {
                ink = true;
                break;
            }
        }
        if ink {
            min = min.min(along);
            max = max.max(along);
            covered += 1;
        }
    }

    if covered == 0 {
        return None;
    }
    let span_start = min as f32;
    let span_end = max as f32 + 1.0;
    let span = span_end - span_start;
    if span <= 1.0 {
        return None;
    }
    let coverage = (covered as f32 / span).clamp(0.0, 1.0);

    Some(LineCandidate {
        orientation,
        position: position as f32,
        span_start,
        span_end,
        coverage,
        style: if coverage >= 0.75 {
            LineStyle::Solid
        } else {
            LineStyle::Dashed
        },
        score: ((span / extent.max(1) as f32) * coverage).clamp(0.0, 1.0),
        source: LineSource::Raster,
        segment_count: 1,
    })
}
