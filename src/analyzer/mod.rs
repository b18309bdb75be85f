//! Stage 2: structure analysis.
//!
//! Turns line/separator/panel candidates plus text fragments into row
//! boundaries (shared across the whole page) and, per panel, column
//! boundaries and an assembled grid. Whether a table exists at all is
//! decided here, on purely physical thresholds.

pub mod columns;
pub mod grid;
pub mod rows;

use crate::config::ReconstructConfig;
use crate::geometry::Rect;
use crate::observer::{LineStyle, Observation, PanelCandidate, PanelSource};
use crate::token::Token;
use crate::trace::{Stage, TraceEvent, TraceSink};
use serde::Serialize;

pub use columns::{BoundarySource, ColumnBoundary};
pub use grid::{Cell, Grid};
pub use rows::{RowCenter, RowSource};

/// Structure derived for one panel.
#[derive(Debug, Clone, Serialize)]
pub struct PanelStructure {
    /// Panel index, left to right.
    pub panel_id: usize,
    /// Panel bounding box.
    pub bbox: Rect,
    /// Accepted column boundaries, sorted by x.
    pub col_boundaries: Vec<ColumnBoundary>,
    /// Every column boundary considered, rejected ones included.
    pub col_boundary_candidates: Vec<ColumnBoundary>,
    /// The assembled grid, when the row/column minimums are met.
    pub grid: Option<Grid>,
    /// Tokens whose centroid falls inside this panel.
    pub token_count: usize,
    /// Confidence in [0, 1].
    pub confidence: f32,
}

/// Output of the structure analysis stage.
#[derive(Debug, Clone, Serialize)]
pub struct Structure {
    /// Estimated bounding box of the tabular content area.
    pub data_rect: Option<Rect>,
    /// Row centers, shared by all panels.
    pub row_centers: Vec<RowCenter>,
    /// Row boundaries, shared by all panels. Strictly increasing.
    pub row_boundaries: Vec<f32>,
    /// Per-panel structure, ordered left to right.
    pub panels: Vec<PanelStructure>,
    /// True when a grid was built, or (degraded) when row centers alone
    /// meet the row minimum.
    pub has_table: bool,
    /// Warnings accumulated during analysis.
    pub warnings: Vec<String>,
}

impl Structure {
    /// An empty, well-formed structure for pages without any evidence.
    pub fn empty() -> Self {
        Self {
            data_rect: None,
            row_centers: Vec::new(),
            row_boundaries: Vec::new(),
            panels: Vec::new(),
            has_table: false,
            warnings: Vec::new(),
        }
    }
}

/// Analyze the page structure from observation output and tokens.
///
/// `external_bbox` overrides the observer's table bounding box estimate
/// when an upstream collaborator already knows where the table is.
pub fn analyze(
    observation: &Observation,
    tokens: &[Token],
    page_width: f32,
    page_height: f32,
    external_bbox: Option<Rect>,
    cfg: &ReconstructConfig,
    sink: &mut dyn TraceSink,
) -> Structure {
    sink.event(&TraceEvent::StageStarted {
        stage: Stage::Analyzer,
    });

    let mut structure = Structure::empty();

    structure.data_rect = external_bbox
        .or(observation.table_bbox)
        .or_else(|| token_union(tokens))
        .map(|r| clamp_to_page(r, page_width, page_height));

    let Some(data_rect) = structure.data_rect else {
        log::debug!("analyzer: no data rect, page has no content");
        sink.event(&TraceEvent::StageFinished {
            stage: Stage::Analyzer,
            warnings: 0,
        });
        return structure;
    };

    // Panel hypothesis selection: primary, then loose, then token gaps,
    // then the whole data rect as a single implicit panel.
    let panel_boxes = select_panels(observation, tokens, &data_rect, cfg, &mut structure.warnings);
    sink.event(&TraceEvent::CandidateCount {
        stage: Stage::Analyzer,
        kind: "panels",
        count: panel_boxes.len(),
    });

    // Row structure is computed once and shared by every panel.
    structure.row_centers = rows::detect_row_centers(tokens, Some(&data_rect), &observation.horizontal, cfg);
    let solid_lines: Vec<f32> = observation
        .horizontal
        .iter()
        .filter(|l| l.style == LineStyle::Solid)
        .map(|l| l.position)
        .collect();
    structure.row_boundaries = rows::row_boundaries(&structure.row_centers, &solid_lines, cfg);

    // Column structure and grids, independently per panel.
    let panel_count = panel_boxes.len();
    let (mut panels, mut any_grid) =
        build_panel_structures(panel_boxes, observation, tokens, &structure.row_boundaries, cfg);

    // A multi-panel hypothesis that yields no grid anywhere usually means
    // the panel separators were really column rules. Retry as one panel.
    if !any_grid && panel_count > 1 {
        let msg = format!("{} panels produced no grid, retrying as a single panel", panel_count);
        log::debug!("analyzer: {}", msg);
        structure.warnings.push(msg);
        sink.event(&TraceEvent::DetectorDiscarded {
            stage: Stage::Analyzer,
            detail: "multi-panel hypothesis without grid".to_string(),
        });
        let (retried, retried_grid) = build_panel_structures(
            vec![(data_rect, 0.5)],
            observation,
            tokens,
            &structure.row_boundaries,
            cfg,
        );
        panels = retried;
        any_grid = retried_grid;
    }
    structure.panels = panels;

    structure.has_table = any_grid;
    if !any_grid && structure.row_centers.len() >= cfg.min_rows {
        structure.has_table = true;
        let msg = format!(
            "degraded table: {} row centers but no valid grid",
            structure.row_centers.len()
        );
        log::warn!("analyzer: {}", msg);
        structure.warnings.push(msg);
    }

    log::debug!(
        "analyzer: {} rows, {} panels, has_table={}",
        structure.row_boundaries.len().saturating_sub(1),
        structure.panels.len(),
        structure.has_table
    );
    sink.event(&TraceEvent::StageFinished {
        stage: Stage::Analyzer,
        warnings: structure.warnings.len(),
    });
    structure
}

/// Build per-panel column structure and grids.
fn build_panel_structures(
    panel_boxes: Vec<(Rect, f32)>,
    observation: &Observation,
    tokens: &[Token],
    row_boundaries: &[f32],
    cfg: &ReconstructConfig,
) -> (Vec<PanelStructure>, bool) {
    let mut panels = Vec::with_capacity(panel_boxes.len());
    let mut any_grid = false;

    for (panel_id, (bbox, base_confidence)) in panel_boxes.into_iter().enumerate() {
        let (accepted, candidates) = columns::detect_columns(
            &bbox,
            &observation.vertical,
            &observation.separators_all,
            tokens,
            cfg,
        );
        let col_xs: Vec<f32> = accepted.iter().map(|b| b.x).collect();
        let panel_grid = grid::assemble(row_boundaries, &col_xs, cfg);

        let token_count = tokens
            .iter()
            .filter(|t| t.bbox.map(|b| bbox.contains_point(&b.center())).unwrap_or(false))
            .count();

        let confidence = if let Some(g) = &panel_grid {
            any_grid = true;
            log::debug!(
                "analyzer: panel {} grid {}x{} over {:?}",
                panel_id,
                g.n_rows,
                g.n_cols,
                g.bbox()
            );
            (base_confidence + 0.2).clamp(0.0, 1.0)
        } else {
            (base_confidence - 0.2).clamp(0.0, 1.0)
        };

        panels.push(PanelStructure {
            panel_id,
            bbox,
            col_boundaries: accepted,
            col_boundary_candidates: candidates,
            grid: panel_grid,
            token_count,
            confidence,
        });
    }

    (panels, any_grid)
}

/// Choose panel bounding boxes: `(bbox, base_confidence)` per panel.
fn select_panels(
    observation: &Observation,
    tokens: &[Token],
    data_rect: &Rect,
    cfg: &ReconstructConfig,
    warnings: &mut Vec<String>,
) -> Vec<(Rect, f32)> {
    let plausible = |panels: &[PanelCandidate]| -> bool {
        if panels.is_empty() {
            return false;
        }
        let has_tokens = tokens.iter().any(|t| t.bbox.is_some());
        !has_tokens
            || panels.iter().all(|p| {
                tokens
                    .iter()
                    .any(|t| t.bbox.map(|b| p.bbox.contains_point(&b.center())).unwrap_or(false))
            })
    };

    if plausible(&observation.panel_candidates) {
        return observation
            .panel_candidates
            .iter()
            .map(|p| (p.bbox, p.confidence))
            .collect();
    }
    if !observation.panel_candidates.is_empty() {
        warnings.push("primary panel hypothesis implausible, trying loose".to_string());
    }
    if plausible(&observation.panel_candidates_loose) {
        return observation
            .panel_candidates_loose
            .iter()
            .map(|p| (p.bbox, p.confidence * 0.8))
            .collect();
    }

    // Signal 3: infer panels from token gaps.
    let inferred = infer_panels_from_tokens(data_rect, tokens, cfg);
    if !inferred.is_empty() {
        return inferred.iter().map(|p| (p.bbox, p.confidence)).collect();
    }

    // Single implicit panel covering the whole table region.
    vec![(*data_rect, 0.5)]
}

/// Infer panel candidates from a histogram of token x-extents: sustained
/// low-density bins wide enough are panel-dividing gutters.
fn infer_panels_from_tokens(
    data_rect: &Rect,
    tokens: &[Token],
    cfg: &ReconstructConfig,
) -> Vec<PanelCandidate> {
    if data_rect.width <= 0.0 {
        return Vec::new();
    }
    let bin_width = (data_rect.width / 128.0).max(2.0);
    let bins = (data_rect.width / bin_width).ceil() as usize;
    if bins < 8 {
        return Vec::new();
    }

    let mut histogram = vec![0u32; bins];
    let mut counted = 0u32;
    for token in tokens {
        let Some(bbox) = token.bbox else { continue };
        if !data_rect.contains_point(&bbox.center()) {
            continue;
        }
        let b0 = (((bbox.left() - data_rect.left()) / bin_width).floor().max(0.0) as usize)
            .min(bins - 1);
        let b1 = (((bbox.right() - data_rect.left()) / bin_width).floor().max(0.0) as usize)
            .min(bins - 1);
        for bin in &mut histogram[b0..=b1] {
            *bin += 1;
        }
        counted += 1;
    }
    if counted < 4 {
        return Vec::new();
    }

    // Interior runs of empty bins. Edge-touching runs are padding.
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut run_start: Option<usize> = None;
    for i in 0..=bins {
        let empty = i < bins && histogram[i] == 0;
        match (empty, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                run_start = None;
                if start > 0 && i < bins {
                    runs.push((start, i));
                }
            },
            _ => {},
        }
    }

    // A panel gutter must be both absolutely wide and clearly wider than
    // ordinary column gaps, or every column gap would split the table.
    let min_gutter = data_rect.width * cfg.gutter_min_width_ratio;
    let widest = runs
        .iter()
        .map(|(s, e)| (e - s) as f32 * bin_width)
        .fold(0.0f32, f32::max);
    let dividers: Vec<f32> = runs
        .iter()
        .filter(|(s, e)| {
            let width = (e - s) as f32 * bin_width;
            width >= min_gutter && width >= widest * 0.5
        })
        .map(|(s, e)| data_rect.left() + (s + e) as f32 / 2.0 * bin_width)
        .collect();
    if dividers.is_empty() {
        return Vec::new();
    }

    let mut edges = vec![data_rect.left()];
    edges.extend(dividers);
    edges.push(data_rect.right());

    edges
        .windows(2)
        .filter(|w| w[1] - w[0] > 1.0)
        .map(|w| PanelCandidate {
            bbox: Rect::from_points(w[0], data_rect.top(), w[1], data_rect.bottom()),
            confidence: 0.6,
            source: PanelSource::TokenGaps,
            left_x: w[0],
            right_x: w[1],
        })
        .collect()
}

fn token_union(tokens: &[Token]) -> Option<Rect> {
    let mut union: Option<Rect> = None;
    for token in tokens {
        if let Some(bbox) = token.bbox {
            union = Some(match union {
                Some(u) => u.union(&bbox),
                None => bbox,
            });
        }
    }
    union
}

fn clamp_to_page(rect: Rect, page_width: f32, page_height: f32) -> Rect {
    Rect::from_points(
        rect.left().max(0.0),
        rect.top().max(0.0),
        rect.right().min(page_width),
        rect.bottom().min(page_height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::NullTraceSink;

    fn cfg() -> ReconstructConfig {
        ReconstructConfig::default()
    }

    /// A page of tokens laid out as two side-by-side sub-tables.
    fn two_panel_tokens() -> Vec<Token> {
        let mut tokens = Vec::new();
        for row in 0..6 {
            let y = 50.0 + row as f32 * 30.0;
            for col in 0..2 {
                tokens.push(Token::new("l", Rect::new(20.0 + col as f32 * 90.0, y, 60.0, 12.0)));
                tokens.push(Token::new(
                    "r",
                    Rect::new(320.0 + col as f32 * 90.0, y, 60.0, 12.0),
                ));
            }
        }
        tokens
    }

    #[test]
    fn test_empty_input_yields_empty_structure() {
        let structure = analyze(
            &Observation::empty(),
            &[],
            600.0,
            800.0,
            None,
            &cfg(),
            &mut NullTraceSink,
        );
        assert!(!structure.has_table);
        assert!(structure.panels.is_empty());
        assert!(structure.row_boundaries.is_empty());
    }

    #[test]
    fn test_panels_inferred_from_token_gaps() {
        let tokens = two_panel_tokens();
        let structure = analyze(
            &Observation::empty(),
            &tokens,
            600.0,
            800.0,
            None,
            &cfg(),
            &mut NullTraceSink,
        );

        // Two token clusters with a wide gutter: exactly two panels, with
        // the boundary inside the gutter.
        assert_eq!(structure.panels.len(), 2);
        let divider = structure.panels[0].bbox.right();
        assert!(divider > 170.0 && divider < 320.0);
    }

    #[test]
    fn test_rows_shared_across_panels() {
        let tokens = two_panel_tokens();
        let structure = analyze(
            &Observation::empty(),
            &tokens,
            600.0,
            800.0,
            None,
            &cfg(),
            &mut NullTraceSink,
        );

        assert_eq!(structure.row_centers.len(), 6);
        // Both panels see the same row boundaries through the grid.
        for panel in &structure.panels {
            if let Some(grid) = &panel.grid {
                assert_eq!(grid.row_boundaries, structure.row_boundaries);
            }
        }
    }

    #[test]
    fn test_monotonic_boundaries() {
        let tokens = two_panel_tokens();
        let structure = analyze(
            &Observation::empty(),
            &tokens,
            600.0,
            800.0,
            None,
            &cfg(),
            &mut NullTraceSink,
        );

        for w in structure.row_boundaries.windows(2) {
            assert!(w[1] > w[0]);
        }
        for panel in &structure.panels {
            for w in panel.col_boundaries.windows(2) {
                assert!(w[1].x > w[0].x);
            }
        }
    }

    #[test]
    fn test_external_bbox_overrides() {
        let tokens = two_panel_tokens();
        let external = Rect::new(0.0, 0.0, 250.0, 300.0);
        let structure = analyze(
            &Observation::empty(),
            &tokens,
            600.0,
            800.0,
            Some(external),
            &cfg(),
            &mut NullTraceSink,
        );
        assert_eq!(structure.data_rect, Some(external));
    }
}
