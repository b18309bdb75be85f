//! Stage 3: token-to-cell assignment.
//!
//! Every input token gets exactly one tag: either a set of cell targets
//! with the reason the targets were chosen, or an untagged marker saying
//! why no cell fit. The output stream is in 1:1 correspondence with the
//! input and its order never changes.

use std::collections::BTreeMap;

use crate::analyzer::{Grid, PanelStructure, Structure};
use crate::config::ReconstructConfig;
use crate::geometry::{safe_float_cmp, Rect};
use crate::token::{AssignReason, CellTarget, TaggedToken, Token, TokenTag, UntaggedReason};
use crate::trace::{Stage, TraceEvent, TraceSink};
use serde::Serialize;

/// The aggregated content of one grid cell.
#[derive(Debug, Clone, Serialize)]
pub struct CellContent {
    /// Panel the cell belongs to.
    pub panel_id: usize,
    /// Row index within the grid.
    pub row: usize,
    /// Column index within the grid.
    pub col: usize,
    /// Union of the member tokens' bounding boxes.
    pub bbox: Option<Rect>,
    /// Token texts joined in reading order.
    pub text: String,
    /// Ids of the contributing tokens, in reading order.
    pub token_ids: Vec<usize>,
}

/// Counters describing one assignment pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AssignStats {
    /// Tokens seen.
    pub total: usize,
    /// Tokens linked to at least one cell.
    pub tagged: usize,
    /// Tokens left untagged.
    pub untagged: usize,
    /// Tokens linked to more than one cell.
    pub spans: usize,
    /// Spanning tokens exceeding the configured span size.
    pub large_spans: usize,
}

/// Output of the cell assignment stage.
#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    /// One tagged token per input token, in input order.
    pub tagged: Vec<TaggedToken>,
    /// First-row cell texts, panels left to right, columns left to right.
    pub x_headers: Vec<String>,
    /// First-column cell texts, panels left to right, rows top to bottom.
    pub y_headers: Vec<String>,
    /// Non-empty cells, ordered by (panel, row, col).
    pub cells: Vec<CellContent>,
    /// Assignment counters.
    pub stats: AssignStats,
}

/// Assign tokens to grid cells.
pub fn assign(
    structure: &Structure,
    tokens: &[Token],
    cfg: &ReconstructConfig,
    sink: &mut dyn TraceSink,
) -> Assignment {
    sink.event(&TraceEvent::StageStarted {
        stage: Stage::Assigner,
    });

    let gridded: Vec<&PanelStructure> = structure
        .panels
        .iter()
        .filter(|p| p.grid.is_some())
        .collect();

    let mut stats = AssignStats {
        total: tokens.len(),
        ..AssignStats::default()
    };
    let mut tagged = Vec::with_capacity(tokens.len());

    for (id, token) in tokens.iter().enumerate() {
        let tag = tag_token(token, &gridded, cfg);
        match &tag {
            TokenTag::Cell {
                targets,
                is_large_span,
                ..
            } => {
                stats.tagged += 1;
                if targets.len() > 1 {
                    stats.spans += 1;
                }
                if *is_large_span {
                    stats.large_spans += 1;
                }
            },
            TokenTag::Untagged { .. } => stats.untagged += 1,
        }
        tagged.push(TaggedToken {
            id,
            text: token.text.clone(),
            bbox: token.bbox,
            tag,
        });
    }

    let cells = aggregate_cells(&tagged, tokens);
    let (x_headers, y_headers) = headers(&cells, &gridded);

    log::debug!(
        "assigner: {}/{} tokens tagged, {} spans ({} large)",
        stats.tagged,
        stats.total,
        stats.spans,
        stats.large_spans
    );
    sink.event(&TraceEvent::CandidateCount {
        stage: Stage::Assigner,
        kind: "cells",
        count: cells.len(),
    });
    sink.event(&TraceEvent::StageFinished {
        stage: Stage::Assigner,
        warnings: 0,
    });

    Assignment {
        tagged,
        x_headers,
        y_headers,
        cells,
        stats,
    }
}

/// Decide the tag for a single token.
fn tag_token(token: &Token, panels: &[&PanelStructure], cfg: &ReconstructConfig) -> TokenTag {
    let Some(bbox) = token.bbox else {
        return TokenTag::Untagged {
            reason: UntaggedReason::NoBbox,
        };
    };
    if panels.is_empty() {
        return TokenTag::Untagged {
            reason: UntaggedReason::NoGrid,
        };
    }

    let Some(panel) = pick_panel(&bbox, panels) else {
        return TokenTag::Untagged {
            reason: UntaggedReason::Outside,
        };
    };
    let Some(grid) = panel.grid.as_ref() else {
        return TokenTag::Untagged {
            reason: UntaggedReason::NoGrid,
        };
    };

    // Small tokens are placed by centroid alone.
    if bbox.area() < cfg.small_token_area {
        return match centroid_target(&bbox, panel.panel_id, grid) {
            Some(target) => TokenTag::Cell {
                targets: vec![target],
                reason: AssignReason::Centroid,
                is_large_span: false,
            },
            None => TokenTag::Untagged {
                reason: UntaggedReason::Outside,
            },
        };
    }

    let overlaps = cell_overlaps(&bbox, grid);
    let passing: Vec<&CellOverlap> = overlaps
        .iter()
        .filter(|o| o.ratio >= cfg.overlap_ratio_min)
        .collect();

    match passing.len() {
        0 => {
            if let Some(target) = centroid_target(&bbox, panel.panel_id, grid) {
                return TokenTag::Cell {
                    targets: vec![target],
                    reason: AssignReason::Centroid,
                    is_large_span: false,
                };
            }
            // Any positive overlap at all still beats dropping the token.
            let best = overlaps
                .iter()
                .max_by(|a, b| safe_float_cmp(a.ratio, b.ratio));
            match best {
                Some(o) if o.ratio > 0.0 => TokenTag::Cell {
                    targets: vec![CellTarget {
                        panel_id: panel.panel_id,
                        row: o.row,
                        col: o.col,
                    }],
                    reason: AssignReason::BestOverlap,
                    is_large_span: false,
                },
                _ => TokenTag::Untagged {
                    reason: UntaggedReason::Outside,
                },
            }
        },
        1 => TokenTag::Cell {
            targets: vec![CellTarget {
                panel_id: panel.panel_id,
                row: passing[0].row,
                col: passing[0].col,
            }],
            reason: AssignReason::SingleOverlap,
            is_large_span: false,
        },
        _ => multi_cell_tag(&passing, panel.panel_id, cfg),
    }
}

/// Resolve a token overlapping several cells into a span or a dominant
/// row/column.
fn multi_cell_tag(
    passing: &[&CellOverlap],
    panel_id: usize,
    cfg: &ReconstructConfig,
) -> TokenTag {
    let rows: Vec<usize> = {
        let mut v: Vec<usize> = passing.iter().map(|o| o.row).collect();
        v.sort_unstable();
        v.dedup();
        v
    };
    let cols: Vec<usize> = {
        let mut v: Vec<usize> = passing.iter().map(|o| o.col).collect();
        v.sort_unstable();
        v.dedup();
        v
    };

    let targets_of = |cells: &[&CellOverlap]| -> Vec<CellTarget> {
        let mut targets: Vec<CellTarget> = cells
            .iter()
            .map(|o| CellTarget {
                panel_id,
                row: o.row,
                col: o.col,
            })
            .collect();
        targets.sort_by_key(|t| (t.row, t.col));
        targets
    };

    // A clean horizontal or vertical run of cells is a span.
    if rows.len() == 1 && consecutive(&cols) {
        let targets = targets_of(passing);
        let large = targets.len() > cfg.large_span_count;
        return TokenTag::Cell {
            targets,
            reason: AssignReason::Span,
            is_large_span: large,
        };
    }
    if cols.len() == 1 && consecutive(&rows) {
        let targets = targets_of(passing);
        let large = targets.len() > cfg.large_span_count;
        return TokenTag::Cell {
            targets,
            reason: AssignReason::Span,
            is_large_span: large,
        };
    }

    // Otherwise narrow to whichever row or column holds the most overlap.
    let mut row_sums: BTreeMap<usize, f32> = BTreeMap::new();
    let mut col_sums: BTreeMap<usize, f32> = BTreeMap::new();
    for o in passing {
        *row_sums.entry(o.row).or_insert(0.0) += o.ratio;
        *col_sums.entry(o.col).or_insert(0.0) += o.ratio;
    }
    let (best_row, row_sum) = row_sums
        .iter()
        .max_by(|a, b| safe_float_cmp(*a.1, *b.1))
        .map(|(k, v)| (*k, *v))
        .unwrap_or((0, 0.0));
    let (best_col, col_sum) = col_sums
        .iter()
        .max_by(|a, b| safe_float_cmp(*a.1, *b.1))
        .map(|(k, v)| (*k, *v))
        .unwrap_or((0, 0.0));

    let (filtered, reason): (Vec<&CellOverlap>, AssignReason) = if row_sum >= col_sum {
        (
            passing.iter().copied().filter(|o| o.row == best_row).collect(),
            AssignReason::DominantRow,
        )
    } else {
        (
            passing.iter().copied().filter(|o| o.col == best_col).collect(),
            AssignReason::DominantCol,
        )
    };

    // The dominant run must itself be contiguous; a scattered remainder
    // falls back to the single best-overlapping cell.
    let indices: Vec<usize> = {
        let mut v: Vec<usize> = filtered
            .iter()
            .map(|o| if reason == AssignReason::DominantRow { o.col } else { o.row })
            .collect();
        v.sort_unstable();
        v
    };
    if !consecutive(&indices) {
        let best = filtered
            .iter()
            .max_by(|a, b| safe_float_cmp(a.ratio, b.ratio))
            .unwrap();
        return TokenTag::Cell {
            targets: vec![CellTarget {
                panel_id,
                row: best.row,
                col: best.col,
            }],
            reason: AssignReason::BestOverlap,
            is_large_span: false,
        };
    }

    let targets = targets_of(&filtered);
    let large = targets.len() > cfg.large_span_count;
    TokenTag::Cell {
        targets,
        reason,
        is_large_span: large,
    }
}

/// Pick the panel for a token: centroid containment first, then the
/// largest bbox intersection. Only panels with a grid are considered.
fn pick_panel<'a>(bbox: &Rect, panels: &[&'a PanelStructure]) -> Option<&'a PanelStructure> {
    let centroid = bbox.center();
    for panel in panels {
        if panel.bbox.contains_point(&centroid) {
            return Some(panel);
        }
    }
    panels
        .iter()
        .map(|p| (*p, p.bbox.intersection_area(bbox)))
        .filter(|(_, a)| *a > 0.0)
        .max_by(|a, b| safe_float_cmp(a.1, b.1))
        .map(|(p, _)| p)
}

fn centroid_target(bbox: &Rect, panel_id: usize, grid: &Grid) -> Option<CellTarget> {
    let c = bbox.center();
    let row = grid.row_at(c.y)?;
    let col = grid.col_at(c.x)?;
    Some(CellTarget { panel_id, row, col })
}

struct CellOverlap {
    row: usize,
    col: usize,
    ratio: f32,
}

/// Overlap ratio of the token with each cell its bbox touches. Only the
/// row/column ranges the bbox corners fall in are visited.
fn cell_overlaps(bbox: &Rect, grid: &Grid) -> Vec<CellOverlap> {
    let area = bbox.area();
    if area <= 0.0 {
        return Vec::new();
    }

    let clamp_row = |y: f32| -> usize {
        grid.row_at(y.clamp(
            grid.row_boundaries[0],
            *grid.row_boundaries.last().unwrap(),
        ))
        .unwrap_or(0)
    };
    let clamp_col = |x: f32| -> usize {
        grid.col_at(x.clamp(
            grid.col_boundaries[0],
            *grid.col_boundaries.last().unwrap(),
        ))
        .unwrap_or(0)
    };

    let r0 = clamp_row(bbox.top());
    let r1 = clamp_row(bbox.bottom());
    let c0 = clamp_col(bbox.left());
    let c1 = clamp_col(bbox.right());

    let mut overlaps = Vec::new();
    for row in r0..=r1 {
        for col in c0..=c1 {
            let Some(cell) = grid.cell(row, col) else { continue };
            let ratio = cell.bbox.intersection_area(bbox) / area;
            if ratio > 0.0 {
                overlaps.push(CellOverlap { row, col, ratio });
            }
        }
    }
    overlaps
}

fn consecutive(sorted: &[usize]) -> bool {
    sorted.windows(2).all(|w| w[1] == w[0] + 1)
}

/// Group tagged tokens by cell, join their texts in reading order, and
/// union their bounding boxes.
fn aggregate_cells(tagged: &[TaggedToken], tokens: &[Token]) -> Vec<CellContent> {
    let mut by_cell: BTreeMap<(usize, usize, usize), Vec<usize>> = BTreeMap::new();
    for t in tagged {
        if let TokenTag::Cell { targets, .. } = &t.tag {
            for target in targets {
                by_cell
                    .entry((target.panel_id, target.row, target.col))
                    .or_default()
                    .push(t.id);
            }
        }
    }

    by_cell
        .into_iter()
        .map(|((panel_id, row, col), mut ids)| {
            // Reading order inside the cell: top to bottom, left to right.
            ids.sort_by(|a, b| {
                let ca = tokens[*a].bbox.map(|r| r.center());
                let cb = tokens[*b].bbox.map(|r| r.center());
                match (ca, cb) {
                    (Some(ca), Some(cb)) => {
                        safe_float_cmp(ca.y, cb.y).then(safe_float_cmp(ca.x, cb.x))
                    },
                    _ => a.cmp(b),
                }
            });
            let text = ids
                .iter()
                .map(|&id| tokens[id].text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            let mut bbox: Option<Rect> = None;
            for &id in &ids {
                if let Some(b) = tokens[id].bbox {
                    bbox = Some(match bbox {
                        Some(u) => u.union(&b),
                        None => b,
                    });
                }
            }
            CellContent {
                panel_id,
                row,
                col,
                bbox,
                text,
                token_ids: ids,
            }
        })
        .collect()
}

/// Header labels: the first row read across, and the first column read
/// down, per panel in left-to-right order. Empty cells contribute empty
/// strings so positions stay aligned with the grid.
fn headers(cells: &[CellContent], panels: &[&PanelStructure]) -> (Vec<String>, Vec<String>) {
    let text_at = |panel_id: usize, row: usize, col: usize| -> String {
        cells
            .iter()
            .find(|c| c.panel_id == panel_id && c.row == row && c.col == col)
            .map(|c| c.text.clone())
            .unwrap_or_default()
    };

    let mut x_headers = Vec::new();
    let mut y_headers = Vec::new();
    for panel in panels {
        let Some(grid) = panel.grid.as_ref() else { continue };
        for col in 0..grid.n_cols {
            x_headers.push(text_at(panel.panel_id, 0, col));
        }
        for row in 0..grid.n_rows {
            y_headers.push(text_at(panel.panel_id, row, 0));
        }
    }
    (x_headers, y_headers)
}
