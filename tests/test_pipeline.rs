#![allow(dead_code)]
//! Integration tests for the full reconstruction pipeline.
//!
//! These tests drive all three stages end to end with mock vector
//! evidence and token layouts simulating realistic scanned tables.

use gridscan::geometry::Rect;
use gridscan::observer::{PageEvidence, Segment, VectorPage};
use gridscan::token::{Token, TokenTag, UntaggedReason};
use gridscan::{reconstruct_page, ReconstructConfig};

// ============================================================================
// Helper Functions for Creating Mock Data
// ============================================================================

/// A fully ruled table: horizontal lines at the given y positions and
/// vertical lines at the given x positions, spanning each other exactly.
fn ruled_page(h_ys: &[f32], v_xs: &[f32]) -> VectorPage {
    let x0 = v_xs[0];
    let x1 = *v_xs.last().unwrap();
    let y0 = h_ys[0];
    let y1 = *h_ys.last().unwrap();

    let mut page = VectorPage::new(612.0, 792.0);
    for &y in h_ys {
        page.segments.push(Segment::new(x0, y, x1, y));
    }
    for &x in v_xs {
        page.segments.push(Segment::new(x, y0, x, y1));
    }
    page
}

fn vector_evidence(page: VectorPage) -> PageEvidence {
    PageEvidence {
        vector: Some(page),
        ..PageEvidence::default()
    }
}

/// A token centered at (cx, cy).
fn token_at(text: &str, cx: f32, cy: f32, w: f32, h: f32) -> Token {
    Token::new(text, Rect::new(cx - w / 2.0, cy - h / 2.0, w, h))
}

/// Tokens laid out as two side-by-side sub-tables of 6 rows × 2 columns,
/// separated by a wide whitespace gutter.
fn two_panel_tokens() -> Vec<Token> {
    let mut tokens = Vec::new();
    for row in 0..6 {
        let y = 50.0 + row as f32 * 30.0;
        for col in 0..2 {
            tokens.push(Token::new(
                "l",
                Rect::new(20.0 + col as f32 * 90.0, y, 60.0, 12.0),
            ));
            tokens.push(Token::new(
                "r",
                Rect::new(320.0 + col as f32 * 90.0, y, 60.0, 12.0),
            ));
        }
    }
    tokens
}

fn cfg() -> ReconstructConfig {
    ReconstructConfig::default()
}

// ============================================================================
// Grid Recovery
// ============================================================================

#[test]
fn test_ruled_grid_recovered_exactly() {
    // 5 horizontal and 4 vertical rules: a 4-row, 3-column table.
    let h_ys = [100.0, 150.0, 200.0, 250.0, 300.0];
    let v_xs = [50.0, 200.0, 350.0, 500.0];
    let evidence = vector_evidence(ruled_page(&h_ys, &v_xs));

    let result = reconstruct_page(&[], &evidence, 612.0, 792.0, &cfg()).unwrap();

    assert!(result.has_table);
    let gridded: Vec<_> = result
        .structure
        .panels
        .iter()
        .filter_map(|p| p.grid.as_ref())
        .collect();
    assert_eq!(gridded.len(), 1);

    let grid = gridded[0];
    assert_eq!(grid.n_rows, 4);
    assert_eq!(grid.n_cols, 3);
    for (b, expected) in grid.row_boundaries.iter().zip(h_ys) {
        assert!((b - expected).abs() < 2.0, "row boundary {} vs {}", b, expected);
    }
    for (b, expected) in grid.col_boundaries.iter().zip(v_xs) {
        assert!((b - expected).abs() < 2.0, "col boundary {} vs {}", b, expected);
    }
}

#[test]
fn test_below_minimum_grid_is_not_a_table() {
    // 3 horizontal rules give only 2 rows, under the minimum of 3.
    let evidence = vector_evidence(ruled_page(
        &[100.0, 150.0, 200.0],
        &[50.0, 200.0, 350.0, 500.0],
    ));

    let result = reconstruct_page(&[], &evidence, 612.0, 792.0, &cfg()).unwrap();
    assert!(result
        .structure
        .panels
        .iter()
        .all(|p| p.grid.is_none()));
}

// ============================================================================
// Token Conservation
// ============================================================================

#[test]
fn test_no_token_loss() {
    let evidence = vector_evidence(ruled_page(
        &[100.0, 150.0, 200.0, 250.0, 300.0],
        &[50.0, 200.0, 350.0, 500.0],
    ));
    let tokens = vec![
        token_at("a", 125.0, 125.0, 40.0, 14.0),
        token_at("b", 275.0, 175.0, 40.0, 14.0),
        Token::without_bbox("orphan"),
        token_at("far", 580.0, 700.0, 40.0, 14.0),
    ];

    let result = reconstruct_page(&tokens, &evidence, 612.0, 792.0, &cfg()).unwrap();

    assert_eq!(result.assignment.tagged.len(), tokens.len());
    assert_eq!(result.assignment.stats.total, tokens.len());
    assert_eq!(
        result.assignment.stats.tagged + result.assignment.stats.untagged,
        tokens.len()
    );
    for (i, t) in result.assignment.tagged.iter().enumerate() {
        assert_eq!(t.id, i);
        assert_eq!(t.text, tokens[i].text);
    }
    match &result.assignment.tagged[2].tag {
        TokenTag::Untagged { reason } => assert_eq!(*reason, UntaggedReason::NoBbox),
        _ => panic!("bboxless token must stay untagged"),
    }
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn test_identical_input_identical_output() {
    let tokens = two_panel_tokens();
    let run = || {
        let result =
            reconstruct_page(&tokens, &PageEvidence::default(), 612.0, 792.0, &cfg()).unwrap();
        serde_json::to_string(&result).unwrap()
    };

    assert_eq!(run(), run());
}

#[test]
fn test_ruled_input_deterministic() {
    let evidence = vector_evidence(ruled_page(
        &[100.0, 150.0, 200.0, 250.0, 300.0],
        &[50.0, 200.0, 350.0, 500.0],
    ));
    let tokens = vec![
        token_at("a", 125.0, 125.0, 40.0, 14.0),
        token_at("b", 275.0, 175.0, 40.0, 14.0),
    ];

    let a = reconstruct_page(&tokens, &evidence, 612.0, 792.0, &cfg()).unwrap();
    let b = reconstruct_page(&tokens, &evidence, 612.0, 792.0, &cfg()).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

// ============================================================================
// Spanning Tokens
// ============================================================================

#[test]
fn test_spanning_token_links_every_covered_cell() {
    let evidence = vector_evidence(ruled_page(
        &[100.0, 150.0, 200.0, 250.0, 300.0],
        &[50.0, 200.0, 350.0, 500.0],
    ));
    // A title stretching across all three columns of the second row.
    let tokens = vec![token_at("quarterly totals", 275.0, 165.0, 430.0, 20.0)];

    let result = reconstruct_page(&tokens, &evidence, 612.0, 792.0, &cfg()).unwrap();

    match &result.assignment.tagged[0].tag {
        TokenTag::Cell { targets, .. } => {
            assert_eq!(targets.len(), 3);
            assert!(targets.iter().all(|t| t.row == 1));
            let cols: Vec<usize> = targets.iter().map(|t| t.col).collect();
            assert_eq!(cols, vec![0, 1, 2]);
        },
        _ => panic!("spanning token must be tagged"),
    }
    assert_eq!(result.assignment.stats.spans, 1);
}

// ============================================================================
// Panel Separation
// ============================================================================

#[test]
fn test_two_panels_from_token_gutter() {
    let tokens = two_panel_tokens();
    let result =
        reconstruct_page(&tokens, &PageEvidence::default(), 612.0, 792.0, &cfg()).unwrap();

    assert!(result.has_table);
    assert_eq!(result.structure.panels.len(), 2);

    // The divider falls inside the whitespace gutter.
    let divider = result.structure.panels[0].bbox.right();
    assert!(divider > 170.0 && divider < 320.0, "divider at {}", divider);

    // Both panels carry their own grid over the shared rows.
    for panel in &result.structure.panels {
        let grid = panel.grid.as_ref().expect("panel grid");
        assert_eq!(grid.n_rows, 6);
        assert_eq!(grid.n_cols, 2);
        assert_eq!(grid.row_boundaries, result.structure.row_boundaries);
    }

    // Tokens never cross the gutter: each lands in its own panel.
    for t in &result.assignment.tagged {
        if let TokenTag::Cell { targets, .. } = &t.tag {
            let expected_panel = if tokens[t.id].bbox.unwrap().center().x < divider {
                0
            } else {
                1
            };
            assert!(targets.iter().all(|c| c.panel_id == expected_panel));
        }
    }
}

// ============================================================================
// Candidate Retention and Ordering
// ============================================================================

#[test]
fn test_ranked_separators_are_a_permutation() {
    let evidence = vector_evidence(ruled_page(
        &[100.0, 150.0, 200.0, 250.0, 300.0],
        &[50.0, 200.0, 350.0, 500.0],
    ));
    let result = reconstruct_page(&[], &evidence, 612.0, 792.0, &cfg()).unwrap();

    let obs = &result.observation;
    assert_eq!(obs.separators_all.len(), obs.separators_ranked.len());
    for sep in &obs.separators_ranked {
        assert!(obs
            .separators_all
            .iter()
            .any(|s| (s.x - sep.x).abs() < 0.01 && (s.strength - sep.strength).abs() < 0.01));
    }
    for w in obs.separators_ranked.windows(2) {
        assert!(w[0].strength >= w[1].strength);
    }
}

#[test]
fn test_boundaries_strictly_monotonic() {
    let tokens = two_panel_tokens();
    let result =
        reconstruct_page(&tokens, &PageEvidence::default(), 612.0, 792.0, &cfg()).unwrap();

    for w in result.structure.row_boundaries.windows(2) {
        assert!(w[1] > w[0]);
    }
    for panel in &result.structure.panels {
        if let Some(grid) = &panel.grid {
            for w in grid.col_boundaries.windows(2) {
                assert!(w[1] > w[0]);
            }
        }
    }
}

// ============================================================================
// Headers
// ============================================================================

#[test]
fn test_header_extraction() {
    let evidence = vector_evidence(ruled_page(
        &[100.0, 150.0, 200.0, 250.0, 300.0],
        &[50.0, 200.0, 350.0, 500.0],
    ));
    let mut tokens = vec![
        token_at("name", 125.0, 125.0, 60.0, 14.0),
        token_at("q1", 275.0, 125.0, 40.0, 14.0),
        token_at("q2", 425.0, 125.0, 40.0, 14.0),
    ];
    for (i, label) in ["alpha", "beta", "gamma"].iter().enumerate() {
        tokens.push(token_at(label, 125.0, 175.0 + i as f32 * 50.0, 60.0, 14.0));
        tokens.push(token_at("1", 275.0, 175.0 + i as f32 * 50.0, 20.0, 14.0));
        tokens.push(token_at("2", 425.0, 175.0 + i as f32 * 50.0, 20.0, 14.0));
    }

    let result = reconstruct_page(&tokens, &evidence, 612.0, 792.0, &cfg()).unwrap();

    assert_eq!(result.assignment.x_headers, vec!["name", "q1", "q2"]);
    assert_eq!(
        result.assignment.y_headers,
        vec!["name", "alpha", "beta", "gamma"]
    );
}

// ============================================================================
// Degenerate Input
// ============================================================================

#[test]
fn test_empty_page() {
    let result =
        reconstruct_page(&[], &PageEvidence::default(), 612.0, 792.0, &cfg()).unwrap();

    assert!(!result.has_table);
    assert!(result.structure.panels.is_empty());
    assert!(result.assignment.tagged.is_empty());
    assert!(result.assignment.cells.is_empty());
}

#[test]
fn test_tokens_without_any_structure() {
    // A lone paragraph fragment: nothing resembling a table.
    let tokens = vec![
        token_at("just", 100.0, 100.0, 40.0, 14.0),
        token_at("prose", 150.0, 100.0, 50.0, 14.0),
    ];
    let result =
        reconstruct_page(&tokens, &PageEvidence::default(), 612.0, 792.0, &cfg()).unwrap();

    assert!(!result.has_table);
    assert_eq!(result.assignment.tagged.len(), 2);
    assert!(result
        .assignment
        .tagged
        .iter()
        .all(|t| !t.is_cell()));
}
