//! Property-based tests over randomized token layouts.
//!
//! Whatever the token geometry looks like, the pipeline must conserve
//! tokens, produce monotonic boundaries, and behave as a pure function
//! of its inputs.

use gridscan::geometry::Rect;
use gridscan::observer::PageEvidence;
use gridscan::token::Token;
use gridscan::{reconstruct_page, ReconstructConfig};
use proptest::prelude::*;

const PAGE_W: f32 = 612.0;
const PAGE_H: f32 = 792.0;

/// A token somewhere on the page, occasionally without a bbox.
fn arb_token() -> impl Strategy<Value = Token> {
    (
        "[a-z]{1,8}",
        0.0f32..(PAGE_W - 100.0),
        0.0f32..(PAGE_H - 40.0),
        4.0f32..100.0,
        4.0f32..40.0,
        0u8..10,
    )
        .prop_map(|(text, x, y, w, h, roll)| {
            if roll == 0 {
                Token::without_bbox(text)
            } else {
                Token::new(text, Rect::new(x, y, w, h))
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_no_token_loss(tokens in prop::collection::vec(arb_token(), 0..60)) {
        let result = reconstruct_page(
            &tokens,
            &PageEvidence::default(),
            PAGE_W,
            PAGE_H,
            &ReconstructConfig::default(),
        )
        .unwrap();

        prop_assert_eq!(result.assignment.tagged.len(), tokens.len());
        prop_assert_eq!(
            result.assignment.stats.tagged + result.assignment.stats.untagged,
            tokens.len()
        );
        for (i, t) in result.assignment.tagged.iter().enumerate() {
            prop_assert_eq!(t.id, i);
        }
    }

    #[test]
    fn prop_deterministic(tokens in prop::collection::vec(arb_token(), 0..40)) {
        let run = || {
            let result = reconstruct_page(
                &tokens,
                &PageEvidence::default(),
                PAGE_W,
                PAGE_H,
                &ReconstructConfig::default(),
            )
            .unwrap();
            serde_json::to_string(&result).unwrap()
        };
        prop_assert_eq!(run(), run());
    }

    #[test]
    fn prop_boundaries_monotonic(tokens in prop::collection::vec(arb_token(), 0..60)) {
        let result = reconstruct_page(
            &tokens,
            &PageEvidence::default(),
            PAGE_W,
            PAGE_H,
            &ReconstructConfig::default(),
        )
        .unwrap();

        for w in result.structure.row_boundaries.windows(2) {
            prop_assert!(w[1] > w[0]);
        }
        for panel in &result.structure.panels {
            if let Some(grid) = &panel.grid {
                for w in grid.row_boundaries.windows(2) {
                    prop_assert!(w[1] > w[0]);
                }
                for w in grid.col_boundaries.windows(2) {
                    prop_assert!(w[1] > w[0]);
                }
            }
        }
    }
}
