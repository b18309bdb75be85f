//! Token types: the text fragments flowing through the pipeline.

use crate::geometry::Rect;
use serde::Serialize;

/// A recognized text fragment with a bounding box.
///
/// Tokens are produced by an upstream OCR/merge stage and are immutable
/// once created. A token without a bounding box is carried through the
/// pipeline and tagged `Untagged { reason: NoBbox }` at the end rather
/// than dropped.
#[derive(Debug, Clone, Serialize)]
pub struct Token {
    /// The recognized text.
    pub text: String,
    /// Bounding box in page-pixel coordinates, if known.
    pub bbox: Option<Rect>,
    /// Optional provenance tag from the upstream merge step.
    pub source: Option<String>,
}

impl Token {
    /// Create a token with a bounding box.
    pub fn new(text: impl Into<String>, bbox: Rect) -> Self {
        Self {
            text: text.into(),
            bbox: Some(bbox),
            source: None,
        }
    }

    /// Create a token without geometry.
    pub fn without_bbox(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bbox: None,
            source: None,
        }
    }

    /// Attach a provenance tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// One grid cell a token was linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellTarget {
    /// Panel the cell belongs to.
    pub panel_id: usize,
    /// Row index within the grid.
    pub row: usize,
    /// Column index within the grid.
    pub col: usize,
}

/// How a cell assignment was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignReason {
    /// Small token placed by centroid containment.
    Centroid,
    /// Exactly one cell cleared the overlap threshold.
    SingleOverlap,
    /// Consecutive cells in one row or column; the token spans them.
    Span,
    /// Narrowed to the dominant row by summed overlap.
    DominantRow,
    /// Narrowed to the dominant column by summed overlap.
    DominantCol,
    /// Fallback to the single best-overlapping cell.
    BestOverlap,
}

/// Why a token could not be placed in any cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UntaggedReason {
    /// The token has no bounding box.
    NoBbox,
    /// The token lies outside every grid.
    Outside,
    /// No grid was assembled for the page.
    NoGrid,
}

/// The final annotation attached to a token.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenTag {
    /// Linked to one or more grid cells.
    Cell {
        /// The linked cells; more than one for spanning tokens.
        targets: Vec<CellTarget>,
        /// How the assignment was decided.
        reason: AssignReason,
        /// Set when the span covers more cells than the configured count.
        is_large_span: bool,
    },
    /// Not placed in any cell.
    Untagged {
        /// Why the token was not placed.
        reason: UntaggedReason,
    },
}

/// A token annotated with its cell assignment.
///
/// The tagged stream is in 1:1 correspondence with the input token list:
/// `id` is the input position, every input position appears exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct TaggedToken {
    /// Index of the token in the input list.
    pub id: usize,
    /// The token text, copied through unchanged.
    pub text: String,
    /// The token bounding box, copied through unchanged.
    pub bbox: Option<Rect>,
    /// The assignment.
    pub tag: TokenTag,
}

impl TaggedToken {
    /// True when the token was linked to at least one cell.
    pub fn is_cell(&self) -> bool {
        matches!(self.tag, TokenTag::Cell { .. })
    }
}
