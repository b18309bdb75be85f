//! # gridscan
//!
//! Reconstruction of physical table structure from OCR output.
//!
//! Given recognized text tokens (with bounding boxes) and line evidence
//! for a page — vector graphics primitives or a rendered raster image —
//! gridscan recovers the table's physical layout: panels (side-by-side
//! sub-tables), page-wide row boundaries, per-panel column boundaries,
//! and a deterministic assignment of every token to grid cells,
//! spanning tokens included.
//!
//! The pipeline has three stages:
//!
//! 1. **Observer** — classifies raw line evidence into scored horizontal
//!    and vertical line candidates, estimates the table bounding box,
//!    and proposes panel splits from vertical separators and whitespace
//!    gutters.
//! 2. **Analyzer** — derives row centers and boundaries (shared across
//!    the page), per-panel column boundaries, and assembles grids when
//!    the row/column minimums are met.
//! 3. **Assigner** — tags every input token with its cell targets (or a
//!    reason it has none), aggregates cell text, and extracts header
//!    labels.
//!
//! Malformed input (non-positive page size, detached analysis rect) is
//! the only error source; heuristic failures degrade into warnings on a
//! well-formed result.
//!
//! ## Example
//!
//! ```ignore
//! use gridscan::{reconstruct_page, PageEvidence, ReconstructConfig, Token};
//!
//! let result = reconstruct_page(
//!     &tokens,
//!     &PageEvidence { raster: Some(page_image), ..Default::default() },
//!     612.0,
//!     792.0,
//!     &ReconstructConfig::default(),
//! )?;
//! for cell in &result.assignment.cells {
//!     println!("({}, {}, {}): {}", cell.panel_id, cell.row, cell.col, cell.text);
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

pub mod analyzer;
pub mod assigner;
pub mod config;
pub mod error;
pub mod geometry;
pub mod observer;
pub mod pipeline;
pub mod token;
pub mod trace;

pub use analyzer::{analyze, Grid, PanelStructure, Structure};
pub use assigner::{assign, AssignStats, Assignment, CellContent};
pub use config::ReconstructConfig;
pub use error::{Error, Result};
pub use geometry::{Point, Rect};
pub use observer::{
    observe, EvidenceSource, LineCandidate, Observation, PageEvidence, PanelCandidate,
    SeparatorCandidate, VectorPage,
};
pub use pipeline::{reconstruct_page, reconstruct_page_with_trace, PageReconstruction};
pub use token::{AssignReason, CellTarget, TaggedToken, Token, TokenTag, UntaggedReason};
pub use trace::{NullTraceSink, TraceEvent, TraceSink, VecTraceSink};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
