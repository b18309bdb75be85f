//! The full reconstruction pipeline.
//!
//! Chains observation, structure analysis, and cell assignment into one
//! call. Input validation happens here; the stages themselves never
//! fail, they degrade and warn.

use crate::analyzer::{self, Structure};
use crate::assigner::{self, Assignment};
use crate::config::ReconstructConfig;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::observer::{self, Observation, PageEvidence};
use crate::token::Token;
use crate::trace::{NullTraceSink, TraceSink};
use serde::Serialize;

/// The reconstruction result for one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageReconstruction {
    /// Stage 1 output: line and separator candidates.
    pub observation: Observation,
    /// Stage 2 output: rows, panels, and grids.
    pub structure: Structure,
    /// Stage 3 output: tagged tokens, cells, and headers.
    pub assignment: Assignment,
    /// Whether the page holds at least one table, possibly degraded.
    pub has_table: bool,
    /// Warnings from every stage, in pipeline order.
    pub warnings: Vec<String>,
}

/// Reconstruct the table structure of one page.
///
/// `page_width` and `page_height` are the dimensions of the coordinate
/// space the tokens and evidence live in. An optional analysis rect on
/// the evidence restricts raster processing to that region; an optional
/// table bbox on the evidence overrides the observer's own estimate of
/// where the table sits.
///
/// # Arguments
///
/// * `tokens` - Recognized text fragments, in upstream order
/// * `evidence` - Vector and/or raster line evidence for the page
/// * `page_width` - Page width in pixels, must be positive
/// * `page_height` - Page height in pixels, must be positive
/// * `cfg` - Threshold configuration
///
/// # Returns
///
/// The full three-stage result. Pages without tables come back with
/// `has_table == false` and a well-formed, mostly-empty result; only
/// malformed inputs produce an error.
///
/// # Examples
///
/// ```ignore
/// use gridscan::{reconstruct_page, PageEvidence, ReconstructConfig, Token};
///
/// let tokens: Vec<Token> = load_tokens();
/// let result = reconstruct_page(
///     &tokens,
///     &PageEvidence::default(),
///     612.0,
///     792.0,
///     &ReconstructConfig::default(),
/// )?;
/// if result.has_table {
///     println!("headers: {:?}", result.assignment.x_headers);
/// }
/// ```
pub fn reconstruct_page(
    tokens: &[Token],
    evidence: &PageEvidence,
    page_width: f32,
    page_height: f32,
    cfg: &ReconstructConfig,
) -> Result<PageReconstruction> {
    reconstruct_page_with_trace(
        tokens,
        evidence,
        page_width,
        page_height,
        cfg,
        &mut NullTraceSink,
    )
}

/// Like [`reconstruct_page`], reporting trace events to `sink`.
pub fn reconstruct_page_with_trace(
    tokens: &[Token],
    evidence: &PageEvidence,
    page_width: f32,
    page_height: f32,
    cfg: &ReconstructConfig,
    sink: &mut dyn TraceSink,
) -> Result<PageReconstruction> {
    validate(evidence, page_width, page_height)?;

    let observation = observer::observe(evidence, page_width, page_height, cfg, sink);
    let structure = analyzer::analyze(
        &observation,
        tokens,
        page_width,
        page_height,
        evidence.table_bbox,
        cfg,
        sink,
    );
    let assignment = assigner::assign(&structure, tokens, cfg, sink);

    let mut warnings = Vec::new();
    warnings.extend(observation.warnings.iter().cloned());
    warnings.extend(structure.warnings.iter().cloned());

    let has_table = structure.has_table;
    Ok(PageReconstruction {
        observation,
        structure,
        assignment,
        has_table,
        warnings,
    })
}

fn validate(evidence: &PageEvidence, page_width: f32, page_height: f32) -> Result<()> {
    if !(page_width > 0.0) || !(page_height > 0.0) {
        return Err(Error::InvalidPageSize {
            width: page_width,
            height: page_height,
        });
    }
    if let Some(rect) = evidence.analysis_rect {
        let page = Rect::new(0.0, 0.0, page_width, page_height);
        if rect.is_degenerate() || !rect.intersects(&page) {
            return Err(Error::InvalidAnalysisRect(rect));
        }
    }
    Ok(())
}
