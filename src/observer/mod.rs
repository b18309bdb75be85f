//! Stage 1: line & separator observation.
//!
//! Converts raw line evidence — vector primitives or a rendered raster
//! image — into classified, scored line candidates, estimates the table
//! bounding box, and detects candidate panels (horizontally distinct
//! sub-tables). All separator candidates above the noise floor are
//! retained; filtering is the downstream stages' job.

pub mod panels;
pub mod raster;
pub mod separators;
pub mod vector;

use crate::config::ReconstructConfig;
use crate::geometry::Rect;
use crate::trace::{Stage, TraceEvent, TraceSink};
use image::GrayImage;
use serde::Serialize;

pub use vector::{Segment, VectorPage};

/// Orientation of a line candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Runs left-to-right; position is a y-coordinate.
    Horizontal,
    /// Runs top-to-bottom; position is an x-coordinate.
    Vertical,
}

/// Visual style of a line, derived from its ink-coverage ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStyle {
    /// Coverage at or above the solid threshold.
    Solid,
    /// Fragmented ink along the span.
    Dashed,
}

/// Where a line candidate was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    /// Native vector graphics primitives.
    Vector,
    /// Morphological / Hough analysis of a rendered image.
    Raster,
}

/// A classified, scored line candidate.
///
/// `position` is the coordinate perpendicular to the orientation
/// (y for horizontal lines, x for vertical ones); the span runs along
/// the orientation.
#[derive(Debug, Clone, Serialize)]
pub struct LineCandidate {
    /// Horizontal or vertical.
    pub orientation: Orientation,
    /// Perpendicular coordinate of the line.
    pub position: f32,
    /// Start of the span along the orientation.
    pub span_start: f32,
    /// End of the span along the orientation. Always > `span_start`.
    pub span_end: f32,
    /// Fraction of the span covered by ink, in [0, 1].
    pub coverage: f32,
    /// Solid or dashed, from the coverage ratio.
    pub style: LineStyle,
    /// Score in [0, 1]: normalized span length × coverage.
    pub score: f32,
    /// Observation source.
    pub source: LineSource,
    /// How many raw fragments were merged into this candidate.
    pub segment_count: usize,
}

impl LineCandidate {
    /// Length of the span.
    pub fn span(&self) -> f32 {
        self.span_end - self.span_start
    }

    /// Overlap of this line's span with an interval, in absolute units.
    pub fn span_overlap(&self, start: f32, end: f32) -> f32 {
        (self.span_end.min(end) - self.span_start.max(start)).max(0.0)
    }
}

/// Signal a separator candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparatorSource {
    /// A vertical line spanning most of the table height.
    VerticalLine,
    /// A sustained low-ink-density band of the image.
    WhitespaceGutter,
}

/// Evidence backing a separator candidate.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SeparatorEvidence {
    /// Vertical-line evidence.
    Line {
        /// Line span / table height.
        span_ratio: f32,
        /// Ink coverage of the line.
        coverage: f32,
    },
    /// Whitespace-gutter evidence.
    Gutter {
        /// Gutter width in pixels.
        width: f32,
        /// Relative density drop, in [0, 1].
        depth: f32,
    },
}

/// A candidate vertical separator between panels or columns.
#[derive(Debug, Clone, Serialize)]
pub struct SeparatorCandidate {
    /// X position of the separator.
    pub x: f32,
    /// Strength score in [0, 1].
    pub strength: f32,
    /// Which signal produced it.
    pub source: SeparatorSource,
    /// Strong enough to bound a panel on its own.
    pub is_strong: bool,
    /// Lies within the border margin of the table bbox.
    pub is_border: bool,
    /// The raw evidence record.
    pub evidence: SeparatorEvidence,
}

/// Signal a panel candidate was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelSource {
    /// Bounded by vertical-line separators.
    VerticalSeparators,
    /// Bounded by whitespace gutters.
    WhitespaceGutters,
    /// Bounded by a mix of separator kinds.
    Mixed,
    /// Inferred downstream from token-gap analysis.
    TokenGaps,
}

/// A candidate horizontally-distinct sub-table.
#[derive(Debug, Clone, Serialize)]
pub struct PanelCandidate {
    /// Bounding box of the panel.
    pub bbox: Rect,
    /// Confidence in [0, 1], from the bounding separators' strength.
    pub confidence: f32,
    /// Which signal bounded it.
    pub source: PanelSource,
    /// X of the left bounding separator (table edge when leftmost).
    pub left_x: f32,
    /// X of the right bounding separator (table edge when rightmost).
    pub right_x: f32,
}

/// Which kind of evidence the observer ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    /// Native vector graphics were available (preferred).
    Vector,
    /// Only a rendered raster image was available.
    Raster,
    /// No line evidence at all.
    None,
}

/// Raw line evidence for one page.
#[derive(Default)]
pub struct PageEvidence {
    /// Native vector graphics, when the document format provides them.
    pub vector: Option<VectorPage>,
    /// Rendered raster image of the page.
    pub raster: Option<GrayImage>,
    /// Mask: raster analysis is physically blanked outside this rect.
    pub analysis_rect: Option<Rect>,
    /// Externally known table bounding box; overrides the observer's own
    /// estimate during structure analysis.
    pub table_bbox: Option<Rect>,
}

impl std::fmt::Debug for PageEvidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageEvidence")
            .field("vector", &self.vector.is_some())
            .field("raster", &self.raster.is_some())
            .field("analysis_rect", &self.analysis_rect)
            .field("table_bbox", &self.table_bbox)
            .finish()
    }
}

/// Output of the observation stage.
#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    /// Which evidence kind was used.
    pub source: EvidenceSource,
    /// Horizontal line candidates, sorted by position.
    pub horizontal: Vec<LineCandidate>,
    /// Vertical line candidates, sorted by position.
    pub vertical: Vec<LineCandidate>,
    /// Estimated table bounding box, when line evidence allows one.
    pub table_bbox: Option<Rect>,
    /// Primary panel hypothesis (strong, non-border separators).
    pub panel_candidates: Vec<PanelCandidate>,
    /// Secondary hypothesis from all non-border separators, for callers
    /// that find the primary implausible.
    pub panel_candidates_loose: Vec<PanelCandidate>,
    /// Every separator candidate above the noise floor.
    pub separators_all: Vec<SeparatorCandidate>,
    /// The same candidates, sorted by strength descending.
    pub separators_ranked: Vec<SeparatorCandidate>,
    /// Human-readable warnings accumulated during observation.
    pub warnings: Vec<String>,
}

impl Observation {
    /// An empty, well-formed observation for pages without evidence.
    pub fn empty() -> Self {
        Self {
            source: EvidenceSource::None,
            horizontal: Vec::new(),
            vertical: Vec::new(),
            table_bbox: None,
            panel_candidates: Vec::new(),
            panel_candidates_loose: Vec::new(),
            separators_all: Vec::new(),
            separators_ranked: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Observe line and separator candidates for one page.
///
/// Vector evidence is preferred over raster. Absence of any evidence
/// produces an empty but well-formed [`Observation`] with
/// `source = EvidenceSource::None` — never an error.
pub fn observe(
    evidence: &PageEvidence,
    page_width: f32,
    page_height: f32,
    cfg: &ReconstructConfig,
    sink: &mut dyn TraceSink,
) -> Observation {
    sink.event(&TraceEvent::StageStarted {
        stage: Stage::Observer,
    });

    let mut warnings = Vec::new();
    let mut obs = Observation::empty();

    // Capability selection happens exactly once, up front.
    let source = if evidence.vector.is_some() {
        EvidenceSource::Vector
    } else if evidence.raster.is_some() {
        EvidenceSource::Raster
    } else {
        EvidenceSource::None
    };
    obs.source = source;

    match source {
        EvidenceSource::Vector => {
            let vp = evidence.vector.as_ref().unwrap();
            let (horizontal, vertical, mut w) =
                vector::observe_lines(vp, page_width, page_height, cfg);
            obs.horizontal = horizontal;
            obs.vertical = vertical;
            warnings.append(&mut w);
        },
        EvidenceSource::Raster => {
            let img = evidence.raster.as_ref().unwrap();
            let mut result = raster::observe_lines(img, evidence.analysis_rect, cfg);
            obs.horizontal = std::mem::take(&mut result.horizontal);
            obs.vertical = std::mem::take(&mut result.vertical);
            warnings.append(&mut result.warnings);
        },
        EvidenceSource::None => {
            log::debug!("observer: no line evidence, emitting empty observation");
        },
    }

    sink.event(&TraceEvent::CandidateCount {
        stage: Stage::Observer,
        kind: "horizontal_lines",
        count: obs.horizontal.len(),
    });
    sink.event(&TraceEvent::CandidateCount {
        stage: Stage::Observer,
        kind: "vertical_lines",
        count: obs.vertical.len(),
    });

    // Table bounding box estimate from the observed lines.
    obs.table_bbox =
        panels::estimate_table_bbox(&obs.horizontal, &obs.vertical, page_width, page_height);

    if let Some(table) = obs.table_bbox {
        // Separator signal 1: vertical lines spanning most of the table.
        let mut seps = separators::from_vertical_lines(&obs.vertical, &table, cfg);

        // Separator signal 2: whitespace gutters in the rendered image.
        // Signal 3 (token gaps) is deferred to the structure analyzer.
        if let Some(img) = evidence.raster.as_ref() {
            let ink = raster::ink_mask(img, evidence.analysis_rect);
            seps.extend(separators::from_gutters(&ink, &table, cfg));
        }

        seps.sort_by(|a, b| crate::geometry::safe_float_cmp(a.x, b.x));
        obs.separators_ranked = separators::rank(&seps);
        obs.separators_all = seps;

        sink.event(&TraceEvent::CandidateCount {
            stage: Stage::Observer,
            kind: "separators",
            count: obs.separators_all.len(),
        });

        // Primary hypothesis: strong non-border separators only.
        let strong: Vec<&SeparatorCandidate> = obs
            .separators_all
            .iter()
            .filter(|s| s.is_strong && !s.is_border)
            .collect();
        obs.panel_candidates = panels::cluster_into_panels(&strong, &table, cfg);

        // Loose hypothesis: every non-border candidate.
        let loose: Vec<&SeparatorCandidate> = obs
            .separators_all
            .iter()
            .filter(|s| !s.is_border)
            .collect();
        obs.panel_candidates_loose = panels::cluster_into_panels(&loose, &table, cfg);

        log::debug!(
            "observer: {} h-lines, {} v-lines, {} separators, {} panels (strict), {} panels (loose)",
            obs.horizontal.len(),
            obs.vertical.len(),
            obs.separators_all.len(),
            obs.panel_candidates.len(),
            obs.panel_candidates_loose.len()
        );
    }

    obs.warnings = warnings;
    sink.event(&TraceEvent::StageFinished {
        stage: Stage::Observer,
        warnings: obs.warnings.len(),
    });
    obs
}
