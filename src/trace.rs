//! Injectable observability for the reconstruction stages.
//!
//! Stages report structured events to a caller-supplied [`TraceSink`]
//! instead of mutating process-wide counters. The default sink discards
//! everything; tests and diagnostic tooling can capture the stream with
//! [`VecTraceSink`]. Events are mirrored to the `log` crate at debug
//! level by the stage orchestrators themselves.

/// The pipeline stage an event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Line & separator observation
    Observer,
    /// Row/column/grid analysis
    Analyzer,
    /// Token-to-cell assignment
    Assigner,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Observer => write!(f, "observer"),
            Stage::Analyzer => write!(f, "analyzer"),
            Stage::Assigner => write!(f, "assigner"),
        }
    }
}

/// A structured trace event emitted by a pipeline stage.
#[derive(Debug, Clone)]
pub enum TraceEvent {
    /// A stage began processing.
    StageStarted {
        /// Originating stage
        stage: Stage,
    },
    /// A stage finished, reporting how many warnings it produced.
    StageFinished {
        /// Originating stage
        stage: Stage,
        /// Number of warnings accumulated by the stage
        warnings: usize,
    },
    /// A candidate collection reached a given size.
    CandidateCount {
        /// Originating stage
        stage: Stage,
        /// Candidate kind, e.g. `"horizontal_lines"` or `"separators"`
        kind: &'static str,
        /// Number of candidates
        count: usize,
    },
    /// A sub-detector's output was discarded as implausible.
    DetectorDiscarded {
        /// Originating stage
        stage: Stage,
        /// Human-readable discard reason
        detail: String,
    },
}

/// Receiver for trace events.
pub trait TraceSink {
    /// Handle one event. Implementations must not panic.
    fn event(&mut self, event: &TraceEvent);
}

/// A sink that discards all events. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn event(&mut self, _event: &TraceEvent) {}
}

/// A sink that records every event, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct VecTraceSink {
    /// Recorded events, in emission order.
    pub events: Vec<TraceEvent>,
}

impl TraceSink for VecTraceSink {
    fn event(&mut self, event: &TraceEvent) {
        self.events.push(event.clone());
    }
}
