//! ── Error Types ────────────────────────────────────────────────────────────
//!
//! One typed error per component seam, matched to the taxonomy each
//! component is allowed to raise. Nothing here is a blanket catch-all:
//! a telemetry callback can only ever produce a `TelemetryReadError`, an
//! executor action only an `ExecutorError`, and so on.

use thiserror::Error;

/// A keyword read, write, or wait failed at the bus boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("keyword {0} has no published value yet")]
    NotYetPublished(&'static str),
    #[error("keyword {0} carried a value of the wrong shape")]
    WrongType(&'static str),
    #[error("gateway channel closed")]
    ChannelClosed,
}

/// A telemetry callback couldn't make sense of the value it was handed.
/// Every such failure is substituted with a documented neutral default —
/// this type only exists so the substitution logic has one name instead
/// of being an inline `unwrap_or` scattered across every callback.
#[derive(Debug, Error)]
pub enum TelemetryReadError {
    #[error("missing keyword {0}")]
    Missing(&'static str),
    #[error("could not parse value for keyword {0}")]
    Unparseable(&'static str),
}

/// A fatal, non-retryable condition raised by an Executor action.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("move permission not granted within {0:?}")]
    MovePermTimeout(std::time::Duration),
    #[error("TEQ mode could not be set to {0} within the allotted wait")]
    TeqModeUnsettable(String),
    #[error("closeup did not succeed within the {0:?} retry budget")]
    CloseupBudgetExhausted(std::time::Duration),
    #[error("external script exited with code {0}")]
    ScriptFailed(i32),
}

/// Raised by the Sequencer when a phase fails in a way that must abort the
/// whole run with a specific process exit code.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("focus failed: {0}")]
    FocusFailed(#[source] ExecutorError),
    #[error("pre-night calibration failed: {0}")]
    CalibrationFailed(#[source] ExecutorError),
}

impl SequencerError {
    /// The process exit code this failure maps to (§6 of the external
    /// interface: 1 for open/focus, 2 for Cal-Pre).
    pub fn exit_code(&self) -> i32 {
        match self {
            SequencerError::FocusFailed(_) => 1,
            SequencerError::CalibrationFailed(_) => 2,
        }
    }
}

/// The observation-number computation failed to read one of its two
/// sources. Unlike a telemetry callback this only runs once per sequencer
/// pass, so its failure is surfaced rather than silently defaulted.
#[derive(Debug, Error)]
pub enum ObsNumError {
    #[error("could not read butler starlist directory {0}: {1}")]
    ButlerDirUnreadable(String, std::io::Error),
    #[error("butler file {0} had no parseable observation number")]
    ButlerFileEmpty(String),
    #[error("could not read lastObs file {0}: {1}")]
    LastObsUnreadable(String, std::io::Error),
}
