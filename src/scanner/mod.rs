//! Multi-target parallel scan engine.
//!
//! Three nested levels of bounded fan-out, each a `buffer_unordered` pool so
//! completed results are consumed as they arrive:
//!
//! * orchestrator: up to [`MAX_TARGET_CONCURRENCY`] targets at once,
//! * target scanner: up to [`MAX_RULE_CONCURRENCY`] rules per target,
//! * discovery: up to [`MAX_PROBE_CONCURRENCY`] candidate probes.
//!
//! The bounds exist to respect provider rate limits; there is no
//! cancellation of in-flight sibling calls when one fails. Timeouts are the
//! transport client's responsibility.

pub use discovery::{discover_targets, ProbeOutcome};
pub use orchestrator::{run_scan, ScanReport, TargetPlan, TargetSpec};
pub use target::{scan_target, FatalKind, FatalTargetError, TargetOutcome};

mod discovery;
mod orchestrator;
mod target;

use std::fmt;

use thiserror::Error;

/// Concurrently scanned targets.
pub const MAX_TARGET_CONCURRENCY: usize = 5;
/// Concurrent rule invocations per target.
pub const MAX_RULE_CONCURRENCY: usize = 4;
/// Concurrent discovery probes.
pub const MAX_PROBE_CONCURRENCY: usize = 8;

/// How the scanned target set was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// The caller named the targets.
    Explicit,
    /// Targets came from auto-discovery.
    Auto,
}

impl SelectionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionMode::Explicit => "explicit",
            SelectionMode::Auto => "auto",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a specific target was asked for by name or found by discovery.
///
/// A fatal error on an explicitly requested target aborts the whole scan;
/// the same error on an auto-discovered target is logged and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOrigin {
    Explicit,
    Discovered,
}

/// How a completed target scan is classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClassification {
    /// Every rule succeeded.
    None,
    /// Some rules failed, at least one succeeded. Accepted terminal state.
    Partial,
    /// Every rule failed. Only recorded for auto-discovered targets; on an
    /// explicit target the scan aborts instead.
    Fatal,
}

/// Errors that terminate a scan as a whole.
#[derive(Debug, Error)]
pub enum ScanError {
    /// An explicitly requested target failed fatally. The user asked for
    /// this target by name and must be told rather than receive a silently
    /// incomplete report.
    #[error("target '{target}' failed: {source}")]
    FatalTarget {
        target: String,
        #[source]
        source: FatalTargetError,
    },

    /// Credential or permission problem that makes the whole scan
    /// untrustworthy. Maps to exit code 3.
    #[error("permission error: {0}")]
    Permission(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
