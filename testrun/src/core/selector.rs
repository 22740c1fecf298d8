//! Deterministic run/skip selection for compilation units.

use chrono::{DateTime, Utc};

use crate::core::history::{RunHistoryRecord, UnitHistoryEntry};
use crate::core::types::{Coverage, UnitId};

/// Invocation-wide inputs that decide whether cached results may be trusted.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    pub toolchain_version: String,
    pub use_history: bool,
    /// A name filter is active (the user targets specific tests).
    pub filter_set: bool,
    pub coverage: Coverage,
}

/// Why a unit must be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunReason {
    HistoryDisabled,
    ToolchainChanged,
    FilterSet,
    CoverageEnabled,
    NotInHistory,
    ArtifactChanged,
    PreviousFailures,
}

impl RunReason {
    pub fn describe(self) -> &'static str {
        match self {
            RunReason::HistoryDisabled => "run history disabled",
            RunReason::ToolchainChanged => "toolchain version differs from previous run",
            RunReason::FilterSet => "test name filter is set",
            RunReason::CoverageEnabled => "coverage collection requested",
            RunReason::NotInHistory => "unit did not exist in previous run",
            RunReason::ArtifactChanged => "artifact timestamp changed since previous run",
            RunReason::PreviousFailures => "previous run contained failures",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision<'r> {
    Run(RunReason),
    /// Reuse the cached entry unchanged.
    Skip(&'r UnitHistoryEntry),
}

impl SelectionPolicy {
    /// Reason the whole record is untrusted, if any.
    pub fn untrusted(&self, record: &RunHistoryRecord) -> Option<RunReason> {
        if !self.use_history {
            return Some(RunReason::HistoryDisabled);
        }
        if record.toolchain_version.as_deref() != Some(self.toolchain_version.as_str()) {
            return Some(RunReason::ToolchainChanged);
        }
        if self.filter_set {
            return Some(RunReason::FilterSet);
        }
        if self.coverage != Coverage::None {
            return Some(RunReason::CoverageEnabled);
        }
        None
    }

    /// Decide whether `unit` runs. First matching rule wins.
    ///
    /// `current` is the artifact's timestamp now; an absent timestamp on either
    /// side never counts as unchanged.
    pub fn decide<'r>(
        &self,
        record: &'r RunHistoryRecord,
        unit: &UnitId,
        current: Option<DateTime<Utc>>,
    ) -> Decision<'r> {
        if let Some(reason) = self.untrusted(record) {
            return Decision::Run(reason);
        }
        let Some(entry) = record.entry(unit) else {
            return Decision::Run(RunReason::NotInHistory);
        };
        let unchanged = matches!(
            (current, entry.last_modified),
            (Some(now), Some(then)) if now == then
        );
        if !unchanged {
            return Decision::Run(RunReason::ArtifactChanged);
        }
        if entry.failed_test_count > 0 {
            return Decision::Run(RunReason::PreviousFailures);
        }
        Decision::Skip(entry)
    }
}
