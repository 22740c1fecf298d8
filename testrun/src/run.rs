//! One test invocation: select units, run them, report, persist history.

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::events::{EventBus, EventKind};
use crate::core::filter::TestFilter;
use crate::core::history::RunHistoryRecord;
use crate::core::selector::{Decision, SelectionPolicy};
use crate::core::types::{Coverage, TestCounts, UnitId};
use crate::io::artifacts::ArtifactSource;
use crate::io::engine::{ExecutionEngine, UnitStatus};
use crate::io::history::{load_history, save_history};
use crate::io::indented::IndentedWriter;
use crate::reporter::HierarchicalReporter;

/// Source of the invocation's elapsed time.
pub trait Stopwatch {
    fn elapsed(&self) -> Duration;
}

impl Stopwatch for Instant {
    fn elapsed(&self) -> Duration {
        Instant::elapsed(self)
    }
}

/// Resolved inputs of one invocation.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub history_path: PathBuf,
    pub use_history: bool,
    /// Overrides the engine-reported toolchain version.
    pub toolchain_version: Option<String>,
    pub filter: Option<TestFilter>,
    pub coverage: Coverage,
    pub indent_width: usize,
}

/// A unit the engine stopped before it finished reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedUnit {
    pub unit: UnitId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub fresh: TestCounts,
    pub unmodified: TestCounts,
    pub units_run: usize,
    pub units_skipped: usize,
    pub aborted: Vec<AbortedUnit>,
    pub history_saved: bool,
    pub exit_code: i32,
}

/// Run `units` through `engine`, writing the report to `output`.
///
/// Units whose cached results can be trusted are not executed; their counts
/// are carried into the summary and the saved history.
#[instrument(skip_all, fields(units = units.len(), use_history = settings.use_history))]
pub fn run_invocation<W: Write>(
    settings: &RunSettings,
    units: &[UnitId],
    engine: &mut dyn ExecutionEngine,
    artifacts: &dyn ArtifactSource,
    stopwatch: &dyn Stopwatch,
    output: W,
) -> Result<InvocationOutcome> {
    let toolchain_version = match &settings.toolchain_version {
        Some(version) => version.clone(),
        None if settings.use_history => engine
            .toolchain_version()
            .context("determine toolchain version")?,
        None => String::new(),
    };
    let record = if settings.use_history {
        load_history(&settings.history_path)?
    } else {
        RunHistoryRecord::default()
    };
    let policy = SelectionPolicy {
        toolchain_version: toolchain_version.clone(),
        use_history: settings.use_history,
        filter_set: settings.filter.is_some(),
        coverage: settings.coverage,
    };
    info!(
        toolchain_version = %toolchain_version,
        filter = settings.filter.as_ref().map(TestFilter::as_str),
        coverage = %settings.coverage,
        "starting test run"
    );

    let mut reporter = HierarchicalReporter::new(IndentedWriter::new(output, settings.indent_width));
    let mut units_run = 0;
    let mut units_skipped = 0;
    let mut aborted = Vec::new();

    for unit in units {
        let current = artifacts
            .last_modified(unit)
            .with_context(|| format!("read timestamp of {unit}"))?;
        match policy.decide(&record, unit, current) {
            Decision::Skip(entry) => {
                debug!(unit = %unit, "unchanged since a passing run, skipping");
                reporter.carry(entry.clone());
                units_skipped += 1;
            }
            Decision::Run(reason) => {
                debug!(unit = %unit, reason = reason.describe(), "running unit");
                reporter.begin_unit(unit, current);
                let summary = {
                    let mut bus = EventBus::new();
                    bus.subscribe(&EventKind::ALL, &mut reporter);
                    engine.run_unit(unit, settings.filter.as_ref(), &mut bus)?
                };
                reporter.settle()?;
                units_run += 1;
                if let UnitStatus::Aborted { reason } = summary.status {
                    warn!(unit = %unit, reason = %reason, "unit did not finish");
                    aborted.push(AbortedUnit {
                        unit: unit.clone(),
                        reason,
                    });
                }
            }
        }
    }

    reporter.write_summary(stopwatch.elapsed())?;
    let (_, aggregator, ledger) = reporter.into_parts();

    let history_saved = settings.use_history && settings.filter.is_none();
    if history_saved {
        debug!(
            carried = ledger.carried_len(),
            fresh = ledger.fresh_len(),
            "saving run history"
        );
        let record = ledger.into_record(&toolchain_version);
        save_history(&settings.history_path, &record)?;
    } else {
        debug!("run history not saved");
    }

    let outcome = InvocationOutcome {
        fresh: aggregator.fresh(),
        unmodified: aggregator.unmodified(),
        units_run,
        units_skipped,
        aborted,
        history_saved,
        exit_code: aggregator.exit_code(),
    };
    info!(
        units_run,
        units_skipped,
        failed = outcome.fresh.failed,
        "test run finished"
    );
    Ok(outcome)
}
