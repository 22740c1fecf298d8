//! Invocation-wide result totals and the summary table rows.

use std::time::Duration;

use crate::core::failure::FailureRecord;
use crate::exit_codes;
use crate::core::types::{Outcome, TestCounts};

/// A test that was skipped during this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTest {
    pub full_name: String,
    pub reason: Option<String>,
}

/// A test failure with the scope path it occurred in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    pub scope: String,
    pub failure: FailureRecord,
}

/// One label/value row of the summary table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub label: &'static str,
    pub value: String,
}

impl SummaryRow {
    fn new(label: &'static str, value: impl ToString) -> Self {
        Self {
            label,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResultAggregator {
    fresh: TestCounts,
    unmodified: TestCounts,
    skipped_tests: Vec<SkippedTest>,
    failures: Vec<FailureEntry>,
}

impl ResultAggregator {
    /// Count a freshly executed test result.
    pub fn record(&mut self, full_name: String, outcome: &Outcome) {
        self.fresh.record(outcome);
        match outcome {
            Outcome::Passed => {}
            Outcome::Skipped(reason) => self.skipped_tests.push(SkippedTest {
                full_name,
                reason: reason.clone().filter(|reason| !reason.is_empty()),
            }),
            Outcome::Failed(failure) => self.failures.push(FailureEntry {
                scope: full_name,
                failure: failure.clone(),
            }),
        }
    }

    /// Add counts carried over from a unit that was not executed.
    pub fn add_unmodified(&mut self, counts: TestCounts) {
        self.unmodified.passed += counts.passed;
        self.unmodified.skipped += counts.skipped;
    }

    pub fn fresh(&self) -> TestCounts {
        self.fresh
    }

    pub fn unmodified(&self) -> TestCounts {
        self.unmodified
    }

    pub fn skipped_tests(&self) -> &[SkippedTest] {
        &self.skipped_tests
    }

    pub fn failures(&self) -> &[FailureEntry] {
        &self.failures
    }

    pub fn failed_count(&self) -> u32 {
        self.fresh.failed
    }

    /// Process exit code for the invocation: nonzero iff any test failed.
    pub fn exit_code(&self) -> i32 {
        if self.fresh.failed > 0 {
            exit_codes::TESTS_FAILED
        } else {
            exit_codes::OK
        }
    }

    /// Table rows; every row except the duration is omitted when zero.
    pub fn summary_rows(&self, elapsed: Duration) -> Vec<SummaryRow> {
        let mut rows = Vec::new();
        let unmodified_total = self.unmodified.passed + self.unmodified.skipped;
        if unmodified_total > 0 {
            rows.push(SummaryRow::new("Unmodified Tests:", unmodified_total));
            if self.unmodified.passed > 0 {
                rows.push(SummaryRow::new("Unmodified Passed Tests:", self.unmodified.passed));
            }
            if self.unmodified.skipped > 0 {
                rows.push(SummaryRow::new("Unmodified Skipped Tests:", self.unmodified.skipped));
            }
        }
        if self.fresh.finished() > 0 {
            rows.push(SummaryRow::new("Tests Run:", self.fresh.finished()));
            if self.fresh.passed > 0 {
                rows.push(SummaryRow::new("Tests Passed:", self.fresh.passed));
            }
            if self.fresh.failed > 0 {
                rows.push(SummaryRow::new("Tests Failed:", self.fresh.failed));
            }
            if self.fresh.skipped > 0 {
                rows.push(SummaryRow::new("Tests Skipped:", self.fresh.skipped));
            }
        }
        rows.push(SummaryRow::new(
            "Tests Duration:",
            format!("{:.1}", elapsed.as_secs_f64()),
        ));
        rows
    }
}
