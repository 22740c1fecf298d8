//! Console reporter: turns the lifecycle event stream into an indented
//! progress report and per-unit history entries.
//!
//! The tree is never buffered. Ancestor headers are written lazily, when the
//! first test or group below them starts, so groups without any reported
//! descendants never appear in the output.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::core::aggregate::ResultAggregator;
use crate::core::events::{LifecycleEvent, Subscriber};
use crate::core::failure::{Cause, ErrorId, ErrorNode, FailureRecord};
use crate::core::history::{HistoryLedger, UnitHistoryEntry};
use crate::core::scope::{OpenScopeSet, Scope, ScopeId, ScopeKind, Test};
use crate::core::types::{Outcome, TestCounts, UnitId};
use crate::io::indented::IndentedWriter;

/// Nested causes deeper than this are cut off; only direct self-causes are
/// detected, so a longer cycle would otherwise never end.
const MAX_CAUSE_DEPTH: usize = 32;

#[derive(Debug, Default)]
struct UnitTally {
    last_modified: Option<DateTime<Utc>>,
    counts: TestCounts,
}

pub struct HierarchicalReporter<W: Write> {
    out: IndentedWriter<W>,
    open: OpenScopeSet,
    /// Test whose line has been started but has no outcome yet.
    pending: Option<ScopeId>,
    tallies: HashMap<UnitId, UnitTally>,
    aggregator: ResultAggregator,
    ledger: HistoryLedger,
}

impl<W: Write> HierarchicalReporter<W> {
    pub fn new(out: IndentedWriter<W>) -> Self {
        Self {
            out,
            open: OpenScopeSet::default(),
            pending: None,
            tallies: HashMap::new(),
            aggregator: ResultAggregator::default(),
            ledger: HistoryLedger::default(),
        }
    }

    /// Note that `unit` is about to run with the given artifact timestamp.
    pub fn begin_unit(&mut self, unit: &UnitId, last_modified: Option<DateTime<Utc>>) {
        self.tallies.insert(
            unit.clone(),
            UnitTally {
                last_modified,
                counts: TestCounts::default(),
            },
        );
    }

    /// Carry a cached entry for a unit that is not executed.
    pub fn carry(&mut self, entry: UnitHistoryEntry) {
        self.aggregator.add_unmodified(entry.counts());
        self.ledger.carry(entry);
    }

    /// Close whatever the engine left open after a unit, so the indent
    /// returns to zero. Returns the number of levels closed.
    pub fn settle(&mut self) -> Result<usize> {
        let mut closed = 0;
        if self.pending.take().is_some() {
            self.out.finish_line().context("write report")?;
            self.out.decrease();
            closed += 1;
        }
        let open = self.open.drain();
        closed += open;
        while self.out.level() > 0 {
            self.out.decrease();
        }
        for (unit, tally) in self.tallies.drain() {
            debug!(unit = %unit, finished = tally.counts.finished(), "unit did not complete");
        }
        if closed > 0 {
            debug!(closed, "closed scopes left open by the engine");
        }
        self.out.flush().context("flush report")?;
        Ok(closed)
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    pub fn indent_level(&self) -> usize {
        self.out.level()
    }

    /// Write the skipped tests, failures and the totals table.
    pub fn write_summary(&mut self, elapsed: Duration) -> Result<()> {
        self.write_summary_inner(elapsed).context("write summary")
    }

    pub fn into_parts(self) -> (W, ResultAggregator, HistoryLedger) {
        (self.out.into_inner(), self.aggregator, self.ledger)
    }

    fn open_ancestors(&mut self, start: Option<&Rc<Scope>>) -> io::Result<()> {
        let mut to_open = Vec::new();
        let mut current = start;
        while let Some(scope) = current {
            if self.open.contains(scope.id) {
                break;
            }
            to_open.push(scope);
            current = scope.parent.as_ref();
        }
        if !to_open.is_empty() {
            self.out.finish_line()?;
        }
        while let Some(scope) = to_open.pop() {
            let mut header = scope.name.clone();
            if let Some(skip) = &scope.skip {
                header.push_str(" - Skipped");
                if let Some(reason) = skip.reason() {
                    header.push_str(": ");
                    header.push_str(reason);
                }
            }
            self.out.write_line(&header)?;
            self.open.insert_if_absent(scope.id);
            self.out.increase();
        }
        Ok(())
    }

    fn before_test(&mut self, test: &Test) -> io::Result<()> {
        if let Some(unfinished) = self.pending.take() {
            debug!(test = unfinished.0, "test started before the previous one finished");
            self.out.finish_line()?;
            self.out.decrease();
        }
        self.open_ancestors(test.parent.as_ref())?;
        self.out.finish_line()?;
        self.out.write(&test.name)?;
        self.out.increase();
        self.pending = Some(test.id);
        Ok(())
    }

    fn after_result(&mut self, test: &Test, outcome: &Outcome) -> io::Result<()> {
        if self.pending != Some(test.id) {
            debug!(test = %test.full_name(), "ignoring result for a test that is not running");
            return Ok(());
        }
        self.pending = None;
        match outcome {
            Outcome::Passed => self.out.write_line(" - Passed")?,
            Outcome::Failed(failure) => {
                self.out.write_line(" - Failed")?;
                self.write_failure(failure)?;
            }
            Outcome::Skipped(reason) => match reason.as_deref().filter(|reason| !reason.is_empty()) {
                Some(reason) => self.out.write_line(&format!(" - Skipped: {reason}"))?,
                None => self.out.write_line(" - Skipped")?,
            },
        }
        self.out.decrease();

        if let Some(unit) = test.unit_id() {
            self.tallies
                .entry(unit.clone())
                .or_default()
                .counts
                .record(outcome);
        }
        self.aggregator.record(test.full_name(), outcome);
        Ok(())
    }

    fn after_test(&mut self, test: &Test) -> io::Result<()> {
        if self.pending == Some(test.id) {
            self.pending = None;
            self.out.finish_line()?;
            self.out.decrease();
        }
        Ok(())
    }

    fn after_group(&mut self, scope: &Rc<Scope>) {
        if self.open.remove_if_present(scope.id) {
            self.out.decrease();
        }
        if let ScopeKind::Unit(unit) = &scope.kind {
            let tally = self.tallies.remove(unit).unwrap_or_default();
            debug!(
                unit = %unit,
                passed = tally.counts.passed,
                skipped = tally.counts.skipped,
                failed = tally.counts.failed,
                "unit finished"
            );
            self.ledger.record_fresh(UnitHistoryEntry::new(
                unit.clone(),
                tally.last_modified,
                tally.counts,
            ));
        }
    }

    /// Write a failure block at the current indentation.
    pub fn write_failure(&mut self, failure: &FailureRecord) -> io::Result<()> {
        let root = failure.root();
        self.write_error_body(failure.error(root))?;
        self.write_nested_cause(failure, root, 0)
    }

    fn write_error_body(&mut self, error: &ErrorNode) -> io::Result<()> {
        self.out.increase();
        for line in &error.message_lines {
            self.out.write_line(line)?;
        }
        if !error.stack_trace.is_empty() {
            self.out.write_line("Stack Trace:")?;
            self.out.increase();
            for frame in &error.stack_trace {
                self.out.write_line(&format!("at {frame}"))?;
            }
            self.out.decrease();
        }
        self.out.decrease();
        Ok(())
    }

    fn write_cause(&mut self, failure: &FailureRecord, cause: &Cause, depth: usize) -> io::Result<()> {
        match cause {
            Cause::Aggregate(inner) => {
                self.out.write_line("Caused by:")?;
                for (number, &id) in inner.iter().enumerate() {
                    let error = failure.error(id);
                    self.out.write_line(&format!("{}) {}", number + 1, error.kind))?;
                    self.write_error_body(error)?;
                    self.write_nested_cause_indented(failure, id, depth)?;
                }
            }
            Cause::Single(id) => {
                let error = failure.error(*id);
                self.out.write_line(&format!("Caused by: {}", error.kind))?;
                self.write_error_body(error)?;
                self.write_nested_cause_indented(failure, *id, depth)?;
            }
        }
        Ok(())
    }

    fn write_nested_cause_indented(
        &mut self,
        failure: &FailureRecord,
        of: ErrorId,
        depth: usize,
    ) -> io::Result<()> {
        self.out.increase();
        let result = self.write_nested_cause(failure, of, depth + 1);
        self.out.decrease();
        result
    }

    /// Write the cause of `of` unless it has none or is `of` itself.
    fn write_nested_cause(&mut self, failure: &FailureRecord, of: ErrorId, depth: usize) -> io::Result<()> {
        let Some(cause) = &failure.error(of).cause else {
            return Ok(());
        };
        if *cause == Cause::Single(of) {
            return Ok(());
        }
        if depth >= MAX_CAUSE_DEPTH {
            return self.out.write_line("Caused by: ...");
        }
        self.write_cause(failure, cause, depth)
    }

    fn write_summary_inner(&mut self, elapsed: Duration) -> io::Result<()> {
        self.out.finish_line()?;
        self.out.write_line("")?;

        let skipped = self.aggregator.skipped_tests().to_vec();
        if !skipped.is_empty() {
            self.out.write_line("Skipped Tests:")?;
            self.out.increase();
            for (number, test) in skipped.iter().enumerate() {
                let line = match &test.reason {
                    Some(reason) => format!("{}) {}: {reason}", number + 1, test.full_name),
                    None => format!("{}) {}", number + 1, test.full_name),
                };
                self.out.write_line(&line)?;
            }
            self.out.decrease();
            self.out.write_line("")?;
        }

        let failures = self.aggregator.failures().to_vec();
        if !failures.is_empty() {
            self.out.write_line("Test failures:")?;
            self.out.increase();
            for (number, entry) in failures.iter().enumerate() {
                self.out.write_line(&format!("{}) {}", number + 1, entry.scope))?;
                self.out.increase();
                self.write_failure(&entry.failure)?;
                self.out.decrease();
                self.out.write_line("")?;
            }
            self.out.decrease();
        }

        let rows = self.aggregator.summary_rows(elapsed);
        let width = rows.iter().map(|row| row.label.len()).max().unwrap_or(0);
        for row in &rows {
            self.out
                .write_line(&format!("{:<width$} {}", row.label, row.value))?;
        }
        self.out.write_line("")?;
        self.out.flush()
    }
}

impl<W: Write> Subscriber for HierarchicalReporter<W> {
    fn on_event(&mut self, event: &LifecycleEvent<'_>) -> Result<()> {
        let written = match *event {
            LifecycleEvent::BeforeGroup(scope) => self.open_ancestors(scope.parent.as_ref()),
            LifecycleEvent::AfterGroup(scope) => {
                self.after_group(scope);
                Ok(())
            }
            LifecycleEvent::BeforeTest(test) => self.before_test(test),
            LifecycleEvent::AfterTestResult(test, outcome) => self.after_result(test, outcome),
            LifecycleEvent::AfterTest(test) => self.after_test(test),
        };
        written.context("write report")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{EventBus, EventKind};
    use crate::core::types::Skip;
    use crate::test_support::{ScopeBuilder, SharedBuffer};
    use chrono::TimeZone;

    fn reporter(buffer: &SharedBuffer) -> HierarchicalReporter<SharedBuffer> {
        HierarchicalReporter::new(IndentedWriter::new(buffer.clone(), 2))
    }

    fn emit(reporter: &mut HierarchicalReporter<SharedBuffer>, events: &[LifecycleEvent<'_>]) {
        let mut bus = EventBus::new();
        bus.subscribe(&EventKind::ALL, reporter);
        for event in events {
            bus.dispatch(*event).expect("dispatch");
        }
    }

    #[test]
    fn group_with_passing_test() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let group = tree.group("Group1", None);
        let test = tree.test("testX", &group);
        emit(
            &mut reporter,
            &[
                LifecycleEvent::BeforeGroup(&group),
                LifecycleEvent::BeforeTest(&test),
                LifecycleEvent::AfterTestResult(&test, &Outcome::Passed),
                LifecycleEvent::AfterTest(&test),
                LifecycleEvent::AfterGroup(&group),
            ],
        );
        assert_eq!(buffer.contents(), "Group1\n  testX - Passed\n");
        assert_eq!(reporter.indent_level(), 0);
        assert_eq!(reporter.aggregator().fresh().passed, 1);
    }

    #[test]
    fn headers_are_written_lazily_and_once() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let unit = tree.unit("a.B");
        let empty = tree.group("Empty", Some(&unit));
        let outer = tree.group("Outer", Some(&unit));
        let inner = tree.group("Inner", Some(&outer));
        let first = tree.test("first", &inner);
        let second = tree.test("second", &inner);
        emit(
            &mut reporter,
            &[
                LifecycleEvent::BeforeGroup(&unit),
                LifecycleEvent::BeforeGroup(&empty),
                LifecycleEvent::AfterGroup(&empty),
                LifecycleEvent::BeforeGroup(&outer),
                LifecycleEvent::BeforeGroup(&inner),
                LifecycleEvent::BeforeTest(&first),
                LifecycleEvent::AfterTestResult(&first, &Outcome::Passed),
                LifecycleEvent::AfterTest(&first),
                LifecycleEvent::BeforeTest(&second),
                LifecycleEvent::AfterTestResult(&second, &Outcome::Skipped(None)),
                LifecycleEvent::AfterTest(&second),
                LifecycleEvent::AfterGroup(&inner),
                LifecycleEvent::AfterGroup(&outer),
                LifecycleEvent::AfterGroup(&unit),
            ],
        );
        assert_eq!(
            buffer.contents(),
            "a.B\n  Outer\n    Inner\n      first - Passed\n      second - Skipped\n"
        );
        assert_eq!(reporter.indent_level(), 0);
    }

    #[test]
    fn skipped_group_header_carries_reason() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let unit = tree.unit("a.B");
        let slow = tree.skipped_group("Slow", &unit, Skip::because("too slow"));
        let test = tree.test("t", &slow);
        emit(
            &mut reporter,
            &[
                LifecycleEvent::BeforeGroup(&unit),
                LifecycleEvent::BeforeGroup(&slow),
                LifecycleEvent::BeforeTest(&test),
                LifecycleEvent::AfterTestResult(&test, &Outcome::Skipped(Some("too slow".to_string()))),
                LifecycleEvent::AfterTest(&test),
                LifecycleEvent::AfterGroup(&slow),
                LifecycleEvent::AfterGroup(&unit),
            ],
        );
        assert_eq!(
            buffer.contents(),
            "a.B\n  Slow - Skipped: too slow\n    t - Skipped: too slow\n"
        );
    }

    #[test]
    fn closing_unopened_scopes_is_a_no_op() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let group = tree.group("Never", None);
        emit(
            &mut reporter,
            &[
                LifecycleEvent::AfterGroup(&group),
                LifecycleEvent::AfterGroup(&group),
            ],
        );
        assert_eq!(buffer.contents(), "");
        assert_eq!(reporter.indent_level(), 0);
    }

    #[test]
    fn missing_result_still_ends_the_test_line() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let group = tree.group("G", None);
        let silent = tree.test("silent", &group);
        let next = tree.test("next", &group);
        emit(
            &mut reporter,
            &[
                LifecycleEvent::BeforeTest(&silent),
                LifecycleEvent::AfterTest(&silent),
                LifecycleEvent::BeforeTest(&next),
                LifecycleEvent::AfterTestResult(&next, &Outcome::Passed),
                LifecycleEvent::AfterTest(&next),
                LifecycleEvent::AfterGroup(&group),
            ],
        );
        assert_eq!(buffer.contents(), "G\n  silent\n  next - Passed\n");
        assert_eq!(reporter.indent_level(), 0);
    }

    #[test]
    fn settle_closes_scopes_left_open() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let unit = tree.unit("a.B");
        let group = tree.group("G", Some(&unit));
        let test = tree.test("hung", &group);
        reporter.begin_unit(&UnitId::parse("a.B").expect("unit"), None);
        emit(&mut reporter, &[LifecycleEvent::BeforeTest(&test)]);
        assert_eq!(reporter.indent_level(), 3);

        assert_eq!(reporter.settle().expect("settle"), 3);
        assert_eq!(reporter.indent_level(), 0);
        assert_eq!(buffer.contents(), "a.B\n  G\n    hung\n");

        let (_, _, ledger) = reporter.into_parts();
        assert_eq!(ledger.fresh_len(), 0);
    }

    #[test]
    fn repeated_result_is_not_counted_twice() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let unit = tree.unit("a.B");
        let outer = tree.group("Outer", Some(&unit));
        let inner = tree.group("Inner", Some(&outer));
        let first = tree.test("t1", &inner);
        let second = tree.test("t2", &inner);
        emit(
            &mut reporter,
            &[
                LifecycleEvent::BeforeGroup(&unit),
                LifecycleEvent::BeforeGroup(&outer),
                LifecycleEvent::BeforeGroup(&inner),
                LifecycleEvent::BeforeTest(&first),
                LifecycleEvent::AfterTestResult(&first, &Outcome::Passed),
                LifecycleEvent::AfterTestResult(&first, &Outcome::Passed),
                LifecycleEvent::AfterTest(&first),
                LifecycleEvent::BeforeTest(&second),
                LifecycleEvent::AfterTestResult(&second, &Outcome::Passed),
                LifecycleEvent::AfterTest(&second),
            ],
        );
        assert_eq!(
            buffer.contents(),
            "a.B\n  Outer\n    Inner\n      t1 - Passed\n      t2 - Passed\n"
        );
        assert_eq!(reporter.indent_level(), 3);
        assert_eq!(reporter.aggregator().fresh().passed, 2);
    }

    #[test]
    fn overlapping_test_closes_the_unfinished_line() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let unit = tree.unit("a.B");
        let first = tree.test("t1", &unit);
        let second = tree.test("t2", &unit);
        emit(
            &mut reporter,
            &[
                LifecycleEvent::BeforeGroup(&unit),
                LifecycleEvent::BeforeTest(&first),
                LifecycleEvent::BeforeTest(&second),
                LifecycleEvent::AfterTestResult(&second, &Outcome::Passed),
                LifecycleEvent::AfterTest(&second),
            ],
        );
        assert_eq!(buffer.contents(), "a.B\n  t1\n  t2 - Passed\n");
        assert_eq!(reporter.indent_level(), 1);

        reporter.settle().expect("settle");
        assert_eq!(reporter.indent_level(), 0);
        assert_eq!(reporter.aggregator().fresh().passed, 1);
    }

    #[test]
    fn unit_close_records_fresh_entry() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let unit = tree.unit("a.B");
        let pass = tree.test("pass", &unit);
        let fail = tree.test("fail", &unit);
        let stamp = Utc.timestamp_opt(42, 0).single().expect("timestamp");
        let unit_id = UnitId::parse("a.B").expect("unit");
        reporter.carry(UnitHistoryEntry::new(
            unit_id.clone(),
            Some(stamp),
            TestCounts {
                passed: 9,
                skipped: 0,
                failed: 0,
            },
        ));
        reporter.begin_unit(&unit_id, Some(stamp));
        let failure = Outcome::Failed(FailureRecord::message("AssertionError", "nope"));
        emit(
            &mut reporter,
            &[
                LifecycleEvent::BeforeGroup(&unit),
                LifecycleEvent::BeforeTest(&pass),
                LifecycleEvent::AfterTestResult(&pass, &Outcome::Passed),
                LifecycleEvent::AfterTest(&pass),
                LifecycleEvent::BeforeTest(&fail),
                LifecycleEvent::AfterTestResult(&fail, &failure),
                LifecycleEvent::AfterTest(&fail),
                LifecycleEvent::AfterGroup(&unit),
            ],
        );

        let (_, aggregator, ledger) = reporter.into_parts();
        assert_eq!(aggregator.failed_count(), 1);
        let record = ledger.into_record("17");
        let entry = record.entry(&unit_id).expect("entry");
        assert_eq!(entry.last_modified, Some(stamp));
        assert_eq!(
            entry.counts(),
            TestCounts {
                passed: 1,
                skipped: 0,
                failed: 1,
            }
        );
    }

    #[test]
    fn failure_with_single_cause_chain() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut failure = FailureRecord::new(
            ErrorNode::new("AssertionError")
                .with_message("expected 1\nactual 2")
                .with_stack_trace(["a.B.test(B.java:10)"]),
        );
        let io = failure.push(ErrorNode::new("IOException").with_message("disk full"));
        let root = failure.root();
        failure.set_cause(root, Cause::Single(io));
        failure.set_cause(io, Cause::Single(io));

        reporter.write_failure(&failure).expect("write");
        assert_eq!(
            buffer.contents(),
            concat!(
                "  expected 1\n",
                "  actual 2\n",
                "  Stack Trace:\n",
                "    at a.B.test(B.java:10)\n",
                "Caused by: IOException\n",
                "  disk full\n",
            )
        );
    }

    #[test]
    fn failure_with_aggregate_cause() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut failure = FailureRecord::message("MultipleFailures", "2 errors");
        let first = failure.push(
            ErrorNode::new("Kind1")
                .with_message("first")
                .with_stack_trace(["x.y(Z.java:1)"]),
        );
        let second = failure.push(ErrorNode::new("Kind2").with_message("second"));
        let nested = failure.push(ErrorNode::new("Kind3").with_message("nested"));
        let root = failure.root();
        failure.set_cause(root, Cause::Aggregate(vec![first, second]));
        failure.set_cause(first, Cause::Single(first));
        failure.set_cause(second, Cause::Single(nested));

        reporter.write_failure(&failure).expect("write");
        assert_eq!(
            buffer.contents(),
            concat!(
                "  2 errors\n",
                "Caused by:\n",
                "1) Kind1\n",
                "  first\n",
                "  Stack Trace:\n",
                "    at x.y(Z.java:1)\n",
                "2) Kind2\n",
                "  second\n",
                "  Caused by: Kind3\n",
                "    nested\n",
            )
        );
        assert_eq!(reporter.indent_level(), 0);
    }

    #[test]
    fn two_step_cycle_is_cut_off() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut failure = FailureRecord::message("A", "a");
        let b = failure.push(ErrorNode::new("B"));
        let root = failure.root();
        failure.set_cause(root, Cause::Single(b));
        failure.set_cause(b, Cause::Single(root));

        reporter.write_failure(&failure).expect("write");
        let contents = buffer.contents();
        assert!(contents.contains("Caused by: ..."));
        assert_eq!(reporter.indent_level(), 0);
    }

    #[test]
    fn failed_test_inside_tree() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let group = tree.group("G", None);
        let test = tree.test("t", &group);
        let failure = Outcome::Failed(FailureRecord::message("AssertionError", "boom"));
        emit(
            &mut reporter,
            &[
                LifecycleEvent::BeforeTest(&test),
                LifecycleEvent::AfterTestResult(&test, &failure),
                LifecycleEvent::AfterTest(&test),
                LifecycleEvent::AfterGroup(&group),
            ],
        );
        assert_eq!(buffer.contents(), "G\n  t - Failed\n      boom\n");
        assert_eq!(reporter.indent_level(), 0);
    }

    #[test]
    fn summary_lists_skips_failures_and_table() {
        let buffer = SharedBuffer::default();
        let mut reporter = reporter(&buffer);
        let mut tree = ScopeBuilder::default();
        let unit = tree.unit("a.B");
        let skipped = tree.test("s", &unit);
        let failed = tree.test("f", &unit);
        let failure = Outcome::Failed(FailureRecord::message("AssertionError", "boom"));
        emit(
            &mut reporter,
            &[
                LifecycleEvent::BeforeTest(&skipped),
                LifecycleEvent::AfterTestResult(&skipped, &Outcome::Skipped(Some("later".to_string()))),
                LifecycleEvent::AfterTest(&skipped),
                LifecycleEvent::BeforeTest(&failed),
                LifecycleEvent::AfterTestResult(&failed, &failure),
                LifecycleEvent::AfterTest(&failed),
                LifecycleEvent::AfterGroup(&unit),
            ],
        );
        buffer.clear();

        reporter.write_summary(Duration::from_millis(2500)).expect("summary");
        assert_eq!(
            buffer.contents(),
            concat!(
                "\n",
                "Skipped Tests:\n",
                "  1) a.B s: later\n",
                "\n",
                "Test failures:\n",
                "  1) a.B f\n",
                "      boom\n",
                "\n",
                "Tests Run:      2\n",
                "Tests Failed:   1\n",
                "Tests Skipped:  1\n",
                "Tests Duration: 2.5\n",
                "\n",
            )
        );
    }
}
