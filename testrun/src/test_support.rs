//! Test-only helpers: scope builders, an in-memory engine, fixed clocks and
//! artifact timestamps, and a shareable output buffer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use crate::core::events::{EventBus, LifecycleEvent};
use crate::core::failure::FailureRecord;
use crate::core::filter::TestFilter;
use crate::core::scope::{Scope, ScopeId, Test};
use crate::core::types::{Outcome, Skip, UnitId};
use crate::io::artifacts::ArtifactSource;
use crate::io::engine::{ExecutionEngine, UnitRunSummary, UnitStatus};
use crate::run::Stopwatch;

/// Parse a unit id, panicking on invalid input.
pub fn unit(name: &str) -> UnitId {
    UnitId::parse(name).expect("valid unit id")
}

/// Deterministic UTC timestamp `secs` after the epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

/// Builds scopes and tests with increasing ids.
#[derive(Debug, Default)]
pub struct ScopeBuilder {
    next: u64,
}

impl ScopeBuilder {
    fn id(&mut self) -> ScopeId {
        self.next += 1;
        ScopeId(self.next)
    }

    pub fn unit(&mut self, name: &str) -> Rc<Scope> {
        let id = self.id();
        Scope::unit(id, unit(name))
    }

    pub fn group(&mut self, name: &str, parent: Option<&Rc<Scope>>) -> Rc<Scope> {
        let id = self.id();
        Scope::group(id, name, parent, None)
    }

    pub fn skipped_group(&mut self, name: &str, parent: &Rc<Scope>, skip: Skip) -> Rc<Scope> {
        let id = self.id();
        Scope::group(id, name, Some(parent), Some(skip))
    }

    pub fn test(&mut self, name: &str, parent: &Rc<Scope>) -> Test {
        let id = self.id();
        Test::new(id, name, Some(parent))
    }
}

/// Cloneable in-memory sink; every clone appends to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.bytes.borrow().clone()).expect("utf8 output")
    }

    pub fn clear(&self) {
        self.bytes.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that rejects every write.
#[derive(Debug, Default)]
pub struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "output closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Stopwatch that always reports the same elapsed time.
#[derive(Debug, Clone, Copy)]
pub struct FixedStopwatch(pub Duration);

impl Stopwatch for FixedStopwatch {
    fn elapsed(&self) -> Duration {
        self.0
    }
}

/// Artifact timestamps held in memory.
#[derive(Debug, Clone, Default)]
pub struct FixedArtifacts {
    stamps: HashMap<UnitId, DateTime<Utc>>,
}

impl FixedArtifacts {
    pub fn with(mut self, name: &str, stamp: DateTime<Utc>) -> Self {
        self.set(name, stamp);
        self
    }

    pub fn set(&mut self, name: &str, stamp: DateTime<Utc>) {
        self.stamps.insert(unit(name), stamp);
    }
}

impl ArtifactSource for FixedArtifacts {
    fn last_modified(&self, unit: &UnitId) -> Result<Option<DateTime<Utc>>> {
        Ok(self.stamps.get(unit).copied())
    }
}

/// One scripted test result, optionally inside a named group.
#[derive(Debug, Clone)]
pub struct ScriptedTest {
    pub group: Option<String>,
    pub name: String,
    pub outcome: Outcome,
}

pub fn passing(name: &str) -> ScriptedTest {
    ScriptedTest {
        group: None,
        name: name.to_string(),
        outcome: Outcome::Passed,
    }
}

pub fn failing(name: &str, message: &str) -> ScriptedTest {
    ScriptedTest {
        group: None,
        name: name.to_string(),
        outcome: Outcome::Failed(FailureRecord::message("AssertionError", message)),
    }
}

pub fn skipped(name: &str, reason: Option<&str>) -> ScriptedTest {
    ScriptedTest {
        group: None,
        name: name.to_string(),
        outcome: Outcome::Skipped(reason.map(str::to_string)),
    }
}

impl ScriptedTest {
    pub fn in_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }
}

/// Engine that replays scripted results instead of running anything.
///
/// Tests of a unit are emitted in order; consecutive tests sharing a group
/// name are reported inside one group scope under the unit scope.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    version: String,
    units: HashMap<UnitId, Vec<ScriptedTest>>,
    executed: Vec<UnitId>,
    next: u64,
}

impl ScriptedEngine {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..Self::default()
        }
    }

    pub fn unit(mut self, name: &str, tests: Vec<ScriptedTest>) -> Self {
        self.units.insert(unit(name), tests);
        self
    }

    pub fn set_tests(&mut self, name: &str, tests: Vec<ScriptedTest>) {
        self.units.insert(unit(name), tests);
    }

    /// Units run so far, in order.
    pub fn executed(&self) -> &[UnitId] {
        &self.executed
    }

    fn id(&mut self) -> ScopeId {
        self.next += 1;
        ScopeId(self.next)
    }
}

impl ExecutionEngine for ScriptedEngine {
    fn toolchain_version(&mut self) -> Result<String> {
        Ok(self.version.clone())
    }

    fn run_unit(
        &mut self,
        unit: &UnitId,
        filter: Option<&TestFilter>,
        bus: &mut EventBus<'_>,
    ) -> Result<UnitRunSummary> {
        self.executed.push(unit.clone());
        let Some(tests) = self.units.get(unit).cloned() else {
            return Ok(UnitRunSummary {
                events: 0,
                status: UnitStatus::Aborted {
                    reason: format!("no scripted tests for {unit}"),
                },
            });
        };

        let root = Scope::unit(self.id(), unit.clone());
        let mut events = 0;
        bus.dispatch(LifecycleEvent::BeforeGroup(&root))?;
        events += 1;

        let mut group: Option<Rc<Scope>> = None;
        for scripted in tests {
            let current = group.as_ref().map(|scope| scope.name.as_str());
            if current != scripted.group.as_deref() {
                if let Some(done) = group.take() {
                    bus.dispatch(LifecycleEvent::AfterGroup(&done))?;
                    events += 1;
                }
                if let Some(name) = &scripted.group {
                    let scope = Scope::group(self.id(), name.as_str(), Some(&root), None);
                    bus.dispatch(LifecycleEvent::BeforeGroup(&scope))?;
                    events += 1;
                    group = Some(scope);
                }
            }

            let parent = group.as_ref().unwrap_or(&root);
            let test = Test::new(self.id(), scripted.name.as_str(), Some(parent));
            if filter.is_some_and(|filter| !filter.matches(&test.name, &test.full_name())) {
                continue;
            }
            bus.dispatch(LifecycleEvent::BeforeTest(&test))?;
            bus.dispatch(LifecycleEvent::AfterTestResult(&test, &scripted.outcome))?;
            bus.dispatch(LifecycleEvent::AfterTest(&test))?;
            events += 3;
        }

        if let Some(done) = group.take() {
            bus.dispatch(LifecycleEvent::AfterGroup(&done))?;
            events += 1;
        }
        bus.dispatch(LifecycleEvent::AfterGroup(&root))?;
        events += 1;

        Ok(UnitRunSummary {
            events,
            status: UnitStatus::Completed,
        })
    }
}

/// Scratch directory with an output folder for compiled artifacts.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn output_folder(&self) -> PathBuf {
        self.dir.path().join("outputs")
    }

    pub fn history_path(&self) -> PathBuf {
        self.output_folder().join("test.json")
    }

    /// Create an empty artifact for `relative` (e.g. `a/B.class`).
    pub fn write_artifact(&self, relative: &str) -> PathBuf {
        let path = self.output_folder().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create artifact dir");
        }
        fs::write(&path, b"").expect("write artifact");
        path
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
