//! Execution engine boundary and the external-process engine adapter.
//!
//! An engine runs one unit at a time and reports its lifecycle through the
//! [`EventBus`]. Problems on the engine side (a crash, a timeout, a malformed
//! event stream) end the unit early and are reported in the
//! [`UnitRunSummary`]; errors returned by subscribers are fatal and propagate.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::process::Command;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::core::events::{EventBus, LifecycleEvent};
use crate::core::failure::{Cause, ErrorId, ErrorNode, FailureRecord};
use crate::core::filter::TestFilter;
use crate::core::scope::{Scope, ScopeId, Test};
use crate::core::types::{Outcome, Skip, UnitId};
use crate::io::config::EngineConfig;
use crate::io::process::{LineStream, StreamExit, StreamItem, run_command_with_timeout};

/// How a unit run ended from the engine's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitStatus {
    Completed,
    /// The engine stopped before reporting the whole unit.
    Aborted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRunSummary {
    /// Lifecycle events dispatched for the unit.
    pub events: usize,
    pub status: UnitStatus,
}

pub trait ExecutionEngine {
    /// Identity of the toolchain the engine runs tests with.
    fn toolchain_version(&mut self) -> Result<String>;

    /// Run the tests of `unit` matching `filter`, dispatching lifecycle
    /// events as they happen.
    fn run_unit(
        &mut self,
        unit: &UnitId,
        filter: Option<&TestFilter>,
        bus: &mut EventBus<'_>,
    ) -> Result<UnitRunSummary>;
}

/// Runs each unit in a separate engine process that reports events as JSON
/// lines on stdout.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    command: Vec<String>,
    timeout: Duration,
    stderr_limit_bytes: usize,
    next_scope_id: u64,
}

impl CommandEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.unit_timeout_secs),
            stderr_limit_bytes: config.stderr_limit_bytes,
            next_scope_id: 0,
        }
    }

    fn base_command(&self) -> Result<Command> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("engine command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(args);
        Ok(cmd)
    }
}

impl ExecutionEngine for CommandEngine {
    #[instrument(skip_all)]
    fn toolchain_version(&mut self) -> Result<String> {
        let mut cmd = self.base_command()?;
        cmd.arg("--version");
        let output = run_command_with_timeout(cmd, self.timeout, self.stderr_limit_bytes)
            .context("query engine version")?;
        if output.timed_out || !output.status.success() {
            bail!(
                "engine --version failed ({:?}): {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or_default().trim();
        if version.is_empty() {
            bail!("engine --version printed nothing");
        }
        debug!(version, "engine toolchain version");
        Ok(version.to_string())
    }

    #[instrument(skip_all, fields(unit = %unit))]
    fn run_unit(
        &mut self,
        unit: &UnitId,
        filter: Option<&TestFilter>,
        bus: &mut EventBus<'_>,
    ) -> Result<UnitRunSummary> {
        let mut cmd = self.base_command()?;
        cmd.arg(unit.class_name());
        if let Some(filter) = filter {
            cmd.arg("--pattern").arg(filter.as_str());
        }
        let mut stream = match LineStream::spawn(cmd, self.timeout, self.stderr_limit_bytes) {
            Ok(stream) => stream,
            Err(err) => {
                let reason = format!("start engine: {err:#}");
                warn!(unit = %unit, reason = %reason, "engine aborted unit");
                return Ok(UnitRunSummary {
                    events: 0,
                    status: UnitStatus::Aborted { reason },
                });
            }
        };

        let mut tree = UnitTree::new(unit.clone(), self.next_scope_id);
        let mut events = 0usize;
        let aborted = loop {
            let line = match stream.next_line() {
                Ok(StreamItem::Line(line)) => line,
                Ok(StreamItem::Eof) => break None,
                Ok(StreamItem::TimedOut) => {
                    break Some(format!("timed out after {}s", self.timeout.as_secs()));
                }
                Err(err) => break Some(format!("{err:#}")),
            };
            if line.trim().is_empty() {
                continue;
            }
            let applied = serde_json::from_str::<WireEvent>(&line)
                .map_err(|err| protocol(format!("malformed event {line:?}: {err}")))
                .and_then(|event| tree.apply(event, bus));
            match applied {
                Ok(()) => events += 1,
                Err(err) if err.is::<ProtocolError>() => break Some(err.to_string()),
                Err(err) => {
                    self.next_scope_id = tree.next_id;
                    if let Err(kill_err) = stream.kill() {
                        debug!(err = %kill_err, "stop engine after subscriber error");
                    }
                    return Err(err);
                }
            }
        };
        self.next_scope_id = tree.next_id;

        let exit = match &aborted {
            Some(_) => stream.kill()?,
            None => stream.finish()?,
        };
        let status = unit_status(unit, aborted, &exit, events);
        Ok(UnitRunSummary { events, status })
    }
}

fn unit_status(unit: &UnitId, aborted: Option<String>, exit: &StreamExit, events: usize) -> UnitStatus {
    let stderr = String::from_utf8_lossy(&exit.stderr);
    if let Some(reason) = aborted {
        warn!(unit = %unit, reason = %reason, stderr = %stderr.trim(), "engine aborted unit");
        return UnitStatus::Aborted { reason };
    }
    if exit.timed_out {
        warn!(unit = %unit, "engine did not exit in time");
        return UnitStatus::Aborted {
            reason: "engine did not exit in time".to_string(),
        };
    }
    if !exit.status.success() {
        if events == 0 {
            let reason = format!("engine exited with {:?} before reporting", exit.status.code());
            warn!(unit = %unit, reason = %reason, stderr = %stderr.trim(), "engine aborted unit");
            return UnitStatus::Aborted { reason };
        }
        warn!(
            unit = %unit,
            exit_code = ?exit.status.code(),
            stderr = %stderr.trim(),
            "engine exited with nonzero status"
        );
    }
    UnitStatus::Completed
}

/// Malformed or inconsistent engine output.
#[derive(Debug)]
struct ProtocolError(String);

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine protocol error: {}", self.0)
    }
}

impl Error for ProtocolError {}

fn protocol(message: impl Into<String>) -> anyhow::Error {
    ProtocolError(message.into()).into()
}

/// One JSON line of the engine event stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum WireEvent {
    BeforeGroup {
        id: u64,
        #[serde(default)]
        parent: Option<u64>,
        name: String,
        #[serde(default)]
        skip: Option<Skip>,
    },
    BeforeTest {
        id: u64,
        parent: u64,
        name: String,
        #[serde(default)]
        skip: Option<Skip>,
    },
    Passed {
        id: u64,
    },
    Failed {
        id: u64,
        failure: WireFailure,
    },
    Skipped {
        id: u64,
        #[serde(default)]
        reason: Option<String>,
    },
    AfterTest {
        id: u64,
    },
    AfterGroup {
        id: u64,
    },
}

#[derive(Debug, Deserialize)]
struct WireFailure {
    #[serde(default)]
    root: usize,
    errors: Vec<WireError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireError {
    kind: String,
    #[serde(default)]
    message_lines: Vec<String>,
    #[serde(default)]
    stack_trace: Vec<String>,
    #[serde(default)]
    cause: Option<WireCause>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum WireCause {
    Single(usize),
    Aggregate(Vec<usize>),
}

impl WireFailure {
    fn into_record(self) -> Result<FailureRecord> {
        let errors = self
            .errors
            .into_iter()
            .map(|error| ErrorNode {
                kind: error.kind,
                message_lines: error.message_lines,
                stack_trace: error.stack_trace,
                cause: error.cause.map(|cause| match cause {
                    WireCause::Single(index) => Cause::Single(ErrorId::new(index)),
                    WireCause::Aggregate(indices) => {
                        Cause::Aggregate(indices.into_iter().map(ErrorId::new).collect())
                    }
                }),
            })
            .collect();
        FailureRecord::from_parts(errors, self.root).map_err(protocol)
    }
}

/// Scopes and tests of the unit being run, keyed by wire id.
struct UnitTree {
    unit: UnitId,
    root_seen: bool,
    scopes: HashMap<u64, Rc<Scope>>,
    tests: HashMap<u64, Test>,
    /// Tests that already received their result.
    reported: HashSet<u64>,
    /// Test started and not yet finished.
    running: Option<u64>,
    next_id: u64,
}

impl UnitTree {
    fn new(unit: UnitId, next_id: u64) -> Self {
        Self {
            unit,
            root_seen: false,
            scopes: HashMap::new(),
            tests: HashMap::new(),
            reported: HashSet::new(),
            running: None,
            next_id,
        }
    }

    fn fresh_id(&mut self) -> ScopeId {
        self.next_id += 1;
        ScopeId(self.next_id)
    }

    fn scope(&self, id: u64) -> Result<&Rc<Scope>> {
        self.scopes
            .get(&id)
            .ok_or_else(|| protocol(format!("unknown group id {id}")))
    }

    fn test(&self, id: u64) -> Result<&Test> {
        self.tests
            .get(&id)
            .ok_or_else(|| protocol(format!("unknown test id {id}")))
    }

    /// Test receiving a result; each test gets exactly one.
    fn result_target(&mut self, id: u64) -> Result<&Test> {
        if !self.tests.contains_key(&id) {
            return Err(protocol(format!("unknown test id {id}")));
        }
        if !self.reported.insert(id) {
            return Err(protocol(format!("second result for test id {id}")));
        }
        self.test(id)
    }

    fn apply(&mut self, event: WireEvent, bus: &mut EventBus<'_>) -> Result<()> {
        match event {
            WireEvent::BeforeGroup {
                id,
                parent,
                name,
                skip,
            } => {
                if self.scopes.contains_key(&id) || self.tests.contains_key(&id) {
                    return Err(protocol(format!("duplicate id {id}")));
                }
                let scope_id = self.fresh_id();
                let scope = match parent {
                    None if self.root_seen => {
                        return Err(protocol(format!("second root group {name:?}")));
                    }
                    None => {
                        self.root_seen = true;
                        Scope::unit(scope_id, self.unit.clone())
                    }
                    Some(parent) => {
                        let parent = self.scope(parent)?.clone();
                        Scope::group(scope_id, name, Some(&parent), skip)
                    }
                };
                self.scopes.insert(id, Rc::clone(&scope));
                bus.dispatch(LifecycleEvent::BeforeGroup(&scope))
            }
            WireEvent::BeforeTest {
                id,
                parent,
                name,
                skip,
            } => {
                if self.scopes.contains_key(&id) || self.tests.contains_key(&id) {
                    return Err(protocol(format!("duplicate id {id}")));
                }
                if let Some(running) = self.running {
                    return Err(protocol(format!(
                        "test id {id} started while test id {running} is running"
                    )));
                }
                let parent = self.scope(parent)?.clone();
                let mut test = Test::new(self.fresh_id(), name, Some(&parent));
                test.skip = skip;
                bus.dispatch(LifecycleEvent::BeforeTest(&test))?;
                self.tests.insert(id, test);
                self.running = Some(id);
                Ok(())
            }
            WireEvent::Passed { id } => {
                let test = self.result_target(id)?;
                bus.dispatch(LifecycleEvent::AfterTestResult(test, &Outcome::Passed))
            }
            WireEvent::Failed { id, failure } => {
                let failure = failure.into_record()?;
                let test = self.result_target(id)?;
                bus.dispatch(LifecycleEvent::AfterTestResult(
                    test,
                    &Outcome::Failed(failure),
                ))
            }
            WireEvent::Skipped { id, reason } => {
                let test = self.result_target(id)?;
                let reason = reason.or_else(|| {
                    test.skip
                        .as_ref()
                        .and_then(|skip| skip.reason().map(str::to_string))
                });
                bus.dispatch(LifecycleEvent::AfterTestResult(
                    test,
                    &Outcome::Skipped(reason),
                ))
            }
            WireEvent::AfterTest { id } => {
                let test = self
                    .tests
                    .remove(&id)
                    .ok_or_else(|| protocol(format!("unknown test id {id}")))?;
                self.reported.remove(&id);
                if self.running == Some(id) {
                    self.running = None;
                }
                bus.dispatch(LifecycleEvent::AfterTest(&test))
            }
            WireEvent::AfterGroup { id } => {
                let scope = self
                    .scopes
                    .remove(&id)
                    .ok_or_else(|| protocol(format!("unknown group id {id}")))?;
                bus.dispatch(LifecycleEvent::AfterGroup(&scope))
            }
        }
    }
}
