//! Test run configuration stored in `testrun.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "testrun.toml";

/// Test run configuration (TOML).
///
/// Edited by humans; missing fields take their defaults and command-line flags
/// override whatever is set here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TestRunConfig {
    /// Spaces per indentation level in the console report.
    pub indent_width: usize,

    /// History file name, relative to the output folder.
    pub history_file: String,

    /// Toolchain identity recorded in the history. When unset the engine's
    /// `--version` output is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain_version: Option<String>,

    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine command; the unit's class name is appended per run.
    pub command: Vec<String>,

    /// Wall-clock budget for one unit, in seconds.
    pub unit_timeout_secs: u64,

    /// Engine stderr kept for diagnostics beyond this many bytes is dropped.
    pub stderr_limit_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: vec!["testrun-engine".to_string()],
            unit_timeout_secs: 10 * 60,
            stderr_limit_bytes: 100_000,
        }
    }
}

impl Default for TestRunConfig {
    fn default() -> Self {
        Self {
            indent_width: 2,
            history_file: "test.json".to_string(),
            toolchain_version: None,
            engine: EngineConfig::default(),
        }
    }
}

impl TestRunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.indent_width > 16 {
            return Err(anyhow!("indent_width must be <= 16"));
        }
        if self.history_file.trim().is_empty() {
            return Err(anyhow!("history_file must not be empty"));
        }
        if Path::new(&self.history_file).is_absolute() {
            return Err(anyhow!("history_file must be relative to the output folder"));
        }
        if self
            .toolchain_version
            .as_deref()
            .is_some_and(|version| version.trim().is_empty())
        {
            return Err(anyhow!("toolchain_version must not be blank"));
        }
        if self.engine.unit_timeout_secs == 0 {
            return Err(anyhow!("engine.unit_timeout_secs must be > 0"));
        }
        if self.engine.stderr_limit_bytes == 0 {
            return Err(anyhow!("engine.stderr_limit_bytes must be > 0"));
        }
        if self.engine.command.is_empty() || self.engine.command[0].trim().is_empty() {
            return Err(anyhow!("engine.command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TestRunConfig::default()`.
pub fn load_config(path: &Path) -> Result<TestRunConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = TestRunConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TestRunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &TestRunConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
