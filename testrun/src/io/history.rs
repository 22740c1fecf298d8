//! Run history persisted as JSON in the output folder (`test.json`).
//!
//! Loading is lenient: a malformed field degrades to its default with a
//! warning instead of discarding the whole record. Only a file that is not
//! JSON at all is an error.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::history::{RunHistoryRecord, UnitHistoryEntry};
use crate::core::types::{TestCounts, UnitId};

const VERSION_KEY: &str = "toolchainVersion";
const LEGACY_VERSION_KEY: &str = "javaVersion";
const ENTRIES_KEY: &str = "classFiles";

/// Load the history record at `path`. A missing file yields an empty record.
pub fn load_history(path: &Path) -> Result<RunHistoryRecord> {
    debug!(path = %path.display(), "loading run history");
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no run history");
            return Ok(RunHistoryRecord::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read run history {}", path.display()));
        }
    };
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse run history {}", path.display()))?;
    let record = parse_history(&value)
        .with_context(|| format!("parse run history {}", path.display()))?;
    debug!(
        entries = record.len(),
        toolchain_version = ?record.toolchain_version,
        "run history loaded"
    );
    Ok(record)
}

/// Build a record from an already parsed JSON document.
pub fn parse_history(value: &Value) -> Result<RunHistoryRecord> {
    let root = value
        .as_object()
        .ok_or_else(|| anyhow!("run history must be a JSON object"))?;

    let toolchain_version = match root.get(VERSION_KEY).or_else(|| root.get(LEGACY_VERSION_KEY)) {
        None | Some(Value::Null) => None,
        Some(Value::String(version)) => Some(version.clone()),
        Some(other) => {
            warn!(value = %other, "ignoring malformed toolchain version");
            None
        }
    };

    let mut record = RunHistoryRecord::new(toolchain_version);
    match root.get(ENTRIES_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::Object(entries)) => {
            for (key, entry) in entries {
                if let Some(entry) = parse_entry(key, entry) {
                    record.insert(entry);
                }
            }
        }
        Some(other) => warn!(value = %other, "ignoring malformed {ENTRIES_KEY}"),
    }
    Ok(record)
}

fn parse_entry(key: &str, value: &Value) -> Option<UnitHistoryEntry> {
    let unit = match UnitId::parse(key) {
        Ok(unit) => unit,
        Err(err) => {
            warn!(key, err = %err, "dropping history entry with invalid path");
            return None;
        }
    };
    let Some(fields) = value.as_object() else {
        warn!(unit = %unit, "dropping history entry that is not an object");
        return None;
    };

    let last_modified = match fields.get("lastModified") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => match DateTime::parse_from_rfc3339(raw) {
            Ok(timestamp) => Some(timestamp.with_timezone(&Utc)),
            Err(err) => {
                warn!(unit = %unit, raw = %raw, err = %err, "ignoring malformed lastModified");
                None
            }
        },
        Some(other) => {
            warn!(unit = %unit, value = %other, "ignoring malformed lastModified");
            None
        }
    };

    let counts = TestCounts {
        passed: count_field(&unit, fields, "passedTestCount"),
        skipped: count_field(&unit, fields, "skippedTestCount"),
        failed: count_field(&unit, fields, "failedTestCount"),
    };
    Some(UnitHistoryEntry::new(unit, last_modified, counts))
}

fn count_field(unit: &UnitId, fields: &Map<String, Value>, name: &str) -> u32 {
    match fields.get(name) {
        None | Some(Value::Null) => 0,
        Some(value) => match value.as_u64().and_then(|count| u32::try_from(count).ok()) {
            Some(count) => count,
            None => {
                warn!(unit = %unit, field = name, value = %value, "ignoring malformed count");
                0
            }
        },
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryDocument<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    toolchain_version: Option<&'a str>,
    class_files: BTreeMap<&'a str, EntryDocument>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    passed_test_count: u32,
    skipped_test_count: u32,
    failed_test_count: u32,
}

/// Serialize `record` as pretty JSON with a trailing newline.
pub fn render_history(record: &RunHistoryRecord) -> Result<String> {
    let document = HistoryDocument {
        toolchain_version: record.toolchain_version.as_deref(),
        class_files: record
            .entries()
            .map(|entry| {
                (
                    entry.relative_path.as_str(),
                    EntryDocument {
                        last_modified: entry
                            .last_modified
                            .map(|timestamp| timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
                        passed_test_count: entry.passed_test_count,
                        skipped_test_count: entry.skipped_test_count,
                        failed_test_count: entry.failed_test_count,
                    },
                )
            })
            .collect(),
    };
    let mut buf = serde_json::to_string_pretty(&document).context("serialize run history")?;
    buf.push('\n');
    Ok(buf)
}

/// Atomically write the record to `path` (temp file + rename).
pub fn save_history(path: &Path, record: &RunHistoryRecord) -> Result<()> {
    debug!(path = %path.display(), entries = record.len(), "writing run history");
    let buf = render_history(record)?;
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("run history path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp run history {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace run history {}", path.display()))?;
    Ok(())
}
