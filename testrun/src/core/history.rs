//! In-memory run history: what each unit did the last time it was executed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::core::types::{TestCounts, UnitId};

/// Last known outcome of one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHistoryEntry {
    /// Artifact path relative to the output folder; equals the record key.
    pub relative_path: UnitId,
    /// Artifact timestamp when the unit was last executed.
    pub last_modified: Option<DateTime<Utc>>,
    pub passed_test_count: u32,
    pub skipped_test_count: u32,
    pub failed_test_count: u32,
}

impl UnitHistoryEntry {
    pub fn new(
        relative_path: UnitId,
        last_modified: Option<DateTime<Utc>>,
        counts: TestCounts,
    ) -> Self {
        Self {
            relative_path,
            last_modified,
            passed_test_count: counts.passed,
            skipped_test_count: counts.skipped,
            failed_test_count: counts.failed,
        }
    }

    pub fn counts(&self) -> TestCounts {
        TestCounts {
            passed: self.passed_test_count,
            skipped: self.skipped_test_count,
            failed: self.failed_test_count,
        }
    }
}

/// Persisted history of a previous invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunHistoryRecord {
    /// Toolchain that produced the record; `None` when unknown or never run.
    pub toolchain_version: Option<String>,
    entries: BTreeMap<UnitId, UnitHistoryEntry>,
}

impl RunHistoryRecord {
    pub fn new(toolchain_version: Option<String>) -> Self {
        Self {
            toolchain_version,
            entries: BTreeMap::new(),
        }
    }

    /// Insert an entry under its own path, replacing any previous one.
    pub fn insert(&mut self, entry: UnitHistoryEntry) {
        self.entries.insert(entry.relative_path.clone(), entry);
    }

    pub fn entry(&self, unit: &UnitId) -> Option<&UnitHistoryEntry> {
        self.entries.get(unit)
    }

    pub fn entries(&self) -> impl Iterator<Item = &UnitHistoryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Entries collected during an invocation: carried over from skipped units and
/// freshly produced by executed ones. Fresh entries win.
#[derive(Debug, Default)]
pub struct HistoryLedger {
    carried: BTreeMap<UnitId, UnitHistoryEntry>,
    fresh: BTreeMap<UnitId, UnitHistoryEntry>,
}

impl HistoryLedger {
    pub fn carry(&mut self, entry: UnitHistoryEntry) {
        self.carried.insert(entry.relative_path.clone(), entry);
    }

    pub fn record_fresh(&mut self, entry: UnitHistoryEntry) {
        self.fresh.insert(entry.relative_path.clone(), entry);
    }

    pub fn carried_len(&self) -> usize {
        self.carried.len()
    }

    pub fn fresh_len(&self) -> usize {
        self.fresh.len()
    }

    /// Merge into the record to persist for the next invocation.
    pub fn into_record(self, toolchain_version: &str) -> RunHistoryRecord {
        let mut record = RunHistoryRecord::new(Some(toolchain_version.to_string()));
        for entry in self.carried.into_values() {
            record.insert(entry);
        }
        for entry in self.fresh.into_values() {
            record.insert(entry);
        }
        record
    }
}
