//! Shared deterministic types for testrun core logic.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::failure::FailureRecord;

/// Identifier of a compilation unit: the normalized, non-rooted path of its
/// compiled artifact relative to the output folder (e.g. `a/B.class`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId(String);

impl UnitId {
    /// File extension of compiled unit artifacts.
    pub const EXTENSION: &'static str = ".class";

    /// Parse either a relative artifact path (`a/B.class`, `a\B.class`) or a
    /// full class name (`a.B`).
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("unit id must not be empty".to_string());
        }
        let path = if raw.ends_with(Self::EXTENSION) {
            raw.replace('\\', "/")
        } else {
            format!("{}{}", raw.replace('.', "/"), Self::EXTENSION)
        };
        if path.starts_with('/') || has_drive_prefix(&path) {
            return Err(format!("unit id must be a relative path: {raw}"));
        }

        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Err(format!("unit id must not leave the output folder: {raw}")),
                other => segments.push(other),
            }
        }
        let normalized = segments.join("/");
        if normalized.len() <= Self::EXTENSION.len() || normalized.ends_with(&format!("/{}", Self::EXTENSION)) {
            return Err(format!("unit id has no class name: {raw}"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full class name (`a/B.class` -> `a.B`).
    pub fn class_name(&self) -> String {
        self.0
            .strip_suffix(Self::EXTENSION)
            .unwrap_or(&self.0)
            .replace('/', ".")
    }
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UnitId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UnitId> for String {
    fn from(value: UnitId) -> Self {
        value.0
    }
}

/// Code coverage collection mode requested for the invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coverage {
    #[default]
    None,
    Sources,
    Tests,
    All,
}

impl FromStr for Coverage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Coverage::None),
            "sources" => Ok(Coverage::Sources),
            "tests" => Ok(Coverage::Tests),
            "all" => Ok(Coverage::All),
            other => Err(format!(
                "unknown coverage mode '{other}' (expected none, sources, tests or all)"
            )),
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Coverage::None => "None",
            Coverage::Sources => "Sources",
            Coverage::Tests => "Tests",
            Coverage::All => "All",
        };
        f.write_str(name)
    }
}

/// Skip marker attached to a scope or test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skip {
    #[serde(default)]
    pub reason: Option<String>,
}

impl Skip {
    pub fn because(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    /// Reason text, or `None` when absent or blank.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref().filter(|reason| !reason.is_empty())
    }
}

/// Passed/skipped/failed tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounts {
    pub passed: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl TestCounts {
    pub fn finished(&self) -> u32 {
        self.passed + self.skipped + self.failed
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Result of a single test reported by the execution engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(FailureRecord),
    Skipped(Option<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_class_name_and_path_agree() {
        let from_name = UnitId::parse("a.b.C").expect("class name");
        let from_path = UnitId::parse("a/b/C.class").expect("path");
        let from_windows = UnitId::parse("a\\b\\C.class").expect("windows path");
        assert_eq!(from_name, from_path);
        assert_eq!(from_path, from_windows);
        assert_eq!(from_name.as_str(), "a/b/C.class");
        assert_eq!(from_name.class_name(), "a.b.C");
    }

    #[test]
    fn parse_normalizes_current_dir_segments() {
        let unit = UnitId::parse("./a//B.class").expect("parse");
        assert_eq!(unit.as_str(), "a/B.class");
    }

    #[test]
    fn parse_rejects_rooted_and_escaping_paths() {
        assert!(UnitId::parse("/a/B.class").is_err());
        assert!(UnitId::parse("C:\\a\\B.class").is_err());
        assert!(UnitId::parse("../B.class").is_err());
        assert!(UnitId::parse("").is_err());
        assert!(UnitId::parse("a/.class").is_err());
    }

    #[test]
    fn coverage_parses_case_insensitively() {
        assert_eq!("Sources".parse::<Coverage>(), Ok(Coverage::Sources));
        assert_eq!("all".parse::<Coverage>(), Ok(Coverage::All));
        assert!("some".parse::<Coverage>().is_err());
    }

    #[test]
    fn skip_reason_ignores_blank_text() {
        assert_eq!(Skip::because("").reason(), None);
        assert_eq!(Skip::because("slow").reason(), Some("slow"));
        assert_eq!(Skip::default().reason(), None);
    }

    #[test]
    fn counts_record_each_outcome_once() {
        let mut counts = TestCounts::default();
        counts.record(&Outcome::Passed);
        counts.record(&Outcome::Skipped(None));
        counts.record(&Outcome::Passed);
        assert_eq!(
            counts,
            TestCounts {
                passed: 2,
                skipped: 1,
                failed: 0
            }
        );
        assert_eq!(counts.finished(), 3);
    }
}
