//! Compiled unit artifacts in the output folder.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::core::types::UnitId;

/// Source of the current modification timestamp of a unit's artifact.
pub trait ArtifactSource {
    /// `Ok(None)` when the artifact does not exist.
    fn last_modified(&self, unit: &UnitId) -> Result<Option<DateTime<Utc>>>;
}

/// Output folder holding compiled artifacts and the run history file.
#[derive(Debug, Clone)]
pub struct OutputFolder {
    root: PathBuf,
}

impl OutputFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact_path(&self, unit: &UnitId) -> PathBuf {
        unit.as_str()
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Every unit artifact under the folder, sorted by id.
    pub fn discover_units(&self) -> Result<Vec<UnitId>> {
        let mut units = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries =
                fs::read_dir(&dir).with_context(|| format!("read directory {}", dir.display()))?;
            for entry in entries {
                let entry = entry.with_context(|| format!("read directory {}", dir.display()))?;
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .with_context(|| format!("stat {}", path.display()))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let relative = relative.to_string_lossy();
                if !relative.ends_with(UnitId::EXTENSION) {
                    continue;
                }
                match UnitId::parse(&relative) {
                    Ok(unit) => units.push(unit),
                    Err(err) => warn!(path = %path.display(), err = %err, "skipping artifact"),
                }
            }
        }
        units.sort();
        debug!(root = %self.root.display(), count = units.len(), "discovered units");
        Ok(units)
    }
}

impl ArtifactSource for OutputFolder {
    fn last_modified(&self, unit: &UnitId) -> Result<Option<DateTime<Utc>>> {
        let path = self.artifact_path(unit);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("stat {}", path.display())),
        };
        let modified = metadata
            .modified()
            .with_context(|| format!("read modification time {}", path.display()))?;
        Ok(Some(DateTime::<Utc>::from(modified)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_nested_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let folder = OutputFolder::new(temp.path());
        fs::create_dir_all(temp.path().join("a").join("b")).expect("mkdir");
        fs::write(temp.path().join("a").join("B.class"), b"").expect("write");
        fs::write(temp.path().join("a").join("b").join("C.class"), b"").expect("write");
        fs::write(temp.path().join("test.json"), b"{}").expect("write");

        let units = folder.discover_units().expect("discover");
        let names: Vec<&str> = units.iter().map(UnitId::as_str).collect();
        assert_eq!(names, vec!["a/B.class", "a/b/C.class"]);
    }

    #[test]
    fn last_modified_of_missing_artifact_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let folder = OutputFolder::new(temp.path());
        let unit = UnitId::parse("a.Missing").expect("unit");
        assert_eq!(folder.last_modified(&unit).expect("stat"), None);
    }

    #[test]
    fn last_modified_is_stable_between_reads() {
        let temp = tempfile::tempdir().expect("tempdir");
        let folder = OutputFolder::new(temp.path());
        fs::write(temp.path().join("B.class"), b"").expect("write");
        let unit = UnitId::parse("B").expect("unit");
        let first = folder.last_modified(&unit).expect("stat");
        assert!(first.is_some());
        assert_eq!(folder.last_modified(&unit).expect("stat"), first);
    }
}
