//! Case base: append-only JSON-lines file mirrored in memory
//!
//! One case per line, in commit order. Each case's `index` equals its line
//! position, so the file read in order is always a prefix of the in-memory
//! list. Opening with `continue_existing` reloads the file and rejects gaps
//! or reordering; opening without it truncates the file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::kdma::Case;

/// Case base errors
#[derive(Debug, thiserror::Error)]
pub enum CaseBaseError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("case base index gap: expected {expected}, found {found:?}")]
    Index { expected: usize, found: Option<usize> },
}

pub struct CaseBase {
    path: Option<PathBuf>,
    file: Option<File>,
    cases: Vec<Case>,
}

impl std::fmt::Debug for CaseBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseBase")
            .field("path", &self.path)
            .field("cases", &self.cases.len())
            .finish()
    }
}

fn parse_lines(raw: &str) -> Result<Vec<Case>, CaseBaseError> {
    let mut cases = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let case: Case = serde_json::from_str(line)
            .map_err(|e| CaseBaseError::Serialization(format!("line {}: {e}", line_no + 1)))?;
        if case.index != Some(cases.len()) {
            return Err(CaseBaseError::Index { expected: cases.len(), found: case.index });
        }
        cases.push(case);
    }
    Ok(cases)
}

impl CaseBase {
    /// Open the case base at `path`, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P, continue_existing: bool) -> Result<Self, CaseBaseError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CaseBaseError::Io(e.to_string()))?;
        }

        let cases = if continue_existing && path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| CaseBaseError::Io(e.to_string()))?;
            parse_lines(&raw)?
        } else {
            if path.exists() {
                debug!(path = %path.display(), "Starting fresh case base, truncating");
            }
            fs::write(&path, b"").map_err(|e| CaseBaseError::Io(e.to_string()))?;
            Vec::new()
        };

        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| CaseBaseError::Io(e.to_string()))?;

        info!(path = %path.display(), cases = cases.len(), "Case base loaded");
        Ok(Self { path: Some(path), file: Some(file), cases })
    }

    /// A case base with no backing file.
    pub const fn in_memory() -> Self {
        Self { path: None, file: None, cases: Vec::new() }
    }

    /// In-memory case base over existing cases, re-indexed in order.
    pub fn from_cases(cases: Vec<Case>) -> Self {
        let cases = cases
            .into_iter()
            .enumerate()
            .map(|(i, mut c)| {
                c.index = Some(i);
                c
            })
            .collect();
        Self { path: None, file: None, cases }
    }

    /// Assign the next index to `case`, append it to disk, and keep it.
    pub fn commit(&mut self, mut case: Case) -> Result<usize, CaseBaseError> {
        let index = self.cases.len();
        case.index = Some(index);
        if let Some(file) = self.file.as_mut() {
            let mut line =
                serde_json::to_string(&case).map_err(|e| CaseBaseError::Serialization(e.to_string()))?;
            line.push('\n');
            file.write_all(line.as_bytes())
                .and_then(|()| file.flush())
                .map_err(|e| CaseBaseError::Io(e.to_string()))?;
        }
        debug!(index, scene = %case.scene, action = %case.features.action_name, "Case committed");
        self.cases.push(case);
        Ok(index)
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn case(scene: &str) -> Case {
        Case { scene: scene.into(), ..Case::default() }
    }

    #[test]
    fn test_commit_assigns_dense_indices() {
        let dir = TempDir::new().unwrap();
        let mut base = CaseBase::open(dir.path().join("cases.jsonl"), true).unwrap();
        assert_eq!(base.commit(case("a")).unwrap(), 0);
        assert_eq!(base.commit(case("a")).unwrap(), 1);
        assert_eq!(base.cases()[1].index, Some(1));
    }

    #[test]
    fn test_reopen_continues() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/cases.jsonl");
        {
            let mut base = CaseBase::open(&path, true).unwrap();
            base.commit(case("a")).unwrap();
        }
        let mut base = CaseBase::open(&path, true).unwrap();
        assert_eq!(base.len(), 1);
        assert_eq!(base.commit(case("b")).unwrap(), 1);
    }

    #[test]
    fn test_fresh_open_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cases.jsonl");
        CaseBase::open(&path, true).unwrap().commit(case("a")).unwrap();
        let base = CaseBase::open(&path, false).unwrap();
        assert!(base.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_in_memory_has_no_file() {
        let mut base = CaseBase::in_memory();
        base.commit(case("a")).unwrap();
        assert!(base.path().is_none());
        assert_eq!(CaseBase::from_cases(vec![case("x"), case("y")]).cases()[1].index, Some(1));
    }
}
