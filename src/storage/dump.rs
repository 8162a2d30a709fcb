//! Decision dump
//!
//! With `--dump`, every decision the session makes is appended as one JSON
//! record: the probe (with analyzer metrics), the candidate cases, and the
//! chosen decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::kdma::Case;
use crate::types::Probe;

use super::CaseBaseError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub dumped_at: DateTime<Utc>,
    pub scenario: String,
    pub probe: Probe,
    pub candidates: Vec<Case>,
    pub chosen: String,
    pub distance: f64,
}

pub struct DumpWriter {
    file: File,
    written: usize,
}

impl DumpWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, CaseBaseError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CaseBaseError::Io(e.to_string()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CaseBaseError::Io(e.to_string()))?;
        tracing::info!(path = %path.display(), "Dumping decisions");
        Ok(Self { file, written: 0 })
    }

    pub fn write(&mut self, record: &DecisionRecord) -> Result<(), CaseBaseError> {
        let mut line =
            serde_json::to_string(record).map_err(|e| CaseBaseError::Serialization(e.to_string()))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .map_err(|e| CaseBaseError::Io(e.to_string()))?;
        self.written += 1;
        Ok(())
    }

    pub const fn written(&self) -> usize {
        self.written
    }
}
