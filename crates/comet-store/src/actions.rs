use crate::error::Result;
use comet::v1::{Action, ActionName};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

/// One line of the action log: the action without its notebook, plus the
/// cell positions it changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub t: i64,
    pub name: ActionName,
    pub index: usize,
    #[serde(default)]
    pub indices: Vec<usize>,
    #[serde(default)]
    pub changed: Vec<usize>,
}

impl ActionRecord {
    pub fn new(action: &Action, changed: Vec<usize>) -> Self {
        Self {
            t: action.timestamp,
            name: action.name.clone(),
            index: action.selected_index,
            indices: action.selected_indices.clone(),
            changed,
        }
    }
}

/// Append-only JSONL log of a notebook's actions.
#[derive(Debug, Clone)]
pub struct ActionLog {
    path: PathBuf,
}

impl ActionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, record: &ActionRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// All records in log order. Blank lines are skipped; lines that fail to
    /// parse are logged and skipped.
    pub fn read(&self) -> Result<Vec<ActionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ActionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_num + 1,
                        error = %e,
                        "skipping unreadable action record"
                    );
                }
            }
        }
        Ok(records)
    }
}
