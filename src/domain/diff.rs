// Output value objects: per-file diffs, captured failures, and the
// aggregated result of one processing run or batch.

use serde::{Deserialize, Serialize};

/// Before/after text for one rewritten file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub file: String,
    pub old: String,
    pub new: String,
}

impl FileDiff {
    pub fn new(file: &str, old: String, new: String) -> Self {
        FileDiff {
            file: file.to_string(),
            old,
            new,
        }
    }

    /// Number of lines that differ, for the run report.
    pub fn changed_lines(&self) -> usize {
        let old: Vec<&str> = self.old.lines().collect();
        let new: Vec<&str> = self.new.lines().collect();
        let shared = old.len().min(new.len());
        let mut changed = old.len().max(new.len()) - shared;
        for i in 0..shared {
            if old[i] != new[i] {
                changed += 1;
            }
        }
        changed
    }
}

/// An unrecoverable per-file or transport failure, captured and reported
/// instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemError {
    pub message: String,
    pub file: String,
    pub line: usize,
}

impl SystemError {
    pub fn new(message: &str, file: &str, line: usize) -> Self {
        SystemError {
            message: message.to_string(),
            file: file.to_string(),
            line,
        }
    }
}

/// Aggregated diffs and errors for a batch or a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub file_diffs: Vec<FileDiff>,
    pub system_errors: Vec<SystemError>,
}

impl ProcessResult {
    pub fn merge(&mut self, other: ProcessResult) {
        self.file_diffs.extend(other.file_diffs);
        self.system_errors.extend(other.system_errors);
    }
}
