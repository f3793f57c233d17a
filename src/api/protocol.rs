// Line-delimited JSON wire protocol between the coordinator and its
// worker processes. One message per line, tagged on "action".

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::diff::{FileDiff, ProcessResult, SystemError};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum WireMessage {
    /// Worker introduces itself right after connecting.
    Hello { identifier: String },
    /// Coordinator hands a batch of file paths to one worker.
    Main { files: Vec<String> },
    /// Worker reports one processed batch.
    Result { result: BatchResult },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct BatchResult {
    pub file_diffs: Vec<FileDiff>,
    /// Number of files attempted, failures included.
    pub files_count: usize,
    pub system_errors: Vec<SystemError>,
    pub system_errors_count: usize,
}

impl BatchResult {
    pub fn from_processed(result: ProcessResult, files_count: usize) -> Self {
        BatchResult {
            files_count,
            system_errors_count: result.system_errors.len(),
            file_diffs: result.file_diffs,
            system_errors: result.system_errors,
        }
    }

    /// A transport failure: nothing was processed, one error explains why.
    pub fn transport_failure(error: SystemError) -> Self {
        BatchResult {
            file_diffs: Vec::new(),
            files_count: 0,
            system_errors: vec![error],
            system_errors_count: 1,
        }
    }
}

pub fn write_message<W: Write>(writer: &mut W, message: &WireMessage) -> Result<()> {
    let line = serde_json::to_string(message).context("encoding wire message")?;
    writer
        .write_all(line.as_bytes())
        .and_then(|_| writer.write_all(b"\n"))
        .and_then(|_| writer.flush())
        .context("writing wire message")?;
    Ok(())
}

/// Reads the next message; `None` means the peer closed the connection.
/// Blank lines are skipped.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Option<WireMessage>> {
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).context("reading wire message")?;
        if bytes_read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let message: WireMessage =
            serde_json::from_str(trimmed).context("decoding wire message")?;
        if let WireMessage::Main { files } = &message {
            if files.is_empty() {
                bail!("MAIN message with no files");
            }
        }
        return Ok(Some(message));
    }
}
