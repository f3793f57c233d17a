// Worker process side of the parallel protocol: connect, introduce, then
// process batches until the coordinator closes the connection.

use std::io::{BufReader, Write};
use std::net::TcpStream;

use anyhow::{bail, Context, Result};

use crate::api::protocol::{read_message, write_message, BatchResult, WireMessage};
use crate::application::FileProcessor;
use crate::domain::diff::SystemError;
use crate::infrastructure::config::Configuration;
use crate::infrastructure::memory;

/// Explicit lifecycle; transitions happen only in `run_worker`'s loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Connecting,
    HelloSent,
    Ready,
    Processing,
    Reporting,
    Closed,
    Error,
}

pub struct WorkerOptions {
    pub port: u16,
    pub identifier: String,
    pub configuration: Configuration,
    pub dry_run: bool,
}

pub fn run_worker(options: WorkerOptions) -> Result<()> {
    if let Some(limit) = &options.configuration.memory_limit {
        let bytes = memory::parse_memory_limit(limit)?;
        memory::apply_memory_limit(bytes)?;
    }
    let processor = FileProcessor::from_config(&options.configuration, options.dry_run)?;

    let mut state = WorkerState::Idle;
    let result = drive(&options, &processor, &mut state);
    if result.is_err() {
        state = WorkerState::Error;
    }
    match state {
        WorkerState::Closed => Ok(()),
        _ => result,
    }
}

fn drive(
    options: &WorkerOptions,
    processor: &FileProcessor,
    state: &mut WorkerState,
) -> Result<()> {
    *state = WorkerState::Connecting;
    let mut stream = TcpStream::connect(("127.0.0.1", options.port))
        .with_context(|| format!("worker cannot reach coordinator on port {}", options.port))?;
    let mut reader = BufReader::new(stream.try_clone().context("cloning worker stream")?);

    write_message(
        &mut stream,
        &WireMessage::Hello {
            identifier: options.identifier.clone(),
        },
    )?;
    *state = WorkerState::HelloSent;

    loop {
        let message = match read_message(&mut reader) {
            Ok(message) => {
                // First traffic from the coordinator confirms the handshake.
                if *state == WorkerState::HelloSent {
                    *state = WorkerState::Ready;
                }
                message
            }
            Err(e) => {
                // Decode failures are transport failures: report once with
                // nothing processed, then close. No retry.
                report_transport_failure(&mut stream, &options.identifier, &e);
                *state = WorkerState::Closed;
                return Err(e);
            }
        };
        match message {
            None => {
                *state = WorkerState::Closed;
                return Ok(());
            }
            Some(WireMessage::Main { files }) => {
                *state = WorkerState::Processing;
                let processed = processor.process_batch(&files);
                let batch = BatchResult::from_processed(processed, files.len());
                *state = WorkerState::Reporting;
                write_message(&mut stream, &WireMessage::Result { result: batch })?;
                *state = WorkerState::Ready;
            }
            Some(other) => {
                bail!("unexpected message in worker: {:?}", other);
            }
        }
    }
}

fn report_transport_failure(stream: &mut (impl Write), identifier: &str, error: &anyhow::Error) {
    let batch = BatchResult::transport_failure(SystemError::new(
        &format!("worker {} transport failure: {:#}", identifier, error),
        "",
        0,
    ));
    // Best effort: the connection may already be gone.
    let _ = write_message(stream, &WireMessage::Result { result: batch });
}
