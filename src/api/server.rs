// Parallel coordinator: binds an ephemeral local port, spawns worker
// processes, and hands out file batches over one thread per connection.
// RESULTs funnel through a channel into the buffer this thread owns.

use std::collections::VecDeque;
use std::io::{BufReader, ErrorKind};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::api::protocol::{read_message, write_message, BatchResult, WireMessage};
use crate::domain::diff::{ProcessResult, SystemError};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub struct ParallelSettings {
    pub workers: usize,
    pub batch_size: usize,
    /// Forwarded configuration file each worker loads at startup.
    pub config_path: PathBuf,
    pub dry_run: bool,
}

pub fn run_parallel(files: Vec<String>, settings: &ParallelSettings) -> Result<ProcessResult> {
    if settings.workers == 0 || settings.batch_size == 0 {
        bail!("workers and batch size must be positive");
    }
    let listener =
        TcpListener::bind("127.0.0.1:0").context("binding coordinator listener")?;
    let port = listener.local_addr().context("reading listener address")?.port();
    println!(
        "[Recast] coordinator on 127.0.0.1:{} ({} workers)",
        port, settings.workers
    );

    let batches: VecDeque<Vec<String>> = files
        .chunks(settings.batch_size)
        .map(|chunk| chunk.to_vec())
        .collect();
    let queue = Arc::new(Mutex::new(batches));

    let mut children: Vec<Option<Child>> = spawn_workers(port, settings)?
        .into_iter()
        .map(Some)
        .collect();

    let (tx, rx) = mpsc::channel::<BatchResult>();
    let mut startup_errors = Vec::new();
    let handles = accept_workers(
        &listener,
        &mut children,
        &queue,
        &tx,
        settings.workers,
        &mut startup_errors,
    )?;
    drop(tx);

    // Aggregation buffer is owned here; handler threads only send.
    let mut aggregate = ProcessResult::default();
    aggregate.system_errors.extend(startup_errors);
    for batch in rx {
        aggregate.file_diffs.extend(batch.file_diffs);
        aggregate.system_errors.extend(batch.system_errors);
    }

    for handle in handles {
        if handle.join().is_err() {
            aggregate
                .system_errors
                .push(SystemError::new("worker handler thread panicked", "", 0));
        }
    }
    // Resets any connection still sitting in the backlog so its worker's
    // next read fails and the process exits instead of blocking reap.
    drop(listener);
    reap(&mut children, &mut aggregate);
    Ok(aggregate)
}

fn spawn_workers(port: u16, settings: &ParallelSettings) -> Result<Vec<Child>> {
    let exe = std::env::current_exe().context("locating own executable")?;
    let mut children = Vec::with_capacity(settings.workers);
    for i in 0..settings.workers {
        let mut command = Command::new(&exe);
        command
            .arg("--worker")
            .arg("--port")
            .arg(port.to_string())
            .arg("--identifier")
            .arg(format!("worker-{}", i))
            .arg("--config")
            .arg(&settings.config_path);
        if settings.dry_run {
            command.arg("--dry-run");
        }
        let child = command
            .spawn()
            .with_context(|| format!("spawning worker {}", i))?;
        children.push(child);
    }
    Ok(children)
}

/// Accepts one connection per live worker. The listener is polled rather
/// than blocked on: a worker that dies before connecting is recorded as a
/// startup failure and no longer waited for, so the run cannot hang on a
/// connection that will never arrive.
fn accept_workers(
    listener: &TcpListener,
    children: &mut [Option<Child>],
    queue: &Arc<Mutex<VecDeque<Vec<String>>>>,
    tx: &Sender<BatchResult>,
    workers: usize,
    errors: &mut Vec<SystemError>,
) -> Result<Vec<thread::JoinHandle<()>>> {
    listener
        .set_nonblocking(true)
        .context("configuring coordinator listener")?;
    let mut expected = workers;
    let mut handles = Vec::with_capacity(workers);
    while handles.len() < expected {
        match listener.accept() {
            Ok((stream, _)) => {
                stream
                    .set_nonblocking(false)
                    .context("configuring worker stream")?;
                let queue = Arc::clone(queue);
                let tx = tx.clone();
                handles.push(thread::spawn(move || serve_worker(stream, queue, tx)));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                expected = expected.saturating_sub(reap_startup_failures(children, errors));
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => return Err(e).context("accepting worker connection"),
        }
    }
    Ok(handles)
}

/// Collects workers that already exited nonzero, returning how many were
/// removed. Cleanly-exited workers are left for the final reap.
fn reap_startup_failures(children: &mut [Option<Child>], errors: &mut Vec<SystemError>) -> usize {
    let mut removed = 0;
    for slot in children.iter_mut() {
        let status = match slot {
            Some(child) => match child.try_wait() {
                Ok(Some(status)) if !status.success() => status,
                _ => continue,
            },
            None => continue,
        };
        errors.push(SystemError::new(
            &format!("worker process exited with {} before completing its batches", status),
            "",
            0,
        ));
        removed += 1;
        *slot = None;
    }
    removed
}

/// One connection, one thread. A failed connection reports a transport
/// failure and is never reused.
fn serve_worker(
    stream: TcpStream,
    queue: Arc<Mutex<VecDeque<Vec<String>>>>,
    tx: Sender<BatchResult>,
) {
    if let Err(e) = worker_loop(stream, queue, &tx) {
        let failure = BatchResult::transport_failure(SystemError::new(
            &format!("worker connection failed: {:#}", e),
            "",
            0,
        ));
        let _ = tx.send(failure);
    }
}

fn worker_loop(
    mut stream: TcpStream,
    queue: Arc<Mutex<VecDeque<Vec<String>>>>,
    tx: &Sender<BatchResult>,
) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone().context("cloning worker stream")?);
    match read_message(&mut reader)? {
        Some(WireMessage::Hello { identifier }) => {
            println!("[Recast] {} connected", identifier);
        }
        other => bail!("expected HELLO, got {:?}", other),
    }

    loop {
        let batch = {
            let mut locked = queue
                .lock()
                .map_err(|_| anyhow::anyhow!("batch queue poisoned"))?;
            locked.pop_front()
        };
        let files = match batch {
            Some(files) => files,
            // Queue drained: dropping the stream tells the worker to stop.
            None => return Ok(()),
        };
        write_message(&mut stream, &WireMessage::Main { files })?;
        match read_message(&mut reader)? {
            Some(WireMessage::Result { result }) => {
                tx.send(result).context("aggregation channel closed")?;
            }
            other => bail!("expected RESULT, got {:?}", other),
        }
    }
}

fn reap(children: &mut [Option<Child>], aggregate: &mut ProcessResult) {
    for child in children.iter_mut().flatten() {
        match child.wait() {
            Ok(status) if !status.success() => {
                aggregate.system_errors.push(SystemError::new(
                    &format!("worker process exited with {}", status),
                    "",
                    0,
                ));
            }
            Ok(_) => {}
            Err(e) => {
                aggregate.system_errors.push(SystemError::new(
                    &format!("failed waiting for worker: {}", e),
                    "",
                    0,
                ));
            }
        }
    }
}
