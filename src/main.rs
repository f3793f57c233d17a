// Command-line entry point for Recast.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use recast::application::{run, RunOptions};
use recast::infrastructure::config::Configuration;
use recast::infrastructure::worker::{run_worker, WorkerOptions};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Files or directories to process
    #[arg(required = false)]
    paths: Vec<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace Cargo.toml whose member crates are processed
    #[arg(long)]
    workspace: Option<String>,

    /// Rule names to enable, in dispatch order (overrides config)
    #[arg(short, long)]
    rule: Vec<String>,

    /// Distribute work across worker processes
    #[arg(long)]
    parallel: bool,

    /// Worker process count (default: half the cores)
    #[arg(long)]
    workers: Option<usize>,

    /// Files per batch handed to a worker
    #[arg(long)]
    batch_size: Option<usize>,

    /// Per-worker memory ceiling, e.g. "512M"
    #[arg(long)]
    memory_limit: Option<String>,

    /// Target language version gate, e.g. "1.70"
    #[arg(long)]
    target_version: Option<String>,

    /// Report changes without writing any file
    #[arg(long)]
    dry_run: bool,

    /// Echo each file path before processing
    #[arg(long)]
    debug: bool,

    /// Internal: run as a spawned worker process
    #[arg(long, hide = true)]
    worker: bool,

    /// Internal: coordinator port for worker mode
    #[arg(long, hide = true)]
    port: Option<u16>,

    /// Internal: worker identifier
    #[arg(long, hide = true)]
    identifier: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run_cli(cli) {
        eprintln!("[Recast] error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let mut configuration = match &cli.config {
        Some(path) => Configuration::load(path)?,
        None => Configuration::default(),
    };
    if !cli.paths.is_empty() {
        configuration.paths = cli.paths.clone();
    }
    if !cli.rule.is_empty() {
        configuration.rules = cli.rule.clone();
    }
    if cli.workers.is_some() {
        configuration.workers = cli.workers;
    }
    if cli.batch_size.is_some() {
        configuration.batch_size = cli.batch_size;
    }
    if cli.memory_limit.is_some() {
        configuration.memory_limit = cli.memory_limit.clone();
    }
    if cli.target_version.is_some() {
        configuration.target_version = cli.target_version.clone();
    }
    if cli.debug {
        configuration.debug = true;
    }

    if cli.worker {
        let port = cli.port.context("--worker requires --port")?;
        let identifier = cli
            .identifier
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));
        return run_worker(WorkerOptions {
            port,
            identifier,
            configuration,
            dry_run: cli.dry_run,
        });
    }

    run(RunOptions {
        configuration,
        workspace: cli.workspace,
        parallel: cli.parallel,
        dry_run: cli.dry_run,
    })
}
