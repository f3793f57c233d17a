// Run orchestration: the per-file processing boundary, the sequential
// runner, and the aggregated report. The parallel path lives in api::server
// and funnels back into the same report.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::api::server::{self, ParallelSettings};
use crate::domain::diff::{FileDiff, ProcessResult, SystemError};
use crate::domain::resolver::TypeResolver;
use crate::domain::rules::{RuleCtx, RuleDispatcher, RuleRegistry};
use crate::domain::scope::RenameTable;
use crate::infrastructure::analyzer::{ClassIndex, IndexedAnalyzer};
use crate::infrastructure::config::Configuration;
use crate::infrastructure::loader;
use crate::infrastructure::memory;
use crate::infrastructure::parser::{ParseError, SynParser};
use crate::infrastructure::printer::SpanPrinter;
use crate::ports::{SourceParser, SourcePrinter};

pub struct RunOptions {
    pub configuration: Configuration,
    pub workspace: Option<String>,
    pub parallel: bool,
    pub dry_run: bool,
}

/// Everything one process needs to rewrite files: front end, printer,
/// index-backed analyzer, the validated rule set, and the run's rename
/// table. Workers build their own.
pub struct FileProcessor {
    parser: SynParser,
    printer: SpanPrinter,
    analyzer: IndexedAnalyzer,
    registry: RuleRegistry,
    renames: RenameTable,
    dry_run: bool,
    debug: bool,
}

impl FileProcessor {
    pub fn from_config(config: &Configuration, dry_run: bool) -> Result<Self> {
        // The index covers every configured path so cross-file facts are
        // available no matter how files are batched.
        let files = loader::resolve_paths(&config.paths, None)?;
        let sources = loader::read_sources(&files);
        let index = ClassIndex::build(&sources);
        Ok(FileProcessor {
            parser: SynParser,
            printer: SpanPrinter,
            analyzer: IndexedAnalyzer::new(index),
            registry: config.build_registry()?,
            renames: RenameTable::new(),
            dry_run,
            debug: config.debug,
        })
    }

    fn rewrite_source(&self, path: &str, source: &str) -> Result<Option<String>> {
        let mut root = self.parser.parse(path, source)?;
        let resolver = TypeResolver::new(&self.analyzer, &self.analyzer, &self.renames);
        let ctx = RuleCtx {
            resolver: &resolver,
            renames: &self.renames,
            target_version: self.registry.target_version(),
        };
        let dispatcher = RuleDispatcher::new(&self.registry, ctx);
        if !dispatcher.rewrite(&mut root)? {
            return Ok(None);
        }
        let printed = self.printer.print(source, &root);
        if printed == source {
            return Ok(None);
        }
        Ok(Some(printed))
    }

    pub fn process_file(&self, path: &str) -> Result<Option<FileDiff>> {
        if self.debug {
            println!("[Recast] processing {}", path);
        }
        let source =
            fs::read_to_string(path).with_context(|| format!("cannot read {}", path))?;
        match self.rewrite_source(path, &source)? {
            Some(new) => {
                if !self.dry_run {
                    fs::write(path, &new).with_context(|| format!("cannot write {}", path))?;
                }
                Ok(Some(FileDiff::new(path, source, new)))
            }
            None => Ok(None),
        }
    }

    /// The per-file boundary. A failing file - error or panic - becomes a
    /// SystemError and the batch keeps going.
    pub fn process_batch(&self, files: &[String]) -> ProcessResult {
        let mut result = ProcessResult::default();
        for file in files {
            match panic::catch_unwind(AssertUnwindSafe(|| self.process_file(file))) {
                Ok(Ok(Some(diff))) => result.file_diffs.push(diff),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => result.system_errors.push(file_error(file, &e)),
                Err(payload) => {
                    result
                        .system_errors
                        .push(SystemError::new(&panic_message(&payload), file, 0));
                }
            }
        }
        result
    }
}

fn file_error(file: &str, error: &anyhow::Error) -> SystemError {
    let line = error
        .downcast_ref::<ParseError>()
        .map(|p| p.line)
        .unwrap_or(0);
    SystemError::new(&format!("{:#}", error), file, line)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panic: {}", text)
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panic: {}", text)
    } else {
        "panic: unknown payload".to_string()
    }
}

pub fn run(options: RunOptions) -> Result<()> {
    let files = loader::resolve_paths(
        &options.configuration.paths,
        options.workspace.as_deref(),
    )?;
    if files.is_empty() {
        bail!("no source files found; configure paths or pass them on the command line");
    }
    let file_names: Vec<String> = files
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect();
    println!("[Recast] {} files to process", file_names.len());

    let result = if options.parallel {
        run_parallel(&options, file_names.clone())?
    } else {
        run_sequential(&options, &file_names)?
    };
    report(&result, file_names.len());
    Ok(())
}

fn run_sequential(options: &RunOptions, files: &[String]) -> Result<ProcessResult> {
    let processor = FileProcessor::from_config(&options.configuration, options.dry_run)?;
    let result = processor.process_batch(files);
    for error in &result.system_errors {
        eprintln!("[Recast] WARN: {} failed: {}", error.file, error.message);
    }
    Ok(result)
}

fn run_parallel(options: &RunOptions, files: Vec<String>) -> Result<ProcessResult> {
    let workers = options
        .configuration
        .workers
        .unwrap_or_else(memory::default_worker_count);
    let batch_size = options.configuration.batch_size.unwrap_or(16);
    // Workers re-read their configuration from a file; write the merged
    // one so command-line overrides reach them too.
    let config_path = write_forward_config(&options.configuration)?;
    let settings = ParallelSettings {
        workers,
        batch_size,
        config_path: config_path.clone(),
        dry_run: options.dry_run,
    };
    let outcome = server::run_parallel(files, &settings);
    let _ = fs::remove_file(&config_path);
    outcome
}

fn write_forward_config(config: &Configuration) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("recast-config-{}.json", std::process::id()));
    let text = serde_json::to_string_pretty(config).context("encoding forwarded config")?;
    fs::write(&path, text)
        .with_context(|| format!("cannot write forwarded config {}", path.display()))?;
    Ok(path)
}

fn report(result: &ProcessResult, total_files: usize) {
    for diff in &result.file_diffs {
        println!(
            "[Recast] {} ({} lines changed)",
            diff.file,
            diff.changed_lines()
        );
    }
    println!(
        "[Recast] done: {} files, {} changed, {} errors",
        total_files,
        result.file_diffs.len(),
        result.system_errors.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config_for(dir: &std::path::Path, rules: Vec<String>) -> Configuration {
        Configuration {
            paths: vec![dir.to_string_lossy().to_string()],
            rules,
            ..Configuration::default()
        }
    }

    #[test]
    fn test_failing_file_becomes_system_error_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.rs");
        let bad = dir.path().join("bad.rs");
        fs::write(&good, "fn fine() {}\n").unwrap();
        fs::write(&bad, "fn broken( {\n").unwrap();

        let config = config_for(dir.path(), vec![]);
        let processor = FileProcessor::from_config(&config, true).unwrap();
        let result = processor.process_batch(&[
            good.to_string_lossy().to_string(),
            bad.to_string_lossy().to_string(),
        ]);
        assert_eq!(result.system_errors.len(), 1);
        assert!(result.system_errors[0].file.ends_with("bad.rs"));
        assert!(result.system_errors[0].line >= 1);
    }

    #[test]
    fn test_unchanged_file_produces_no_diff() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.rs");
        fs::write(&file, "fn untouched() {}\n").unwrap();

        let config = config_for(
            dir.path(),
            vec!["simplify_if_else_same_content".to_string()],
        );
        let processor = FileProcessor::from_config(&config, true).unwrap();
        let result = processor.process_batch(&[file.to_string_lossy().to_string()]);
        assert!(result.file_diffs.is_empty());
        assert!(result.system_errors.is_empty());
    }

    #[test]
    fn test_dry_run_leaves_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.rs");
        let source = "fn pick() {\n    if flag {\n        done();\n    } else {\n        done();\n    }\n}\n";
        fs::write(&file, source).unwrap();

        let config = config_for(
            dir.path(),
            vec!["simplify_if_else_same_content".to_string()],
        );
        let processor = FileProcessor::from_config(&config, true).unwrap();
        let result = processor.process_batch(&[file.to_string_lossy().to_string()]);
        assert_eq!(result.file_diffs.len(), 1);
        assert_eq!(fs::read_to_string(&file).unwrap(), source);
    }
}
