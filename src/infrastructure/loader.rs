// Source collection: individual files, recursive directory walks with
// target/.git pruning, and workspace-manifest member expansion.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    visit_dir(dir, &mut files);
    files.sort();
    files
}

fn visit_dir(dir: &Path, files: &mut Vec<PathBuf>) {
    if dir.ends_with("target") || dir.ends_with(".git") {
        return;
    }
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                visit_dir(&path, files);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
    }
}

/// Expands a workspace Cargo.toml into the member crates' src files.
pub fn collect_from_workspace(cargo_toml: &str) -> Result<Vec<PathBuf>> {
    let toml_content = fs::read_to_string(cargo_toml)
        .with_context(|| format!("cannot read workspace manifest {}", cargo_toml))?;
    let parsed: toml::Value = toml::from_str(&toml_content)
        .with_context(|| format!("invalid toml in {}", cargo_toml))?;
    let root = Path::new(cargo_toml)
        .parent()
        .context("workspace manifest has no parent directory")?;

    let members = parsed
        .get("workspace")
        .and_then(|w| w.get("members"))
        .and_then(|m| m.as_array())
        .with_context(|| format!("{} has no [workspace] members", cargo_toml))?;

    let mut files = Vec::new();
    for member in members {
        let member_path = member
            .as_str()
            .with_context(|| format!("non-string member in {}", cargo_toml))?;
        let src_dir = root.join(member_path).join("src");
        if src_dir.exists() {
            files.extend(collect_rs_files(&src_dir));
        }
    }
    Ok(files)
}

/// Resolves the configured paths (files and directories) to the full
/// ordered list of source files for a run.
pub fn resolve_paths(paths: &[String], workspace: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let path = Path::new(path);
        if path.is_dir() {
            files.extend(collect_rs_files(path));
        } else if path.exists() {
            files.push(path.to_path_buf());
        } else {
            anyhow::bail!("path not found: {}", path.display());
        }
    }
    if let Some(manifest) = workspace {
        files.extend(collect_from_workspace(manifest)?);
    }
    files.dedup();
    Ok(files)
}

/// Reads every file into (path, contents) pairs, skipping unreadable ones
/// with a warning the way the collection step always has.
pub fn read_sources(files: &[PathBuf]) -> Vec<(String, String)> {
    let mut sources = Vec::new();
    for file in files {
        match fs::read_to_string(file) {
            Ok(code) => sources.push((file.to_string_lossy().to_string(), code)),
            Err(e) => eprintln!("[Recast] WARN: cannot read {}: {}", file.display(), e),
        }
    }
    sources
}
