//! Locate Cargo packages by name under the solution directory.
//!
//! The platform equivalent of hunting for `<name>.csproj`: the first
//! `Cargo.toml` (deterministic sorted walk) whose `[package] name` matches
//! wins.

use crate::error::CulparError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// `[package] name` from a manifest, if it parses and has one.
pub fn package_name(manifest: &Path) -> Option<String> {
    let content = fs::read_to_string(manifest).ok()?;
    let value: toml::Value = content.parse().ok()?;
    value
        .get("package")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// Find the manifest of the package called `name` under `solution_dir`.
pub fn resolve_project(solution_dir: &Path, name: &str) -> Result<PathBuf, CulparError> {
    let walker = WalkDir::new(solution_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !(e.file_type().is_dir() && e.file_name() == "target"));
    for entry in walker.flatten() {
        if entry.file_type().is_file() && entry.file_name() == "Cargo.toml" {
            if let Some(found) = package_name(entry.path()) {
                if found == name {
                    debug!("resolved {name} to {}", entry.path().display());
                    return Ok(entry.into_path());
                }
            }
        }
    }
    Err(CulparError::ProjectNotFound {
        name: name.to_string(),
        root: solution_dir.to_path_buf(),
    })
}

/// Directory the package lives in.
pub fn project_dir(manifest: &Path) -> PathBuf {
    manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// The tree the rewriter operates on: the package's `src` directory when it
/// exists, else the whole package directory.
pub fn source_root(manifest: &Path) -> PathBuf {
    let dir = project_dir(manifest);
    let src = dir.join("src");
    if src.is_dir() {
        src
    } else {
        dir
    }
}
