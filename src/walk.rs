//! Source-tree walking shared by the rewriter and test discovery.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Build-output segments never descended into, matched case-insensitively.
const IGNORED_SEGMENTS: &[&str] = &["bin", "obj", "coverage", ".coverage", "target"];

/// Generated-file markers, matched case-insensitively anywhere in the name
/// (`Grammar.g.rs`, `Form.Designer.rs`).
const GENERATED_MARKERS: &[&str] = &[".g.", ".designer."];

fn is_ignored_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|n| IGNORED_SEGMENTS.iter().any(|s| n.eq_ignore_ascii_case(s)))
            .unwrap_or(false)
}

/// True for generated files that should never be touched or scanned.
pub fn is_generated(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    GENERATED_MARKERS.iter().any(|m| lower.contains(m))
}

/// All `.rs` files under `root` in deterministic (sorted) order, skipping
/// build output and generated files.
pub fn rust_sources(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().map(|x| x == "rs").unwrap_or(false))
        .filter(|e| e.file_name().to_str().map(|n| !is_generated(n)).unwrap_or(true))
        .map(DirEntry::into_path)
        .collect()
}
