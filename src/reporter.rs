//! Reporter: serialise ranked rows as CSV or Markdown, plus the console
//! summary.
//!
//! Numeric fields use six fractional digits in the invariant locale,
//! `Infinity` for infinite scores, and an empty field (CSV) or `-`
//! (Markdown) for undefined scores. Reports are written atomically via a
//! sibling temp file and rename.

use crate::error::CulparError;
use crate::types::RankedRow;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Metric columns in report order.
pub const METRIC_COLUMNS: &[&str] = &["Tarantula", "Ochiai", "DStar", "Op2", "Jaccard"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Markdown => "md",
        }
    }
}

/// `suspiciousness_report.{csv,md}` in the working directory.
pub fn default_report_path(format: ReportFormat) -> PathBuf {
    PathBuf::from(format!("suspiciousness_report.{}", format.extension()))
}

/// Truncate after ordering when a top-N filter is set.
pub fn apply_top(rows: &mut Vec<RankedRow>, top: Option<usize>) {
    if let Some(n) = top {
        rows.truncate(n);
    }
}

fn fmt_score(score: Option<f64>, undefined: &str) -> String {
    match score {
        Some(v) if v.is_infinite() => "Infinity".to_string(),
        Some(v) => format!("{v:.6}"),
        None => undefined.to_string(),
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn render_csv(rows: &[RankedRow]) -> String {
    let mut out = String::from("sid,file,line,snippet,Tarantula,Ochiai,DStar,Op2,Jaccard\n");
    for row in rows {
        let mut fields = vec![
            csv_field(&row.sid),
            csv_field(&row.site.file.display().to_string()),
            row.site.line.to_string(),
            csv_field(&row.site.snippet),
        ];
        for metric in METRIC_COLUMNS {
            fields.push(fmt_score(row.score(metric), ""));
        }
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

fn md_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

pub fn render_markdown(rows: &[RankedRow]) -> String {
    let mut out = String::from(
        "| sid | file | line | snippet | Tarantula | Ochiai | DStar | Op2 | Jaccard |\n\
         |---|---|---|---|---|---|---|---|---|\n",
    );
    for row in rows {
        let mut cells = vec![
            md_cell(&row.sid),
            md_cell(&row.site.file.display().to_string()),
            row.site.line.to_string(),
            md_cell(&row.site.snippet),
        ];
        for metric in METRIC_COLUMNS {
            cells.push(fmt_score(row.score(metric), "-"));
        }
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}

pub fn render(rows: &[RankedRow], format: ReportFormat) -> String {
    match format {
        ReportFormat::Csv => render_csv(rows),
        ReportFormat::Markdown => render_markdown(rows),
    }
}

/// Write-and-rename so a crash never leaves a truncated report behind.
pub fn write_report(path: &Path, content: &str) -> Result<(), CulparError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    let tmp = path.with_file_name(format!("{name}.tmp"));
    let result = fs::write(&tmp, content).and_then(|()| fs::rename(&tmp, path));
    result.map_err(|source| CulparError::ReportWrite {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the first `limit` rows to stdout with every metric.
pub fn print_summary(rows: &[RankedRow], limit: usize) {
    println!();
    println!(
        "{}",
        format!("Most suspicious statements (top {limit})").bold()
    );
    println!(
        "  {:>4}  {:>9} {:>9} {:>9} {:>9} {:>9}  location",
        "e_f", "Tarant.", "Ochiai", "DStar", "Op2", "Jaccard"
    );
    for row in rows.iter().take(limit) {
        let scores: Vec<String> = METRIC_COLUMNS
            .iter()
            .map(|m| format!("{:>9}", fmt_score(row.score(m), "-")))
            .collect();
        let location = row.site.display();
        let location = match row.score("Ochiai") {
            Some(s) if s > 0.8 => location.red().to_string(),
            Some(s) if s > 0.5 => location.yellow().to_string(),
            Some(_) => location,
            None => location.dimmed().to_string(),
        };
        println!("  {:>4}  {}  {}", row.counts.e_f, scores.join(" "), location);
    }
    if rows.len() > limit {
        println!("  {}", format!("... {} more rows", rows.len() - limit).dimmed());
    }
    println!();
}
