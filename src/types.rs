//! Core data model shared across the localization pipeline.
//!
//! Everything here is plain data: the rewriter produces [`IdentifierMap`]
//! entries, discovery produces [`TestCase`]s, the runner produces a
//! [`PassMap`], the loader a [`CoverageMap`], and the ranker turns the lot
//! into [`RankedRow`]s.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Statement identifier: an opaque, stable string drawn once per
/// instrumented statement (lowercase hyphenated UUID-v4 text).
pub type Sid = String;

/// Where an instrumented statement lives, for report display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSite {
    /// Source file containing the probe.
    pub file: PathBuf,
    /// 1-based line of the annotated statement in the instrumented file.
    pub line: usize,
    /// Trimmed source text of the annotated statement.
    pub snippet: String,
}

impl StatementSite {
    /// `file:line snippet` rendering used by reports.
    pub fn display(&self) -> String {
        format!("{}:{} {}", self.file.display(), self.line, self.snippet)
    }
}

/// Map from `sid` to the statement it annotates. Rebuilt on every invocation
/// by scanning the surviving probe text, so there is exactly one entry per
/// live probe.
pub type IdentifierMap = BTreeMap<Sid, StatementSite>;

/// A discovered test function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TestCase {
    /// File the test was found in.
    pub file: PathBuf,
    /// Innermost container: impl type, inline module, or file stem.
    pub type_name: String,
    /// Function name.
    pub method: String,
    /// `::`-joined path used as the subprocess test filter and as the
    /// deduplication/sort key.
    pub qualified: String,
}

impl TestCase {
    /// Filename-safe key used to name coverage files and to key the
    /// pass/fail vector.
    pub fn stem(&self) -> String {
        format!("{}.{}", self.type_name, self.method)
    }
}

/// Pass/fail vector keyed by coverage stem; `true` means the test passed.
pub type PassMap = BTreeMap<String, bool>;

/// Coverage matrix: stem to the set of sids that test exercised.
pub type CoverageMap = BTreeMap<String, BTreeSet<Sid>>;

/// Execution counts for one sid over the whole spectrum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectrumCounts {
    /// Failed tests that exercised the statement.
    pub e_f: usize,
    /// Passed tests that exercised the statement.
    pub e_p: usize,
    /// Failed tests that did not.
    pub n_f: usize,
    /// Passed tests that did not.
    pub n_p: usize,
}

/// One ranked report row: a statement plus its score under every metric.
/// `None` means the metric is undefined there, which is distinct from zero
/// and rendered as `-` (Markdown) or an empty field (CSV).
#[derive(Debug, Clone, Serialize)]
pub struct RankedRow {
    pub sid: Sid,
    pub site: StatementSite,
    pub counts: SpectrumCounts,
    pub scores: BTreeMap<&'static str, Option<f64>>,
}

impl RankedRow {
    /// Score under the named metric; absent metrics count as undefined.
    pub fn score(&self, metric: &str) -> Option<f64> {
        self.scores.get(metric).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_joins_type_and_method() {
        let t = TestCase {
            file: PathBuf::from("tests/math.rs"),
            type_name: "math".into(),
            method: "test_add".into(),
            qualified: "test_add".into(),
        };
        assert_eq!(t.stem(), "math.test_add");
    }

    #[test]
    fn test_site_display() {
        let site = StatementSite {
            file: PathBuf::from("src/lib.rs"),
            line: 42,
            snippet: "let x = 5;".into(),
        };
        assert_eq!(site.display(), "src/lib.rs:42 let x = 5;");
    }

    #[test]
    fn test_row_score_missing_metric_is_undefined() {
        let row = RankedRow {
            sid: "a".into(),
            site: StatementSite {
                file: PathBuf::from("src/lib.rs"),
                line: 1,
                snippet: String::new(),
            },
            counts: SpectrumCounts::default(),
            scores: BTreeMap::new(),
        };
        assert_eq!(row.score("Ochiai"), None);
    }
}
