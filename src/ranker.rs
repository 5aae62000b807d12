//! Ranker: suspiciousness scores over the coverage matrix and pass/fail
//! vector.
//!
//! Each metric is a formula object sharing the `(counts) -> Option<f64>`
//! contract, registered by name in [`default_metrics`]; adding a metric is
//! one struct and one registry line.
//!
//! A score of `None` means the metric is undefined for that statement,
//! which is distinct from zero. A statement executed by no failing test
//! (`e_f == 0`) is unscorable under every metric here; for `e_f > 0` a zero
//! denominator yields positive infinity (reachable only for D*).

use crate::types::{
    CoverageMap, IdentifierMap, PassMap, RankedRow, SpectrumCounts, StatementSite,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::warn;

/// Metric used for ordering unless the caller picks another.
pub const DEFAULT_PRIMARY: &str = "Ochiai";

/// One SBFL formula.
pub trait Metric {
    fn name(&self) -> &'static str;
    fn score(&self, c: SpectrumCounts) -> Option<f64>;
}

/// `(e_f/F) / (e_f/F + e_p/P)` where `F = e_f + n_f`, `P = e_p + n_p`.
/// With no passing tests the passing branch contributes 0, so a statement
/// covered only by the failing suite scores 1.0.
pub struct Tarantula;

impl Metric for Tarantula {
    fn name(&self) -> &'static str {
        "Tarantula"
    }

    fn score(&self, c: SpectrumCounts) -> Option<f64> {
        if c.e_f == 0 {
            return None;
        }
        let fail_ratio = c.e_f as f64 / (c.e_f + c.n_f) as f64;
        let pass_total = c.e_p + c.n_p;
        let pass_ratio = if pass_total == 0 {
            0.0
        } else {
            c.e_p as f64 / pass_total as f64
        };
        Some(fail_ratio / (fail_ratio + pass_ratio))
    }
}

/// `e_f / sqrt((e_f + n_f) * (e_f + e_p))`.
pub struct Ochiai;

impl Metric for Ochiai {
    fn name(&self) -> &'static str {
        "Ochiai"
    }

    fn score(&self, c: SpectrumCounts) -> Option<f64> {
        if c.e_f == 0 {
            return None;
        }
        let denom = (((c.e_f + c.n_f) * (c.e_f + c.e_p)) as f64).sqrt();
        Some(c.e_f as f64 / denom)
    }
}

/// `e_f^★ / (e_p + n_f)` with `★ = 2`. The one metric whose denominator
/// can reach zero with a positive numerator, hence infinity.
pub struct DStar {
    pub exponent: i32,
}

impl Metric for DStar {
    fn name(&self) -> &'static str {
        "DStar"
    }

    fn score(&self, c: SpectrumCounts) -> Option<f64> {
        if c.e_f == 0 {
            return None;
        }
        let num = (c.e_f as f64).powi(self.exponent);
        let den = (c.e_p + c.n_f) as f64;
        if den == 0.0 {
            Some(f64::INFINITY)
        } else {
            Some(num / den)
        }
    }
}

/// `e_f - e_p / (e_p + n_p + 1)`.
pub struct Op2;

impl Metric for Op2 {
    fn name(&self) -> &'static str {
        "Op2"
    }

    fn score(&self, c: SpectrumCounts) -> Option<f64> {
        if c.e_f == 0 {
            return None;
        }
        Some(c.e_f as f64 - c.e_p as f64 / (c.e_p + c.n_p + 1) as f64)
    }
}

/// `e_f / (e_f + n_f + e_p)`.
pub struct Jaccard;

impl Metric for Jaccard {
    fn name(&self) -> &'static str {
        "Jaccard"
    }

    fn score(&self, c: SpectrumCounts) -> Option<f64> {
        if c.e_f == 0 {
            return None;
        }
        Some(c.e_f as f64 / (c.e_f + c.n_f + c.e_p) as f64)
    }
}

/// The metric pipeline in report column order.
pub fn default_metrics() -> Vec<Box<dyn Metric>> {
    vec![
        Box::new(Tarantula),
        Box::new(Ochiai),
        Box::new(DStar { exponent: 2 }),
        Box::new(Op2),
        Box::new(Jaccard),
    ]
}

/// Count `e_f/e_p/n_f/n_p` for every sid appearing in any coverage set.
pub fn spectrum_counts(coverage: &CoverageMap, pass: &PassMap) -> BTreeMap<String, SpectrumCounts> {
    let total_failed = pass.values().filter(|p| !**p).count();
    let total_passed = pass.len() - total_failed;

    let mut counts: BTreeMap<String, SpectrumCounts> = BTreeMap::new();
    for (stem, sids) in coverage {
        let Some(&passed) = pass.get(stem) else {
            warn!("coverage for {stem} has no pass/fail outcome; ignored");
            continue;
        };
        for sid in sids {
            let c = counts.entry(sid.clone()).or_default();
            if passed {
                c.e_p += 1;
            } else {
                c.e_f += 1;
            }
        }
    }
    for c in counts.values_mut() {
        c.n_f = total_failed - c.e_f;
        c.n_p = total_passed - c.e_p;
    }
    counts
}

/// Descending on the score, undefined after every defined value.
fn cmp_score(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Total order: primary metric descending, then higher `e_f`, then sid.
pub fn sort_rows(rows: &mut [RankedRow], primary: &str) {
    rows.sort_by(|a, b| {
        cmp_score(a.score(primary), b.score(primary))
            .then_with(|| b.counts.e_f.cmp(&a.counts.e_f))
            .then_with(|| a.sid.cmp(&b.sid))
    });
}

/// Score and order every statement of the spectrum.
pub fn rank(
    coverage: &CoverageMap,
    pass: &PassMap,
    sites: &IdentifierMap,
    primary: &str,
) -> Vec<RankedRow> {
    let metrics = default_metrics();
    let mut rows: Vec<RankedRow> = spectrum_counts(coverage, pass)
        .into_iter()
        .map(|(sid, c)| {
            let site = sites.get(&sid).cloned().unwrap_or_else(|| {
                warn!("no source site recorded for {sid}");
                StatementSite {
                    file: "<unknown>".into(),
                    line: 0,
                    snippet: String::new(),
                }
            });
            let scores = metrics.iter().map(|m| (m.name(), m.score(c))).collect();
            RankedRow {
                sid,
                site,
                counts: c,
                scores,
            }
        })
        .collect();
    sort_rows(&mut rows, primary);
    rows
}
