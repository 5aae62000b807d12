//! Spectrum-based fault localization for Cargo projects.
//!
//! `culpar` instruments every executable statement of a production crate
//! with a probe that appends a statement identifier to a coverage sink,
//! runs each discovered test in an isolated subprocess, and ranks
//! statements by suspiciousness under the Tarantula, Ochiai, D*, Op2 and
//! Jaccard metrics.

pub mod coverage;
pub mod discovery;
pub mod error;
pub mod probe;
pub mod project;
pub mod ranker;
pub mod reporter;
pub mod rewriter;
pub mod runner;
pub mod types;
pub mod walk;

pub use error::CulparError;
pub use ranker::{default_metrics, rank, Metric, DEFAULT_PRIMARY};
pub use reporter::ReportFormat;
pub use runner::{CargoDriver, RunnerConfig, TestDriver};
pub use types::{CoverageMap, IdentifierMap, PassMap, RankedRow, Sid, TestCase};
