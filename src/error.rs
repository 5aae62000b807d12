//! Typed errors for the fatal, all-or-nothing failure paths.
//!
//! Per-item recoverable faults (a file that will not parse, a coverage file
//! that failed to promote) are logged with `tracing::warn!` at the site and
//! the run continues with partial data; only the kinds below abort.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CulparError {
    /// A path given on the command line does not exist.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// No Cargo package with the requested name under the solution dir.
    #[error("no package named `{name}` found under {root}")]
    ProjectNotFound { name: String, root: PathBuf },

    /// Two live probes carry the same statement identifier. Identifiers are
    /// process-global; a collision poisons every ranking, so we stop.
    #[error("duplicate statement identifier {sid} in {file}")]
    DuplicateSid { sid: String, file: PathBuf },

    /// The build subprocess exited non-zero; no report is emitted.
    #[error("build failed with {status}")]
    BuildFailure { status: std::process::ExitStatus },

    /// The report could not be written; nothing useful survives the run.
    #[error("failed to write report to {path}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
