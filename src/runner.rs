//! Runner: build once, execute each test in a fresh subprocess, promote the
//! probe log into a per-test coverage file.
//!
//! Execution is strictly sequential. The temporary coverage file is a
//! singleton rendezvous between the instrumented program and the runner, so
//! promotion for test *T* always completes before test *T+1* starts.

use crate::coverage::coverage_file_name;
use crate::error::CulparError;
use crate::types::{PassMap, TestCase};
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Well-known name every probe writes to inside the coverage directory.
pub const TEMP_COVERAGE_FILE: &str = "__current.coverage.tmp";

/// Wall-clock budget per test before the subprocess is killed.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The two subprocesses the runner needs. Substituting another test
/// framework means implementing these two commands: `build_command` exits 0
/// on a successful build, `test_command` exits 0 iff the single filtered
/// test passed.
pub trait TestDriver {
    fn build_command(&self) -> Command;
    fn test_command(&self, test: &TestCase) -> Command;
}

/// Default driver: `cargo` against the test project manifest.
pub struct CargoDriver {
    pub manifest: PathBuf,
}

impl TestDriver for CargoDriver {
    fn build_command(&self) -> Command {
        let mut cmd = Command::new("cargo");
        cmd.args(["test", "--no-run", "--manifest-path"])
            .arg(&self.manifest);
        cmd
    }

    fn test_command(&self, test: &TestCase) -> Command {
        let mut cmd = Command::new("cargo");
        cmd.args(["test", "--quiet", "--manifest-path"])
            .arg(&self.manifest)
            .arg(&test.qualified)
            .args(["--", "--exact"]);
        cmd
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub coverage_dir: PathBuf,
    pub timeout: Duration,
    pub verbose: bool,
}

impl RunnerConfig {
    pub fn new(coverage_dir: impl Into<PathBuf>) -> Self {
        Self {
            coverage_dir: coverage_dir.into(),
            timeout: DEFAULT_TEST_TIMEOUT,
            verbose: false,
        }
    }

    /// Path the probes append to.
    pub fn temp_path(&self) -> PathBuf {
        self.coverage_dir.join(TEMP_COVERAGE_FILE)
    }
}

/// Delete everything in the coverage directory (best-effort) and make sure
/// it exists.
pub fn clear_coverage_dir(dir: &Path) {
    if dir.exists() {
        match fs::read_dir(dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_file() {
                        if let Err(e) = fs::remove_file(&path) {
                            warn!("could not remove {}: {e}", path.display());
                        }
                    }
                }
            }
            Err(e) => warn!("could not read {}: {e}", dir.display()),
        }
    }
    if let Err(e) = fs::create_dir_all(dir) {
        warn!("could not create {}: {e}", dir.display());
    }
}

fn wait_with_timeout(mut child: Child, timeout: Duration, name: &str) -> bool {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return status.success(),
            Ok(None) => {}
            Err(e) => {
                warn!("failed to poll test {name}: {e}");
                let _ = child.kill();
                let _ = child.wait();
                return false;
            }
        }
        if start.elapsed() >= timeout {
            warn!("test {name} exceeded {timeout:?}; killing and marking failed");
            let _ = child.kill();
            let _ = child.wait();
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Promote the temp coverage file to its per-test name. Returns `false`
/// only when the rename itself failed, which poisons the rendezvous for
/// every later test.
fn promote(temp: &Path, target: &Path, stem: &str) -> bool {
    if target.exists() {
        if let Err(e) = fs::remove_file(target) {
            warn!("could not remove stale {}: {e}", target.display());
        }
    }
    if temp.exists() {
        if let Err(e) = fs::rename(temp, target) {
            warn!("could not promote coverage for {stem}: {e}");
            return false;
        }
    } else {
        warn!("test {stem} produced no coverage");
    }
    true
}

/// Build once, then run every test in discovery order. On build failure the
/// run aborts with no pass/fail data; on promotion failure the remaining
/// tests are skipped and the data gathered so far is returned.
pub fn run_tests(
    driver: &dyn TestDriver,
    tests: &[TestCase],
    cfg: &RunnerConfig,
) -> anyhow::Result<PassMap> {
    clear_coverage_dir(&cfg.coverage_dir);

    info!("building test project");
    let output = driver
        .build_command()
        .output()
        .context("failed to invoke build subprocess")?;
    if !output.status.success() {
        eprint!("{}", String::from_utf8_lossy(&output.stderr));
        return Err(CulparError::BuildFailure {
            status: output.status,
        }
        .into());
    }
    if cfg.verbose {
        print!("{}", String::from_utf8_lossy(&output.stdout));
    }

    let temp = cfg.temp_path();
    let mut pass = PassMap::new();
    for test in tests {
        let stem = test.stem();
        info!("running {}", test.qualified);
        let mut cmd = driver.test_command(test);
        if cfg.verbose {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        let passed = match cmd.spawn() {
            Ok(child) => wait_with_timeout(child, cfg.timeout, &test.qualified),
            Err(e) => {
                warn!("failed to spawn test {}: {e}", test.qualified);
                false
            }
        };
        pass.insert(stem.clone(), passed);

        let target = cfg.coverage_dir.join(coverage_file_name(&stem));
        if !promote(&temp, &target, &stem) {
            warn!("skipping remaining tests; ranking will use partial data");
            let _ = fs::remove_file(&temp);
            break;
        }
        let _ = fs::remove_file(&temp);
    }
    Ok(pass)
}
