use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use culpar::error::CulparError;
use culpar::reporter::ReportFormat;
use culpar::runner::{CargoDriver, RunnerConfig};
use culpar::{coverage, discovery, project, ranker, reporter, rewriter, runner};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormatArg {
    Csv,
    #[value(alias = "md")]
    Markdown,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(arg: ReportFormatArg) -> Self {
        match arg {
            ReportFormatArg::Csv => ReportFormat::Csv,
            ReportFormatArg::Markdown => ReportFormat::Markdown,
        }
    }
}

#[derive(Parser)]
#[command(name = "culpar")]
#[command(version, about = "Spectrum-based fault localization for Cargo projects", long_about = None)]
struct Cli {
    /// Directory containing the production and test packages
    solution_dir: PathBuf,

    /// Package name of the test project
    test_project: String,

    /// Package name of the project under test
    project_under_test: String,

    /// Strip all probes, clear coverage data, and exit
    #[arg(short, long)]
    reset: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Strip probes from the production tree after the run
    #[arg(short, long)]
    cleanup: bool,

    /// Print a console summary of the most suspicious rows
    #[arg(short, long)]
    summary: bool,

    /// Keep only the N most suspicious rows in the report
    #[arg(short, long, value_name = "N")]
    top: Option<usize>,

    /// Report format
    #[arg(long, value_enum, default_value = "csv")]
    report_format: ReportFormatArg,

    /// Report output path, resolved against the working directory
    #[arg(long, value_name = "PATH")]
    report_path: Option<PathBuf>,

    /// Unrecognised trailing arguments are warned about and skipped
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    unknown: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("info")
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    for flag in &cli.unknown {
        warn!("ignoring unknown argument {flag}");
    }

    if !cli.solution_dir.is_dir() {
        return Err(CulparError::PathNotFound(cli.solution_dir).into());
    }

    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let prod_manifest = project::resolve_project(&cli.solution_dir, &cli.project_under_test)?;
    let test_manifest = project::resolve_project(&cli.solution_dir, &cli.test_project)?;
    let prod_root = project::source_root(&prod_manifest);
    let coverage_dir = std::env::current_dir()?.join("Coverage");

    if cli.reset {
        return reset(&prod_root, &coverage_dir);
    }

    let mut runner_cfg = RunnerConfig::new(&coverage_dir);
    runner_cfg.verbose = cli.verbose;
    let sink = runner_cfg.temp_path();

    // Files that already carry probes get their sink literals rewritten;
    // everything else is instrumented fresh. All rewriting happens before
    // the build, so no test subprocess ever sees a half-rewritten tree.
    let retargeted = rewriter::retarget_tree(&prod_root, &sink);
    let instrumented = rewriter::instrument_tree(&prod_root, &sink);
    info!(
        "instrumented {} files ({} new probes), retargeted {} files",
        instrumented.files_changed, instrumented.probes, retargeted.files_changed
    );

    let sites = rewriter::collect_tree(&prod_root)?;
    info!("{} live probes under {}", sites.len(), prod_root.display());

    let tests = discovery::discover_tests(&project::project_dir(&test_manifest));
    if tests.is_empty() {
        warn!("no tests discovered in {}", cli.test_project);
    }
    info!("discovered {} tests", tests.len());

    let driver = CargoDriver {
        manifest: test_manifest,
    };
    let pass = runner::run_tests(&driver, &tests, &runner_cfg)?;

    let coverage = coverage::load_coverage(&coverage_dir, &tests);
    let mut rows = ranker::rank(&coverage, &pass, &sites, ranker::DEFAULT_PRIMARY);
    reporter::apply_top(&mut rows, cli.top);

    let format = ReportFormat::from(cli.report_format);
    let report_path = cli
        .report_path
        .clone()
        .unwrap_or_else(|| reporter::default_report_path(format));
    reporter::write_report(&report_path, &reporter::render(&rows, format))?;

    let failed = pass.values().filter(|p| !**p).count();
    println!(
        "{} {} tests run ({} failed), {} statements ranked -> {}",
        "done:".bright_green().bold(),
        pass.len(),
        failed,
        rows.len(),
        report_path.display()
    );

    if cli.summary {
        reporter::print_summary(&rows, cli.top.unwrap_or(10));
    }

    if cli.cleanup {
        let stripped = rewriter::strip_tree(&prod_root);
        info!("cleanup stripped {} probes", stripped.probes);
    }

    Ok(())
}

fn reset(prod_root: &Path, coverage_dir: &Path) -> Result<()> {
    let stats = rewriter::strip_tree(prod_root);
    runner::clear_coverage_dir(coverage_dir);
    println!(
        "{} removed {} probes from {} files; coverage cleared",
        "reset:".bright_green().bold(),
        stats.probes,
        stats.files_changed
    );
    Ok(())
}
