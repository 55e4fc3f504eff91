//! reprobox - containerised bug reproduction CLI
//!
//! The `reprobox` command builds bug images and checks that each bug still
//! produces its documented test outcomes.
//!
//! ## Commands
//!
//! - `list`: Show every registered bug and whether its image is installed
//! - `validate`: Validate one or more bugs
//! - `validate-all`: Validate every registered bug
//! - `build` / `uninstall` / `download` / `upload`: Manage bug images
//! - `status`: Show details of a single bug

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn, Level};

use reprobox_core::{
    BatchSummary, Bug, BugManager, BugRegistry, ConsoleReporter, Reporter, ReproboxConfig,
    SilentReporter, TestHarness, ValidationFailure,
};
use reprobox_docker::{DockerBuildGateway, ImageStatus};

#[derive(Parser)]
#[command(name = "reprobox")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reproducible bugs in Docker containers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Dataset manifest (repeatable; overrides REPROBOX_DATASETS)
    #[arg(long = "dataset", global = true, value_name = "PATH")]
    datasets: Vec<PathBuf>,

    /// Docker client binary (overrides REPROBOX_DOCKER)
    #[arg(long, global = true, value_name = "BIN")]
    docker: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn config(&self) -> Result<ReproboxConfig> {
        let mut config = ReproboxConfig::from_env()
            .context("Invalid reprobox configuration")?
            .with_datasets(self.datasets.clone());
        if let Some(docker) = &self.docker {
            config = config.with_docker_binary(docker.clone());
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List registered bugs
    List,

    /// Validate bugs: build, compile, and check every test outcome
    Validate {
        /// Bug identifiers
        #[arg(required = true)]
        bugs: Vec<String>,

        /// Suppress task lines and diagnostics
        #[arg(short, long)]
        quiet: bool,

        /// Write a JSON report to this file
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Validate every registered bug
    ValidateAll {
        /// Suppress task lines and diagnostics
        #[arg(short, long)]
        quiet: bool,

        /// Write a JSON report to this file
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Build the image for a bug
    Build {
        bug: String,

        /// Rebuild even if the image is installed
        #[arg(short, long)]
        force: bool,

        /// Do not stream build output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Remove the image for a bug
    Uninstall {
        bug: String,

        /// Succeed if the image is not installed, and force removal
        #[arg(short, long)]
        force: bool,

        /// Keep untagged parent images
        #[arg(long)]
        noprune: bool,
    },

    /// Pull the image for a bug from its registry
    Download {
        bug: String,

        /// Pull even if the image is installed
        #[arg(short, long)]
        force: bool,
    },

    /// Push the image for a bug to its registry
    Upload { bug: String },

    /// Show details of a bug and its image
    Status { bug: String },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    reprobox_core::init_tracing(cli.json, level);

    let config = cli.config()?;
    if config.datasets.is_empty() {
        warn!("No dataset manifests configured; pass --dataset or set REPROBOX_DATASETS");
    }
    let registry =
        BugRegistry::load(&config.datasets).context("Failed to load dataset manifests")?;
    let (gateway, provisioner) = reprobox_docker::backend(&config, &registry);
    let gateway = Arc::new(gateway);
    let manager = BugManager::new(registry, gateway.clone(), Arc::new(provisioner));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let ok = run(&manager, Some(gateway.as_ref()), cli.command, &mut out)?;
    out.flush().ok();

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Dispatch a command. Returns `false` when the command's verdict is negative.
fn run(
    manager: &BugManager,
    docker: Option<&DockerBuildGateway>,
    command: Commands,
    out: &mut dyn Write,
) -> Result<bool> {
    match command {
        Commands::List => cmd_list(manager, out),
        Commands::Validate {
            bugs,
            quiet,
            report,
        } => {
            let bugs = bugs
                .iter()
                .map(|name| manager.get(name))
                .collect::<reprobox_core::Result<Vec<_>>>()?;
            cmd_validate(manager, &bugs, quiet, report.as_deref(), out)
        }
        Commands::ValidateAll { quiet, report } => {
            let bugs: Vec<&Bug> = manager.bugs().collect();
            cmd_validate(manager, &bugs, quiet, report.as_deref(), out)
        }
        Commands::Build { bug, force, quiet } => {
            let bug = manager.get(&bug)?;
            manager
                .build(bug, force, quiet)
                .with_context(|| format!("Failed to build bug {}", bug.name))?;
            writeln!(out, "Built {} ({})", bug.name, bug.build_instructions.tag)?;
            Ok(true)
        }
        Commands::Uninstall {
            bug,
            force,
            noprune,
        } => {
            let bug = manager.get(&bug)?;
            manager
                .uninstall(bug, force, noprune)
                .with_context(|| format!("Failed to uninstall bug {}", bug.name))?;
            writeln!(out, "Uninstalled {} ({})", bug.name, bug.build_instructions.tag)?;
            Ok(true)
        }
        Commands::Download { bug, force } => {
            let bug = manager.get(&bug)?;
            let ok = manager.download(bug, force);
            let verb = if ok { "Downloaded" } else { "Failed to download" };
            writeln!(out, "{verb} {} ({})", bug.name, bug.build_instructions.tag)?;
            Ok(ok)
        }
        Commands::Upload { bug } => {
            let bug = manager.get(&bug)?;
            let ok = manager.upload(bug);
            let verb = if ok { "Uploaded" } else { "Failed to upload" };
            writeln!(out, "{verb} {} ({})", bug.name, bug.build_instructions.tag)?;
            Ok(ok)
        }
        Commands::Status { bug } => {
            let bug = manager.get(&bug)?;
            let image = docker.map(|gateway| gateway.status(bug.build_instructions()));
            let installed = match &image {
                Some(status) => status.installed,
                None => manager.is_installed(bug),
            };
            cmd_status(bug, installed, image.as_ref(), out)?;
            Ok(true)
        }
    }
}

/// List all registered bugs
fn cmd_list(manager: &BugManager, out: &mut dyn Write) -> Result<bool> {
    if manager.registry().is_empty() {
        writeln!(out, "No bugs registered.")?;
        return Ok(true);
    }
    for bug in manager.bugs() {
        let installed = if manager.is_installed(bug) {
            "installed"
        } else {
            "not installed"
        };
        writeln!(
            out,
            "{:<40} {:<16} {}",
            bug.name,
            bug.dataset.as_deref().unwrap_or("-"),
            installed
        )?;
    }
    Ok(true)
}

/// Validate `bugs` in order, printing one summary line per bug
fn cmd_validate(
    manager: &BugManager,
    bugs: &[&Bug],
    quiet: bool,
    report_path: Option<&Path>,
    out: &mut dyn Write,
) -> Result<bool> {
    let mut summary = BatchSummary::default();

    for bug in bugs {
        let result = if quiet {
            manager.validate_with(bug, &mut SilentReporter)
        } else {
            let mut reporter = ConsoleReporter::new(&mut *out);
            let result = manager.validate_with(bug, &mut reporter);
            reporter.message("");
            result
        };

        match result {
            Ok(report) => {
                let verdict = if report.verdict() { "VALIDATED" } else { "FAILED" };
                writeln!(out, "{}: {} ({})", bug.name, verdict, report.outcome.label())?;
                summary.reports.push(report);
            }
            Err(e) => {
                writeln!(out, "{}: ERROR ({})", bug.name, e)?;
                summary.errors.push(ValidationFailure {
                    bug: bug.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    if bugs.len() > 1 {
        writeln!(
            out,
            "\n{} validated, {} failed, {} errored",
            summary.validated_count(),
            summary.failed_count(),
            summary.errored_count()
        )?;
    }

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Wrote validation report");
    }

    Ok(summary.all_validated())
}

/// Show bug details and image state
fn cmd_status(
    bug: &Bug,
    installed: bool,
    image: Option<&ImageStatus>,
    out: &mut dyn Write,
) -> Result<()> {
    let build = bug.build_instructions();
    let harness = bug.harness();

    writeln!(out, "Bug:        {}", bug.name)?;
    writeln!(out, "Dataset:    {}", bug.dataset.as_deref().unwrap_or("-"))?;
    writeln!(out, "Program:    {}", bug.program.as_deref().unwrap_or("-"))?;
    writeln!(out, "Image:      {}", build.tag)?;
    writeln!(out, "Dockerfile: {}", build.dockerfile.display())?;
    if let Some(dependency) = &build.depends_on {
        writeln!(out, "Depends on: {dependency}")?;
    }
    writeln!(out, "Digest:     {}", build.short_digest())?;
    writeln!(
        out,
        "Installed:  {}",
        if installed { "yes" } else { "no" }
    )?;
    if let Some(image) = image.filter(|i| i.installed) {
        let state = if image.is_current() { "yes" } else { "no (rebuild needed)" };
        writeln!(out, "Current:    {state}")?;
    }
    writeln!(out, "Compile:    {}", bug.compile_instructions.command)?;
    writeln!(
        out,
        "Tests:      {} passing, {} failing",
        harness.passing().len(),
        harness.failing().len()
    )?;
    Ok(())
}
