// SPDX-License-Identifier: Apache-2.0

//! Command line driver for the coverage-guided EMI loop.
//!
//! Sample usage, from the build project root:
//!
//! ```shell
//! $ emi-driver path/to/registry --max-iters=10
//! $ emi-driver path/to/registry --resume
//! $ emi-driver path/to/registry --toolchain=$HOME/emi-toolchain.toml \
//!     --jacoco-cli=/opt/jacoco/lib/jacococli.jar
//! ```
//!
//! The loop runs until `--max-iters` iterations complete, a step fails, or
//! it is interrupted (Ctrl-C / SIGTERM). A stopped run can be continued with
//! `--resume`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;

use emi_driver::checkpoint::Checkpoint;
use emi_driver::controller::{Controller, StopReason};
use emi_driver::error::EmiError;
use emi_driver::registry::Registry;
use emi_driver::report_cli_error::{
    error_details, report_cli_error_and_exit, report_step_failure_and_exit,
};
use emi_driver::toolchain_config::{
    load_toolchain_config, Toolchain, ToolOverrides, DEFAULT_TOOLCHAIN_FILE,
};
use emi_driver::variant_id::VariantId;

#[derive(Parser, Debug)]
#[command(
    name = "emi-driver",
    version,
    about = "Drives a coverage-guided EMI exploration over a variant registry"
)]
struct Args {
    /// Registry directory holding the seed program and its `run` script.
    registry: PathBuf,

    /// Variant to start from: `seed` or a 16 hex character mutant id.
    #[arg(long, default_value = "seed", conflicts_with = "resume")]
    seed: String,

    /// Continue from the variant recorded in the registry's checkpoint.
    #[arg(long, default_value_t = false)]
    resume: bool,

    /// Number of iterations to run; if omitted, run until interrupted.
    #[arg(long)]
    max_iters: Option<u64>,

    /// Path to an emi-toolchain.toml file.
    #[arg(long)]
    toolchain: Option<PathBuf>,

    /// Build project root holding `bazel-bin/` and `lib/`; defaults to the
    /// current directory.
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Java launcher used for the coverage report CLI.
    #[arg(long)]
    java: Option<String>,

    /// Heap-dump capture library.
    #[arg(long)]
    heap_dump_lib: Option<PathBuf>,

    /// JaCoCo agent jar.
    #[arg(long)]
    jacoco_agent: Option<PathBuf>,

    /// JaCoCo command line jar.
    #[arg(long)]
    jacoco_cli: Option<PathBuf>,
}

fn report_error_and_exit(error: &EmiError) -> ! {
    let details = error_details(error);
    report_cli_error_and_exit(
        &error.to_string(),
        None,
        details.iter().map(|(k, v)| (*k, v.as_str())).collect(),
    )
}

/// Flag paths are relative to where the driver was invoked, not to the
/// project root.
fn flag_path(cwd: &Path, path: &Option<PathBuf>) -> Option<String> {
    path.as_ref()
        .map(|p| cwd.join(p).to_string_lossy().to_string())
}

fn resolve_toolchain(args: &Args, cwd: &Path) -> Result<Toolchain, EmiError> {
    let project_root = match &args.project_root {
        Some(dir) => cwd.join(dir),
        None => cwd.to_path_buf(),
    };
    if !project_root.is_dir() {
        return Err(EmiError::configuration(
            &project_root,
            Some("The project root should be an existing directory."),
        ));
    }
    let project_root =
        std::fs::canonicalize(&project_root).map_err(|e| EmiError::io(&project_root, e))?;

    // If there is no toolchain flag but the project root has an
    // emi-toolchain.toml, use that.
    let toolchain_path = match &args.toolchain {
        Some(path) => Some(cwd.join(path)),
        None => {
            let default_path = project_root.join(DEFAULT_TOOLCHAIN_FILE);
            if default_path.exists() {
                log::info!("Using {} in project root", default_path.display());
                Some(default_path)
            } else {
                None
            }
        }
    };
    let config = match &toolchain_path {
        Some(path) => Some(load_toolchain_config(path)?),
        None => None,
    };

    let overrides = ToolOverrides {
        java: args.java.clone(),
        heap_dump_lib: flag_path(cwd, &args.heap_dump_lib),
        jacoco_agent: flag_path(cwd, &args.jacoco_agent),
        jacoco_cli: flag_path(cwd, &args.jacoco_cli),
    };
    Toolchain::resolve(&project_root, config.as_ref(), &overrides)
}

/// Picks the variant to start from. The iteration count always continues
/// from what the registry records.
fn starting_point(args: &Args, registry: &Registry) -> Result<VariantId, EmiError> {
    if !args.resume {
        return VariantId::parse(&args.seed);
    }
    match Checkpoint::load(registry)? {
        Some(checkpoint) => {
            log::info!(
                "resuming at {} after {} iterations",
                checkpoint.current,
                checkpoint.iteration
            );
            Ok(checkpoint.current)
        }
        None => Err(EmiError::configuration(
            emi_driver::checkpoint::checkpoint_path(registry),
            Some("Nothing to resume; start without --resume."),
        )),
    }
}

fn main() {
    let _ = env_logger::try_init();
    let args = Args::parse();

    log::info!("emi-driver starting; version: {}", env!("CARGO_PKG_VERSION"));

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            stop.store(true, Ordering::Relaxed);
        }) {
            report_cli_error_and_exit(
                "could not install the interrupt handler",
                None,
                vec![("cause", e.to_string().as_str())],
            );
        }
    }

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => report_error_and_exit(&EmiError::io(".", e)),
    };
    let toolchain = resolve_toolchain(&args, &cwd).unwrap_or_else(|e| report_error_and_exit(&e));
    log::debug!("toolchain: {:?}", toolchain);

    let registry =
        Registry::open(cwd.join(&args.registry)).unwrap_or_else(|e| report_error_and_exit(&e));
    let start = starting_point(&args, &registry).unwrap_or_else(|e| report_error_and_exit(&e));

    let mut controller = Controller::from_toolchain(registry, &toolchain, start, stop)
        .unwrap_or_else(|failure| report_step_failure_and_exit(&failure));

    let summary = controller
        .run(args.max_iters)
        .unwrap_or_else(|failure| report_step_failure_and_exit(&failure));

    match summary.reason {
        StopReason::IterationLimit => eprintln!(
            "{}",
            format!(
                "* Completed {} iterations; next variant: {}.",
                summary.iterations, summary.last
            )
            .green()
        ),
        StopReason::Interrupted => eprintln!(
            "{}",
            format!(
                "* Interrupted after {} iterations; continue with --resume from {}.",
                summary.iterations, summary.last
            )
            .yellow()
        ),
    }
}
