// SPDX-License-Identifier: Apache-2.0

//! The EMI loop.
//!
//! Starting from a variant (normally `seed`), each iteration:
//!
//! 1. resolves the variant's directory (fatal if a mutant is missing);
//! 2. runs it in dump mode, writing `dumps/<id>.hprof`;
//! 3. compares that dump against the seed's when a checker is enabled;
//! 4. runs it in profile mode, writing `coverage/<id>.exec`;
//! 5. turns the trace into `coverage/<id>.xml`;
//! 6. asks the mutator for a fresh variant derived from it;
//! 7. checkpoints and moves on to the fresh variant.
//!
//! Each step consumes the previous step's artifact, so iterations are strictly
//! sequential. Any failure ends the run; artifacts from completed steps are
//! left in place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;

use crate::checkpoint::{append_lineage, completed_iterations, Checkpoint};
use crate::equivalence::{EquivalenceChecker, HeapDiffChecker, NoopEquivalenceChecker};
use crate::error::{AtStep, EmiError, Step, StepFailure};
use crate::executor::{ExecutionMode, Executor, ScriptExecutor};
use crate::mutator::{CommandMutator, Mutator};
use crate::preflight;
use crate::registry::{Registry, RegistryLayout};
use crate::reporter::{JacocoReporter, Reporter};
use crate::toolchain_config::Toolchain;
use crate::variant_id::VariantId;

/// The pluggable collaborators of the loop.
pub struct Backends {
    pub executor: Box<dyn Executor>,
    pub reporter: Box<dyn Reporter>,
    pub mutator: Box<dyn Mutator>,
    pub equivalence: Box<dyn EquivalenceChecker>,
}

impl Backends {
    /// Process-based backends for a validated toolchain.
    pub fn from_toolchain(
        toolchain: &Toolchain,
        registry: &Registry,
        stop: &Arc<AtomicBool>,
    ) -> Result<Self, EmiError> {
        let equivalence: Box<dyn EquivalenceChecker> = match &toolchain.heap_differ {
            Some(differ) => Box::new(HeapDiffChecker::new(
                differ,
                &toolchain.project_root,
                stop.clone(),
            )?),
            None => Box::new(NoopEquivalenceChecker),
        };
        Ok(Backends {
            executor: Box::new(ScriptExecutor::new(
                registry.root(),
                &registry.run_script(),
                &toolchain.heap_dump_lib,
                &toolchain.jacoco_agent,
                stop.clone(),
            )),
            reporter: Box::new(JacocoReporter::new(
                &toolchain.java,
                &toolchain.jacoco_cli,
                stop.clone(),
            )),
            mutator: Box::new(CommandMutator::new(
                &toolchain.mutator_command,
                &toolchain.project_root,
                stop.clone(),
            )?),
            equivalence,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationOutcome {
    /// Variant processed by this iteration.
    pub variant: VariantId,
    /// Variant minted from it, now current.
    pub next: VariantId,
    /// Iterations completed in the registry, including this one.
    pub iteration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    IterationLimit,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub last: VariantId,
    pub reason: StopReason,
}

pub struct Controller {
    registry: Registry,
    layout: RegistryLayout,
    backends: Backends,
    current: VariantId,
    iteration: u64,
    stop: Arc<AtomicBool>,
}

/// Progress line for the user, alongside the log record.
fn announce(message: &str) {
    log::info!("{}", message);
    eprintln!("{}", format!("* {}", message).cyan());
}

impl Controller {
    /// Validates the toolchain, then prepares the registry layout.
    pub fn from_toolchain(
        registry: Registry,
        toolchain: &Toolchain,
        start: VariantId,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, StepFailure> {
        preflight::check(toolchain, &registry).at(Step::Preflight)?;
        let backends = Backends::from_toolchain(toolchain, &registry, &stop).at(Step::Preflight)?;
        Controller::new(registry, backends, start, stop)
    }

    /// Iteration numbering continues from what the registry already
    /// records, also when starting over from `seed` or another variant.
    pub fn new(
        registry: Registry,
        backends: Backends,
        start: VariantId,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, StepFailure> {
        let layout = registry.ensure_layout().at(Step::Layout)?;
        let iteration = completed_iterations(&registry).at(Step::Checkpoint)?;
        Ok(Controller {
            registry,
            layout,
            backends,
            current: start,
            iteration,
            stop,
        })
    }

    pub fn current(&self) -> &VariantId {
        &self.current
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn layout(&self) -> &RegistryLayout {
        &self.layout
    }

    /// Runs one full iteration on the current variant and advances to the
    /// minted successor.
    pub fn step(&mut self) -> Result<IterationOutcome, StepFailure> {
        let current = self.current.clone();
        let registry = &self.registry;
        let backends = &self.backends;

        let variant_path = registry.resolve_variant_path(&current).at(Step::Resolve)?;

        let heap_dump = registry.heap_dump_path(&current);
        announce(&format!(
            "Running {}. Dumping heap to {}.",
            current,
            heap_dump.display()
        ));
        backends
            .executor
            .execute(ExecutionMode::Dump, &variant_path, &heap_dump)
            .at(Step::Dump)?;

        if !current.is_seed() && backends.equivalence.is_enabled() {
            let baseline = registry.heap_dump_path(&VariantId::seed());
            announce(&format!("Comparing heap dump of {} with baseline.", current));
            backends
                .equivalence
                .check(&baseline, &heap_dump)
                .at(Step::Equivalence)?;
        }

        announce(&format!("Re-running {} to obtain coverage.", current));
        let trace = registry.coverage_trace_path(&current);
        backends
            .executor
            .execute(ExecutionMode::Profile, &variant_path, &trace)
            .at(Step::Profile)?;

        let report = registry.coverage_report_path(&current);
        backends
            .reporter
            .report(&trace, &variant_path, &report)
            .at(Step::Report)?;

        let next = registry.mint_variant_id().at(Step::Mutate)?;
        announce(&format!("Creating a mutant of {} as {}.", current, next));
        backends
            .mutator
            .mutate(registry.root(), &current, &next, &report)
            .at(Step::Mutate)?;

        let iteration = self.iteration + 1;
        Checkpoint {
            current: next.clone(),
            parent: Some(current.clone()),
            iteration,
        }
        .store(registry)
        .at(Step::Checkpoint)?;
        append_lineage(registry, iteration, &current, &next).at(Step::Checkpoint)?;

        self.iteration = iteration;
        self.current = next.clone();
        Ok(IterationOutcome {
            variant: current,
            next,
            iteration,
        })
    }

    /// Iterates until `max_iters` iterations have run (if given), a stop is
    /// requested, or a step fails.
    pub fn run(&mut self, max_iters: Option<u64>) -> Result<RunSummary, StepFailure> {
        let mut completed = 0u64;
        let reason = loop {
            if max_iters.map_or(false, |max| completed >= max) {
                break StopReason::IterationLimit;
            }
            if self.stop.load(Ordering::Relaxed) {
                break StopReason::Interrupted;
            }
            match self.step() {
                Ok(outcome) => {
                    completed += 1;
                    log::info!(
                        "iteration {} complete; {} -> {}",
                        outcome.iteration,
                        outcome.variant,
                        outcome.next
                    );
                }
                Err(failure) if failure.source.is_interrupted() => {
                    log::warn!("{}", failure);
                    break StopReason::Interrupted;
                }
                Err(failure) => return Err(failure),
            }
        };
        Ok(RunSummary {
            iterations: completed,
            last: self.current.clone(),
            reason,
        })
    }
}
