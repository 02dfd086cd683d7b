// src/engine/pipeline.rs

//! Sequential execution of resolved steps.
//!
//! The dispatch runtime talks to a [`CycleBackend`] instead of the executor
//! directly. Production uses [`PipelineRunner`]; tests can provide a backend
//! that records plans and reports canned outcomes without touching the
//! filesystem.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::engine::{CycleOutcome, CyclePlan};
use crate::errors::Result;
use crate::registry::{ResolvedStep, TaskRegistry};
use crate::transform::{RuleExecutor, StepReport};
use crate::watch::path_utils::project_relative;

/// Trait abstracting how a dispatching cycle is executed.
pub trait CycleBackend: Send {
    /// Run every pipeline in `plan`, in order.
    ///
    /// A failing pipeline must not stop the others; failures are reported
    /// in the outcome.
    fn run_cycle(
        &mut self,
        plan: CyclePlan,
    ) -> Pin<Box<dyn Future<Output = CycleOutcome> + Send + '_>>;
}

/// Runs pipelines from an immutable registry through a [`RuleExecutor`].
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    registry: Arc<TaskRegistry>,
    executor: RuleExecutor,
}

impl PipelineRunner {
    pub fn new(registry: Arc<TaskRegistry>, executor: RuleExecutor) -> Self {
        Self { registry, executor }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Run resolved steps strictly in order, stopping at the first failure.
    ///
    /// `serve` and `watch` steps are handled by the caller; here they are
    /// skipped.
    pub async fn run_steps(&self, steps: &[ResolvedStep]) -> Result<StepReport> {
        let mut total = StepReport::default();
        for step in steps {
            match step {
                ResolvedStep::Task(task) => {
                    let report = self.executor.execute(task).await?;
                    total.merge(report);
                }
                ResolvedStep::Serve | ResolvedStep::Watch => {
                    debug!(step = %step, "skipping long-running step inside a pipeline run");
                }
            }
        }
        Ok(total)
    }

    /// Resolve and run a single pipeline (or task) by name.
    pub async fn run_pipeline(&self, name: &str) -> Result<StepReport> {
        let steps = self.registry.resolve(name)?;
        info!(pipeline = name, steps = steps.len(), "running pipeline");
        self.run_steps(&steps).await
    }

    fn relative_outputs(&self, report: &StepReport) -> Vec<PathBuf> {
        report
            .changed_paths()
            .map(|p| project_relative(self.executor.root(), p))
            .collect()
    }
}

impl CycleBackend for PipelineRunner {
    fn run_cycle(
        &mut self,
        plan: CyclePlan,
    ) -> Pin<Box<dyn Future<Output = CycleOutcome> + Send + '_>> {
        Box::pin(async move {
            let mut outcome = CycleOutcome::default();
            for name in &plan.pipelines {
                match self.run_pipeline(name).await {
                    Ok(report) => {
                        outcome.outputs_changed.extend(self.relative_outputs(&report));
                    }
                    Err(err) => {
                        // Only this pipeline is aborted; the loop keeps watching.
                        error!(pipeline = %name, error = %err, "pipeline failed");
                        outcome.failures.push((name.clone(), err.to_string()));
                    }
                }
            }
            if !outcome.failures.is_empty() {
                warn!(failed = outcome.failures.len(), "cycle finished with failures");
            }
            outcome
        })
    }
}
