// src/registry/mod.rs

//! Immutable task registry and pipeline resolution.
//!
//! - [`TaskRegistry`] is the snapshot of every named task, pipeline and
//!   watch binding, built once from a validated [`ConfigFile`].
//! - [`resolver`] flattens a composite name into the ordered steps to run.

pub mod resolver;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::ConfigFile;
use crate::transform::rule::{NamedTask, TransformRule};
use crate::types::TaskName;

pub use resolver::ResolvedStep;

/// A composite task: an ordered list of step names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub name: TaskName,
    /// Names of tasks, nested pipelines or the reserved `serve` / `watch`.
    pub steps: Vec<TaskName>,
}

/// Maps filesystem changes to the pipelines that must re-run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBinding {
    pub name: String,
    pub trigger_globs: Vec<String>,
    /// Pipelines or single tasks, in run order.
    pub run: Vec<TaskName>,
    pub livereload: bool,
}

/// Read-only registry of everything a run can refer to by name.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, Arc<NamedTask>>,
    pipelines: BTreeMap<TaskName, Pipeline>,
    bindings: Vec<WatchBinding>,
}

impl TaskRegistry {
    /// Build the registry from a validated config.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut registry = TaskRegistry::default();

        for (name, task_cfg) in cfg.tasks() {
            let rule = TransformRule::from_config(task_cfg, &cfg.config.browsers);
            registry.insert_task(NamedTask::new(name, rule));
        }

        for (name, steps) in cfg.pipeline.iter() {
            registry.insert_pipeline(Pipeline {
                name: name.clone(),
                steps: steps.clone(),
            });
        }

        for binding in cfg.watch.iter() {
            registry.bindings.push(WatchBinding {
                name: binding.name.clone(),
                trigger_globs: binding.files.clone(),
                run: binding.run.clone(),
                livereload: binding.livereload,
            });
        }

        debug!(
            tasks = registry.tasks.len(),
            pipelines = registry.pipelines.len(),
            bindings = registry.bindings.len(),
            "task registry built"
        );

        registry
    }

    /// Register a task directly. Used when assembling registries in code.
    pub fn insert_task(&mut self, task: NamedTask) {
        self.tasks.insert(task.name.clone(), Arc::new(task));
    }

    pub fn insert_pipeline(&mut self, pipeline: Pipeline) {
        self.pipelines.insert(pipeline.name.clone(), pipeline);
    }

    pub fn task(&self, name: &str) -> Option<&Arc<NamedTask>> {
        self.tasks.get(name)
    }

    pub fn pipeline(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.get(name)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Arc<NamedTask>> {
        self.tasks.values()
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.values()
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }
}
