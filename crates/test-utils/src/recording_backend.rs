use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use sitepipe::engine::{CycleBackend, CycleOutcome, CyclePlan};

/// A fake cycle backend that:
/// - records every plan it was asked to run
/// - fails the pipelines named in `failing`
/// - reports `outputs` as changed for every successful pipeline
#[derive(Clone, Default)]
pub struct RecordingBackend {
    plans: Arc<Mutex<Vec<CyclePlan>>>,
    runs: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    outputs: Vec<PathBuf>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, pipeline: &str) -> Self {
        self.failing.insert(pipeline.to_string());
        self
    }

    pub fn with_outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(PathBuf::from).collect();
        self
    }

    pub fn plans(&self) -> Vec<CyclePlan> {
        self.plans.lock().unwrap().clone()
    }

    /// Every pipeline attempted, in order, across all cycles.
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }
}

impl CycleBackend for RecordingBackend {
    fn run_cycle(
        &mut self,
        plan: CyclePlan,
    ) -> Pin<Box<dyn Future<Output = CycleOutcome> + Send + '_>> {
        Box::pin(async move {
            self.plans.lock().unwrap().push(plan.clone());
            let mut outcome = CycleOutcome::default();
            for name in plan.pipelines {
                self.runs.lock().unwrap().push(name.clone());
                if self.failing.contains(&name) {
                    outcome
                        .failures
                        .push((name, "step 'sass:development' failed:\nboom".to_string()));
                } else {
                    outcome.outputs_changed.extend(self.outputs.iter().cloned());
                }
            }
            outcome
        })
    }
}
