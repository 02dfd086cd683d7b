#![allow(dead_code, unused_imports)]

pub use sitepipe_test_utils::{
    builders, fake_toolchain, init_tracing, list_files, recording_backend, with_timeout,
    write_tree,
};

use std::sync::Arc;

use sitepipe::config::ConfigFile;
use sitepipe::engine::PipelineRunner;
use sitepipe::fs::RealFileSystem;
use sitepipe::registry::TaskRegistry;
use sitepipe::transform::RuleExecutor;

use self::fake_toolchain::FakeToolchain;

/// A pipeline runner over the real filesystem rooted at the config's
/// `base_dir`, with `tools` standing in for the external collaborators.
pub fn runner_for(cfg: &ConfigFile, tools: &FakeToolchain) -> PipelineRunner {
    let registry = Arc::new(TaskRegistry::from_config(cfg));
    let executor = RuleExecutor::new(
        Arc::new(RealFileSystem),
        Arc::new(tools.clone()),
        cfg.base_dir.clone(),
    );
    PipelineRunner::new(registry, executor)
}
