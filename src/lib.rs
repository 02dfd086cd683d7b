// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod registry;
pub mod server;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{DispatchEvent, DispatchRuntime, Dispatcher, PipelineRunner};
use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::registry::{ResolvedStep, TaskRegistry};
use crate::server::{DevServer, ReloadHandle, RunningServer, ServerSession};
use crate::transform::{DefaultToolchain, RuleExecutor};
use crate::watch::path_utils::project_relative;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the task registry
/// - up-front resolution of every requested name
/// - sequential step execution
/// - (for `serve`) the dev server
/// - (for `watch`) the file watcher, dispatch loop and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let registry = Arc::new(TaskRegistry::from_config(&cfg));

    if args.list {
        print_listing(&registry);
        return Ok(());
    }

    // Every name is resolved before the first step touches the filesystem.
    let steps = registry.resolve_all(&args.tasks)?;

    if args.dry_run {
        print_dry_run(&args.tasks, &steps);
        return Ok(());
    }

    let executor = RuleExecutor::new(
        Arc::new(RealFileSystem),
        Arc::new(DefaultToolchain::from_config(&cfg.tools)),
        cfg.base_dir.clone(),
    );
    let runner = PipelineRunner::new(Arc::clone(&registry), executor);

    run_steps(&cfg, runner, &steps).await
}

/// Execute resolved steps in order.
///
/// `serve` binds and starts the dev server; `watch` hands control to the
/// dispatch loop until Ctrl-C. A server started without a later `watch`
/// keeps serving until Ctrl-C.
pub async fn run_steps(cfg: &ConfigFile, runner: PipelineRunner, steps: &[ResolvedStep]) -> Result<()> {
    let mut server: Option<RunningServer> = None;

    for step in steps {
        match step {
            ResolvedStep::Task(_) => {
                if let Err(err) = runner.run_steps(std::slice::from_ref(step)).await {
                    error!(step = %step, "step failed; aborting");
                    return Err(err);
                }
            }
            ResolvedStep::Serve => {
                if server.is_none() {
                    let dev = DevServer::bind(ServerSession::from_config(cfg)).await?;
                    server = Some(dev.spawn()?);
                }
            }
            ResolvedStep::Watch => {
                let reload = server.as_ref().map(RunningServer::reload_handle);
                return watch_loop(cfg, runner, reload).await;
            }
        }
    }

    if server.is_some() {
        info!("serving; press Ctrl-C to stop");
        tokio::signal::ctrl_c()
            .await
            .context("listening for Ctrl-C")?;
    }

    debug!(steps = steps.len(), "all steps finished");
    Ok(())
}

/// Watch the project and re-run bound pipelines until Ctrl-C.
async fn watch_loop(cfg: &ConfigFile, runner: PipelineRunner, reload: Option<ReloadHandle>) -> Result<()> {
    let profiles = watch::build_profiles(runner.registry().bindings())?;
    let (tx, rx) = mpsc::channel::<DispatchEvent>(256);

    let _watcher = watch::spawn_watcher(cfg.base_dir.clone(), profiles.clone(), tx.clone())?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(DispatchEvent::ShutdownRequested).await;
            }
            Err(e) => error!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    let reload_root = reload
        .as_ref()
        .map(|_| served_root(cfg));
    let core = Dispatcher::new(profiles, reload_root);
    let runtime = DispatchRuntime::new(
        core,
        rx,
        runner,
        reload,
        Duration::from_millis(cfg.config.debounce_ms),
    );
    runtime.run().await?;
    Ok(())
}

/// The served directory relative to the project root.
fn served_root(cfg: &ConfigFile) -> PathBuf {
    project_relative(&cfg.base_dir, &cfg.resolve_path(Path::new(&cfg.server.root)))
}

/// `--list`: tasks, pipelines and watch bindings.
fn print_listing(registry: &TaskRegistry) {
    println!("tasks:");
    let mut group = "";
    for task in registry.tasks() {
        if task.group() != group {
            group = task.group();
            println!("  {group}");
        }
        let dest = task
            .rule
            .destination
            .as_ref()
            .map(|d| format!(" -> {}", d.display()))
            .unwrap_or_default();
        println!("    {:<26} {:<16} {:?}{dest}", task.name, task.rule.mode, task.rule.sources);
    }

    println!();
    println!("pipelines:");
    for pipeline in registry.pipelines() {
        println!("  {:<28} {}", pipeline.name, pipeline.steps.join(", "));
    }

    if !registry.bindings().is_empty() {
        println!();
        println!("watch:");
        for binding in registry.bindings() {
            let reload = if binding.livereload { " (livereload)" } else { "" };
            println!(
                "  {:<28} {:?} -> [{}]{reload}",
                binding.name,
                binding.trigger_globs,
                binding.run.join(", ")
            );
        }
    }
}

/// `--dry-run`: the resolved steps, nothing executed.
fn print_dry_run(names: &[String], steps: &[ResolvedStep]) {
    println!("sitepipe dry-run: {}", names.join(" "));
    for (i, step) in steps.iter().enumerate() {
        match step {
            ResolvedStep::Task(task) => {
                println!("  {:>2}. {} ({})", i + 1, task.name, task.rule.mode);
                println!("      src: {:?}", task.rule.sources);
                if let Some(dest) = &task.rule.destination {
                    println!("      dest: {}", dest.display());
                }
            }
            other => println!("  {:>2}. {other}", i + 1),
        }
    }
    debug!("dry-run complete (no execution)");
}
