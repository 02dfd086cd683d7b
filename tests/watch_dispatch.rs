// tests/watch_dispatch.rs

mod common;
use crate::common::builders::{ConfigFileBuilder, TaskConfigBuilder};
use crate::common::fake_toolchain::FakeToolchain;
use crate::common::recording_backend::RecordingBackend;
use crate::common::{init_tracing, runner_for, with_timeout, write_tree};

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;

use sitepipe::config::ConfigFile;
use sitepipe::engine::{CycleBackend, DispatchEvent, DispatchRuntime, Dispatcher};
use sitepipe::registry::TaskRegistry;
use sitepipe::server::ReloadHandle;
use sitepipe::transform::ToolOp;
use sitepipe::types::TransformMode;
use sitepipe::watch::build_profiles;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

const DEBOUNCE: Duration = Duration::from_millis(30);

/// The docs-site watch layout: stylesheets, templates and a reload-only
/// binding over the served output.
fn watch_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_task(
            "sass:development",
            TaskConfigBuilder::new(TransformMode::Compile, &["docs/scss/*.scss"])
                .dest("docs/css")
                .build(),
        )
        .with_task(
            "postcss:development",
            TaskConfigBuilder::new(TransformMode::PostProcess, &["docs/css/*.css"]).build(),
        )
        .with_task(
            "ejs:development",
            TaskConfigBuilder::new(TransformMode::TemplateRender, &["docs/ejs/*.ejs"])
                .dest("docs")
                .build(),
        )
        .with_pipeline("css", &["sass:development", "postcss:development"])
        .with_watch("sass", &["docs/scss/**/*.scss"], &["css"], false)
        .with_watch("ejs", &["docs/ejs/**/*.ejs"], &["ejs:development"], false)
        .with_watch(
            "livereload",
            &["docs/*.html", "docs/css/*.css", "docs/js/*.js"],
            &[],
            true,
        )
        .with_debounce_ms(30)
        .build()
}

fn runtime<B: CycleBackend>(
    cfg: &ConfigFile,
    backend: B,
    reload: Option<ReloadHandle>,
) -> Result<(mpsc::Sender<DispatchEvent>, DispatchRuntime<B>), Box<dyn Error>> {
    let registry = TaskRegistry::from_config(cfg);
    let profiles = build_profiles(registry.bindings())?;
    let reload_root = reload.as_ref().map(|_| PathBuf::from("docs"));
    let (tx, rx) = mpsc::channel(64);
    let rt = DispatchRuntime::new(
        Dispatcher::new(profiles, reload_root),
        rx,
        backend,
        reload,
        DEBOUNCE,
    );
    Ok((tx, rt))
}

fn changed(path: &str) -> DispatchEvent {
    DispatchEvent::FileChanged(PathBuf::from(path))
}

#[tokio::test]
async fn burst_of_changes_runs_each_pipeline_once() -> TestResult {
    init_tracing();
    let backend = RecordingBackend::new();
    let (tx, rt) = runtime(&watch_config(), backend.clone(), None)?;

    for path in [
        "docs/scss/main.scss",
        "docs/scss/_variables.scss",
        "docs/ejs/index.ejs",
        "docs/scss/main.scss",
        "docs/ejs/about.ejs",
    ] {
        tx.send(changed(path)).await?;
    }
    drop(tx);

    let cycles = with_timeout(rt.run()).await?;

    assert_eq!(cycles, 1);
    assert_eq!(backend.runs(), vec!["css", "ejs:development"]);
    let plan = &backend.plans()[0];
    assert_eq!(plan.changed.len(), 4, "duplicates are coalesced: {plan:?}");
    Ok(())
}

#[tokio::test]
async fn unrelated_changes_run_nothing() -> TestResult {
    let backend = RecordingBackend::new();
    let (tx, rt) = runtime(&watch_config(), backend.clone(), None)?;

    tx.send(changed("README.md")).await?;
    tx.send(changed("vendor/bootstrap/scss/_grid.scss")).await?;
    drop(tx);

    assert_eq!(with_timeout(rt.run()).await?, 0);
    assert!(backend.runs().is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_pipeline_does_not_stop_the_loop() -> TestResult {
    init_tracing();
    let backend = RecordingBackend::new().failing("css");
    let (tx, rt) = runtime(&watch_config(), backend.clone(), None)?;
    let handle = tokio::spawn(rt.run());

    tx.send(changed("docs/scss/main.scss")).await?;
    tokio::time::sleep(DEBOUNCE * 5).await;
    tx.send(changed("docs/scss/main.scss")).await?;
    tokio::time::sleep(DEBOUNCE * 5).await;
    tx.send(changed("docs/ejs/index.ejs")).await?;
    drop(tx);

    let cycles = with_timeout(handle).await??;
    assert_eq!(cycles, 3);
    assert_eq!(backend.runs(), vec!["css", "css", "ejs:development"]);
    Ok(())
}

#[tokio::test]
async fn shutdown_discards_pending_changes() -> TestResult {
    let backend = RecordingBackend::new();
    let (tx, rt) = runtime(&watch_config(), backend.clone(), None)?;

    tx.send(changed("docs/scss/main.scss")).await?;
    tx.send(DispatchEvent::ShutdownRequested).await?;

    assert_eq!(with_timeout(rt.run()).await?, 0);
    assert!(backend.runs().is_empty());
    Ok(())
}

#[tokio::test]
async fn outputs_under_the_served_root_trigger_a_reload() -> TestResult {
    let backend = RecordingBackend::new().with_outputs(&["docs/css/main.css", "build/cache.json"]);
    let reload = ReloadHandle::new("test");
    let mut rx = reload.subscribe();
    let (tx, rt) = runtime(&watch_config(), backend, Some(reload.clone()))?;

    tx.send(changed("docs/scss/main.scss")).await?;
    drop(tx);
    with_timeout(rt.run()).await?;

    assert_eq!(reload.version(), 1);
    let msg = rx.try_recv()?;
    assert_eq!(msg.paths, vec!["docs/css/main.css"]);
    Ok(())
}

#[tokio::test]
async fn rewritten_output_reported_by_the_watcher_does_not_reload_twice() -> TestResult {
    let backend = RecordingBackend::new().with_outputs(&["docs/css/main.css"]);
    let reload = ReloadHandle::new("test");
    let (tx, rt) = runtime(&watch_config(), backend.clone(), Some(reload.clone()))?;
    let handle = tokio::spawn(rt.run());

    tx.send(changed("docs/scss/main.scss")).await?;
    tokio::time::sleep(DEBOUNCE * 5).await;
    // What notify delivers after the cycle wrote the stylesheet.
    tx.send(changed("docs/css/main.css")).await?;
    tx.send(changed("docs/css/main.css")).await?;
    drop(tx);

    assert_eq!(with_timeout(handle).await??, 1);
    assert_eq!(reload.version(), 1);
    Ok(())
}

#[tokio::test]
async fn livereload_binding_reloads_without_running_anything() -> TestResult {
    let backend = RecordingBackend::new();
    let reload = ReloadHandle::new("test");
    let mut rx = reload.subscribe();
    let (tx, rt) = runtime(&watch_config(), backend.clone(), Some(reload.clone()))?;

    tx.send(changed("docs/index.html")).await?;
    drop(tx);

    assert_eq!(with_timeout(rt.run()).await?, 0);
    assert!(backend.runs().is_empty());
    assert_eq!(rx.try_recv()?.paths, vec!["docs/index.html"]);
    Ok(())
}

#[tokio::test]
async fn unchanged_outputs_do_not_reload() -> TestResult {
    let backend = RecordingBackend::new();
    let reload = ReloadHandle::new("test");
    let (tx, rt) = runtime(&watch_config(), backend.clone(), Some(reload.clone()))?;

    tx.send(changed("docs/ejs/index.ejs")).await?;
    drop(tx);

    assert_eq!(with_timeout(rt.run()).await?, 1);
    assert_eq!(reload.version(), 0);
    Ok(())
}

#[tokio::test]
async fn pipeline_runner_rebuilds_and_reloads_real_outputs() -> TestResult {
    init_tracing();
    let dir = TempDir::new()?;
    write_tree(dir.path(), &[("docs/scss/main.scss", "body { color: red; }\n")]);

    let cfg = watch_config().with_base_dir(dir.path());
    let tools = FakeToolchain::new();
    let reload = ReloadHandle::new("test");
    let mut rx = reload.subscribe();
    let (tx, rt) = runtime(&cfg, runner_for(&cfg, &tools), Some(reload.clone()))?;

    tx.send(changed("docs/scss/main.scss")).await?;
    drop(tx);
    assert_eq!(with_timeout(rt.run()).await?, 1);

    assert_eq!(tools.ops(), vec![ToolOp::CompileStylesheet, ToolOp::PostProcess]);
    assert!(dir.path().join("docs/css/main.css").is_file());
    assert_eq!(rx.try_recv()?.paths, vec!["docs/css/main.css"]);
    Ok(())
}
