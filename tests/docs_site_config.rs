// tests/docs_site_config.rs

mod common;
use crate::common::fake_toolchain::FakeToolchain;
use crate::common::{list_files, runner_for, with_timeout, write_tree};

use std::error::Error;
use std::path::{Path, PathBuf};

use sitepipe::config::{ConfigFile, load_and_validate};
use sitepipe::registry::{ResolvedStep, TaskRegistry};
use sitepipe::transform::ToolOp;
use sitepipe::watch::build_profiles;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

fn config_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/docs-site.toml")
}

fn load() -> Result<ConfigFile, Box<dyn Error>> {
    Ok(load_and_validate(config_path())?)
}

fn step_names(steps: &[ResolvedStep]) -> Vec<&str> {
    steps.iter().map(ResolvedStep::name).collect()
}

#[test]
fn composite_tasks_resolve_in_order() -> TestResult {
    let cfg = load()?;
    let registry = TaskRegistry::from_config(&cfg);

    assert_eq!(
        step_names(&registry.resolve("setup-bootstrap")?),
        vec![
            "clean:reset",
            "copy:bootstrap_scss",
            "copy:bootstrap_mixins",
            "copy:bootstrap_utilities",
            "copy:font_awesome",
            "copy:bootstrap_js",
            "copy:jquery",
        ]
    );
    assert_eq!(
        step_names(&registry.resolve("dev-compile")?),
        vec![
            "sass:development",
            "postcss:development",
            "cssmin:development",
            "uglify:development",
        ]
    );
    assert_eq!(
        step_names(&registry.resolve("dist")?),
        vec!["clean:dist", "sass:dist", "postcss:dist", "cssmin:dist"]
    );
    assert_eq!(registry.resolve("test")?, registry.resolve("dist")?);

    let server = registry.resolve("server")?;
    assert_eq!(
        step_names(&server[server.len() - 2..]),
        vec!["serve", "watch"]
    );
    Ok(())
}

#[test]
fn watch_bindings_compile() -> TestResult {
    let cfg = load()?;
    let registry = TaskRegistry::from_config(&cfg);
    let profiles = build_profiles(registry.bindings())?;

    let names: Vec<&str> = profiles.iter().map(|p| p.name()).collect();
    assert_eq!(names, vec!["sass", "ejs", "livereload"]);

    assert!(profiles[0].matches("docs/scss/vendors/bootstrap/_grid.scss"));
    assert!(profiles[1].matches("docs/ejs/partials/header.ejs"));
    assert!(profiles[2].matches("docs/css/main.min.css"));
    assert!(profiles[2].matches("index.html"));
    assert!(profiles[2].matches("docs/index.html"));
    assert!(profiles[2].matches("docs/css/vendors/bootstrap.min.css"));
    assert!(profiles[2].matches("docs/js/vendors/jquery.min.js"));
    assert!(!profiles[2].matches("docs/scss/main.scss"));
    Ok(())
}

#[tokio::test]
async fn dist_against_a_seeded_site() -> TestResult {
    let dir = TempDir::new()?;
    write_tree(
        dir.path(),
        &[
            ("docs/scss/main.scss", "@import 'vendors/bootstrap/bootstrap';\n"),
            ("docs/css/main.css.map", "{\"version\":3}"),
            ("docs/css/main.min.css", "stale"),
        ],
    );

    let cfg = load()?.with_base_dir(dir.path());
    let tools = FakeToolchain::new();
    let runner = runner_for(&cfg, &tools);
    let steps = runner.registry().resolve("dist")?;

    with_timeout(sitepipe::run_steps(&cfg, runner, &steps)).await?;

    assert_eq!(
        list_files(dir.path()),
        vec![
            "docs/css/main.css",
            "docs/css/main.min.css",
            "docs/css/main.min.css.map",
            "docs/scss/main.scss"
        ]
    );
    assert_eq!(
        tools.ops(),
        vec![ToolOp::CompileStylesheet, ToolOp::PostProcess, ToolOp::MinifyCss]
    );
    Ok(())
}

#[tokio::test]
async fn ejs_renders_flat_and_skips_partials() -> TestResult {
    let dir = TempDir::new()?;
    write_tree(
        dir.path(),
        &[
            ("docs/ejs/index.ejs", "<%- include('partials/header') %>"),
            ("docs/ejs/guides/setup.ejs", "<h1>Setup</h1>"),
            ("docs/ejs/partials/header.ejs", "<header></header>"),
        ],
    );

    let cfg = load()?.with_base_dir(dir.path());
    let runner = runner_for(&cfg, &FakeToolchain::new());
    with_timeout(runner.run_pipeline("ejs:development")).await?;

    let pages: Vec<String> = list_files(dir.path())
        .into_iter()
        .filter(|f| f.ends_with(".html"))
        .collect();
    assert_eq!(pages, vec!["docs/index.html", "docs/setup.html"]);
    Ok(())
}
