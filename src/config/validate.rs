// src/config/validate.rs

use std::collections::HashSet;
use std::path::Path;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::errors::{Result, SitepipeError};
use crate::transform::expand::build_glob;
use crate::types::{task_name, TransformMode, SERVE_STEP, WATCH_STEP};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SitepipeError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    validate_pipeline_names(cfg)?;
    validate_pipeline_steps(cfg)?;
    validate_pipeline_graph(cfg)?;
    validate_watch_bindings(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.values().all(|targets| targets.is_empty()) && cfg.pipeline.is_empty() {
        return Err(SitepipeError::config(
            "config must contain at least one [task.<group>.<target>] or [pipeline] entry",
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.debounce_ms == 0 {
        return Err(SitepipeError::config(
            "[config].debounce_ms must be >= 1 (got 0)",
        ));
    }

    if cfg.server.port == cfg.server.livereload_port {
        return Err(SitepipeError::config(format!(
            "[server].port and [server].livereload_port must differ (both {})",
            cfg.server.port
        )));
    }

    for (name, tool) in cfg.tools.configured() {
        if tool.cmd.trim().is_empty() {
            return Err(SitepipeError::config(format!(
                "[tools.{name}].cmd must not be empty"
            )));
        }
    }

    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (group, targets) in cfg.task.iter() {
        if group.is_empty() || group.contains(':') {
            return Err(SitepipeError::config(format!(
                "invalid task group name '{group}'"
            )));
        }
        for (target, task) in targets.iter() {
            if target.is_empty() || target.contains(':') {
                return Err(SitepipeError::config(format!(
                    "invalid task target name '{group}.{target}'"
                )));
            }
            validate_task(&task_name(group, target), task)?;
        }
    }
    Ok(())
}

fn validate_task(name: &str, task: &TaskConfig) -> Result<()> {
    if task.src.is_empty() {
        return Err(SitepipeError::config(format!(
            "task '{name}' must list at least one `src` pattern"
        )));
    }

    if task.src.iter().all(|p| p.starts_with('!')) {
        return Err(SitepipeError::config(format!(
            "task '{name}' only has exclusion patterns in `src`"
        )));
    }

    for pattern in task.src.iter() {
        let pat = pattern.strip_prefix('!').unwrap_or(pattern);
        build_glob(pat).map_err(|e| {
            SitepipeError::config(format!("task '{name}' has invalid glob '{pattern}': {e}"))
        })?;
    }

    if task.mode.requires_destination() && task.dest.is_none() {
        return Err(SitepipeError::config(format!(
            "task '{name}' ({}) requires a `dest`",
            task.mode
        )));
    }

    if task.mode == TransformMode::Minify {
        let dest = task.dest.as_deref().unwrap_or_default();
        if Path::new(dest).extension().is_none() {
            return Err(SitepipeError::config(format!(
                "task '{name}' (minify) needs a file destination, got '{dest}'"
            )));
        }
    }

    if let Some(ext) = task.ext.as_deref() {
        if task.mode != TransformMode::TemplateRender {
            return Err(SitepipeError::config(format!(
                "task '{name}': `ext` only applies to template_render"
            )));
        }
        if !ext.starts_with('.') || ext.len() < 2 {
            return Err(SitepipeError::config(format!(
                "task '{name}': `ext` must look like \".html\", got '{ext}'"
            )));
        }
    }

    Ok(())
}

fn validate_pipeline_names(cfg: &RawConfigFile) -> Result<()> {
    let task_names: HashSet<String> = cfg
        .task
        .iter()
        .flat_map(|(g, targets)| targets.keys().map(move |t| task_name(g, t)))
        .collect();

    for name in cfg.pipeline.keys() {
        if name == SERVE_STEP || name == WATCH_STEP {
            return Err(SitepipeError::config(format!(
                "'{name}' is a reserved step name and cannot be a pipeline"
            )));
        }
        if task_names.contains(name) {
            return Err(SitepipeError::config(format!(
                "'{name}' is defined both as a task and as a pipeline"
            )));
        }
    }
    Ok(())
}

fn step_exists(cfg: &RawConfigFile, step: &str) -> bool {
    if step == SERVE_STEP || step == WATCH_STEP || cfg.pipeline.contains_key(step) {
        return true;
    }
    match step.split_once(':') {
        Some((group, target)) => cfg
            .task
            .get(group)
            .is_some_and(|targets| targets.contains_key(target)),
        None => false,
    }
}

fn validate_pipeline_steps(cfg: &RawConfigFile) -> Result<()> {
    for (name, steps) in cfg.pipeline.iter() {
        if steps.is_empty() {
            return Err(SitepipeError::config(format!(
                "pipeline '{name}' has no steps"
            )));
        }
        for step in steps.iter() {
            if !step_exists(cfg, step) {
                return Err(SitepipeError::config(format!(
                    "pipeline '{name}' references unknown step '{step}'"
                )));
            }
        }
    }
    Ok(())
}

fn validate_pipeline_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: pipeline -> nested pipeline it references.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.pipeline.keys() {
        graph.add_node(name.as_str());
    }

    for (name, steps) in cfg.pipeline.iter() {
        for step in steps.iter() {
            if cfg.pipeline.contains_key(step) {
                if step == name {
                    return Err(SitepipeError::config(format!(
                        "pipeline '{name}' cannot include itself"
                    )));
                }
                graph.add_edge(name.as_str(), step.as_str(), ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(SitepipeError::config(format!(
            "cycle detected in pipelines involving '{}'",
            cycle.node_id()
        ))),
    }
}

fn validate_watch_bindings(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();

    for binding in cfg.watch.iter() {
        if !seen.insert(binding.name.as_str()) {
            return Err(SitepipeError::config(format!(
                "duplicate watch binding '{}'",
                binding.name
            )));
        }
        if binding.files.is_empty() {
            return Err(SitepipeError::config(format!(
                "watch binding '{}' must list at least one file pattern",
                binding.name
            )));
        }
        if binding.run.is_empty() && !binding.livereload {
            return Err(SitepipeError::config(format!(
                "watch binding '{}' neither runs anything nor triggers live reload",
                binding.name
            )));
        }
        for pattern in binding.files.iter() {
            build_glob(pattern).map_err(|e| {
                SitepipeError::config(format!(
                    "watch binding '{}' has invalid glob '{pattern}': {e}",
                    binding.name
                ))
            })?;
        }
        for name in binding.run.iter() {
            if name == SERVE_STEP || name == WATCH_STEP {
                return Err(SitepipeError::config(format!(
                    "watch binding '{}' cannot run the reserved step '{name}'",
                    binding.name
                )));
            }
            if !step_exists(cfg, name) {
                return Err(SitepipeError::config(format!(
                    "watch binding '{}' references unknown task '{name}'",
                    binding.name
                )));
            }
        }
    }
    Ok(())
}
