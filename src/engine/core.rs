// src/engine/core.rs

//! Pure dispatcher state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`DispatchEvent`]s and produces:
//! - an updated state (`Idle`, `Watching`, `Dispatching`)
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::DispatchRuntime`) owns the debounce
//! timer, runs cycles and forwards reload notifications. The core itself
//! has no channels, no Tokio types, and does no IO, so ordering and
//! coalescing are unit tested here without a filesystem.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::engine::coalesce::ChangeBatch;
use crate::engine::{CyclePlan, DispatchEvent};
use crate::types::TaskName;
use crate::watch::path_utils::to_slash;
use crate::watch::patterns::WatchProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Watching,
    Dispatching,
}

/// Command produced by the core, to be executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchCommand {
    /// Start (or restart) the debounce timer.
    ArmDebounce,
    /// Run these pipelines, in order, then report `CycleFinished`.
    RunCycle(CyclePlan),
    /// Tell connected browsers to reload. Paths are project-relative.
    NotifyReload(Vec<PathBuf>),
    /// Stop the loop.
    Exit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchStep {
    pub commands: Vec<DispatchCommand>,
    /// Whether the outer loop should keep running.
    pub keep_running: bool,
}

impl DispatchStep {
    fn run(commands: Vec<DispatchCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn idle() -> Self {
        Self::run(Vec::new())
    }
}

/// Dispatcher state.
///
/// `reload_root` is the served directory relative to the project root, or
/// `None` when no dev server is running (reloads are then never emitted).
#[derive(Debug)]
pub struct Dispatcher {
    state: DispatchState,
    profiles: Vec<WatchProfile>,
    reload_root: Option<PathBuf>,
    batch: ChangeBatch,
    debounce_armed: bool,
    /// Paths matched by `livereload` bindings for the cycle in flight.
    pending_reload: Vec<PathBuf>,
    /// Outputs the last cycle wrote. The watcher reports them back; those
    /// echoes were already covered by the cycle's own reload.
    own_outputs: HashSet<PathBuf>,
}

impl Dispatcher {
    pub fn new(profiles: Vec<WatchProfile>, reload_root: Option<PathBuf>) -> Self {
        Self {
            state: DispatchState::Idle,
            profiles,
            reload_root,
            batch: ChangeBatch::new(),
            debounce_armed: false,
            pending_reload: Vec::new(),
            own_outputs: HashSet::new(),
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Number of changes waiting for the next cycle (for tests).
    pub fn pending_changes(&self) -> usize {
        self.batch.len()
    }

    /// Handle one event, returning the commands for the shell.
    pub fn step(&mut self, event: DispatchEvent) -> DispatchStep {
        match event {
            DispatchEvent::Started => self.on_started(),
            DispatchEvent::FileChanged(path) => self.on_file_changed(path),
            DispatchEvent::DebounceElapsed => self.on_debounce_elapsed(),
            DispatchEvent::CycleFinished { outputs_changed } => {
                self.on_cycle_finished(outputs_changed)
            }
            DispatchEvent::ShutdownRequested => {
                info!("shutdown requested; leaving watch loop");
                DispatchStep {
                    commands: vec![DispatchCommand::Exit],
                    keep_running: false,
                }
            }
        }
    }

    fn arm(&mut self) -> Vec<DispatchCommand> {
        if self.debounce_armed || self.batch.is_empty() {
            return Vec::new();
        }
        self.debounce_armed = true;
        vec![DispatchCommand::ArmDebounce]
    }

    fn on_started(&mut self) -> DispatchStep {
        if self.state != DispatchState::Idle {
            return DispatchStep::idle();
        }
        self.state = DispatchState::Watching;
        info!(bindings = self.profiles.len(), "watching for changes");
        DispatchStep::run(self.arm())
    }

    fn on_file_changed(&mut self, path: PathBuf) -> DispatchStep {
        if self.own_outputs.contains(&path) {
            debug!(path = ?path, "ignoring change written by the last cycle");
            return DispatchStep::idle();
        }
        self.batch.record(path);
        match self.state {
            DispatchState::Watching => DispatchStep::run(self.arm()),
            // Picked up once the current cycle finishes (or on start).
            DispatchState::Dispatching | DispatchState::Idle => DispatchStep::idle(),
        }
    }

    fn on_debounce_elapsed(&mut self) -> DispatchStep {
        self.debounce_armed = false;
        if self.state != DispatchState::Watching {
            return DispatchStep::idle();
        }
        // Echoes land within the first window after a cycle.
        self.own_outputs.clear();

        let changed = self.batch.drain();
        let (pipelines, reload) = self.plan(&changed);

        if pipelines.is_empty() {
            if reload.is_empty() {
                debug!(changes = changed.len(), "changes matched no binding to run");
                return DispatchStep::idle();
            }
            return DispatchStep::run(vec![DispatchCommand::NotifyReload(reload)]);
        }

        info!(?pipelines, changes = changed.len(), "dispatching cycle");
        self.state = DispatchState::Dispatching;
        self.pending_reload = reload;
        DispatchStep::run(vec![DispatchCommand::RunCycle(CyclePlan {
            pipelines,
            changed,
        })])
    }

    fn on_cycle_finished(&mut self, outputs_changed: Vec<PathBuf>) -> DispatchStep {
        if self.state != DispatchState::Dispatching {
            return DispatchStep::idle();
        }
        self.state = DispatchState::Watching;

        self.batch.discard(&outputs_changed);
        self.own_outputs = outputs_changed.iter().cloned().collect();

        let mut reload = std::mem::take(&mut self.pending_reload);
        if let Some(root) = &self.reload_root {
            reload.extend(
                outputs_changed
                    .into_iter()
                    .filter(|p| p.starts_with(root)),
            );
        }
        dedup_in_order(&mut reload);

        let mut commands = Vec::new();
        if !reload.is_empty() {
            commands.push(DispatchCommand::NotifyReload(reload));
        }
        commands.extend(self.arm());
        DispatchStep::run(commands)
    }

    /// Pipelines to run and paths to reload for a drained batch.
    ///
    /// Bindings are visited in declaration order; a pipeline bound by
    /// several matching bindings runs once, at its first position.
    fn plan(&self, changed: &[PathBuf]) -> (Vec<TaskName>, Vec<PathBuf>) {
        let mut pipelines: Vec<TaskName> = Vec::new();
        let mut reload = Vec::new();

        for profile in &self.profiles {
            let hits: Vec<&PathBuf> = changed
                .iter()
                .filter(|p| profile.matches(&to_slash(p)))
                .collect();
            if hits.is_empty() {
                continue;
            }
            debug!(binding = profile.name(), hits = hits.len(), "binding matched");

            for name in profile.run() {
                if !pipelines.contains(name) {
                    pipelines.push(name.clone());
                }
            }
            if profile.livereload() && self.reload_root.is_some() {
                reload.extend(hits.into_iter().cloned());
            }
        }

        dedup_in_order(&mut reload);
        (pipelines, reload)
    }
}

fn dedup_in_order(paths: &mut Vec<PathBuf>) {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    paths.retain(|p| seen.insert(p.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WatchBinding;

    fn profile(name: &str, files: &[&str], run: &[&str], livereload: bool) -> WatchProfile {
        WatchProfile::from_binding(&WatchBinding {
            name: name.into(),
            trigger_globs: files.iter().map(|s| s.to_string()).collect(),
            run: run.iter().map(|s| s.to_string()).collect(),
            livereload,
        })
        .unwrap()
    }

    fn docs_site() -> Dispatcher {
        Dispatcher::new(
            vec![
                profile("sass", &["docs/scss/**/*.scss"], &["sass:development", "postcss:development"], false),
                profile("ejs", &["docs/ejs/**/*.ejs"], &["ejs:development"], false),
                profile("livereload", &["docs/*.html", "docs/css/*.css"], &[], true),
            ],
            Some(PathBuf::from("docs")),
        )
    }

    fn changed(d: &mut Dispatcher, path: &str) -> DispatchStep {
        d.step(DispatchEvent::FileChanged(PathBuf::from(path)))
    }

    #[test]
    fn starts_idle_then_watches() {
        let mut d = docs_site();
        assert_eq!(d.state(), DispatchState::Idle);
        let step = d.step(DispatchEvent::Started);
        assert!(step.commands.is_empty());
        assert!(step.keep_running);
        assert_eq!(d.state(), DispatchState::Watching);
    }

    #[test]
    fn many_changes_in_one_window_make_one_cycle() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);

        assert_eq!(changed(&mut d, "docs/scss/main.scss").commands, vec![DispatchCommand::ArmDebounce]);
        for path in ["docs/scss/_vars.scss", "docs/scss/main.scss", "docs/ejs/index.ejs"] {
            assert!(changed(&mut d, path).commands.is_empty());
        }

        let step = d.step(DispatchEvent::DebounceElapsed);
        assert_eq!(
            step.commands,
            vec![DispatchCommand::RunCycle(CyclePlan {
                pipelines: vec![
                    "sass:development".into(),
                    "postcss:development".into(),
                    "ejs:development".into()
                ],
                changed: vec![
                    PathBuf::from("docs/scss/main.scss"),
                    PathBuf::from("docs/scss/_vars.scss"),
                    PathBuf::from("docs/ejs/index.ejs"),
                ],
            })]
        );
        assert_eq!(d.state(), DispatchState::Dispatching);
    }

    #[test]
    fn shared_pipelines_run_once_at_first_position() {
        let mut d = Dispatcher::new(
            vec![
                profile("a", &["a/*"], &["build", "lint"], false),
                profile("b", &["b/*"], &["deploy", "build"], false),
            ],
            None,
        );
        d.step(DispatchEvent::Started);
        changed(&mut d, "b/x");
        changed(&mut d, "a/x");
        match &d.step(DispatchEvent::DebounceElapsed).commands[..] {
            [DispatchCommand::RunCycle(plan)] => {
                assert_eq!(plan.pipelines, vec!["build", "lint", "deploy"]);
            }
            other => panic!("unexpected commands: {other:?}"),
        }
    }

    #[test]
    fn changes_during_a_cycle_wait_for_the_next_one() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);
        changed(&mut d, "docs/scss/main.scss");
        d.step(DispatchEvent::DebounceElapsed);

        assert!(changed(&mut d, "docs/ejs/index.ejs").commands.is_empty());
        assert_eq!(d.pending_changes(), 1);

        let step = d.step(DispatchEvent::CycleFinished {
            outputs_changed: Vec::new(),
        });
        assert_eq!(step.commands, vec![DispatchCommand::ArmDebounce]);
        assert_eq!(d.state(), DispatchState::Watching);
    }

    #[test]
    fn reload_only_for_outputs_under_the_served_root() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);
        changed(&mut d, "docs/scss/main.scss");
        d.step(DispatchEvent::DebounceElapsed);

        let step = d.step(DispatchEvent::CycleFinished {
            outputs_changed: vec![PathBuf::from("docs/css/main.css"), PathBuf::from("build/cache.json")],
        });
        assert_eq!(
            step.commands,
            vec![DispatchCommand::NotifyReload(vec![PathBuf::from("docs/css/main.css")])]
        );
    }

    #[test]
    fn unchanged_outputs_do_not_reload() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);
        changed(&mut d, "docs/scss/main.scss");
        d.step(DispatchEvent::DebounceElapsed);
        let step = d.step(DispatchEvent::CycleFinished {
            outputs_changed: Vec::new(),
        });
        assert!(step.commands.is_empty());
    }

    #[test]
    fn one_save_reloads_once_when_the_output_echoes_back() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);
        changed(&mut d, "docs/scss/main.scss");
        d.step(DispatchEvent::DebounceElapsed);

        let mut reloads = 0;
        let finished = d.step(DispatchEvent::CycleFinished {
            outputs_changed: vec![PathBuf::from("docs/css/main.css")],
        });
        reloads += finished
            .commands
            .iter()
            .filter(|c| matches!(c, DispatchCommand::NotifyReload(_)))
            .count();

        // The watcher reports the file the cycle just wrote, twice.
        assert!(changed(&mut d, "docs/css/main.css").commands.is_empty());
        assert!(changed(&mut d, "docs/css/main.css").commands.is_empty());
        let after = d.step(DispatchEvent::DebounceElapsed);
        reloads += after
            .commands
            .iter()
            .filter(|c| matches!(c, DispatchCommand::NotifyReload(_)))
            .count();

        assert_eq!(reloads, 1);
        assert_eq!(d.pending_changes(), 0);
    }

    #[test]
    fn echoes_queued_during_a_cycle_are_dropped_with_it() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);
        changed(&mut d, "docs/scss/main.scss");
        d.step(DispatchEvent::DebounceElapsed);

        changed(&mut d, "docs/css/main.css");
        changed(&mut d, "docs/ejs/index.ejs");
        let step = d.step(DispatchEvent::CycleFinished {
            outputs_changed: vec![PathBuf::from("docs/css/main.css")],
        });
        assert_eq!(
            step.commands,
            vec![
                DispatchCommand::NotifyReload(vec![PathBuf::from("docs/css/main.css")]),
                DispatchCommand::ArmDebounce,
            ]
        );
        assert_eq!(d.pending_changes(), 1);
    }

    #[test]
    fn later_edits_to_an_output_reload_again() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);
        changed(&mut d, "docs/scss/main.scss");
        d.step(DispatchEvent::DebounceElapsed);
        d.step(DispatchEvent::CycleFinished {
            outputs_changed: vec![PathBuf::from("docs/css/main.css")],
        });

        // Any window that elapses ends the echo guard.
        changed(&mut d, "docs/index.html");
        d.step(DispatchEvent::DebounceElapsed);

        assert_eq!(changed(&mut d, "docs/css/main.css").commands, vec![DispatchCommand::ArmDebounce]);
        assert_eq!(
            d.step(DispatchEvent::DebounceElapsed).commands,
            vec![DispatchCommand::NotifyReload(vec![PathBuf::from("docs/css/main.css")])]
        );
    }

    #[test]
    fn livereload_binding_without_tasks_reloads_directly() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);
        changed(&mut d, "docs/index.html");
        let step = d.step(DispatchEvent::DebounceElapsed);
        assert_eq!(
            step.commands,
            vec![DispatchCommand::NotifyReload(vec![PathBuf::from("docs/index.html")])]
        );
        assert_eq!(d.state(), DispatchState::Watching);
    }

    #[test]
    fn no_reloads_without_a_server() {
        let mut d = Dispatcher::new(
            vec![profile("livereload", &["docs/*.html"], &[], true)],
            None,
        );
        d.step(DispatchEvent::Started);
        changed(&mut d, "docs/index.html");
        assert!(d.step(DispatchEvent::DebounceElapsed).commands.is_empty());
    }

    #[test]
    fn unmatched_changes_are_dropped() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);
        changed(&mut d, "README.md");
        assert!(d.step(DispatchEvent::DebounceElapsed).commands.is_empty());
        assert_eq!(d.pending_changes(), 0);
    }

    #[test]
    fn changes_before_start_arm_on_start() {
        let mut d = docs_site();
        assert!(changed(&mut d, "docs/ejs/index.ejs").commands.is_empty());
        assert_eq!(d.step(DispatchEvent::Started).commands, vec![DispatchCommand::ArmDebounce]);
    }

    #[test]
    fn stale_timer_and_stray_finish_are_ignored() {
        let mut d = docs_site();
        d.step(DispatchEvent::Started);
        assert!(d.step(DispatchEvent::DebounceElapsed).commands.is_empty());
        assert!(d
            .step(DispatchEvent::CycleFinished { outputs_changed: vec![PathBuf::from("docs/a.css")] })
            .commands
            .is_empty());
        assert_eq!(d.state(), DispatchState::Watching);
    }

    #[test]
    fn shutdown_exits() {
        let mut d = docs_site();
        let step = d.step(DispatchEvent::ShutdownRequested);
        assert_eq!(step.commands, vec![DispatchCommand::Exit]);
        assert!(!step.keep_running);
    }
}
