// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::server::ReloadHandle;

use super::core::Dispatcher;
use super::pipeline::CycleBackend;
use super::{DispatchCommand, DispatchEvent};

/// Drives the dispatcher in response to `DispatchEvent`s and delegates
/// cycle execution to a `CycleBackend`.
///
/// This is an IO shell around `Dispatcher`, which contains all the
/// semantics. It reads events from the channel, owns the debounce timer,
/// awaits cycles inline (so events arriving meanwhile stay queued) and
/// forwards reloads to the dev server.
pub struct DispatchRuntime<B: CycleBackend> {
    core: Dispatcher,
    event_rx: mpsc::Receiver<DispatchEvent>,
    backend: B,
    reload: Option<ReloadHandle>,
    debounce: Duration,
    deadline: Option<Instant>,
    cycles: usize,
}

impl<B: CycleBackend> fmt::Debug for DispatchRuntime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRuntime")
            .field("core", &self.core)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl<B: CycleBackend> DispatchRuntime<B> {
    pub fn new(
        core: Dispatcher,
        event_rx: mpsc::Receiver<DispatchEvent>,
        backend: B,
        reload: Option<ReloadHandle>,
        debounce: Duration,
    ) -> Self {
        Self {
            core,
            event_rx,
            backend,
            reload,
            debounce,
            deadline: None,
            cycles: 0,
        }
    }

    /// Main event loop. Returns the number of cycles run.
    ///
    /// The loop ends on `ShutdownRequested`, or once the event channel is
    /// closed and no debounce is pending.
    pub async fn run(mut self) -> Result<usize> {
        info!(debounce_ms = self.debounce.as_millis() as u64, "dispatch loop started");
        self.handle(DispatchEvent::Started).await;

        let mut closed = false;
        loop {
            let event = match self.deadline {
                Some(deadline) => {
                    tokio::select! {
                        ev = self.event_rx.recv(), if !closed => ev,
                        _ = sleep_until(deadline) => {
                            self.deadline = None;
                            Some(DispatchEvent::DebounceElapsed)
                        }
                    }
                }
                None if closed => break,
                None => self.event_rx.recv().await,
            };

            let Some(event) = event else {
                debug!("dispatch event channel closed");
                closed = true;
                continue;
            };

            debug!(?event, "dispatch loop received event");
            if !self.handle(event).await {
                break;
            }
        }

        info!(cycles = self.cycles, "dispatch loop exiting");
        Ok(self.cycles)
    }

    /// Feed one event (and any follow-up events) through the core.
    /// Returns `false` when the core asked to stop.
    async fn handle(&mut self, event: DispatchEvent) -> bool {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            let step = self.core.step(event);

            for command in step.commands {
                match command {
                    DispatchCommand::ArmDebounce => {
                        self.deadline = Some(Instant::now() + self.debounce);
                    }
                    DispatchCommand::RunCycle(plan) => {
                        self.cycles += 1;
                        let outcome = self.backend.run_cycle(plan).await;
                        pending.push_back(DispatchEvent::CycleFinished {
                            outputs_changed: outcome.outputs_changed,
                        });
                    }
                    DispatchCommand::NotifyReload(paths) => self.notify_reload(paths),
                    DispatchCommand::Exit => {
                        info!("dispatcher issued Exit command");
                    }
                }
            }

            if !step.keep_running {
                return false;
            }
        }
        true
    }

    fn notify_reload(&self, paths: Vec<std::path::PathBuf>) {
        match &self.reload {
            Some(handle) => {
                let clients = handle.notify(&paths);
                info!(paths = paths.len(), clients, "live reload sent");
            }
            None => warn!("reload requested but no dev server is running"),
        }
    }
}
