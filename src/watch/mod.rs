// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Compiling each `[[watch]]` binding's trigger globs.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//!
//! It does **not** decide what runs; it only turns filesystem changes into
//! project-relative `DispatchEvent::FileChanged` events for the dispatcher.

pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::{WatchProfile, build_profiles};
pub use watcher::{WatcherHandle, spawn_watcher};
