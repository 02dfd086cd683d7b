// src/transform/mod.rs

//! Transform rules and their execution.
//!
//! - `rule`: the declarative rule and the named task owning it.
//! - `expand`: execution-time glob expansion.
//! - `executor`: per-mode behaviour, writing through `output`.
//! - `tools` / `command` / `css`: the collaborators rules delegate to.
//! - `sourcemap`: keeping map `sources` valid where maps finally land.

pub mod command;
pub mod css;
pub mod executor;
pub mod expand;
pub mod output;
pub mod rule;
pub mod sourcemap;
pub mod tools;

pub use executor::{RuleExecutor, StepReport};
pub use rule::{NamedTask, RuleOptions, TransformRule};
pub use tools::{DefaultToolchain, ToolError, ToolOp, SourceText, ToolOutput, ToolRequest, Toolchain};
