// src/transform/tools.rs

//! Collaborator contracts for the work the orchestrator delegates.
//!
//! The executor talks to a [`Toolchain`] instead of invoking compilers
//! directly. Production uses [`DefaultToolchain`], which combines external
//! commands ([`CommandTool`]) with the built-in `lightningcss` passes; tests
//! swap in a fake that records requests.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use thiserror::Error;
use tracing::debug;

use crate::config::model::ToolsSection;
use crate::transform::command::CommandTool;
use crate::transform::css;

/// The collaborator operations a rule can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolOp {
    /// Stylesheet compiler (Sass → CSS). Input: `inputs[0]`.
    CompileStylesheet,
    /// CSS post-processor (vendor prefixing). Input: `texts`.
    PostProcess,
    /// CSS minifier. Input: `texts`, concatenated.
    MinifyCss,
    /// JS bundler/minifier. Input: all of `inputs`, in order.
    MinifyJs,
    /// Template renderer. Input: `inputs[0]`, no runtime data.
    RenderTemplate,
}

impl fmt::Display for ToolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolOp::CompileStylesheet => "compile",
            ToolOp::PostProcess => "post_process",
            ToolOp::MinifyCss => "minify_css",
            ToolOp::MinifyJs => "minify_js",
            ToolOp::RenderTemplate => "render_template",
        };
        f.write_str(s)
    }
}

/// Produced CSS handed to a collaborator, one entry per source file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceText {
    /// How maps should refer to this source: its path relative to the
    /// output's directory.
    pub name: String,
    pub code: String,
    /// The source's own map, with `sources` already relative to the
    /// output's directory.
    pub map: Option<String>,
}

/// One request to a collaborator.
#[derive(Debug, Clone, Copy)]
pub struct ToolRequest<'a> {
    /// Source files on disk.
    pub inputs: &'a [PathBuf],
    /// In-memory input, for operations that work on produced CSS.
    pub texts: &'a [SourceText],
    /// File name of the final output (maps refer to it).
    pub output_name: &'a str,
    /// Directory of the final output, relative to `root`.
    pub output_dir: &'a Path,
    /// Project root. External commands run here.
    pub root: &'a Path,
    pub browsers: &'a [String],
    pub source_map: bool,
}

impl ToolRequest<'_> {
    /// All texts as one stylesheet, in order. `None` when the request
    /// carries no in-memory input.
    pub fn joined_code(&self) -> Option<String> {
        match self.texts {
            [] => None,
            [only] => Some(only.code.clone()),
            texts => {
                let mut code = String::new();
                for text in texts {
                    code.push_str(&text.code);
                    if !code.ends_with('\n') {
                        code.push('\n');
                    }
                }
                Some(code)
            }
        }
    }
}

/// Text produced by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    pub code: String,
    pub map: Option<String>,
}

/// A collaborator failure. The message is the tool's own diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ToolError(pub String);

pub type ToolResult = std::result::Result<ToolOutput, ToolError>;

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = ToolResult> + Send + 'a>>;

/// Trait abstracting the external tools a rule delegates to.
pub trait Toolchain: Send + Sync {
    fn run<'a>(&'a self, op: ToolOp, request: ToolRequest<'a>) -> ToolFuture<'a>;
}

/// Production toolchain.
///
/// | op                | default                                   |
/// |-------------------|-------------------------------------------|
/// | compile           | `sass [--no-]source-map {input} {output}`  |
/// | post_process      | built-in `lightningcss` prefixing          |
/// | minify_css        | built-in `lightningcss` minification       |
/// | minify_js         | `uglifyjs {inputs} -o {output}`            |
/// | render_template   | `ejs {input} -o {output}`                  |
///
/// Any of them can be replaced with a `[tools.<op>] cmd` template.
#[derive(Debug, Clone, Default)]
pub struct DefaultToolchain {
    compile: Option<CommandTool>,
    post_process: Option<CommandTool>,
    minify_css: Option<CommandTool>,
    minify_js: Option<CommandTool>,
    render_template: Option<CommandTool>,
}

impl DefaultToolchain {
    pub fn from_config(tools: &ToolsSection) -> Self {
        let cmd = |t: &Option<crate::config::model::ToolConfig>| {
            t.as_ref().map(|c| CommandTool::new(c.cmd.clone()))
        };
        Self {
            compile: cmd(&tools.compile),
            post_process: cmd(&tools.post_process),
            minify_css: cmd(&tools.minify_css),
            minify_js: cmd(&tools.minify_js),
            render_template: cmd(&tools.render_template),
        }
    }

    fn default_command(op: ToolOp, source_map: bool) -> Option<CommandTool> {
        let template = match (op, source_map) {
            (ToolOp::CompileStylesheet, true) => "sass --source-map {input} {output}",
            (ToolOp::CompileStylesheet, false) => "sass --no-source-map {input} {output}",
            (ToolOp::MinifyJs, true) => "uglifyjs {inputs} -o {output} --source-map",
            (ToolOp::MinifyJs, false) => "uglifyjs {inputs} -o {output}",
            (ToolOp::RenderTemplate, _) => "ejs {input} -o {output}",
            (ToolOp::PostProcess | ToolOp::MinifyCss, _) => return None,
        };
        Some(CommandTool::new(template))
    }

    fn configured(&self, op: ToolOp) -> Option<&CommandTool> {
        match op {
            ToolOp::CompileStylesheet => self.compile.as_ref(),
            ToolOp::PostProcess => self.post_process.as_ref(),
            ToolOp::MinifyCss => self.minify_css.as_ref(),
            ToolOp::MinifyJs => self.minify_js.as_ref(),
            ToolOp::RenderTemplate => self.render_template.as_ref(),
        }
    }
}

impl Toolchain for DefaultToolchain {
    fn run<'a>(&'a self, op: ToolOp, request: ToolRequest<'a>) -> ToolFuture<'a> {
        Box::pin(async move {
            let command = self
                .configured(op)
                .cloned()
                .or_else(|| Self::default_command(op, request.source_map));

            if let Some(command) = command {
                debug!(%op, cmd = %command.template(), "delegating to external command");
                return command.run(request).await;
            }

            match op {
                ToolOp::PostProcess => css::prefix(&request),
                _ => css::minify(&request),
            }
        })
    }
}
