use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Canonical task / pipeline name type (`"sass:dist"`, `"dev-compile"`).
pub type TaskName = String;

/// Reserved step that starts the dev server.
pub const SERVE_STEP: &str = "serve";
/// Reserved step that enters the watch loop.
pub const WATCH_STEP: &str = "watch";

/// How a transform rule processes its matched files.
///
/// The heavy lifting for `Compile`, `Minify`, `TemplateRender` and
/// `PostProcess` is delegated to a [`crate::transform::Toolchain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    /// Byte-for-byte copy into the destination.
    Copy,
    /// Stylesheet compilation (Sass → CSS).
    Compile,
    /// CSS or JS minification into a single destination file.
    Minify,
    /// One HTML file per template source.
    TemplateRender,
    /// Post-processing of already produced CSS (vendor prefixing).
    PostProcess,
    /// Remove matched files and directories.
    Clean,
}

impl TransformMode {
    /// Whether a rule in this mode must name a destination.
    pub fn requires_destination(self) -> bool {
        matches!(
            self,
            TransformMode::Copy
                | TransformMode::Compile
                | TransformMode::Minify
                | TransformMode::TemplateRender
        )
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransformMode::Copy => "copy",
            TransformMode::Compile => "compile",
            TransformMode::Minify => "minify",
            TransformMode::TemplateRender => "template_render",
            TransformMode::PostProcess => "post_process",
            TransformMode::Clean => "clean",
        };
        f.pad(s)
    }
}

impl FromStr for TransformMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "copy" => Ok(TransformMode::Copy),
            "compile" => Ok(TransformMode::Compile),
            "minify" => Ok(TransformMode::Minify),
            "template_render" => Ok(TransformMode::TemplateRender),
            "post_process" => Ok(TransformMode::PostProcess),
            "clean" => Ok(TransformMode::Clean),
            other => Err(format!(
                "invalid transform mode: {other} (expected copy, compile, minify, template_render, post_process or clean)"
            )),
        }
    }
}

/// Join a task group and target into the `group:target` form used on the
/// command line and in pipeline step lists.
pub fn task_name(group: &str, target: &str) -> TaskName {
    format!("{group}:{target}")
}
