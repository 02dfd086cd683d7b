// src/transform/command.rs

//! External collaborator commands.
//!
//! A command is a shell template with `{input}`, `{inputs}` and `{output}`
//! placeholders. It runs in the project root, so relative paths in the
//! template (`--load-path=docs/scss`) mean the same thing wherever
//! `sitepipe` was started. Each run gets a private staging directory: the
//! tool writes into it, and the executor decides what (if anything) reaches
//! the real output path. A map the tool leaves next to its output is
//! rebased onto the output's real directory on the way out.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use regex::{Captures, Regex};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::transform::sourcemap::{map_path_for, rebase_sources};
use crate::transform::tools::{ToolError, ToolOutput, ToolRequest, ToolResult};

const PLACEHOLDER: &str = r"\{(input|inputs|output)\}";

/// A shell command template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTool {
    template: String,
}

impl CommandTool {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute placeholders in a single pass, so paths that themselves
    /// contain `{output}` are left alone.
    pub fn render(&self, inputs: &[PathBuf], output: &Path) -> Result<String, ToolError> {
        let re = Regex::new(PLACEHOLDER).map_err(|e| ToolError(e.to_string()))?;
        let rendered = re.replace_all(&self.template, |caps: &Captures<'_>| match &caps[1] {
            "input" => inputs.first().map(|p| quote(p)).unwrap_or_default(),
            "inputs" => inputs.iter().map(|p| quote(p)).collect::<Vec<_>>().join(" "),
            _ => quote(output),
        });
        Ok(rendered.into_owned())
    }

    /// Run the command for one request and collect what it produced.
    pub async fn run(&self, request: ToolRequest<'_>) -> ToolResult {
        let staging = TempDir::new().map_err(|e| ToolError(format!("staging dir: {e}")))?;
        // Tools report paths through symlinks resolved.
        let staging_dir = canonical(staging.path()).await;
        let output = staging_dir.join(request.output_name);

        // In-memory input is handed to the tool as a file next to its output.
        let inputs = match request.joined_code() {
            Some(code) => {
                let input_dir = staging_dir.join("in");
                let input = input_dir.join(request.output_name);
                tokio::fs::create_dir_all(&input_dir)
                    .await
                    .map_err(|e| ToolError(format!("staging input: {e}")))?;
                tokio::fs::write(&input, code)
                    .await
                    .map_err(|e| ToolError(format!("staging input: {e}")))?;
                vec![input]
            }
            None => request.inputs.to_vec(),
        };

        let line = self.render(&inputs, &output)?;
        info!(cmd = %line, "running tool");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&line);
            c
        };
        cmd.current_dir(request.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let out = cmd
            .output()
            .await
            .map_err(|e| ToolError(format!("failed to start `{line}`: {e}")))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let stdout = String::from_utf8_lossy(&out.stdout);
            let message = if stderr.trim().is_empty() {
                stdout.trim_end().to_string()
            } else {
                stderr.trim_end().to_string()
            };
            let code = out.status.code().unwrap_or(-1);
            debug!(exit_code = code, "tool failed");
            return Err(ToolError(if message.is_empty() {
                format!("`{line}` exited with status {code}")
            } else {
                message
            }));
        }

        let code = tokio::fs::read_to_string(&output).await.map_err(|e| {
            ToolError(format!("`{line}` did not produce {}: {e}", request.output_name))
        })?;

        let map = if request.source_map {
            match tokio::fs::read_to_string(map_path_for(&output)).await {
                Ok(map) => {
                    let output_dir = canonical(request.root).await.join(request.output_dir);
                    Some(
                        rebase_sources(&map, &staging_dir, &output_dir, request.output_name)
                            .unwrap_or_else(|e| {
                                warn!(cmd = %line, error = %e, "keeping source map as written");
                                map
                            }),
                    )
                }
                Err(_) => None,
            }
        } else {
            None
        };

        Ok(ToolOutput { code, map })
    }
}

async fn canonical(path: &Path) -> PathBuf {
    match tokio::fs::canonicalize(path).await {
        Ok(path) => path,
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}

fn quote(path: &Path) -> String {
    let s = path.to_string_lossy();
    if cfg!(windows) {
        format!("\"{s}\"")
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
