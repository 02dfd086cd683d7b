// src/transform/executor.rs

//! Applies one [`TransformRule`] against the filesystem.
//!
//! The executor owns no state between runs: sources are expanded every time
//! a task runs, so files created after startup are picked up by the next
//! cycle. All writes go through [`write_if_changed`], which is what makes a
//! second run over unchanged inputs report nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{Result, SitepipeError};
use crate::fs::FileSystem;
use crate::transform::expand::{MatchedFile, expand_sources};
use crate::transform::output::{WriteOutcome, write_if_changed};
use crate::transform::rule::{NamedTask, TransformRule};
use crate::transform::sourcemap::{map_path_for, rebase_sources, relative_path};
use crate::transform::tools::{SourceText, ToolOp, ToolOutput, ToolRequest, Toolchain};
use crate::watch::path_utils::to_slash;
use crate::types::TransformMode;

/// What a single task did to the filesystem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Outputs whose content changed (or that did not exist before).
    pub written: Vec<PathBuf>,
    /// Outputs that already held the produced bytes.
    pub unchanged: Vec<PathBuf>,
    /// Paths deleted by a clean rule.
    pub removed: Vec<PathBuf>,
}

impl StepReport {
    /// Did this step change anything on disk?
    pub fn changed(&self) -> bool {
        !self.written.is_empty() || !self.removed.is_empty()
    }

    /// Written and removed paths, in that order.
    pub fn changed_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.written.iter().chain(self.removed.iter())
    }

    pub fn merge(&mut self, other: StepReport) {
        self.written.extend(other.written);
        self.unchanged.extend(other.unchanged);
        self.removed.extend(other.removed);
    }

    fn record(&mut self, path: PathBuf, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Written => self.written.push(path),
            WriteOutcome::Unchanged => self.unchanged.push(path),
        }
    }
}

/// Runs transform rules against a project root.
#[derive(Clone)]
pub struct RuleExecutor {
    fs: Arc<dyn FileSystem>,
    tools: Arc<dyn Toolchain>,
    root: PathBuf,
}

impl std::fmt::Debug for RuleExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleExecutor")
            .field("fs", &self.fs)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl RuleExecutor {
    pub fn new(fs: Arc<dyn FileSystem>, tools: Arc<dyn Toolchain>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            tools,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Execute a task's rule.
    pub async fn execute(&self, task: &NamedTask) -> Result<StepReport> {
        let rule = &task.rule;
        let include_dirs = rule.mode == TransformMode::Clean;
        let mut sources = expand_sources(self.fs.as_ref(), &self.root, rule, include_dirs)?;

        if rule.mode == TransformMode::Compile {
            sources.retain(|f| !is_partial(&f.path));
        }

        if sources.is_empty() {
            if rule.options.required {
                return Err(SitepipeError::Transform {
                    step: task.name.clone(),
                    message: format!("no files matched {:?}", rule.sources),
                });
            }
            debug!(task = %task.name, "no matching sources; nothing to do");
            return Ok(StepReport::default());
        }

        info!(task = %task.name, mode = %rule.mode, sources = sources.len(), "running task");

        let report = match rule.mode {
            TransformMode::Copy => self.copy(rule, &sources)?,
            TransformMode::Compile => self.compile(task, &sources).await?,
            TransformMode::Minify => self.minify(task, &sources).await?,
            TransformMode::TemplateRender => self.render(task, &sources).await?,
            TransformMode::PostProcess => self.post_process(task, &sources).await?,
            TransformMode::Clean => self.clean(&sources)?,
        };

        info!(
            task = %task.name,
            written = report.written.len(),
            unchanged = report.unchanged.len(),
            removed = report.removed.len(),
            "task finished"
        );
        Ok(report)
    }

    fn destination(&self, rule: &TransformRule) -> Option<PathBuf> {
        rule.destination.as_ref().map(|d| self.root.join(d))
    }

    /// Directory holding `out`, relative to the project root.
    fn output_dir(&self, out: &Path) -> PathBuf {
        let parent = out.parent().unwrap_or(Path::new(""));
        parent.strip_prefix(&self.root).unwrap_or(parent).to_path_buf()
    }

    /// Read `file` as CSS for a collaborator writing `out`.
    ///
    /// With maps requested, the file's own `<file>.map` (when present) comes
    /// along, its sources re-expressed from `out`'s directory.
    fn source_text(&self, task: &NamedTask, file: &Path, out: &Path) -> Result<SourceText> {
        let code = self.read_string(file)?;
        let from = file.parent().unwrap_or(Path::new(""));
        let to = out.parent().unwrap_or(Path::new(""));
        let name = to_slash(&relative_path(to, file));

        let map_file = map_path_for(file);
        let map = if task.rule.options.source_map && self.fs.is_file(&map_file) {
            let raw = self.read_string(&map_file)?;
            match rebase_sources(&raw, from, to, &file_name(out)) {
                Ok(map) => Some(map),
                Err(e) => {
                    warn!(task = %task.name, map = ?map_file, error = %e, "ignoring input source map");
                    None
                }
            }
        } else {
            None
        };

        Ok(SourceText { name, code, map })
    }

    /// Where one source lands under a directory destination.
    fn place(&self, rule: &TransformRule, dest_dir: &Path, file: &MatchedFile, name: &str) -> PathBuf {
        let parent = if rule.options.flatten {
            None
        } else {
            file.rel.parent().filter(|p| !p.as_os_str().is_empty())
        };
        match parent {
            Some(parent) => dest_dir.join(parent).join(name),
            None => dest_dir.join(name),
        }
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.fs.read(path).map_err(|e| SitepipeError::io(path, e))
    }

    fn read_string(&self, path: &Path) -> Result<String> {
        self.fs
            .read_to_string(path)
            .map_err(|e| SitepipeError::io(path, e))
    }

    fn write(&self, report: &mut StepReport, path: PathBuf, contents: &[u8]) -> Result<()> {
        let outcome = write_if_changed(self.fs.as_ref(), &path, contents)?;
        report.record(path, outcome);
        Ok(())
    }

    /// Write a tool result and, when asked for, its source map.
    fn write_output(
        &self,
        task: &NamedTask,
        report: &mut StepReport,
        out: PathBuf,
        produced: ToolOutput,
    ) -> Result<()> {
        let map_path = map_path_for(&out);
        self.write(report, out, produced.code.as_bytes())?;

        if task.rule.options.source_map {
            match produced.map {
                Some(map) => self.write(report, map_path, map.as_bytes())?,
                None => warn!(task = %task.name, "source map requested but the tool produced none"),
            }
        }
        Ok(())
    }

    async fn run_tool(&self, task: &NamedTask, op: ToolOp, request: ToolRequest<'_>) -> Result<ToolOutput> {
        self.tools
            .run(op, request)
            .await
            .map_err(|e| SitepipeError::Transform {
                step: task.name.clone(),
                message: e.0,
            })
    }

    fn request<'a>(
        &'a self,
        rule: &'a TransformRule,
        inputs: &'a [PathBuf],
        texts: &'a [SourceText],
        output_name: &'a str,
        output_dir: &'a Path,
    ) -> ToolRequest<'a> {
        ToolRequest {
            inputs,
            texts,
            output_name,
            output_dir,
            root: &self.root,
            browsers: &rule.options.browsers,
            source_map: rule.options.source_map,
        }
    }

    fn copy(&self, rule: &TransformRule, sources: &[MatchedFile]) -> Result<StepReport> {
        let mut report = StepReport::default();
        let Some(dest) = self.destination(rule) else {
            return Ok(report);
        };
        let single = single_output(&dest, sources.len());

        for file in sources {
            let bytes = self.read(&file.path)?;
            let out = if single {
                dest.clone()
            } else {
                self.place(rule, &dest, file, &file_name(&file.path))
            };
            self.write(&mut report, out, &bytes)?;
        }
        Ok(report)
    }

    async fn compile(&self, task: &NamedTask, sources: &[MatchedFile]) -> Result<StepReport> {
        let rule = &task.rule;
        let mut report = StepReport::default();
        let Some(dest) = self.destination(rule) else {
            return Ok(report);
        };
        let single = single_output(&dest, sources.len());

        for file in sources {
            let out = if single {
                dest.clone()
            } else {
                self.place(rule, &dest, file, &format!("{}.css", file_stem(&file.path)))
            };
            let output_name = file_name(&out);
            let output_dir = self.output_dir(&out);
            let inputs = [file.path.clone()];
            let request = self.request(rule, &inputs, &[], &output_name, &output_dir);
            let produced = self
                .run_tool(task, ToolOp::CompileStylesheet, request)
                .await?;
            self.write_output(task, &mut report, out, produced)?;
        }
        Ok(report)
    }

    async fn minify(&self, task: &NamedTask, sources: &[MatchedFile]) -> Result<StepReport> {
        let rule = &task.rule;
        let mut report = StepReport::default();
        let Some(dest) = self.destination(rule) else {
            return Ok(report);
        };
        let output_name = file_name(&dest);
        let output_dir = self.output_dir(&dest);
        let inputs: Vec<PathBuf> = sources.iter().map(|f| f.path.clone()).collect();

        let produced = if has_extension(&dest, "js") {
            let request = self.request(rule, &inputs, &[], &output_name, &output_dir);
            self.run_tool(task, ToolOp::MinifyJs, request).await?
        } else {
            let texts = sources
                .iter()
                .map(|f| self.source_text(task, &f.path, &dest))
                .collect::<Result<Vec<_>>>()?;
            let request = self.request(rule, &inputs, &texts, &output_name, &output_dir);
            self.run_tool(task, ToolOp::MinifyCss, request).await?
        };

        self.write_output(task, &mut report, dest, produced)?;
        Ok(report)
    }

    async fn render(&self, task: &NamedTask, sources: &[MatchedFile]) -> Result<StepReport> {
        let rule = &task.rule;
        let mut report = StepReport::default();
        let Some(dest) = self.destination(rule) else {
            return Ok(report);
        };

        for file in sources {
            let name = format!("{}{}", file_stem(&file.path), rule.options.ext);
            let out = self.place(rule, &dest, file, &name);
            let output_dir = self.output_dir(&out);
            let inputs = [file.path.clone()];
            let request = ToolRequest {
                source_map: false,
                ..self.request(rule, &inputs, &[], &name, &output_dir)
            };
            let produced = self
                .run_tool(task, ToolOp::RenderTemplate, request)
                .await?;
            self.write(&mut report, out, produced.code.as_bytes())?;
        }
        Ok(report)
    }

    async fn post_process(&self, task: &NamedTask, sources: &[MatchedFile]) -> Result<StepReport> {
        let rule = &task.rule;
        let mut report = StepReport::default();
        let dest = self.destination(rule);
        let single = dest
            .as_ref()
            .is_some_and(|d| single_output(d, sources.len()));

        for file in sources {
            let out = match &dest {
                Some(d) if single => d.clone(),
                Some(d) => self.place(rule, d, file, &file_name(&file.path)),
                None => file.path.clone(),
            };
            let texts = [self.source_text(task, &file.path, &out)?];
            let output_name = file_name(&out);
            let output_dir = self.output_dir(&out);
            let inputs = [file.path.clone()];
            let request = self.request(rule, &inputs, &texts, &output_name, &output_dir);
            let produced = self.run_tool(task, ToolOp::PostProcess, request).await?;

            // Rewriting in place without a map orphans the one already there.
            let stale_map = map_path_for(&out);
            if !rule.options.source_map && out == file.path && self.fs.is_file(&stale_map) {
                self.fs
                    .remove_file(&stale_map)
                    .map_err(|e| SitepipeError::io(&stale_map, e))?;
                debug!(path = ?stale_map, "removed map of rewritten stylesheet");
                report.removed.push(stale_map);
            }
            self.write_output(task, &mut report, out, produced)?;
        }
        Ok(report)
    }

    fn clean(&self, sources: &[MatchedFile]) -> Result<StepReport> {
        let mut report = StepReport::default();
        for file in sources {
            let path = &file.path;
            // An earlier match may have been a directory containing this one.
            if !self.fs.exists(path) {
                continue;
            }
            let result = if self.fs.is_dir(path) {
                self.fs.remove_dir_all(path)
            } else {
                self.fs.remove_file(path)
            };
            result.map_err(|e| SitepipeError::io(path, e))?;
            debug!(path = ?path, "removed");
            report.removed.push(path.clone());
        }
        Ok(report)
    }
}

/// Sass partials (`_mixins.scss`) are only ever imported.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

/// A destination with an extension receiving exactly one source is a file.
fn single_output(dest: &Path, sources: usize) -> bool {
    sources == 1 && dest.extension().is_some()
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
