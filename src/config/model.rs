// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{task_name, TaskName, TransformMode};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// debounce_ms = 200
///
/// [server]
/// port = 8080
/// livereload_port = 42201
/// root = "docs"
///
/// [task.sass.dist]
/// mode = "compile"
/// src = ["docs/scss/main.scss"]
/// dest = "docs/css/main.css"
///
/// [pipeline]
/// dist = ["clean:dist", "sass:dist"]
///
/// [[watch]]
/// name = "sass"
/// files = ["docs/scss/**/*.scss"]
/// run = ["sass:development"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub tools: ToolsSection,

    /// `[task.<group>.<target>]` tables. The registered name is
    /// `"<group>:<target>"`.
    #[serde(default)]
    pub task: BTreeMap<String, BTreeMap<String, TaskConfig>>,

    /// Composite task names mapped to their ordered step lists.
    #[serde(default)]
    pub pipeline: BTreeMap<String, Vec<String>>,

    /// `[[watch]]` bindings, kept in declaration order.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// A validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// holders of a `ConfigFile` can rely on every cross reference resolving.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub server: ServerSection,
    pub tools: ToolsSection,
    pub task: BTreeMap<String, BTreeMap<String, TaskConfig>>,
    pub pipeline: BTreeMap<String, Vec<String>>,
    pub watch: Vec<WatchConfig>,
    /// Directory against which relative paths in the config are resolved.
    pub base_dir: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            server: raw.server,
            tools: raw.tools,
            task: raw.task,
            pipeline: raw.pipeline,
            watch: raw.watch,
            base_dir: PathBuf::from("."),
        }
    }

    /// Return the same config with relative paths anchored at `dir`.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Iterate over all tasks as `("group:target", config)` pairs, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = (TaskName, &TaskConfig)> {
        self.task.iter().flat_map(|(group, targets)| {
            targets
                .iter()
                .map(move |(target, cfg)| (task_name(group, target), cfg))
        })
    }

    /// Whether a task with this full name exists.
    pub fn has_task(&self, name: &str) -> bool {
        match name.split_once(':') {
            Some((group, target)) => self
                .task
                .get(group)
                .is_some_and(|targets| targets.contains_key(target)),
            None => false,
        }
    }

    /// Resolve a config-relative path.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// `[config]` section: global behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Window in which filesystem events are coalesced into one cycle.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Default browserslist queries used by prefixing and minification when a
    /// task does not set its own `browsers`.
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_browsers() -> Vec<String> {
    vec!["last 8 versions".to_string(), "ie 9".to_string()]
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            browsers: default_browsers(),
        }
    }
}

/// `[server]` section: dev server and live reload.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_hostname")]
    pub hostname: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_livereload_port")]
    pub livereload_port: u16,

    /// Directory served over HTTP; also the root for reload detection.
    #[serde(default = "default_root")]
    pub root: String,
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_livereload_port() -> u16 {
    42201
}

fn default_root() -> String {
    "docs".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            port: default_port(),
            livereload_port: default_livereload_port(),
            root: default_root(),
        }
    }
}

/// `[tools]` section: command overrides for the external collaborators.
///
/// ```toml
/// [tools.compile]
/// cmd = "sass --load-path=node_modules {input} {output}"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsSection {
    #[serde(default)]
    pub compile: Option<ToolConfig>,
    #[serde(default)]
    pub post_process: Option<ToolConfig>,
    #[serde(default)]
    pub minify_css: Option<ToolConfig>,
    #[serde(default)]
    pub minify_js: Option<ToolConfig>,
    #[serde(default)]
    pub render_template: Option<ToolConfig>,
}

impl ToolsSection {
    /// All configured tools as `(section name, config)` pairs.
    pub fn configured(&self) -> Vec<(&'static str, &ToolConfig)> {
        [
            ("compile", self.compile.as_ref()),
            ("post_process", self.post_process.as_ref()),
            ("minify_css", self.minify_css.as_ref()),
            ("minify_js", self.minify_js.as_ref()),
            ("render_template", self.render_template.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, cfg)| cfg.map(|c| (name, c)))
        .collect()
    }
}

/// A command template. Supported placeholders: `{input}`, `{inputs}`,
/// `{output}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    pub cmd: String,
}

/// `[task.<group>.<target>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub mode: TransformMode,

    /// Source globs, in order. A leading `!` excludes matches.
    pub src: Vec<String>,

    /// Destination file or directory.
    #[serde(default)]
    pub dest: Option<String>,

    /// Drop the source directory structure when writing outputs.
    #[serde(default)]
    pub flatten: bool,

    /// Ask the collaborator for a source map and write it next to the output.
    #[serde(default)]
    pub source_map: bool,

    /// Treat "no matched files" as an error instead of a no-op.
    #[serde(default)]
    pub required: bool,

    /// Output extension for template rendering (default `.html`).
    #[serde(default)]
    pub ext: Option<String>,

    /// Browserslist queries; falls back to `[config].browsers`.
    #[serde(default)]
    pub browsers: Option<Vec<String>>,
}

impl TaskConfig {
    /// Convenience: effective browser targets given the `[config]` default.
    pub fn effective_browsers(&self, defaults: &[String]) -> Vec<String> {
        self.browsers
            .clone()
            .unwrap_or_else(|| defaults.to_vec())
    }
}

/// `[[watch]]` binding.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    pub name: String,

    /// Trigger globs, relative to the config directory.
    pub files: Vec<String>,

    /// Pipelines (or single tasks) to run, in order.
    #[serde(default)]
    pub run: Vec<String>,

    /// Signal connected browsers when this binding fires.
    #[serde(default)]
    pub livereload: bool,
}
