#![allow(dead_code)]

use sitepipe::config::{ConfigFile, RawConfigFile, TaskConfig, ToolConfig, WatchConfig};
use sitepipe::errors::Result;
use sitepipe::types::TransformMode;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    /// Register a task under its full `group:target` name.
    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        let (group, target) = name
            .split_once(':')
            .expect("task names in tests must look like group:target");
        self.config
            .task
            .entry(group.to_string())
            .or_default()
            .insert(target.to_string(), task);
        self
    }

    pub fn with_pipeline(mut self, name: &str, steps: &[&str]) -> Self {
        self.config
            .pipeline
            .insert(name.to_string(), steps.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_watch(mut self, name: &str, files: &[&str], run: &[&str], livereload: bool) -> Self {
        self.config.watch.push(WatchConfig {
            name: name.to_string(),
            files: files.iter().map(|s| s.to_string()).collect(),
            run: run.iter().map(|s| s.to_string()).collect(),
            livereload,
        });
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn with_server(mut self, hostname: &str, port: u16, livereload_port: u16, root: &str) -> Self {
        self.config.server.hostname = hostname.to_string();
        self.config.server.port = port;
        self.config.server.livereload_port = livereload_port;
        self.config.server.root = root.to_string();
        self
    }

    pub fn with_minify_css_tool(mut self, cmd: &str) -> Self {
        self.config.tools.minify_css = Some(ToolConfig { cmd: cmd.to_string() });
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(mode: TransformMode, src: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                mode,
                src: src.iter().map(|s| s.to_string()).collect(),
                dest: None,
                flatten: false,
                source_map: false,
                required: false,
                ext: None,
                browsers: None,
            },
        }
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = Some(dest.to_string());
        self
    }

    pub fn flatten(mut self) -> Self {
        self.task.flatten = true;
        self
    }

    pub fn source_map(mut self) -> Self {
        self.task.source_map = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.task.required = true;
        self
    }

    pub fn ext(mut self, ext: &str) -> Self {
        self.task.ext = Some(ext.to_string());
        self
    }

    pub fn browsers(mut self, queries: &[&str]) -> Self {
        self.task.browsers = Some(queries.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
