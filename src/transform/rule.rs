// src/transform/rule.rs

//! Declarative transform rules and the named tasks that own them.

use std::path::PathBuf;

use crate::config::model::TaskConfig;
use crate::types::{TaskName, TransformMode};

/// Default output extension for rendered templates.
pub const DEFAULT_TEMPLATE_EXT: &str = ".html";

/// Typed rule options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOptions {
    pub flatten: bool,
    pub source_map: bool,
    /// "No matched files" is an error rather than a no-op.
    pub required: bool,
    /// Output extension for template rendering, including the dot.
    pub ext: String,
    /// Browserslist queries for prefixing / minification.
    pub browsers: Vec<String>,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            flatten: false,
            source_map: false,
            required: false,
            ext: DEFAULT_TEMPLATE_EXT.to_string(),
            browsers: Vec::new(),
        }
    }
}

/// A source-globs → destination mapping with a processing mode.
///
/// Paths are relative to the project root handed to the executor; they are
/// only expanded against the filesystem when the rule runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRule {
    /// Ordered glob patterns; a leading `!` marks an exclusion.
    pub sources: Vec<String>,
    pub destination: Option<PathBuf>,
    pub mode: TransformMode,
    pub options: RuleOptions,
}

impl TransformRule {
    pub fn from_config(cfg: &TaskConfig, default_browsers: &[String]) -> Self {
        Self {
            sources: cfg.src.clone(),
            destination: cfg.dest.as_ref().map(PathBuf::from),
            mode: cfg.mode,
            options: RuleOptions {
                flatten: cfg.flatten,
                source_map: cfg.source_map,
                required: cfg.required,
                ext: cfg
                    .ext
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TEMPLATE_EXT.to_string()),
                browsers: cfg.effective_browsers(default_browsers),
            },
        }
    }

    /// Inclusion patterns in declaration order.
    pub fn include_patterns(&self) -> impl Iterator<Item = &str> {
        self.sources
            .iter()
            .filter(|p| !p.starts_with('!'))
            .map(String::as_str)
    }

    /// Exclusion patterns with the leading `!` stripped.
    pub fn exclude_patterns(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().filter_map(|p| p.strip_prefix('!'))
    }
}

/// A label bound to exactly one transform rule (`"sass:dist"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTask {
    pub name: TaskName,
    pub rule: TransformRule,
}

impl NamedTask {
    pub fn new(name: impl Into<TaskName>, rule: TransformRule) -> Self {
        Self {
            name: name.into(),
            rule,
        }
    }

    /// The part before `:` (e.g. `"sass"`).
    pub fn group(&self) -> &str {
        self.name.split_once(':').map_or(self.name.as_str(), |(g, _)| g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_include_and_exclude_patterns() {
        let rule = TransformRule {
            sources: vec!["docs/js/*.js".into(), "!docs/js/main.min.js".into()],
            destination: Some(PathBuf::from("docs/js/main.min.js")),
            mode: TransformMode::Minify,
            options: RuleOptions::default(),
        };
        assert_eq!(rule.include_patterns().collect::<Vec<_>>(), vec!["docs/js/*.js"]);
        assert_eq!(
            rule.exclude_patterns().collect::<Vec<_>>(),
            vec!["docs/js/main.min.js"]
        );
    }

    #[test]
    fn group_is_prefix_of_name() {
        let task = NamedTask::new(
            "cssmin:dist",
            TransformRule {
                sources: vec!["a.css".into()],
                destination: Some(PathBuf::from("a.min.css")),
                mode: TransformMode::Minify,
                options: RuleOptions::default(),
            },
        );
        assert_eq!(task.group(), "cssmin");
    }
}
