// src/registry/resolver.rs

//! Composite name → flat ordered step list.

use std::fmt;
use std::sync::Arc;

use crate::errors::{Result, SitepipeError};
use crate::registry::TaskRegistry;
use crate::transform::rule::NamedTask;
use crate::types::{SERVE_STEP, WATCH_STEP};

/// A single executable step produced by resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedStep {
    /// Apply a task's transform rule.
    Task(Arc<NamedTask>),
    /// Start the dev server.
    Serve,
    /// Enter the watch loop.
    Watch,
}

impl ResolvedStep {
    pub fn name(&self) -> &str {
        match self {
            ResolvedStep::Task(task) => &task.name,
            ResolvedStep::Serve => SERVE_STEP,
            ResolvedStep::Watch => WATCH_STEP,
        }
    }
}

impl fmt::Display for ResolvedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TaskRegistry {
    /// Resolve a pipeline (or single task) name into its ordered steps.
    ///
    /// Nested pipelines are expanded in place. Resolution never touches the
    /// filesystem: an unknown name fails here, before anything runs.
    pub fn resolve(&self, name: &str) -> Result<Vec<ResolvedStep>> {
        let mut steps = Vec::new();
        let mut stack = Vec::new();
        self.resolve_into(name, &mut stack, &mut steps)?;
        Ok(steps)
    }

    /// Resolve every name up front and concatenate the results.
    ///
    /// Fails on the first unknown name without returning partial output.
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ResolvedStep>> {
        let mut steps = Vec::new();
        for name in names {
            steps.extend(self.resolve(name.as_ref())?);
        }
        Ok(steps)
    }

    fn resolve_into<'a>(
        &'a self,
        name: &'a str,
        stack: &mut Vec<&'a str>,
        out: &mut Vec<ResolvedStep>,
    ) -> Result<()> {
        if name == SERVE_STEP {
            out.push(ResolvedStep::Serve);
            return Ok(());
        }
        if name == WATCH_STEP {
            out.push(ResolvedStep::Watch);
            return Ok(());
        }
        if let Some(task) = self.task(name) {
            out.push(ResolvedStep::Task(Arc::clone(task)));
            return Ok(());
        }

        let pipeline = self.pipeline(name).ok_or_else(|| {
            match stack.last() {
                Some(parent) => SitepipeError::config(format!(
                    "pipeline '{parent}' references unknown step '{name}'"
                )),
                None => SitepipeError::config(format!("unknown task or pipeline '{name}'")),
            }
        })?;

        if stack.contains(&name) {
            return Err(SitepipeError::config(format!(
                "cycle detected in pipelines involving '{name}'"
            )));
        }

        let before = out.len();
        stack.push(name);
        for step in pipeline.steps.iter() {
            self.resolve_into(step, stack, out)?;
        }
        stack.pop();

        if out.len() == before {
            return Err(SitepipeError::config(format!("pipeline '{name}' has no steps")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::registry::Pipeline;
    use crate::transform::rule::{RuleOptions, TransformRule};
    use crate::types::TransformMode;

    fn task(name: &str) -> NamedTask {
        NamedTask::new(
            name,
            TransformRule {
                sources: vec!["docs/css/main.css".into()],
                destination: Some(PathBuf::from("docs/css")),
                mode: TransformMode::Copy,
                options: RuleOptions::default(),
            },
        )
    }

    fn registry() -> TaskRegistry {
        let mut reg = TaskRegistry::default();
        for name in ["clean:dist", "sass:dist", "postcss:dist", "cssmin:dist"] {
            reg.insert_task(task(name));
        }
        reg.insert_pipeline(Pipeline {
            name: "dist".into(),
            steps: vec![
                "clean:dist".into(),
                "sass:dist".into(),
                "postcss:dist".into(),
                "cssmin:dist".into(),
            ],
        });
        reg.insert_pipeline(Pipeline {
            name: "test".into(),
            steps: vec!["dist".into()],
        });
        reg.insert_pipeline(Pipeline {
            name: "server".into(),
            steps: vec!["sass:dist".into(), "serve".into(), "watch".into()],
        });
        reg
    }

    fn names(steps: &[ResolvedStep]) -> Vec<&str> {
        steps.iter().map(ResolvedStep::name).collect()
    }

    #[test]
    fn resolves_in_declaration_order() {
        let steps = registry().resolve("dist").unwrap();
        assert_eq!(
            names(&steps),
            vec!["clean:dist", "sass:dist", "postcss:dist", "cssmin:dist"]
        );
    }

    #[test]
    fn nested_pipeline_is_an_alias() {
        let reg = registry();
        assert_eq!(reg.resolve("test").unwrap(), reg.resolve("dist").unwrap());
    }

    #[test]
    fn reserved_steps_resolve_to_builtins() {
        let steps = registry().resolve("server").unwrap();
        assert_eq!(steps[1], ResolvedStep::Serve);
        assert_eq!(steps[2], ResolvedStep::Watch);
    }

    #[test]
    fn single_task_name_resolves_to_itself() {
        let steps = registry().resolve("sass:dist").unwrap();
        assert_eq!(names(&steps), vec!["sass:dist"]);
    }

    #[test]
    fn unknown_name_is_a_configuration_error() {
        let err = registry().resolve("bogus").unwrap_err();
        assert!(matches!(err, SitepipeError::Configuration(_)));
    }

    #[test]
    fn unknown_nested_step_names_the_pipeline() {
        let mut reg = registry();
        reg.insert_pipeline(Pipeline {
            name: "broken".into(),
            steps: vec!["sass:dist".into(), "uglify:dist".into()],
        });
        let err = reg.resolve("broken").unwrap_err();
        assert!(
            matches!(err, SitepipeError::Configuration(ref m) if m.contains("broken") && m.contains("uglify:dist"))
        );
    }

    #[test]
    fn resolve_all_fails_without_partial_output() {
        let reg = registry();
        assert!(reg.resolve_all(&["dist", "bogus"]).is_err());
        assert_eq!(reg.resolve_all(&["dist", "sass:dist"]).unwrap().len(), 5);
    }
}
