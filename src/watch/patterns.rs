// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobSet, GlobSetBuilder};

use crate::registry::WatchBinding;
use crate::transform::expand::build_glob;
use crate::types::TaskName;

/// Compiled trigger globs for a single watch binding.
///
/// The patterns are relative to the project root; the watcher passes
/// relative paths (e.g. `"docs/scss/main.scss"`) into `matches`. A leading
/// `!` turns a pattern into an exclusion.
#[derive(Clone)]
pub struct WatchProfile {
    name: String,
    run: Vec<TaskName>,
    livereload: bool,
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile")
            .field("name", &self.name)
            .field("run", &self.run)
            .field("livereload", &self.livereload)
            .finish_non_exhaustive()
    }
}

impl WatchProfile {
    pub fn from_binding(binding: &WatchBinding) -> Result<Self> {
        let (excludes, includes): (Vec<&str>, Vec<&str>) = binding
            .trigger_globs
            .iter()
            .map(String::as_str)
            .partition(|p| p.starts_with('!'));
        let excludes: Vec<&str> = excludes.iter().map(|p| &p[1..]).collect();

        let include = build_globset(&includes)
            .with_context(|| format!("building trigger globs for watch binding '{}'", binding.name))?;
        let exclude = if excludes.is_empty() {
            None
        } else {
            Some(build_globset(&excludes).with_context(|| {
                format!("building exclude globs for watch binding '{}'", binding.name)
            })?)
        };

        Ok(Self {
            name: binding.name.clone(),
            run: binding.run.clone(),
            livereload: binding.livereload,
            include,
            exclude,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pipelines (or tasks) to run when this binding fires, in order.
    pub fn run(&self) -> &[TaskName] {
        &self.run
    }

    pub fn livereload(&self) -> bool {
        self.livereload
    }

    /// Whether a change at `rel_path` (relative to the project root) fires
    /// this binding.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        !self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(rel_path))
    }
}

/// Compile every binding, keeping declaration order.
pub fn build_profiles(bindings: &[WatchBinding]) -> Result<Vec<WatchProfile>> {
    bindings.iter().map(WatchProfile::from_binding).collect()
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = build_glob(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(files: &[&str]) -> WatchBinding {
        WatchBinding {
            name: "sass".into(),
            trigger_globs: files.iter().map(|s| s.to_string()).collect(),
            run: vec!["sass:development".into()],
            livereload: false,
        }
    }

    #[test]
    fn recursive_globs_match_nested_files() {
        let p = WatchProfile::from_binding(&binding(&["docs/scss/**/*.scss"])).unwrap();
        assert!(p.matches("docs/scss/main.scss"));
        assert!(p.matches("docs/scss/vendors/bootstrap/_grid.scss"));
        assert!(!p.matches("docs/css/main.css"));
    }

    #[test]
    fn single_star_stays_in_one_directory() {
        let p = WatchProfile::from_binding(&binding(&["*.html", "docs/*.html"])).unwrap();
        assert!(p.matches("index.html"));
        assert!(p.matches("docs/index.html"));
        assert!(!p.matches("docs/ejs/index.html"));
    }

    #[test]
    fn empty_alternative_covers_one_extra_level() {
        let p = WatchProfile::from_binding(&binding(&["{,*/}*.html", "docs/css/{,*/}*.css"])).unwrap();
        assert!(p.matches("index.html"));
        assert!(p.matches("docs/index.html"));
        assert!(p.matches("docs/css/main.css"));
        assert!(p.matches("docs/css/vendor/bootstrap.css"));
        assert!(!p.matches("docs/guides/setup/index.html"));
        assert!(!p.matches("docs/css/a/b/deep.css"));
    }

    #[test]
    fn exclusions_win() {
        let p = WatchProfile::from_binding(&binding(&["docs/js/*.js", "!docs/js/main.min.js"])).unwrap();
        assert!(p.matches("docs/js/app.js"));
        assert!(!p.matches("docs/js/main.min.js"));
    }

    #[test]
    fn invalid_glob_names_the_binding() {
        let err = WatchProfile::from_binding(&binding(&["docs/[scss"])).unwrap_err();
        assert!(format!("{err:#}").contains("watch binding 'sass'"));
    }
}
