// src/transform/expand.rs

//! Execution-time glob expansion for transform rules.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::trace;

use crate::errors::{Result, SitepipeError};
use crate::fs::FileSystem;
use crate::transform::rule::TransformRule;

/// A source path matched by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedFile {
    /// Full path (project root joined).
    pub path: PathBuf,
    /// Path relative to the non-glob base of the pattern that matched it.
    /// Used to preserve structure when a rule does not flatten.
    pub rel: PathBuf,
}

/// Glob syntax shared by rules and watch bindings: `*` stops at `/`, and
/// alternatives may be empty (`{,*/}*.html` is `*.html` or `*/*.html`).
pub fn build_glob(pattern: &str) -> std::result::Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .empty_alternates(true)
        .build()
}

/// Does `pattern` contain glob syntax?
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// The leading components of `pattern` that contain no glob syntax.
///
/// `docs/ejs/**/*.ejs` → `docs/ejs`; `*.html` → ``.
pub fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let mut parts = pattern.split('/').peekable();
    while let Some(part) = parts.next() {
        // The last component is the file pattern itself.
        if parts.peek().is_none() || is_glob(part) {
            break;
        }
        base.push(part);
    }
    base
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    let glob = build_glob(pattern)
        .map_err(|e| SitepipeError::config(format!("invalid glob '{pattern}': {e}")))?;
    Ok(glob.compile_matcher())
}

fn compile_set<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = build_glob(pattern)
            .map_err(|e| SitepipeError::config(format!("invalid glob '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SitepipeError::config(format!("invalid exclude patterns: {e}")))
}

fn rel_str(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// Expand a rule's sources against the filesystem.
///
/// Patterns are processed in declaration order; matches of a single pattern
/// are sorted; a path matched twice keeps its first position. Directories are
/// only returned when `include_dirs` is set (used by clean rules).
pub fn expand_sources(
    fs: &dyn FileSystem,
    root: &Path,
    rule: &TransformRule,
    include_dirs: bool,
) -> Result<Vec<MatchedFile>> {
    let excludes = compile_set(rule.exclude_patterns())?;
    let mut seen = HashSet::new();
    let mut matched = Vec::new();

    for pattern in rule.include_patterns() {
        let mut hits = expand_pattern(fs, root, pattern, include_dirs)?;
        hits.sort_by(|a, b| a.path.cmp(&b.path));

        for hit in hits {
            let excluded = rel_str(root, &hit.path).is_some_and(|rel| excludes.is_match(&rel));
            if !excluded && seen.insert(hit.path.clone()) {
                matched.push(hit);
            }
        }
    }

    trace!(count = matched.len(), "expanded rule sources");
    Ok(matched)
}

fn expand_pattern(
    fs: &dyn FileSystem,
    root: &Path,
    pattern: &str,
    include_dirs: bool,
) -> Result<Vec<MatchedFile>> {
    if !is_glob(pattern) {
        let path = root.join(pattern);
        let wanted = fs.is_file(&path) || (include_dirs && fs.is_dir(&path));
        if !wanted {
            return Ok(Vec::new());
        }
        let rel = path.file_name().map(PathBuf::from).unwrap_or_default();
        return Ok(vec![MatchedFile { path, rel }]);
    }

    let matcher = compile(pattern)?;
    let base = root.join(glob_base(pattern));
    if !fs.is_dir(&base) {
        return Ok(Vec::new());
    }

    let mut hits = Vec::new();
    let mut stack = vec![base.clone()];

    while let Some(dir) = stack.pop() {
        let entries = fs
            .read_dir(&dir)
            .map_err(|e| SitepipeError::io(&dir, e))?;

        for path in entries {
            let is_dir = fs.is_dir(&path);
            let Some(rel_root) = rel_str(root, &path) else {
                continue;
            };

            if matcher.is_match(&rel_root) && (include_dirs || !is_dir) {
                let rel = path
                    .strip_prefix(&base)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));
                hits.push(MatchedFile {
                    path: path.clone(),
                    rel,
                });
                // A matched directory is taken as a whole.
                if is_dir {
                    continue;
                }
            }

            if is_dir {
                stack.push(path);
            }
        }
    }

    Ok(hits)
}
