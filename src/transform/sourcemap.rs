// src/transform/sourcemap.rs

//! Source map path bookkeeping.
//!
//! A map's `sources` are relative to the directory the map lives in. Tools
//! write maps wherever they were told to (a staging directory, the input's
//! directory), so before a map lands next to its final output its sources
//! are re-expressed relative to that output's directory.

use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::transform::tools::ToolError;
use crate::watch::path_utils::to_slash;

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Path of `target` as seen from the directory `from`.
///
/// Both must be relative to the same base, or both absolute.
pub fn relative_path(from: &Path, target: &Path) -> PathBuf {
    let from = normalize(from);
    let target = normalize(target);
    let from: Vec<Component<'_>> = from.components().collect();
    let target: Vec<Component<'_>> = target.components().collect();

    let common = from
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for component in &target[common..] {
        rel.push(component);
    }
    rel
}

/// Map file name for an output: `main.css` → `main.css.map`.
pub fn map_path_for(out: &Path) -> PathBuf {
    let mut s = out.as_os_str().to_owned();
    s.push(".map");
    PathBuf::from(s)
}

/// Rewrite the `sources` of a map written in `from_dir` so they resolve
/// from `to_dir`, and name `file` as the generated file.
///
/// URLs other than `file://` (and data URIs) are left as they are.
pub fn rebase_sources(map: &str, from_dir: &Path, to_dir: &Path, file: &str) -> Result<String, ToolError> {
    let mut json: Value =
        serde_json::from_str(map).map_err(|e| ToolError(format!("unreadable source map: {e}")))?;
    let Some(object) = json.as_object_mut() else {
        return Err(ToolError("source map is not a JSON object".to_string()));
    };

    if let Some(Value::Array(sources)) = object.get_mut("sources") {
        for source in sources.iter_mut() {
            let Value::String(s) = source else { continue };
            let local = match s.strip_prefix("file://") {
                Some(path) => path,
                None if s.contains("://") || s.starts_with("data:") => continue,
                None => s.as_str(),
            };
            let local = Path::new(local);
            let resolved = if local.is_absolute() {
                local.to_path_buf()
            } else {
                from_dir.join(local)
            };
            *s = to_slash(&relative_path(to_dir, &resolved));
        }
    }
    object.insert("file".to_string(), Value::String(file.to_string()));

    serde_json::to_string(&json).map_err(|e| ToolError(format!("writing source map: {e}")))
}
