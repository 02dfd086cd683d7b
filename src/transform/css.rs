// src/transform/css.rs

//! Built-in CSS post-processing and minification on top of `lightningcss`.
//!
//! With `source_map` set, the printed CSS ends in a `sourceMappingURL`
//! comment and the returned map chains through each source's own map, so
//! prefixing a compiled stylesheet still points back at the Sass.

use lightningcss::rules::CssRuleList;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use tracing::warn;

use crate::transform::tools::{SourceText, ToolError, ToolOutput, ToolRequest};

fn targets(browsers: &[String]) -> Result<Targets, ToolError> {
    if browsers.is_empty() {
        return Ok(Targets::default());
    }
    let browsers = Browsers::from_browserslist(browsers.iter())
        .map_err(|e| ToolError(format!("invalid browsers query {browsers:?}: {e}")))?;
    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Inline form lightningcss reads input maps from.
fn data_url(text: &SourceText) -> Option<String> {
    let map = text.map.as_deref()?;
    match SourceMap::from_json("/", map).and_then(|mut sm| sm.to_data_url(None)) {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(source = %text.name, error = %e, "ignoring unreadable input source map");
            None
        }
    }
}

fn process(request: &ToolRequest<'_>, minify: bool) -> Result<ToolOutput, ToolError> {
    let targets = targets(request.browsers)?;
    let output_name = request.output_name;

    let mut rules = Vec::new();
    for (index, text) in request.texts.iter().enumerate() {
        let parsed = StyleSheet::parse(
            &text.code,
            ParserOptions {
                filename: text.name.clone(),
                source_index: index as u32,
                ..ParserOptions::default()
            },
        )
        .map_err(|e| ToolError(format!("{}: {e}", text.name)))?;
        rules.extend(parsed.rules.0);
    }

    let names = request.texts.iter().map(|t| t.name.clone()).collect();
    let mut sheet = StyleSheet::new(names, CssRuleList(rules), ParserOptions::default());
    if request.source_map {
        sheet.source_map_urls = request.texts.iter().map(data_url).collect();
    }

    // Prefixes are added by the minify pass; printing decides whitespace.
    sheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..MinifyOptions::default()
        })
        .map_err(|e| ToolError(format!("{output_name}: {e}")))?;

    if !request.source_map {
        let printed = sheet
            .to_css(PrinterOptions {
                minify,
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| ToolError(format!("{output_name}: {e}")))?;
        return Ok(ToolOutput {
            code: printed.code,
            map: None,
        });
    }

    // Source indexes in the printed mappings are positions in `texts`.
    let mut map = SourceMap::new("/");
    for text in request.texts {
        let index = map.add_source(&text.name);
        map.set_source_content(index as usize, &text.code)
            .map_err(|e| ToolError(format!("{output_name}: {e}")))?;
    }

    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            source_map: Some(&mut map),
            ..PrinterOptions::default()
        })
        .map_err(|e| ToolError(format!("{output_name}: {e}")))?;

    let raw = map
        .to_json(None)
        .map_err(|e| ToolError(format!("{output_name}: {e}")))?;
    let mut json: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| ToolError(format!("{output_name}: {e}")))?;
    json["file"] = serde_json::Value::String(output_name.to_string());

    let mut code = printed.code;
    if !code.ends_with('\n') {
        code.push('\n');
    }
    code.push_str(&format!("/*# sourceMappingURL={output_name}.map */\n"));

    Ok(ToolOutput {
        code,
        map: Some(json.to_string()),
    })
}

/// Add the vendor prefixes `browsers` needs. Output stays readable.
pub fn prefix(request: &ToolRequest<'_>) -> Result<ToolOutput, ToolError> {
    process(request, false)
}

/// Minify the request's texts into one stylesheet, keeping whatever
/// prefixes `browsers` needs.
pub fn minify(request: &ToolRequest<'_>) -> Result<ToolOutput, ToolError> {
    process(request, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use serde_json::Value;

    fn browsers(q: &[&str]) -> Vec<String> {
        q.iter().map(|s| s.to_string()).collect()
    }

    fn text(name: &str, code: &str) -> SourceText {
        SourceText {
            name: name.to_string(),
            code: code.to_string(),
            map: None,
        }
    }

    fn request<'a>(texts: &'a [SourceText], browsers: &'a [String], source_map: bool) -> ToolRequest<'a> {
        ToolRequest {
            inputs: &[],
            texts,
            output_name: "main.css",
            output_dir: Path::new("docs/css"),
            root: Path::new("."),
            browsers,
            source_map,
        }
    }

    #[test]
    fn minify_strips_whitespace() {
        let texts = [text("main.css", ".a {\n  color: red;\n}\n\n.b { margin: 0 }\n")];
        let out = minify(&request(&texts, &[], false)).unwrap();
        assert_eq!(out.code, ".a{color:red}.b{margin:0}");
        assert_eq!(out.map, None);
    }

    #[test]
    fn minify_keeps_source_order_across_files() {
        let texts = [text("b.css", ".b{margin:0}"), text("a.css", ".a{color:red}")];
        let out = minify(&request(&texts, &[], false)).unwrap();
        assert_eq!(out.code, ".b{margin:0}.a{color:red}");
    }

    #[test]
    fn prefix_adds_vendor_prefixes_for_old_browsers() {
        let texts = [text("main.css", ".a { user-select: none; }")];
        let queries = browsers(&["last 8 versions", "ie 9"]);
        let out = prefix(&request(&texts, &queries, false)).unwrap();
        assert!(out.code.contains("-webkit-user-select"), "got: {}", out.code);
        assert!(out.code.contains("user-select: none"), "got: {}", out.code);
    }

    #[test]
    fn requested_map_names_its_sources_and_is_referenced() {
        let texts = [text("main.css", ".a {\n  color: red;\n}\n")];
        let out = minify(&request(&texts, &[], true)).unwrap();

        assert!(out.code.ends_with("/*# sourceMappingURL=main.css.map */\n"), "got: {}", out.code);
        let map: Value = serde_json::from_str(out.map.as_deref().unwrap()).unwrap();
        assert_eq!(map["file"], "main.css");
        assert_eq!(map["sources"][0], "main.css");
        assert!(!map["mappings"].as_str().unwrap().is_empty());
    }

    #[test]
    fn prefixing_compiled_css_chains_to_the_scss_map() {
        // What `sass --source-map` leaves for `.a { user-select: none; }`
        // compiled from ../scss/main.scss.
        let compiled = ".a {\n  user-select: none;\n}\n\n/*# sourceMappingURL=main.css.map */\n";
        let scss_map = r#"{"version":3,"sources":["../scss/main.scss"],"sourcesContent":[".a { user-select: none; }\n"],"names":[],"mappings":"AAAA;EAAK","file":"main.css"}"#;
        let texts = [SourceText {
            name: "main.css".to_string(),
            code: compiled.to_string(),
            map: Some(scss_map.to_string()),
        }];
        let queries = browsers(&["last 8 versions", "ie 9"]);

        let out = prefix(&request(&texts, &queries, true)).unwrap();

        assert!(out.code.contains("-webkit-user-select"));
        assert!(out.code.ends_with("/*# sourceMappingURL=main.css.map */\n"), "got: {}", out.code);
        let map: Value = serde_json::from_str(out.map.as_deref().unwrap()).unwrap();
        let sources: Vec<&str> = map["sources"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(sources.contains(&"../scss/main.scss"), "sources: {sources:?}");
    }

    #[test]
    fn without_a_map_the_stale_reference_is_dropped() {
        let texts = [text("main.css", ".a { color: red; }\n/*# sourceMappingURL=main.css.map */\n")];
        let out = prefix(&request(&texts, &[], false)).unwrap();
        assert!(!out.code.contains("sourceMappingURL"), "got: {}", out.code);
        assert_eq!(out.map, None);
    }

    #[test]
    fn bad_browser_query_is_rejected() {
        let texts = [text("main.css", ".a{}")];
        let queries = browsers(&["not a real query ???"]);
        let err = prefix(&request(&texts, &queries, false)).unwrap_err();
        assert!(err.0.contains("invalid browsers query"));
    }
}
