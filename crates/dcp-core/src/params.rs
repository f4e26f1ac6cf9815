//! Tool-parameter inspection: file-path extraction and the short
//! parameter keys shown next to each entry in `<prunable-tools>`.

use dcp_util::path::{shorten, truncate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Maximum characters for free-form parameter values in the manifest.
const PARAM_KEY_MAX: usize = 60;

/// Path segments kept when shortening file paths for display.
const PATH_SEGMENTS: usize = 4;

/// Patch headers of the form `*** Add File: path/to/file`.
static PATCH_FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\*\*\*\s+(?:Add|Delete|Update)\s+File:\s*(.+?)\s*$")
        .expect("patch header regex is a compile-time constant")
});

fn str_field<'a>(parameters: &'a Value, key: &str) -> Option<&'a str> {
    parameters.get(key).and_then(Value::as_str)
}

/// Extract every file path a tool invocation touches.
///
/// Used by the supersede strategy and by the protected-file check in the
/// tool dispatcher. Unknown tools yield whatever generic path-like
/// fields they carry.
pub fn extract_file_paths(tool: &str, parameters: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    let mut push = |p: &str| {
        if !p.is_empty() && !paths.iter().any(|existing| existing == p) {
            paths.push(p.to_string());
        }
    };

    match tool.to_lowercase().as_str() {
        "read" | "write" | "edit" => {
            if let Some(p) = str_field(parameters, "filePath") {
                push(p);
            }
        }
        "multiedit" => {
            if let Some(p) = str_field(parameters, "filePath") {
                push(p);
            }
            if let Some(edits) = parameters.get("edits").and_then(Value::as_array) {
                for edit in edits {
                    if let Some(p) = str_field(edit, "filePath") {
                        push(p);
                    }
                }
            }
        }
        "apply_patch" | "patch" => {
            if let Some(text) = str_field(parameters, "patchText") {
                for capture in PATCH_FILE_RE.captures_iter(text) {
                    push(capture.get(1).map_or("", |m| m.as_str()));
                }
            }
        }
        _ => {
            for key in ["filePath", "path"] {
                if let Some(p) = str_field(parameters, key) {
                    push(p);
                }
            }
        }
    }

    paths
}

/// Whether a tool invocation writes the given path.
pub fn writes_path(tool: &str, parameters: &Value, path: &str) -> bool {
    match tool.to_lowercase().as_str() {
        "write" | "edit" | "multiedit" => {
            extract_file_paths(tool, parameters).iter().any(|p| p == path)
        }
        "apply_patch" | "patch" => str_field(parameters, "patchText").is_some_and(|text| {
            PATCH_FILE_RE
                .captures_iter(text)
                .any(|c| c.get(1).is_some_and(|m| m.as_str() == path))
        }),
        _ => false,
    }
}

/// Derive the short parameter key for the manifest line `<index>: <tool>, <key>`.
pub fn param_key(tool: &str, parameters: &Value) -> String {
    match tool.to_lowercase().as_str() {
        "read" | "write" | "edit" | "multiedit" | "apply_patch" | "patch" => {
            match extract_file_paths(tool, parameters).first() {
                Some(path) => shorten(path, PATH_SEGMENTS),
                None => "(no path)".to_string(),
            }
        }
        "bash" => str_field(parameters, "description")
            .map(str::to_string)
            .or_else(|| str_field(parameters, "command").map(|c| truncate(c, PARAM_KEY_MAX)))
            .unwrap_or_else(|| "(no command)".to_string()),
        "grep" | "glob" => {
            let pattern = str_field(parameters, "pattern").unwrap_or("(no pattern)");
            match str_field(parameters, "path") {
                Some(path) => format!("{pattern} in {}", shorten(path, PATH_SEGMENTS)),
                None => pattern.to_string(),
            }
        }
        "webfetch" | "fetch" => str_field(parameters, "url")
            .map(str::to_string)
            .unwrap_or_else(|| "(no url)".to_string()),
        "websearch" | "search" => str_field(parameters, "query")
            .map(str::to_string)
            .unwrap_or_else(|| "(no query)".to_string()),
        _ => first_string_value(parameters)
            .map(|v| truncate(v, PARAM_KEY_MAX))
            .unwrap_or_else(|| "(no parameters)".to_string()),
    }
}

/// First string value in key order, for tools we know nothing about.
fn first_string_value(parameters: &Value) -> Option<&str> {
    parameters
        .as_object()?
        .values()
        .find_map(|v| v.as_str())
}
