// SPDX-License-Identifier: MIT

//! `{{ args.path.to.value }}` template expansion for `system_*` steps
//! (spec §4.3). Missing paths render as the empty string rather than
//! erroring — a template is best-effort text, not a strict binding.

use serde_json::Value;

/// Expand every `{{ dotted.path }}` placeholder in `template` by resolving
/// it against `root` (conventionally `run.args`). Unknown paths expand to
/// the empty string.
pub fn render_template(template: &str, root: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let path = after_open[..end].trim();
                out.push_str(&resolve_path(root, path));
                rest = &after_open[end + 2..];
            }
            None => {
                // Unterminated placeholder: emit the rest verbatim.
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_path(root: &Value, path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }
    let mut current = root;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(v) => current = v,
            None => return String::new(),
        }
    }
    match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
