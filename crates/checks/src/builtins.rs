// SPDX-License-Identifier: MIT

//! Built-in check kinds (spec §4.4 table).

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::{Check, CheckContext, CheckResult};

fn result(kind: &str, passed: bool) -> CheckResult {
    CheckResult { kind: kind.to_string(), passed, message: None }
}

fn failed(kind: &str, message: impl Into<String>) -> CheckResult {
    CheckResult { kind: kind.to_string(), passed: false, message: Some(message.into()) }
}

pub fn contains(check: &Check, ctx: &CheckContext) -> CheckResult {
    let text = check.text_param("text");
    result("contains", ctx.step_output.contains(text))
}

pub fn not_contains(check: &Check, ctx: &CheckContext) -> CheckResult {
    let text = check.text_param("text");
    result("not_contains", !ctx.step_output.contains(text))
}

pub fn regex_check(check: &Check, ctx: &CheckContext) -> CheckResult {
    let pattern = check.text_param("pattern");
    match regex::Regex::new(pattern) {
        Ok(re) => result("regex", re.is_match(&ctx.step_output)),
        Err(e) => failed("regex", format!("invalid regex '{pattern}': {e}")),
    }
}

pub fn exit_code(check: &Check, ctx: &CheckContext) -> CheckResult {
    let expected = check.params.get("expected").and_then(|v| v.as_i64()).unwrap_or(0);
    let Some(last) = ctx.tool_results.last() else {
        return failed("exit_code", "no tool results to inspect");
    };
    let actual = last
        .get("exitCode")
        .or_else(|| last.get("code"))
        .and_then(|v| v.as_i64());
    match actual {
        Some(actual) => result("exit_code", actual == expected),
        None => failed("exit_code", "last tool result has no exitCode/code field"),
    }
}

pub fn file_exists(check: &Check, _ctx: &CheckContext) -> CheckResult {
    let path = check.text_param("path");
    result("file_exists", Path::new(path).exists())
}

pub fn file_not_exists(check: &Check, _ctx: &CheckContext) -> CheckResult {
    let path = check.text_param("path");
    result("file_not_exists", !Path::new(path).exists())
}

pub fn file_contains(check: &Check, _ctx: &CheckContext) -> CheckResult {
    let path = check.text_param("path");
    let text = check.text_param("text");
    match std::fs::read_to_string(path) {
        Ok(content) => result("file_contains", content.contains(text)),
        Err(e) => failed("file_contains", format!("cannot read '{path}': {e}")),
    }
}

pub fn file_regex(check: &Check, _ctx: &CheckContext) -> CheckResult {
    let path = check.text_param("path");
    let pattern = check.text_param("pattern");
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return failed("file_regex", format!("cannot read '{path}': {e}")),
    };
    match regex::Regex::new(pattern) {
        Ok(re) => result("file_regex", re.is_match(&content)),
        Err(e) => failed("file_regex", format!("invalid regex '{pattern}': {e}")),
    }
}

pub fn file_hash_changed(check: &Check, _ctx: &CheckContext) -> CheckResult {
    let path = check.text_param("path");
    let previous_hash = check.params.get("previousHash").and_then(|v| v.as_str());
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => return failed("file_hash_changed", format!("cannot read '{path}': {e}")),
    };
    let digest = Sha256::digest(&bytes);
    let current_hash = format!("{digest:x}");
    result("file_hash_changed", Some(current_hash.as_str()) != previous_hash)
}

pub fn non_empty(_check: &Check, ctx: &CheckContext) -> CheckResult {
    result("non_empty", !ctx.step_output.trim().is_empty())
}

#[cfg(test)]
#[path = "builtins_tests.rs"]
mod tests;
