// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ferretbot-checks: the success-check evaluator (spec §4.4). A registry
//! keyed by string → function rather than a trait hierarchy — new kinds
//! register a function, they don't need a new type to implement a trait.

mod builtins;

use std::collections::HashMap;

use serde_json::{Map, Value};

/// A single success-check descriptor, decoupled from
/// `ferretbot-registry::CheckSpec` so this crate has no upward dependency
/// on workflow structure — callers convert at the boundary.
#[derive(Debug, Clone)]
pub struct Check {
    pub kind: String,
    pub params: Map<String, Value>,
}

impl Check {
    pub fn new(kind: impl Into<String>, params: Map<String, Value>) -> Self {
        Self { kind: kind.into(), params }
    }

    fn text_param(&self, key: &str) -> &str {
        self.params.get(key).and_then(Value::as_str).unwrap_or("")
    }
}

/// Everything a check kind needs to evaluate against.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    pub step_output: String,
    pub tool_results: Vec<Value>,
    pub workflow_inputs: Map<String, Value>,
    pub step_results: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub kind: String,
    pub passed: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub passed: bool,
    pub results: Vec<CheckResult>,
}

type CheckFn = fn(&Check, &CheckContext) -> CheckResult;

/// A mutable table of `kind -> CheckFn`, seeded with the built-ins at
/// construction and open to runtime registration of additional kinds. An
/// explicit object passed by dependency injection, per design note §9, never
/// a module-load-time global.
pub struct CheckRegistry {
    kinds: HashMap<String, CheckFn>,
}

impl CheckRegistry {
    /// Construct a registry seeded with every built-in kind from spec §4.4.
    pub fn new() -> Self {
        let mut registry = Self { kinds: HashMap::new() };
        registry.register("contains", builtins::contains);
        registry.register("not_contains", builtins::not_contains);
        registry.register("regex", builtins::regex_check);
        registry.register("exit_code", builtins::exit_code);
        registry.register("command_exit_code", builtins::exit_code);
        registry.register("file_exists", builtins::file_exists);
        registry.register("file_not_exists", builtins::file_not_exists);
        registry.register("file_contains", builtins::file_contains);
        registry.register("file_regex", builtins::file_regex);
        registry.register("file_hash_changed", builtins::file_hash_changed);
        registry.register("non_empty", builtins::non_empty);
        registry
    }

    /// Register (or replace) the function backing `kind`. Third-party
    /// extensions call this to add kinds the built-ins don't cover.
    pub fn register(&mut self, kind: impl Into<String>, f: CheckFn) {
        self.kinds.insert(kind.into(), f);
    }

    /// Evaluate every check in order. An empty list passes vacuously. An
    /// unrecognized `kind` yields a failing result with a diagnostic
    /// message — never a panic, never an `Err` out of this method.
    pub fn evaluate(&self, checks: &[Check], context: &CheckContext) -> CheckOutcome {
        let results: Vec<CheckResult> = checks
            .iter()
            .map(|check| match self.kinds.get(check.kind.as_str()) {
                Some(f) => f(check, context),
                None => CheckResult {
                    kind: check.kind.clone(),
                    passed: false,
                    message: Some(format!("unrecognized check type '{}'", check.kind)),
                },
            })
            .collect();
        let passed = results.iter().all(|r| r.passed);
        CheckOutcome { passed, results }
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
