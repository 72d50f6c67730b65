// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Whole-value environment substitution for parsed config trees.

use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

/// `${VAR}` or `${VAR:-default}` spanning the entire scalar.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static WHOLE_VALUE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{(\w+)(?::-(.*))?\}$").expect("constant regex pattern is valid")
});

/// Replace every string scalar that is exactly `${VAR}` with the value of
/// the environment variable (empty when unset, or the `:-` default).
///
/// Placeholders embedded in longer strings are untouched: job and exec
/// commands hand those to the shell.
pub fn substitute_env(value: &mut Value) {
    substitute_with(value, &|name| std::env::var(name).ok());
}

pub(crate) fn substitute_with(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => {
            let resolved = WHOLE_VALUE_VAR.captures(s).map(|caps| {
                lookup(&caps[1])
                    .or_else(|| caps.get(2).map(|d| d.as_str().to_string()))
                    .unwrap_or_default()
            });
            if let Some(resolved) = resolved {
                *s = resolved;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                substitute_with(item, lookup);
            }
        }
        Value::Mapping(map) => {
            for (_, v) in map.iter_mut() {
                substitute_with(v, lookup);
            }
        }
        Value::Tagged(tagged) => substitute_with(&mut tagged.value, lookup),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
