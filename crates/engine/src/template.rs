// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command template rendering
//!
//! Job commands use `{{name}}` placeholders (triple braces are accepted and
//! behave the same). Values are inserted verbatim; unknown names render as
//! empty strings.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\{?\s*([A-Za-z_][A-Za-z0-9_.-]*)\s*\}?\}\}")
        .expect("constant regex pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("malformed placeholder at byte {position}")]
    Malformed { position: usize },
}

/// Render `template`, substituting placeholders from `vars`.
pub fn render(template: &str, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in TAG_PATTERN.captures_iter(template) {
        let Some(tag) = caps.get(0) else { continue };
        out.push_str(literal(template, last, tag.start())?);
        if let Some(value) = vars.get(&caps[1]) {
            out.push_str(value);
        }
        last = tag.end();
    }
    out.push_str(literal(template, last, template.len())?);
    Ok(out)
}

/// Placeholder names in order of appearance, duplicates included.
pub fn placeholders(template: &str) -> Vec<&str> {
    TAG_PATTERN
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Text between tags; a stray `{{` there is a broken tag.
fn literal(template: &str, start: usize, end: usize) -> Result<&str, TemplateError> {
    let text = &template[start..end];
    match text.find("{{") {
        Some(offset) => Err(TemplateError::Malformed { position: start + offset }),
        None => Ok(text),
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
