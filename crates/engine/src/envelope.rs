// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job message envelope: `{task_id, data, action?}`.

use ji_core::{JobStatus, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub task_id: TaskId,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl JobMessage {
    pub fn new(task_id: TaskId, data: Value) -> Self {
        Self { task_id, data, action: None }
    }

    pub fn decode(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn encode(&self) -> String {
        // Serializing a struct of strings and a Value cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Cancellation status carried instead of job data, if any.
    pub fn cancellation(&self) -> Option<JobStatus> {
        self.action.as_deref().and_then(JobStatus::cancellation)
    }

    /// Template variables: top-level data fields plus `task_id`.
    ///
    /// Strings are inserted as-is, other values as JSON text. Non-object data
    /// contributes nothing.
    pub fn vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        if let Value::Object(fields) = &self.data {
            for (key, value) in fields {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                vars.insert(key.clone(), text);
            }
        }
        vars.insert("task_id".to_string(), self.task_id.to_string());
        vars
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
