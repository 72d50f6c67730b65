// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent configuration model.
//!
//! Loaded from YAML, with whole-value `${VAR}` substitution applied before
//! deserialization. Server-provided settings are merged in by the daemon.

mod broker;
mod subst;

pub use broker::{AuthType, BrokerConnectionConfig, BrokerKind};
pub use subst::substitute_env;

use crate::id::IdentityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Runtime restart budget used when an exec declares `attempt <= 0`.
pub const DEFAULT_RESTART_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("malformed config data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("broker_connection is required")]
    MissingBroker,

    #[error("{context}: {field} is required")]
    MissingField { field: &'static str, context: &'static str },

    #[error("broker_connection.secure requires ca_file")]
    MissingCaFile,

    #[error("{section}[{index}] has an empty {field}")]
    EmptyEntry { section: &'static str, index: usize, field: &'static str },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub secret_key: String,
}

/// Job bound to a broker event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub event: String,
    /// Command template with `{{field}}` placeholders
    pub cmd: String,
}

crate::builder! {
    pub struct JobConfigBuilder => JobConfig {
        into {
            name: String = "job",
            event: String = "run",
            cmd: String = "echo {{task_id}}",
        }
    }
}

/// Long-lived command kept alive by the service supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecConfig {
    pub name: String,
    #[serde(default)]
    pub key: String,
    pub cmd: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub cascade_exit: bool,
    #[serde(default)]
    pub attempt: i32,
}

crate::builder! {
    pub struct ExecConfigBuilder => ExecConfig {
        into {
            name: String = "svc",
            key: String = "svc",
            cmd: String = "true",
        }
        set {
            env: BTreeMap<String, String> = BTreeMap::new(),
            working_dir: Option<String> = None,
            cascade_exit: bool = false,
            attempt: i32 = 0,
        }
    }
}

impl ExecConfig {
    /// Runtime restarts allowed after the first successful start.
    pub fn restart_limit(&self) -> u32 {
        u32::try_from(self.attempt).ok().filter(|n| *n > 0).unwrap_or(DEFAULT_RESTART_ATTEMPTS)
    }

    /// Working directory, relative paths resolved against `base`.
    pub fn resolved_working_dir(&self, base: &Path) -> Option<PathBuf> {
        let dir = self.working_dir.as_deref().filter(|d| !d.is_empty())?;
        let dir = Path::new(dir);
        Some(if dir.is_absolute() { dir.to_path_buf() } else { base.join(dir) })
    }
}

/// Project-level declaration of an event. Nested jobs are data only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobData {
    pub event: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub nested_jobs: Vec<JobData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub job_datas: Vec<JobData>,
}

/// Settings returned by the config server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub broker_connection: Option<BrokerConnectionConfig>,
    #[serde(default)]
    pub project: Option<ProjectData>,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
    #[serde(default)]
    pub execs: Vec<ExecConfig>,
    #[serde(default)]
    pub job_item_version_number: Option<u32>,
    #[serde(default)]
    pub job_item_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub identity_id: Option<IdentityId>,
    #[serde(default)]
    pub end_point: Option<String>,
    #[serde(default)]
    pub credential: Credential,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub broker_connection: Option<BrokerConnectionConfig>,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
    #[serde(default)]
    pub execs: Vec<ExecConfig>,
    #[serde(default)]
    pub project: ProjectData,
    #[serde(default)]
    pub job_item_version_number: u32,
    #[serde(default)]
    pub job_item_link: Option<String>,
}

impl AgentConfig {
    /// Read and parse a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut tree: serde_yaml::Value = serde_yaml::from_str(text)?;
        substitute_env(&mut tree);
        let mut config: AgentConfig = serde_yaml::from_value(tree)?;
        config.apply_defaults();
        Ok(config)
    }

    /// Decode a config already resolved by the supervisor (child processes).
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn end_point(&self) -> Option<&str> {
        self.end_point.as_deref().map(str::trim).filter(|e| !e.is_empty())
    }

    /// Project uuid used for job topics and the dispatch consumer group.
    pub fn project_uuid(&self) -> &str {
        self.project
            .uuid
            .as_deref()
            .or(self.uuid.as_deref())
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.credential.project_id)
    }

    /// Fill derived fields. Without a config server, the project uuid is the
    /// credential's project id.
    pub fn apply_defaults(&mut self) {
        if self.end_point().is_none() && is_blank(&self.uuid) {
            self.uuid = Some(self.credential.project_id.clone());
        }
        if is_blank(&self.project.uuid) {
            self.project.uuid = self.uuid.clone();
        }
    }

    /// Merge settings from the config server. Broker and version settings are
    /// always taken from the server; the rest only fills what is missing.
    pub fn merge_server(&mut self, server: ServerConfig) {
        if server.broker_connection.is_some() {
            self.broker_connection = server.broker_connection;
        }
        if let Some(version) = server.job_item_version_number {
            self.job_item_version_number = version;
        }
        if server.job_item_link.is_some() {
            self.job_item_link = server.job_item_link;
        }
        if is_blank(&self.uuid) {
            self.uuid = server.uuid;
        }
        if let Some(project) = server.project {
            if self.project.job_datas.is_empty() {
                self.project.job_datas = project.job_datas;
            }
            if is_blank(&self.project.uuid) {
                self.project.uuid = project.uuid;
            }
            if self.project.name.is_none() {
                self.project.name = project.name;
            }
        }
        if self.jobs.is_empty() {
            self.jobs = server.jobs;
        }
        if self.execs.is_empty() {
            self.execs = server.execs;
        }
        self.apply_defaults();
    }

    /// Validate everything a role needs before it starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let broker = self.broker_connection.as_ref().ok_or(ConfigError::MissingBroker)?;
        broker.validate()?;
        for (index, job) in self.jobs.iter().enumerate() {
            if job.name.trim().is_empty() {
                return Err(ConfigError::EmptyEntry { section: "jobs", index, field: "name" });
            }
            if job.event.trim().is_empty() {
                return Err(ConfigError::EmptyEntry { section: "jobs", index, field: "event" });
            }
        }
        for (index, exec) in self.execs.iter().enumerate() {
            if exec.name.trim().is_empty() {
                return Err(ConfigError::EmptyEntry { section: "execs", index, field: "name" });
            }
            if exec.cmd.trim().is_empty() {
                return Err(ConfigError::EmptyEntry { section: "execs", index, field: "cmd" });
            }
        }
        Ok(())
    }

    /// Split jobs into those with a matching project event and those without.
    pub fn partition_jobs(&self) -> (Vec<&JobConfig>, Vec<&JobConfig>) {
        self.jobs
            .iter()
            .partition(|job| self.project.job_datas.iter().any(|data| data.event == job.event))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Directory containing the config file; relative paths resolve against it.
pub fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
