// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config server client.
//!
//! The server is infrastructure the agent waits for: every failure is
//! retried on a fixed delay until a config comes back.

use ji_broker::retry_forever;
use ji_core::{Credential, ServerConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const CONFIG_PATH: &str = "/api/worker/config";

/// Delay between config fetch attempts.
pub const SERVER_RETRY_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Serialize)]
struct ConfigRequest<'a> {
    project_id: &'a str,
    secret_key: &'a str,
    os: &'static str,
    arch: &'static str,
    host: String,
}

#[derive(Debug, Deserialize)]
struct ConfigResponse {
    #[serde(rename = "return", default)]
    config: ServerConfig,
}

#[derive(Clone)]
pub struct ServerClient {
    end_point: String,
    retry_delay: Duration,
    http: reqwest::Client,
}

impl ServerClient {
    pub fn new(end_point: &str) -> Self {
        Self {
            end_point: end_point.trim_end_matches('/').to_string(),
            retry_delay: SERVER_RETRY_DELAY,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn config_url(&self) -> String {
        format!("{}{CONFIG_PATH}", self.end_point)
    }

    /// One fetch attempt.
    pub async fn fetch_once(&self, credential: &Credential) -> Result<ServerConfig, ServerError> {
        let request = ConfigRequest {
            project_id: &credential.project_id,
            secret_key: &credential.secret_key,
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            host: sysinfo::System::host_name().unwrap_or_default(),
        };
        let response = self.http.post(self.config_url()).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(ServerError::Status(response.status().as_u16()));
        }
        let body: ConfigResponse = response.json().await?;
        Ok(body.config)
    }

    /// Fetch until the server answers.
    pub async fn fetch(&self, credential: &Credential) -> Result<ServerConfig, ServerError> {
        let what = self.config_url();
        retry_forever(&what, self.retry_delay, |_| false, || self.fetch_once(credential)).await
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
