// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host telemetry published on fixed intervals.
//!
//! The connection is looked up again on every tick, so a reconnect between
//! ticks is picked up without any subscription bookkeeping. Ticks with no
//! live connection are skipped.

use ji_core::topic;
use ji_engine::AgentContext;
use serde_json::{json, Map, Value};
use std::time::Duration;
use sysinfo::{Networks, System};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy)]
pub struct TelemetryTimings {
    pub host_interval: Duration,
    pub sample_interval: Duration,
}

impl Default for TelemetryTimings {
    fn default() -> Self {
        Self { host_interval: Duration::from_secs(300), sample_interval: Duration::from_secs(5) }
    }
}

#[derive(Clone)]
pub struct Telemetry {
    ctx: AgentContext,
    timings: TelemetryTimings,
}

impl Telemetry {
    pub fn new(ctx: AgentContext, timings: TelemetryTimings) -> Self {
        Self { ctx, timings }
    }

    /// Start the host loop and the usage loop. Both end when `stop` fires.
    pub fn spawn(&self, stop: CancellationToken) -> Vec<JoinHandle<()>> {
        let host = {
            let telemetry = self.clone();
            let stop = stop.clone();
            tokio::spawn(async move { telemetry.host_loop(stop).await })
        };
        let usage = {
            let telemetry = self.clone();
            tokio::spawn(async move { telemetry.usage_loop(stop).await })
        };
        vec![host, usage]
    }

    async fn host_loop(&self, stop: CancellationToken) {
        loop {
            if !sleep_or_stop(&stop, self.timings.host_interval).await {
                return;
            }
            self.publish(topic::HOST_INFORMATION, host_info()).await;
        }
    }

    async fn usage_loop(&self, stop: CancellationToken) {
        let mut system = System::new();
        let mut networks = Networks::new_with_refreshed_list();
        // CPU usage is a delta between two refreshes
        system.refresh_cpu();
        loop {
            if !sleep_or_stop(&stop, self.timings.sample_interval).await {
                return;
            }
            networks.refresh();
            self.publish(topic::NET_INFORMATION, net_info(&networks)).await;

            system.refresh_cpu();
            system.refresh_memory();
            self.publish(topic::CPU_INFORMATION, cpu_info(&system)).await;
            self.publish(topic::MEM_INFORMATION, mem_info(&system)).await;
        }
    }

    async fn publish(&self, topic: &str, data: Value) {
        let Some(conn) = self.ctx.connection() else {
            tracing::debug!(topic, "telemetry skipped, no connection");
            return;
        };
        if !conn.is_connected() {
            tracing::debug!(topic, "telemetry skipped, broker disconnected");
            return;
        }
        conn.publish(topic, &self.envelope(data).to_string()).await;
    }

    /// Tag a sample with who sent it.
    pub fn envelope(&self, data: Value) -> Value {
        let mut payload = match data {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        payload.insert("identity_id".to_string(), json!(self.ctx.identity.as_str()));
        payload.insert("project_uuid".to_string(), json!(self.ctx.group()));
        Value::Object(payload)
    }
}

async fn sleep_or_stop(stop: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = stop.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

pub fn host_info() -> Value {
    json!({
        "hostname": System::host_name(),
        "os": System::name(),
        "os_version": System::os_version(),
        "kernel_version": System::kernel_version(),
        "arch": std::env::consts::ARCH,
        "uptime": System::uptime(),
        "boot_time": System::boot_time(),
    })
}

pub fn cpu_info(system: &System) -> Value {
    let per_cpu: Vec<f32> = system.cpus().iter().map(|cpu| cpu.cpu_usage()).collect();
    json!({
        "usage": system.global_cpu_info().cpu_usage(),
        "per_cpu": per_cpu,
    })
}

pub fn mem_info(system: &System) -> Value {
    let total = system.total_memory();
    let used = system.used_memory();
    let used_percent = if total == 0 { 0.0 } else { used as f64 * 100.0 / total as f64 };
    json!({
        "total": total,
        "used": used,
        "available": system.available_memory(),
        "used_percent": used_percent,
        "swap_total": system.total_swap(),
        "swap_used": system.used_swap(),
    })
}

pub fn net_info(networks: &Networks) -> Value {
    let interfaces: Vec<Value> = networks
        .iter()
        .map(|(name, data)| {
            json!({
                "name": name,
                "mac": data.mac_address().to_string(),
                "received": data.received(),
                "transmitted": data.transmitted(),
                "total_received": data.total_received(),
                "total_transmitted": data.total_transmitted(),
            })
        })
        .collect();
    json!({ "interfaces": interfaces })
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
