use crate::collectors::{HostProbes, Probe, ProbeKind};
use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub console_id: String,
    pub name: String,
    #[serde(rename = "version")]
    pub agent_version: String,
    pub hostname: String,
    #[serde(rename = "ip")]
    pub ip_address: String,
    #[serde(rename = "temperature")]
    pub temperature_c: f64,
    #[serde(rename = "cpuUsage")]
    pub cpu_usage_percent: f64,
    #[serde(rename = "memoryUsage")]
    pub memory_usage_percent: f64,
    #[serde(rename = "diskUsage")]
    pub disk_usage_percent: u8,
    pub uptime: String,
    pub game_running: bool,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeFallback {
    pub probe: ProbeKind,
    pub cause: String,
}

#[derive(Debug, Clone)]
pub struct Assembly {
    pub report: StatusReport,
    pub fallbacks: Vec<ProbeFallback>,
}

pub struct ReportAssembler {
    console_id: String,
    name: String,
    agent_version: String,
    probes: Box<dyn HostProbes>,
    last_timestamp_ms: AtomicI64,
}

impl ReportAssembler {
    pub fn new(cfg: &Config, probes: Box<dyn HostProbes>) -> Self {
        Self {
            console_id: cfg.console_id.clone(),
            name: cfg.console_name.clone(),
            agent_version: cfg.agent_version.clone(),
            probes,
            last_timestamp_ms: AtomicI64::new(0),
        }
    }

    pub fn assemble(&self) -> Assembly {
        let mut fallbacks = Vec::new();
        let p = &self.probes;

        let hostname = resolve(&mut fallbacks, ProbeKind::Hostname, p.hostname());
        let ip_address = resolve(&mut fallbacks, ProbeKind::IpAddress, p.ip_address());
        let uptime = resolve(&mut fallbacks, ProbeKind::Uptime, p.uptime());
        let temperature_c = resolve(&mut fallbacks, ProbeKind::Temperature, p.temperature());
        let cpu_usage_percent = resolve(&mut fallbacks, ProbeKind::CpuUsage, p.cpu_usage());
        let memory_usage_percent =
            resolve(&mut fallbacks, ProbeKind::MemoryUsage, p.memory_usage());
        let disk_usage_percent = resolve(&mut fallbacks, ProbeKind::DiskUsage, p.disk_usage());
        let game_running = resolve(&mut fallbacks, ProbeKind::GameRunning, p.game_running());

        let report = StatusReport {
            console_id: self.console_id.clone(),
            name: self.name.clone(),
            agent_version: self.agent_version.clone(),
            hostname,
            ip_address,
            temperature_c,
            cpu_usage_percent,
            memory_usage_percent,
            disk_usage_percent,
            uptime,
            game_running,
            timestamp_ms: self.next_timestamp(),
        };

        Assembly { report, fallbacks }
    }

    fn next_timestamp(&self) -> i64 {
        let now = now_unix_ms();
        let prev = self.last_timestamp_ms.fetch_max(now, Ordering::SeqCst);
        prev.max(now)
    }
}

fn resolve<T>(fallbacks: &mut Vec<ProbeFallback>, kind: ProbeKind, probe: Probe<T>) -> T {
    if let Some(cause) = probe.cause() {
        fallbacks.push(ProbeFallback {
            probe: kind,
            cause: cause.to_string(),
        });
    }
    probe.into_value()
}

pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
