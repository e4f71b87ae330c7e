pub mod checks;
#[cfg(test)]
pub(crate) mod stub;
pub mod system;

use std::io;
use std::process::ExitStatus;
use thiserror::Error;
use tracing::debug;

pub use system::SystemProbes;

pub const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Temperature,
    CpuUsage,
    MemoryUsage,
    DiskUsage,
    Uptime,
    IpAddress,
    Hostname,
    GameRunning,
}

impl ProbeKind {
    #[cfg(test)]
    pub const ALL: [ProbeKind; 8] = [
        ProbeKind::Temperature,
        ProbeKind::CpuUsage,
        ProbeKind::MemoryUsage,
        ProbeKind::DiskUsage,
        ProbeKind::Uptime,
        ProbeKind::IpAddress,
        ProbeKind::Hostname,
        ProbeKind::GameRunning,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProbeKind::Temperature => "temperature",
            ProbeKind::CpuUsage => "cpu_usage",
            ProbeKind::MemoryUsage => "memory_usage",
            ProbeKind::DiskUsage => "disk_usage",
            ProbeKind::Uptime => "uptime",
            ProbeKind::IpAddress => "ip_address",
            ProbeKind::Hostname => "hostname",
            ProbeKind::GameRunning => "game_running",
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        source: io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit {
        program: &'static str,
        status: ExitStatus,
    },
    #[error("malformed {what}: {detail}")]
    Malformed { what: &'static str, detail: String },
    #[error("socket probe failed: {0}")]
    Socket(#[source] io::Error),
}

impl ProbeError {
    pub(crate) fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        ProbeError::Malformed {
            what,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    Value(T),
    Fallback { value: T, cause: String },
}

impl<T> Probe<T> {
    pub fn from_result(kind: ProbeKind, result: Result<T, ProbeError>, fallback: T) -> Self {
        match result {
            Ok(value) => Probe::Value(value),
            Err(err) => {
                debug!(probe = kind.as_str(), error = %err, "probe fell back");
                Probe::Fallback {
                    value: fallback,
                    cause: err.to_string(),
                }
            }
        }
    }

    #[cfg(test)]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Probe::Fallback { .. })
    }

    pub fn cause(&self) -> Option<&str> {
        match self {
            Probe::Value(_) => None,
            Probe::Fallback { cause, .. } => Some(cause),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Probe::Value(value) | Probe::Fallback { value, .. } => value,
        }
    }
}

/// Every failure is reported as [`Probe::Fallback`], never as a panic.
pub trait HostProbes: Send + Sync {
    fn temperature(&self) -> Probe<f64>;
    fn cpu_usage(&self) -> Probe<f64>;
    fn memory_usage(&self) -> Probe<f64>;
    fn disk_usage(&self) -> Probe<u8>;
    fn uptime(&self) -> Probe<String>;
    fn ip_address(&self) -> Probe<String>;
    fn hostname(&self) -> Probe<String>;
    fn game_running(&self) -> Probe<bool>;
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
