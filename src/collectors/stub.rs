use crate::collectors::{HostProbes, Probe, ProbeKind, UNKNOWN};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct StubProbes {
    pub failing: HashSet<ProbeKind>,
}

pub const HOSTNAME: &str = "arcade-pi";
pub const IP_ADDRESS: &str = "192.168.1.42";
pub const TEMPERATURE: f64 = 48.3;
pub const CPU_USAGE: f64 = 12.5;
pub const MEMORY_USAGE: f64 = 37.1;
pub const DISK_USAGE: u8 = 42;
pub const UPTIME: &str = "1d 1h";

impl StubProbes {
    pub fn failing(kinds: impl IntoIterator<Item = ProbeKind>) -> Self {
        Self {
            failing: kinds.into_iter().collect(),
        }
    }

    fn probe<T>(&self, kind: ProbeKind, value: T, fallback: T) -> Probe<T> {
        if self.failing.contains(&kind) {
            Probe::Fallback {
                value: fallback,
                cause: format!("{} forced to fail", kind.as_str()),
            }
        } else {
            Probe::Value(value)
        }
    }
}

impl HostProbes for StubProbes {
    fn temperature(&self) -> Probe<f64> {
        self.probe(ProbeKind::Temperature, TEMPERATURE, 0.0)
    }

    fn cpu_usage(&self) -> Probe<f64> {
        self.probe(ProbeKind::CpuUsage, CPU_USAGE, 0.0)
    }

    fn memory_usage(&self) -> Probe<f64> {
        self.probe(ProbeKind::MemoryUsage, MEMORY_USAGE, 0.0)
    }

    fn disk_usage(&self) -> Probe<u8> {
        self.probe(ProbeKind::DiskUsage, DISK_USAGE, 0)
    }

    fn uptime(&self) -> Probe<String> {
        self.probe(ProbeKind::Uptime, UPTIME.to_string(), UNKNOWN.to_string())
    }

    fn ip_address(&self) -> Probe<String> {
        self.probe(
            ProbeKind::IpAddress,
            IP_ADDRESS.to_string(),
            UNKNOWN.to_string(),
        )
    }

    fn hostname(&self) -> Probe<String> {
        self.probe(ProbeKind::Hostname, HOSTNAME.to_string(), UNKNOWN.to_string())
    }

    fn game_running(&self) -> Probe<bool> {
        self.probe(ProbeKind::GameRunning, true, false)
    }
}
