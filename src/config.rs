use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const ENV_ENDPOINT: &str = "MONITOR_API";
pub const ENV_CONSOLE_ID: &str = "CONSOLE_ID";
pub const ENV_CONSOLE_NAME: &str = "CONSOLE_NAME";
pub const ENV_REPORT_INTERVAL: &str = "REPORT_INTERVAL";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_console_id")]
    pub console_id: String,
    #[serde(default = "default_console_name")]
    pub console_name: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_agent_version")]
    pub agent_version: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub listen: Option<String>,
    #[serde(default)]
    pub probes: ProbeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default = "default_thermal_zone_path")]
    pub thermal_zone_path: PathBuf,
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,
    #[serde(default = "default_disk_mount")]
    pub disk_mount: String,
    #[serde(default = "default_game_process_pattern")]
    pub game_process_pattern: String,
    #[serde(default = "default_ip_probe_target")]
    pub ip_probe_target: String,
    #[serde(default = "default_cpu_sample_window_ms")]
    pub cpu_sample_window_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            console_id: default_console_id(),
            console_name: default_console_name(),
            interval_secs: default_interval_secs(),
            agent_version: default_agent_version(),
            request_timeout_secs: default_request_timeout_secs(),
            listen: None,
            probes: ProbeConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            thermal_zone_path: default_thermal_zone_path(),
            proc_root: default_proc_root(),
            disk_mount: default_disk_mount(),
            game_process_pattern: default_game_process_pattern(),
            ip_probe_target: default_ip_probe_target(),
            cpu_sample_window_ms: default_cpu_sample_window_ms(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid value for environment variable {name}: {value:?}")]
    Env { name: &'static str, value: String },
    #[error("config validation failed: {0}")]
    Validation(String),
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env(|name| std::env::var(name).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let path_display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_ENDPOINT) {
            self.endpoint = v;
        }
        if let Some(v) = get(ENV_CONSOLE_ID) {
            self.console_id = v;
        }
        if let Some(v) = get(ENV_CONSOLE_NAME) {
            self.console_name = v;
        }
        if let Some(v) = get(ENV_REPORT_INTERVAL) {
            self.interval_secs = v.trim().parse().map_err(|_| ConfigError::Env {
                name: ENV_REPORT_INTERVAL,
                value: v.clone(),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::Validation("endpoint is required".to_string()));
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "endpoint '{endpoint}' must be an http:// or https:// URL"
            )));
        }
        if self.console_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "console_id must not be empty".to_string(),
            ));
        }
        if self.interval_secs < 1 {
            return Err(ConfigError::Validation(
                "interval_secs must be >= 1".to_string(),
            ));
        }
        if self.request_timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be >= 1".to_string(),
            ));
        }
        if let Some(listen) = &self.listen {
            if SocketAddr::from_str(listen).is_err() {
                return Err(ConfigError::Validation(format!(
                    "listen '{listen}' must be a host:port address"
                )));
            }
        }

        validate_probes(&self.probes)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_probes(cfg: &ProbeConfig) -> Result<(), ConfigError> {
    if cfg.game_process_pattern.trim().is_empty() {
        return Err(ConfigError::Validation(
            "probes.game_process_pattern must not be empty".to_string(),
        ));
    }
    if cfg.disk_mount.trim().is_empty() {
        return Err(ConfigError::Validation(
            "probes.disk_mount must not be empty".to_string(),
        ));
    }
    if cfg.ip_probe_target.trim().is_empty() {
        return Err(ConfigError::Validation(
            "probes.ip_probe_target must not be empty".to_string(),
        ));
    }
    if !(1..=5000).contains(&cfg.cpu_sample_window_ms) {
        return Err(ConfigError::Validation(
            "probes.cpu_sample_window_ms must be in range 1..5000".to_string(),
        ));
    }
    Ok(())
}

fn default_endpoint() -> String {
    "https://impactman.up.railway.app/api/status".to_string()
}

fn default_console_id() -> String {
    "IMP-001".to_string()
}

fn default_console_name() -> String {
    "Arcade Console".to_string()
}

const fn default_interval_secs() -> u64 {
    30
}

fn default_agent_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

const fn default_request_timeout_secs() -> u64 {
    10
}

fn default_thermal_zone_path() -> PathBuf {
    PathBuf::from("/sys/class/thermal/thermal_zone0/temp")
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_disk_mount() -> String {
    "/".to_string()
}

fn default_game_process_pattern() -> String {
    "chromium".to_string()
}

fn default_ip_probe_target() -> String {
    "8.8.8.8:80".to_string()
}

const fn default_cpu_sample_window_ms() -> u64 {
    100
}
