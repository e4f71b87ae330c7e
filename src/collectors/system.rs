use crate::collectors::checks;
use crate::collectors::{round1, HostProbes, Probe, ProbeError, ProbeKind, UNKNOWN};
use crate::config::ProbeConfig;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use sysinfo::{ProcessExt, System, SystemExt};

#[derive(Debug, Clone)]
pub struct SystemProbes {
    cfg: ProbeConfig,
}

impl SystemProbes {
    pub fn new(cfg: ProbeConfig) -> Self {
        Self { cfg }
    }

    fn read_proc(&self, name: &str) -> Result<String, ProbeError> {
        read_to_string(&self.cfg.proc_root.join(name))
    }

    fn read_cpu_usage(&self) -> Result<f64, ProbeError> {
        let before = parse_cpu_line(&self.read_proc("stat")?)?;
        thread::sleep(Duration::from_millis(self.cfg.cpu_sample_window_ms));
        let after = parse_cpu_line(&self.read_proc("stat")?)?;
        cpu_usage_between(before, after)
    }
}

impl HostProbes for SystemProbes {
    fn temperature(&self) -> Probe<f64> {
        let result =
            read_to_string(&self.cfg.thermal_zone_path).and_then(|s| parse_thermal_millis(&s));
        Probe::from_result(ProbeKind::Temperature, result, 0.0)
    }

    fn cpu_usage(&self) -> Probe<f64> {
        Probe::from_result(ProbeKind::CpuUsage, self.read_cpu_usage(), 0.0)
    }

    fn memory_usage(&self) -> Probe<f64> {
        let mut system = System::new();
        system.refresh_memory();
        let result = memory_usage_percent(system.total_memory(), system.available_memory());
        Probe::from_result(ProbeKind::MemoryUsage, result, 0.0)
    }

    fn disk_usage(&self) -> Probe<u8> {
        Probe::from_result(
            ProbeKind::DiskUsage,
            checks::disk_usage(&self.cfg.disk_mount),
            0,
        )
    }

    fn uptime(&self) -> Probe<String> {
        let result = uptime_from_secs(System::new().uptime());
        Probe::from_result(ProbeKind::Uptime, result, UNKNOWN.to_string())
    }

    fn ip_address(&self) -> Probe<String> {
        Probe::from_result(
            ProbeKind::IpAddress,
            checks::outbound_ip(&self.cfg.ip_probe_target),
            UNKNOWN.to_string(),
        )
    }

    fn hostname(&self) -> Probe<String> {
        let result = System::new()
            .host_name()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| ProbeError::malformed("hostname", "OS did not report a host name"));
        Probe::from_result(ProbeKind::Hostname, result, UNKNOWN.to_string())
    }

    fn game_running(&self) -> Probe<bool> {
        Probe::from_result(
            ProbeKind::GameRunning,
            process_running(&self.cfg.game_process_pattern),
            false,
        )
    }
}

fn read_to_string(path: &Path) -> Result<String, ProbeError> {
    fs::read_to_string(path).map_err(|source| ProbeError::Read {
        path: path.display().to_string(),
        source,
    })
}

pub fn parse_thermal_millis(text: &str) -> Result<f64, ProbeError> {
    let raw = text.trim();
    let millis: i64 = raw
        .parse()
        .map_err(|_| ProbeError::malformed("thermal readout", format!("{raw:?}")))?;
    Ok(round1(millis as f64 / 1000.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

pub fn parse_cpu_line(stat: &str) -> Result<CpuTimes, ProbeError> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| ProbeError::malformed("/proc/stat", "no aggregate cpu line"))?;

    let counters = line
        .split_whitespace()
        .skip(1)
        .map(|tok| tok.parse::<u64>())
        .collect::<Result<Vec<u64>, _>>()
        .map_err(|err| ProbeError::malformed("/proc/stat", err.to_string()))?;
    if counters.len() < 4 {
        return Err(ProbeError::malformed(
            "/proc/stat",
            format!("expected at least 4 counters, got {}", counters.len()),
        ));
    }

    Ok(CpuTimes {
        idle: counters[3],
        total: counters.iter().fold(0_u64, |acc, v| acc.saturating_add(*v)),
    })
}

pub fn cpu_usage_between(before: CpuTimes, after: CpuTimes) -> Result<f64, ProbeError> {
    let total_delta = after.total.saturating_sub(before.total);
    if total_delta == 0 {
        return Err(ProbeError::malformed(
            "/proc/stat",
            "tick counters did not advance between samples",
        ));
    }
    let idle_delta = after.idle.saturating_sub(before.idle);
    let usage = 100.0 * (1.0 - idle_delta as f64 / total_delta as f64);
    Ok(round1(usage.clamp(0.0, 100.0)))
}

pub fn memory_usage_percent(total: u64, available: u64) -> Result<f64, ProbeError> {
    if total == 0 {
        return Err(ProbeError::malformed("memory totals", "total memory is zero"));
    }
    let usage = 100.0 * (1.0 - available as f64 / total as f64);
    Ok(round1(usage.clamp(0.0, 100.0)))
}

pub fn uptime_from_secs(secs: u64) -> Result<String, ProbeError> {
    if secs == 0 {
        return Err(ProbeError::malformed("uptime", "host reported zero seconds"));
    }
    Ok(format_uptime(secs))
}

/// Whether any process command line contains `pattern`, like `pgrep -f`.
pub fn process_running(pattern: &str) -> Result<bool, ProbeError> {
    let mut system = System::new();
    system.refresh_processes();
    let own_pid = sysinfo::get_current_pid().ok();
    let cmdlines = system
        .processes()
        .iter()
        .filter(|(pid, _)| Some(**pid) != own_pid)
        .map(|(_, process)| process.cmd().join(" "));
    any_cmdline_matches(cmdlines, pattern)
}

pub fn any_cmdline_matches<I>(cmdlines: I, pattern: &str) -> Result<bool, ProbeError>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = false;
    for cmdline in cmdlines {
        seen = true;
        if cmdline.contains(pattern) {
            return Ok(true);
        }
    }
    if seen {
        Ok(false)
    } else {
        Err(ProbeError::malformed("process table", "no processes listed"))
    }
}

pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    if days > 0 {
        format!("{days}d {hours}h")
    } else {
        let minutes = (secs % 3_600) / 60;
        format!("{hours}h {minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::process::{Child, Command};
    use std::time::Instant;

    const STAT_BEFORE: &str = "cpu  4705 356 584 3699 23 23 0 0 0 0\n\
                               cpu0 1393 280 325 887 12 9 0 0 0 0\n\
                               intr 114930548 113199788 3 0 5 263 0 4 [... lots more numbers ...]\n";
    const STAT_AFTER: &str = "cpu  4755 356 594 3839 23 23 0 0 0 0\n\
                              cpu0 1405 280 330 920 12 9 0 0 0 0\n";

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(90_061), "1d 1h");
        assert_eq!(format_uptime(3_661), "1h 1m");
        assert_eq!(format_uptime(59), "0h 0m");
        assert_eq!(format_uptime(86_400), "1d 0h");
    }

    #[test]
    fn zero_uptime_is_an_error() {
        assert_eq!(uptime_from_secs(3_661).unwrap(), "1h 1m");
        assert!(uptime_from_secs(0).is_err());
    }

    #[test]
    fn cpu_line_uses_fourth_counter_as_idle() {
        let times = parse_cpu_line(STAT_BEFORE).unwrap();
        assert_eq!(times.idle, 3699);
        assert_eq!(times.total, 4705 + 356 + 584 + 3699 + 23 + 23);
    }

    #[test]
    fn cpu_usage_matches_idle_total_delta() {
        let before = parse_cpu_line(STAT_BEFORE).unwrap();
        let after = parse_cpu_line(STAT_AFTER).unwrap();
        // Δtotal = 200, Δidle = 140
        assert_eq!(cpu_usage_between(before, after).unwrap(), 30.0);

        let before = CpuTimes { idle: 0, total: 0 };
        let after = CpuTimes { idle: 2, total: 3 };
        assert_eq!(cpu_usage_between(before, after).unwrap(), 33.3);
    }

    #[test]
    fn cpu_usage_without_progress_is_an_error() {
        let times = parse_cpu_line(STAT_BEFORE).unwrap();
        assert!(cpu_usage_between(times, times).is_err());
    }

    #[test]
    fn cpu_line_rejects_garbage() {
        assert!(parse_cpu_line("cpu0 1 2 3 4\n").is_err());
        assert!(parse_cpu_line("cpu  1 2 x 4\n").is_err());
        assert!(parse_cpu_line("cpu  1 2 3\n").is_err());
    }

    #[test]
    fn memory_usage_from_total_and_available() {
        assert_eq!(memory_usage_percent(3_884_028, 2_913_021).unwrap(), 25.0);
        assert_eq!(memory_usage_percent(1_000, 0).unwrap(), 100.0);
        assert_eq!(memory_usage_percent(1_000, 2_000).unwrap(), 0.0);
        assert!(memory_usage_percent(0, 0).is_err());
    }

    #[test]
    fn thermal_readout_in_millidegrees() {
        assert_eq!(parse_thermal_millis("48312\n").unwrap(), 48.3);
        assert!(parse_thermal_millis("hot").is_err());
    }

    #[test]
    fn cmdline_matching() {
        let cmdlines = || {
            vec![
                "/sbin/init".to_string(),
                "/usr/lib/chromium/chromium --kiosk http://localhost:3000".to_string(),
            ]
        };
        assert!(any_cmdline_matches(cmdlines(), "chromium").unwrap());
        assert!(any_cmdline_matches(cmdlines(), "--kiosk http").unwrap());
        assert!(!any_cmdline_matches(cmdlines(), "retroarch").unwrap());
    }

    #[test]
    fn empty_process_table_is_an_error() {
        let err = any_cmdline_matches(Vec::new(), "chromium").unwrap_err();
        assert!(err.to_string().contains("no processes listed"));
    }

    fn unique_sleep() -> (Child, String) {
        let duration = format!("60.{}", std::process::id());
        let child = Command::new("sleep").arg(&duration).spawn().unwrap();
        (child, format!("sleep {duration}"))
    }

    #[test]
    fn running_process_is_found_by_command_line() {
        let (mut child, pattern) = unique_sleep();

        // The child may still show the parent's command line until it has exec'd.
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut found = false;
        while Instant::now() < deadline {
            if process_running(&pattern).unwrap() {
                found = true;
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }

        child.kill().unwrap();
        child.wait().unwrap();

        assert!(found, "{pattern:?} not found while running");
        assert!(!process_running(&pattern).unwrap());
    }

    #[test]
    fn absent_process_is_not_running() {
        // Built at runtime so no command line on the host already contains it.
        let pattern = format!("absent-zz-{}", std::process::id() * 7 + 3);
        assert!(!process_running(&pattern).unwrap());
    }

    fn probes_in(dir: &Path) -> SystemProbes {
        SystemProbes::new(ProbeConfig {
            thermal_zone_path: dir.join("thermal_zone0/temp"),
            proc_root: dir.to_path_buf(),
            disk_mount: "/definitely/not/a/mount/point".to_string(),
            game_process_pattern: format!("no-such-arcade-process-{}", std::process::id() + 4242),
            ip_probe_target: "not a socket address".to_string(),
            cpu_sample_window_ms: 1,
        })
    }

    #[test]
    fn missing_sources_fall_back_to_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let probes = probes_in(dir.path());

        let temperature = probes.temperature();
        assert!(temperature.is_fallback());
        assert_eq!(temperature.into_value(), 0.0);

        let cpu = probes.cpu_usage();
        assert!(cpu.is_fallback());
        assert_eq!(cpu.into_value(), 0.0);

        assert_eq!(probes.disk_usage().into_value(), 0);
        assert_eq!(probes.ip_address().into_value(), UNKNOWN);
        assert_eq!(probes.game_running(), Probe::Value(false));
    }

    #[test]
    fn host_memory_and_uptime_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let probes = probes_in(dir.path());

        match probes.memory_usage() {
            Probe::Value(pct) => assert!((0.0..=100.0).contains(&pct)),
            other => panic!("memory probe fell back: {other:?}"),
        }
        match probes.uptime() {
            Probe::Value(text) => assert!(text.ends_with('h') || text.ends_with('m')),
            other => panic!("uptime probe fell back: {other:?}"),
        }
    }

    #[test]
    fn readouts_come_from_configured_paths() {
        let dir = tempfile::tempdir().unwrap();
        let root: PathBuf = dir.path().to_path_buf();
        fs::create_dir_all(root.join("thermal_zone0")).unwrap();
        fs::write(root.join("thermal_zone0/temp"), "51234\n").unwrap();
        // A static stat file never advances.
        fs::write(root.join("stat"), STAT_BEFORE).unwrap();

        let probes = probes_in(&root);
        assert_eq!(probes.temperature(), Probe::Value(51.2));

        let cpu = probes.cpu_usage();
        assert!(cpu.is_fallback());
        assert!(cpu.cause().unwrap_or_default().contains("did not advance"));
    }
}
