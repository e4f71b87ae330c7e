use crate::report::StatusReport;
use crate::transmit::DeliveryOutcome;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started_at_unix: i64,
    pub arcade_agent_ticks_total: Counter,
    pub arcade_agent_tick_panics_total: Counter,
    pub arcade_agent_deliveries_total: CounterVec,
    pub arcade_agent_probe_fallbacks_total: CounterVec,
    pub arcade_agent_scrape_count_total: Counter,
    pub arcade_agent_temperature_celsius: Gauge,
    pub arcade_agent_cpu_usage_percent: Gauge,
    pub arcade_agent_memory_usage_percent: Gauge,
    pub arcade_agent_disk_usage_percent: Gauge,
    pub arcade_agent_game_running: Gauge,
    pub arcade_agent_last_report_timestamp_seconds: Gauge,
    pub arcade_agent_last_delivery_duration_seconds: Gauge,
    pub arcade_agent_last_success_timestamp_seconds: Gauge,
    pub arcade_agent_uptime_seconds: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let arcade_agent_ticks_total = Counter::with_opts(opts!(
            "arcade_agent_ticks_total",
            "Report loop iterations completed"
        ))?;
        let arcade_agent_tick_panics_total = Counter::with_opts(opts!(
            "arcade_agent_tick_panics_total",
            "Report loop iterations aborted by a panic"
        ))?;
        let arcade_agent_deliveries_total = CounterVec::new(
            opts!(
                "arcade_agent_deliveries_total",
                "Delivery attempts by result (ok|failed)"
            ),
            &["result"],
        )?;
        let arcade_agent_probe_fallbacks_total = CounterVec::new(
            opts!(
                "arcade_agent_probe_fallbacks_total",
                "Probes that reported their fallback sentinel, by probe"
            ),
            &["probe"],
        )?;
        let arcade_agent_scrape_count_total = Counter::with_opts(opts!(
            "arcade_agent_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;
        let arcade_agent_temperature_celsius = Gauge::with_opts(opts!(
            "arcade_agent_temperature_celsius",
            "CPU temperature from the last report"
        ))?;
        let arcade_agent_cpu_usage_percent = Gauge::with_opts(opts!(
            "arcade_agent_cpu_usage_percent",
            "CPU usage from the last report (0..100)"
        ))?;
        let arcade_agent_memory_usage_percent = Gauge::with_opts(opts!(
            "arcade_agent_memory_usage_percent",
            "Memory usage from the last report (0..100)"
        ))?;
        let arcade_agent_disk_usage_percent = Gauge::with_opts(opts!(
            "arcade_agent_disk_usage_percent",
            "Root filesystem usage from the last report (0..100)"
        ))?;
        let arcade_agent_game_running = Gauge::with_opts(opts!(
            "arcade_agent_game_running",
            "1 if the foreground game process was running at the last report"
        ))?;
        let arcade_agent_last_report_timestamp_seconds = Gauge::with_opts(opts!(
            "arcade_agent_last_report_timestamp_seconds",
            "Unix time of the last assembled report"
        ))?;
        let arcade_agent_last_delivery_duration_seconds = Gauge::with_opts(opts!(
            "arcade_agent_last_delivery_duration_seconds",
            "Wall time of the last delivery attempt"
        ))?;
        let arcade_agent_last_success_timestamp_seconds = Gauge::with_opts(opts!(
            "arcade_agent_last_success_timestamp_seconds",
            "Unix time of the last successful delivery"
        ))?;
        let arcade_agent_uptime_seconds = Gauge::with_opts(opts!(
            "arcade_agent_uptime_seconds",
            "Seconds since the agent started"
        ))?;

        register(&registry, &arcade_agent_ticks_total)?;
        register(&registry, &arcade_agent_tick_panics_total)?;
        register(&registry, &arcade_agent_deliveries_total)?;
        register(&registry, &arcade_agent_probe_fallbacks_total)?;
        register(&registry, &arcade_agent_scrape_count_total)?;
        register(&registry, &arcade_agent_temperature_celsius)?;
        register(&registry, &arcade_agent_cpu_usage_percent)?;
        register(&registry, &arcade_agent_memory_usage_percent)?;
        register(&registry, &arcade_agent_disk_usage_percent)?;
        register(&registry, &arcade_agent_game_running)?;
        register(&registry, &arcade_agent_last_report_timestamp_seconds)?;
        register(&registry, &arcade_agent_last_delivery_duration_seconds)?;
        register(&registry, &arcade_agent_last_success_timestamp_seconds)?;
        register(&registry, &arcade_agent_uptime_seconds)?;

        Ok(Arc::new(Self {
            registry,
            started_at_unix: now_unix(),
            arcade_agent_ticks_total,
            arcade_agent_tick_panics_total,
            arcade_agent_deliveries_total,
            arcade_agent_probe_fallbacks_total,
            arcade_agent_scrape_count_total,
            arcade_agent_temperature_celsius,
            arcade_agent_cpu_usage_percent,
            arcade_agent_memory_usage_percent,
            arcade_agent_disk_usage_percent,
            arcade_agent_game_running,
            arcade_agent_last_report_timestamp_seconds,
            arcade_agent_last_delivery_duration_seconds,
            arcade_agent_last_success_timestamp_seconds,
            arcade_agent_uptime_seconds,
        }))
    }

    pub fn update_from_report(&self, report: &StatusReport) {
        self.arcade_agent_temperature_celsius
            .set(report.temperature_c);
        self.arcade_agent_cpu_usage_percent
            .set(report.cpu_usage_percent);
        self.arcade_agent_memory_usage_percent
            .set(report.memory_usage_percent);
        self.arcade_agent_disk_usage_percent
            .set(report.disk_usage_percent as f64);
        self.arcade_agent_game_running
            .set(if report.game_running { 1.0 } else { 0.0 });
        self.arcade_agent_last_report_timestamp_seconds
            .set(report.timestamp_ms as f64 / 1000.0);
    }

    pub fn record_delivery(&self, outcome: &DeliveryOutcome, elapsed: Duration) {
        let result = if outcome.success { "ok" } else { "failed" };
        self.arcade_agent_deliveries_total
            .with_label_values(&[result])
            .inc();
        self.arcade_agent_last_delivery_duration_seconds
            .set(elapsed.as_secs_f64());
        if outcome.success {
            self.arcade_agent_last_success_timestamp_seconds
                .set(now_unix() as f64);
        }
    }

    pub fn inc_probe_fallback(&self, probe: &str) {
        self.arcade_agent_probe_fallbacks_total
            .with_label_values(&[probe])
            .inc();
    }

    pub fn inc_tick(&self) {
        self.arcade_agent_ticks_total.inc();
    }

    pub fn inc_tick_panic(&self) {
        self.arcade_agent_tick_panics_total.inc();
    }

    pub fn inc_scrape_count(&self) {
        self.arcade_agent_scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let uptime = now_unix().saturating_sub(self.started_at_unix) as f64;
        self.arcade_agent_uptime_seconds.set(uptime);

        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
