use crate::agent::TickSummary;
use crate::report::StatusReport;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct State {
    pub started_at_unix: i64,
    pub ticks_total: u64,
    pub deliveries_ok: u64,
    pub deliveries_failed: u64,
    pub consecutive_failures: u32,
    pub last_tick_unix: Option<i64>,
    pub last_success_unix: Option<i64>,
    pub last_failure_cause: Option<String>,
    pub last_report: Option<StatusReport>,
}

impl State {
    pub fn new(started_at_unix: i64) -> Self {
        Self {
            started_at_unix,
            ..Self::default()
        }
    }

    pub fn record_tick(&mut self, now_unix: i64, summary: &TickSummary) {
        self.ticks_total += 1;
        self.last_tick_unix = Some(now_unix);
        if let Some(report) = &summary.report {
            self.last_report = Some(report.clone());
        }

        if summary.outcome.success {
            self.deliveries_ok += 1;
            self.consecutive_failures = 0;
            self.last_success_unix = Some(now_unix);
        } else {
            self.deliveries_failed += 1;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.last_failure_cause = summary.outcome.cause.clone();
        }
    }
}
