use crate::metrics::{now_unix, Metrics};
use crate::report::{ReportAssembler, StatusReport};
use crate::state::State;
use crate::transmit::{DeliveryOutcome, Transmitter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::task;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct TickSummary {
    pub report: Option<StatusReport>,
    pub outcome: DeliveryOutcome,
}

impl TickSummary {
    fn aborted(cause: String) -> Self {
        Self {
            report: None,
            outcome: DeliveryOutcome::failed(cause),
        }
    }

    pub fn line(&self) -> String {
        match (&self.report, self.outcome.success) {
            (Some(r), true) => format!(
                "[OK] Reported: CPU {:.1}%, Temp {:.1}°C, Mem {:.1}%",
                r.cpu_usage_percent, r.temperature_c, r.memory_usage_percent
            ),
            _ => "[FAIL] Could not reach API".to_string(),
        }
    }

    pub fn log(&self) {
        if self.outcome.success {
            info!("{}", self.line());
        } else {
            let cause = self.outcome.cause.as_deref().unwrap_or("unknown");
            warn!(cause, "{}", self.line());
        }
    }
}

pub struct Agent {
    assembler: Arc<ReportAssembler>,
    transmitter: Arc<Transmitter>,
    metrics: Arc<Metrics>,
    state: Arc<RwLock<State>>,
    interval: Duration,
}

impl Agent {
    pub fn new(
        assembler: ReportAssembler,
        transmitter: Transmitter,
        metrics: Arc<Metrics>,
        state: Arc<RwLock<State>>,
        interval: Duration,
    ) -> Self {
        Self {
            assembler: Arc::new(assembler),
            transmitter: Arc::new(transmitter),
            metrics,
            state,
            interval,
        }
    }

    pub async fn tick(&self) -> TickSummary {
        let body = tokio::spawn(run_tick(
            self.assembler.clone(),
            self.transmitter.clone(),
            self.metrics.clone(),
        ));
        let summary = match body.await {
            Ok(summary) => summary,
            Err(err) => {
                self.metrics.inc_tick_panic();
                TickSummary::aborted(format!("tick aborted: {err}"))
            }
        };

        self.metrics.inc_tick();
        self.state.write().await.record_tick(now_unix(), &summary);
        summary
    }

    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> u64 {
        self.run_observed(shutdown, |_| {}).await
    }

    pub async fn run_observed<F>(&self, mut shutdown: watch::Receiver<bool>, mut observe: F) -> u64
    where
        F: FnMut(&TickSummary),
    {
        let mut ticks = 0_u64;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let summary = self.tick().await;
            ticks += 1;
            summary.log();
            observe(&summary);

            tokio::select! {
                _ = shutdown.changed() => {
                    info!(ticks, "shutdown signal received, stopping report loop");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        ticks
    }
}

async fn run_tick(
    assembler: Arc<ReportAssembler>,
    transmitter: Arc<Transmitter>,
    metrics: Arc<Metrics>,
) -> TickSummary {
    let assembly = match task::spawn_blocking(move || assembler.assemble()).await {
        Ok(assembly) => assembly,
        Err(err) => {
            metrics.inc_tick_panic();
            return TickSummary::aborted(format!("report assembly aborted: {err}"));
        }
    };
    for fallback in &assembly.fallbacks {
        metrics.inc_probe_fallback(fallback.probe.as_str());
    }
    metrics.update_from_report(&assembly.report);

    let started = Instant::now();
    let outcome = transmitter.send(&assembly.report).await;
    metrics.record_delivery(&outcome, started.elapsed());

    TickSummary {
        report: Some(assembly.report),
        outcome,
    }
}
