mod agent;
mod collectors;
mod config;
mod http;
mod metrics;
mod report;
mod state;
#[cfg(test)]
mod testing;
mod transmit;

use agent::Agent;
use axum::serve;
use clap::Parser;
use collectors::SystemProbes;
use config::Config;
use metrics::{now_unix, Metrics};
use report::ReportAssembler;
use state::State;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use transmit::Transmitter;

#[derive(Parser, Debug)]
#[command(name = "arcade-agent")]
#[command(version)]
struct Cli {
    /// Optional YAML config file; defaults and environment apply without it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    /// Run a single report tick and exit (status 1 if delivery failed).
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    info!(
        version = %cfg.agent_version,
        console_id = %cfg.console_id,
        endpoint = %cfg.endpoint,
        interval = %humantime::format_duration(cfg.interval()),
        "starting arcade-agent"
    );

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialise metrics");
            std::process::exit(1);
        }
    };
    let shared_state = Arc::new(RwLock::new(State::new(now_unix())));

    let agent = Agent::new(
        ReportAssembler::new(&cfg, Box::new(SystemProbes::new(cfg.probes.clone()))),
        Transmitter::new(&cfg),
        metrics.clone(),
        shared_state.clone(),
        cfg.interval(),
    );

    if cli.once {
        let summary = agent.tick().await;
        summary.log();
        std::process::exit(if summary.outcome.success { 0 } else { 1 });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = cfg.listen.clone().map(|listen| {
        let metrics = metrics.clone();
        let http_state = shared_state.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let app = http::build_router(metrics, http_state);
            let addr: SocketAddr = match listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %listen, "invalid listen address");
                    return;
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "failed to start status server");
                    return;
                }
            };
            info!(listen = %addr, "status server listening");

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "status server error");
            }
        })
    });

    let loop_task = tokio::spawn(async move { agent.run(shutdown_rx).await });

    wait_for_shutdown().await;
    info!("shutting down");

    let _ = shutdown_tx.send(true);

    match loop_task.await {
        Ok(ticks) => info!(ticks, "report loop stopped"),
        Err(err) => error!(error = %err, "report loop task failed"),
    }
    if let Some(task) = http_task {
        let _ = task.await;
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            error!(error = %err, "failed to install SIGTERM handler");
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to wait for Ctrl+C");
            }
            return;
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(err) = res {
                error!(error = %err, "failed to wait for Ctrl+C");
            }
        }
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
}
