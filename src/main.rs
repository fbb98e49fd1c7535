mod config;
mod core;
mod notify;
mod scan;
mod schedule;
mod store;

use anyhow::{Context, Result};
use config::config::AppCfg;
use core::types::{Actor, ScheduleState};
use notify::Notifier;
use notify::discord::DiscordNotifier;
use notify::telegram::TelegramNotifier;
use reqwest::Client;
use scan::chartink::ChartinkClient;
use scan::client::ScanClient;
use scan::orchestrator::ScanOrchestrator;
use scan::simulator::SimScanClient;
use schedule::actor::SchedulerActor;
use schedule::slots::MarketHours;
use std::sync::Arc;
use store::json::JsonSeenStore;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let cfg = AppCfg::load("config.yml")?;

    // Root span for the supervisor/main thread
    let span = info_span!(
        "Supervisor",
        pid = %std::process::id(),
        version = env!("CARGO_PKG_VERSION"),
    );

    // logs below are inside "Supervisor"
    let _enter = span.enter();

    info!("Starting up");

    let hours = MarketHours::from_cfg(&cfg.schedule)?;

    info!("Initializing Client");
    let client = Client::builder()
        .user_agent(cfg.http.user_agent.clone())
        .pool_idle_timeout(cfg.http.pool_idle_timeout)
        .pool_max_idle_per_host(cfg.http.pool_max_idle_per_host)
        .tcp_keepalive(cfg.http.tcp_keep_alive)
        .timeout(cfg.http.timeout)
        // The screener session lives in the cookie jar
        .cookie_store(true)
        .build()
        .expect("client");

    let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
    if let Some(discord) = cfg.notify.discord.clone() {
        notifiers.push(Arc::new(DiscordNotifier::new(client.clone(), discord)));
    }
    if let Some(telegram) = cfg.notify.telegram.clone() {
        notifiers.push(Arc::new(TelegramNotifier::new(client.clone(), telegram)));
    }
    info!(channels = notifiers.len(), "notification channels ready");

    let scan_client: Arc<dyn ScanClient> = if cfg.simulation.enabled {
        info!("simulation enabled, using scripted scan client");
        Arc::new(SimScanClient::with_default_script())
    } else {
        Arc::new(ChartinkClient::new(client.clone(), cfg.chartink.clone()))
    };

    let store = Arc::new(JsonSeenStore::new(cfg.storage.dir.clone(), hours.tz));

    info!("Building orchestrator");
    let orchestrator = ScanOrchestrator::new(
        cfg.scans.clone(),
        scan_client,
        store,
        notifiers,
        cfg.notify.always_notify,
        hours.tz,
    );

    info!("Logging in to screener");
    orchestrator.login().await.context("screener login")?;
    info!("Logged in");

    let shutdown = CancellationToken::new();
    let state = if cfg.simulation.enabled {
        ScheduleState::simulate(cfg.simulation.runs)
    } else {
        ScheduleState::live(hours.trading_day(hours.now()))
    };
    let scheduler = SchedulerActor::new(
        orchestrator,
        hours,
        state,
        cfg.simulation.clone(),
        shutdown.clone(),
    );

    info!("Spawning actors");
    let mut actors = tokio::task::JoinSet::new();

    actors.spawn(scheduler.run().instrument(info_span!("Scheduler")));

    info!("Waiting for actors");

    tokio::select! {
        _ = async {
             while let Some(res) = actors.join_next().await {
                 match res {
                    Ok(Ok(()))  => info!("Actor exited cleanly"),
                    Ok(Err(e))  => error!(?e, "Actor returned error"),
                    Err(panic)  => error!(?panic, "Actor panicked/cancelled"),
                }
            }
        } => {  }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down supervisor loop");
            shutdown.cancel();
        }
    }

    info!("Waiting for graceful shutdown of actors");
    while let Some(res) = actors.join_next().await {
        match res {
            Ok(Ok(())) => info!("Actor exited cleanly"),
            Ok(Err(e)) => error!(?e, "Actor returned error"),
            Err(panic) => error!(?panic, "Actor panicked/cancelled"),
        }
    }

    info!("Supervisor exit");
    Ok(())
}
