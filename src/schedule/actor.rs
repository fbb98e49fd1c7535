use crate::config::config::SimulationCfg;
use crate::core::types::{Actor, RunMode, RunResult, ScheduleState};
use crate::scan::orchestrator::ScanOrchestrator;
use crate::schedule::slots::MarketHours;
use anyhow::Result;
use chrono::DateTime;
use chrono_tz::Tz;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Drives the orchestrator on the slot grid. Exactly one cycle runs at a
/// time; the loop suspends only while waiting for the next slot, and the
/// shutdown token is honored between cycles, never mid-cycle.
pub struct SchedulerActor {
    pub orchestrator: ScanOrchestrator,
    pub hours: MarketHours,
    pub state: ScheduleState,
    pub simulation: SimulationCfg,
    pub shutdown: CancellationToken,
}

impl SchedulerActor {
    pub fn new(
        orchestrator: ScanOrchestrator,
        hours: MarketHours,
        state: ScheduleState,
        simulation: SimulationCfg,
        shutdown: CancellationToken,
    ) -> SchedulerActor {
        Self {
            orchestrator,
            hours,
            state,
            simulation,
            shutdown,
        }
    }

    /// Fixed number of cycles at a fixed short interval, grid and weekend
    /// checks bypassed. The process exits normally afterwards.
    async fn run_simulation(&mut self) -> Result<()> {
        let total = self.state.simulation_runs_remaining;
        info!(
            runs = total,
            interval_secs = self.simulation.interval.as_secs(),
            "simulation mode: market hour restrictions bypassed"
        );
        while self.state.simulation_runs_remaining > 0 {
            let run = total - self.state.simulation_runs_remaining + 1;
            info!(run, total, "simulation cycle");
            let results = self.orchestrator.run_cycle().await;
            log_results(&results);
            self.state.simulation_runs_remaining -= 1;
            if self.state.simulation_runs_remaining == 0 {
                break;
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("SchedulerActor: shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.simulation.interval) => {}
            }
        }
        info!("simulation complete");
        Ok(())
    }

    async fn run_live(&mut self) -> Result<()> {
        loop {
            let now = self.hours.now();
            let slot = pick_slot(&self.hours, &self.state, now);
            self.state.next_slot = Some(slot);

            let wait = (slot - now).to_std().unwrap_or_default();
            if !wait.is_zero() {
                info!(
                    slot = %slot.format("%Y-%m-%d %H:%M:%S %Z"),
                    wait_secs = wait.as_secs(),
                    "waiting for next slot"
                );
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        info!("SchedulerActor: shutdown requested");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            } else if self.shutdown.is_cancelled() {
                info!("SchedulerActor: shutdown requested");
                break;
            }

            // First run of a new trading day starts from empty seen sets.
            let woke = self.hours.now();
            let today = self.hours.trading_day(woke);
            if self.state.last_reset_date != Some(today) {
                info!(%today, "new trading day, resetting seen sets");
                self.orchestrator.reset_all();
                self.state.last_reset_date = Some(today);
            }

            info!(slot = %slot.format("%Y-%m-%d %H:%M:%S %Z"), "running scans");
            let results = self.orchestrator.run_cycle().await;
            log_results(&results);
        }
        Ok(())
    }
}

/// `state.next_slot` holds the slot the previous iteration ran. A cycle can
/// finish inside the same due second; always move strictly past that slot.
fn pick_slot(hours: &MarketHours, state: &ScheduleState, now: DateTime<Tz>) -> DateTime<Tz> {
    match state.next_slot {
        Some(prev) if hours.next_slot_or_now(now) <= prev => hours.next_slot(now),
        _ => hours.next_slot_or_now(now),
    }
}

fn log_results(results: &[RunResult]) {
    for r in results {
        match &r.error {
            Some(err) => error!(scan_id = %r.scan_id, "scan failed: {err}"),
            None => info!(
                scan_id = %r.scan_id,
                new = r.new_rows.len(),
                total = r.all_rows.len(),
                "scan complete"
            ),
        }
    }
}

#[async_trait::async_trait]
impl Actor for SchedulerActor {
    async fn run(mut self) -> Result<()> {
        info!("SchedulerActor started");
        match self.state.mode {
            RunMode::Simulate => self.run_simulation().await?,
            RunMode::Live => self.run_live().await?,
        }
        info!("SchedulerActor stopped cleanly");
        Ok(())
    }
}
