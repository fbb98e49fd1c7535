use anyhow::Result;
use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[async_trait::async_trait]
pub trait Actor: Send + Sync + 'static {
    async fn run(self) -> Result<()>;
}

// ----------- Domain messages -----------------

/// One scraped screener result. Identity is `symbol` alone; the price fields
/// are display-only and never participate in dedup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StockRow {
    pub symbol: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, rename = "pctChange")]
    pub pct_change: Option<Decimal>,
}

impl StockRow {
    pub fn bare(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: None,
            pct_change: None,
        }
    }
}

/// Outcome of one scan within one cycle. Transient, never persisted.
#[derive(Clone, Debug)]
pub struct RunResult {
    pub scan_id: String,
    pub new_rows: Vec<StockRow>,
    pub all_rows: Vec<StockRow>,
    pub error: Option<String>,
}

impl RunResult {
    pub fn failed(scan_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            scan_id: scan_id.into(),
            new_rows: Vec::new(),
            all_rows: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Live,
    Simulate,
}

/// Explicit scheduler state threaded through the loop. Rebuilt from the wall
/// clock at process start; nothing here is persisted.
#[derive(Clone, Debug)]
pub struct ScheduleState {
    pub mode: RunMode,
    pub next_slot: Option<DateTime<Tz>>,
    pub simulation_runs_remaining: u32,
    pub last_reset_date: Option<NaiveDate>,
}

impl ScheduleState {
    pub fn live(today: NaiveDate) -> Self {
        Self {
            mode: RunMode::Live,
            next_slot: None,
            simulation_runs_remaining: 0,
            last_reset_date: Some(today),
        }
    }

    pub fn simulate(runs: u32) -> Self {
        Self {
            mode: RunMode::Simulate,
            next_slot: None,
            simulation_runs_remaining: runs,
            last_reset_date: None,
        }
    }
}
