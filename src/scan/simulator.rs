use crate::core::error::ScanError;
use crate::core::types::StockRow;
use crate::scan::client::ScanClient;
use std::sync::Mutex;

/// Scripted screener for SIMULATE mode and tests: each call serves the next
/// result set from the script, then the last set repeats.
pub struct SimScanClient {
    script: Vec<Vec<StockRow>>,
    calls: Mutex<usize>,
}

impl SimScanClient {
    pub fn new(script: Vec<Vec<StockRow>>) -> Self {
        Self {
            script,
            calls: Mutex::new(0),
        }
    }

    /// A growing result set, so every simulation run after the first mixes
    /// already-seen and new symbols.
    pub fn with_default_script() -> Self {
        Self::new(vec![
            vec![StockRow::bare("PNB"), StockRow::bare("SBIN")],
            vec![
                StockRow::bare("PNB"),
                StockRow::bare("SBIN"),
                StockRow::bare("TCS"),
            ],
            vec![
                StockRow::bare("INFY"),
                StockRow::bare("PNB"),
                StockRow::bare("SBIN"),
                StockRow::bare("TCS"),
            ],
        ])
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().expect("calls lock")
    }
}

#[async_trait::async_trait]
impl ScanClient for SimScanClient {
    async fn login(&self) -> Result<(), ScanError> {
        Ok(())
    }

    async fn run_scan(&self, _url: &str) -> Result<Vec<StockRow>, ScanError> {
        let mut calls = self.calls.lock().expect("calls lock");
        let idx = (*calls).min(self.script.len().saturating_sub(1));
        *calls += 1;
        Ok(self.script.get(idx).cloned().unwrap_or_default())
    }
}
