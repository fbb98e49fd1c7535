use crate::config::config::ScanCfg;
use crate::core::error::ScanError;
use crate::core::types::{RunResult, StockRow};
use crate::notify::{Notifier, format_alert};
use crate::scan::client::ScanClient;
use crate::store::SeenStore;
use chrono::Utc;
use chrono_tz::Tz;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Runs every enabled scan once per cycle: scrape, diff against the seen
/// set, persist, then notify. Failures in one scan or one channel never
/// spill into the others; only an auth failure ends the cycle early.
pub struct ScanOrchestrator {
    scans: Vec<ScanCfg>,
    client: Arc<dyn ScanClient>,
    store: Arc<dyn SeenStore>,
    notifiers: Vec<Arc<dyn Notifier>>,
    always_notify: bool,
    tz: Tz,
    seen: HashMap<String, HashSet<String>>,
}

impl ScanOrchestrator {
    pub fn new(
        scans: Vec<ScanCfg>,
        client: Arc<dyn ScanClient>,
        store: Arc<dyn SeenStore>,
        notifiers: Vec<Arc<dyn Notifier>>,
        always_notify: bool,
        tz: Tz,
    ) -> Self {
        let mut seen = HashMap::new();
        for scan in scans.iter().filter(|s| s.enabled) {
            let set = match store.load(&scan.id) {
                Ok(set) => set,
                Err(e) => {
                    // Degraded start beats a dead loop; worst case is one
                    // round of duplicate alerts.
                    warn!(scan_id = %scan.id, "seen set unreadable, starting empty: {e}");
                    HashSet::new()
                }
            };
            info!(scan_id = %scan.id, seen = set.len(), "loaded seen set");
            seen.insert(scan.id.clone(), set);
        }
        Self {
            scans,
            client,
            store,
            notifiers,
            always_notify,
            tz,
            seen,
        }
    }

    pub async fn login(&self) -> Result<(), ScanError> {
        self.client.login().await
    }

    /// One full pass over the enabled scans, in configured order.
    pub async fn run_cycle(&mut self) -> Vec<RunResult> {
        let mut results = Vec::with_capacity(self.scans.len());
        let mut auth_failed = false;

        for scan in self.scans.iter().filter(|s| s.enabled) {
            if auth_failed {
                results.push(RunResult::failed(
                    &scan.id,
                    "skipped: authentication failed earlier this cycle",
                ));
                continue;
            }

            let all_rows = match self.client.run_scan(&scan.url).await {
                Ok(rows) => rows,
                Err(e @ ScanError::Auth(_)) => {
                    // Nothing left to scan with; remaining scans wait for
                    // the next slot.
                    error!(scan_id = %scan.id, "{e}");
                    auth_failed = true;
                    results.push(RunResult::failed(&scan.id, e.to_string()));
                    continue;
                }
                Err(e) => {
                    warn!(scan_id = %scan.id, "{e}");
                    results.push(RunResult::failed(&scan.id, e.to_string()));
                    continue;
                }
            };

            let seen = self.seen.entry(scan.id.clone()).or_default();
            let new_rows: Vec<StockRow> = all_rows
                .iter()
                .filter(|r| !seen.contains(&r.symbol))
                .cloned()
                .collect();

            // Union in every scraped symbol, not just the new ones, so a
            // symbol that drops out and returns intraday stays muted.
            seen.extend(all_rows.iter().map(|r| r.symbol.clone()));

            // Persist before dispatching: a crash between the two renotifies
            // nothing on restart.
            if let Err(e) = self.store.save(&scan.id, seen) {
                error!(scan_id = %scan.id, "persisting seen set: {e}");
            }

            let notify_rows = if self.always_notify {
                &all_rows
            } else {
                &new_rows
            };
            if notify_rows.is_empty() {
                info!(scan_id = %scan.id, total = all_rows.len(), "no new stocks");
            } else {
                info!(
                    scan_id = %scan.id,
                    notify = notify_rows.len(),
                    total = all_rows.len(),
                    "dispatching alerts"
                );
                let message = format_alert(
                    &scan.name,
                    notify_rows,
                    Utc::now().with_timezone(&self.tz),
                );
                let sends = self.notifiers.iter().map(|n| {
                    let message = message.clone();
                    let n = n.clone();
                    async move { n.send(&message).await }
                });
                for res in join_all(sends).await {
                    if let Err(e) = res {
                        warn!("{e}");
                    }
                }
            }

            results.push(RunResult {
                scan_id: scan.id.clone(),
                new_rows,
                all_rows,
                error: None,
            });
        }

        results
    }

    /// Daily reset: every enabled scan starts the day with an empty set,
    /// persisted immediately.
    pub fn reset_all(&mut self) {
        for scan in self.scans.iter().filter(|s| s.enabled) {
            let seen = self.seen.entry(scan.id.clone()).or_default();
            seen.clear();
            if let Err(e) = self.store.save(&scan.id, seen) {
                error!(scan_id = %scan.id, "persisting reset seen set: {e}");
            }
            info!(scan_id = %scan.id, "seen set cleared");
        }
    }

    #[cfg(test)]
    pub fn seen(&self, scan_id: &str) -> Option<&HashSet<String>> {
        self.seen.get(scan_id)
    }
}
