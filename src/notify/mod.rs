use crate::core::error::NotifyError;
use crate::core::types::StockRow;
use chrono::DateTime;
use chrono_tz::Tz;
use std::fmt::Write;

pub mod discord;
pub mod telegram;

/// One chat channel. Send failures come back as values, never panics, so a
/// down channel cannot halt the loop.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// One alert message per scan per cycle, listing the notify-set.
///
/// The same string goes to every channel, so symbols use single-asterisk
/// emphasis: Telegram's Markdown parse mode renders `**` as literal
/// asterisks. On Discord this reads as italic rather than bold.
pub fn format_alert(scan_name: &str, rows: &[StockRow], now: DateTime<Tz>) -> String {
    let mut msg = format!("📈 [{}] {} stock(s)\n", scan_name, rows.len());
    for row in rows {
        match (&row.price, &row.pct_change) {
            (Some(price), Some(pct)) => {
                let _ = writeln!(msg, "• *{}* ({} / {}%)", row.symbol, price, pct);
            }
            (Some(price), None) => {
                let _ = writeln!(msg, "• *{}* ({})", row.symbol, price);
            }
            _ => {
                let _ = writeln!(msg, "• *{}*", row.symbol);
            }
        }
    }
    let _ = write!(msg, "⏰ {}", now.format("%Y-%m-%d %H:%M:%S"));
    msg
}
