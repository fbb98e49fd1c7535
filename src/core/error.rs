use std::path::PathBuf;
use thiserror::Error;

/// Failures at the screener boundary. `Auth` aborts the remainder of the
/// current cycle; everything else is isolated to one scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("screener under maintenance: {0}")]
    Maintenance(String),

    #[error("scrape failed: {0}")]
    Scrape(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file exists but cannot be parsed. Callers degrade to an
    /// empty seen set with a warning rather than failing the scan.
    #[error("corrupt seen file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("seen store io: {0}")]
    Io(#[from] std::io::Error),
}

/// A single channel's send failure. Logged by the dispatcher, never escalated.
#[derive(Debug, Error)]
#[error("{channel} notification failed: {reason}")]
pub struct NotifyError {
    pub channel: &'static str,
    pub reason: String,
}
