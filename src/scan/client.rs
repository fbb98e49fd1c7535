use crate::core::error::ScanError;
use crate::core::types::StockRow;

/// The screener boundary. One shared session behind the trait; the core
/// calls `login` once at startup and treats later scan failures as
/// recoverable per scan.
#[async_trait::async_trait]
pub trait ScanClient: Send + Sync + 'static {
    async fn login(&self) -> Result<(), ScanError>;

    /// Run one configured scan and return the current row set, ordered.
    async fn run_scan(&self, url: &str) -> Result<Vec<StockRow>, ScanError>;
}
