use crate::config::config::ChartinkCfg;
use crate::core::error::ScanError;
use crate::core::types::StockRow;
use crate::scan::client::ScanClient;
use reqwest::Client;
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

const MAINTENANCE_KEYWORDS: [&str; 8] = [
    "under maintenance",
    "scanner under maintenance",
    "please re-try",
    "please retry",
    "service unavailable",
    "temporarily unavailable",
    "server is busy",
    "too many requests",
];

/// Chartink session over plain HTTP: form login with the page's CSRF token,
/// cookie jar on the shared client, results scraped from the scan page.
pub struct ChartinkClient {
    client: Client,
    cfg: ChartinkCfg,
}

impl ChartinkClient {
    /// `client` must have its cookie store enabled; the session lives there.
    pub fn new(client: Client, cfg: ChartinkCfg) -> Self {
        Self { client, cfg }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ScanError> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::Scrape(format!("GET {url}: {e}")))?;
        if res.url().path().contains("login") {
            return Err(ScanError::Auth("redirected to login page".to_string()));
        }
        res.error_for_status()
            .map_err(|e| ScanError::Scrape(e.to_string()))?
            .text()
            .await
            .map_err(|e| ScanError::Scrape(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ScanClient for ChartinkClient {
    async fn login(&self) -> Result<(), ScanError> {
        let login_url = format!("{}/login", self.cfg.base_url);
        let page = self
            .client
            .get(&login_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ScanError::Auth(format!("fetching login page: {e}")))?
            .text()
            .await
            .map_err(|e| ScanError::Auth(format!("reading login page: {e}")))?;

        let token = extract_csrf(&page)
            .ok_or_else(|| ScanError::Auth("login page carries no csrf token".to_string()))?;

        let res = self
            .client
            .post(&login_url)
            .form(&[
                ("email", self.cfg.email.as_str()),
                ("password", self.cfg.password.as_str()),
                ("_token", token.as_str()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ScanError::Auth(format!("submitting login: {e}")))?;

        // Laravel bounces rejected credentials back to the login form.
        if res.url().path().contains("login") {
            return Err(ScanError::Auth("credentials rejected".to_string()));
        }
        info!("chartink login ok");
        Ok(())
    }

    async fn run_scan(&self, url: &str) -> Result<Vec<StockRow>, ScanError> {
        run_with_retries(
            self.cfg.maintenance_retries.max(1),
            self.cfg.retry_delay,
            || self.fetch_page(url),
        )
        .await
    }
}

/// One fetched page, classified: a maintenance banner is a
/// `ScanError::Maintenance`, anything else parses into rows.
fn scan_attempt(body: &str) -> Result<Vec<StockRow>, ScanError> {
    match detect_maintenance(body) {
        Some(msg) => Err(ScanError::Maintenance(msg)),
        None => Ok(parse_rows(body)),
    }
}

/// Retries maintenance answers up to `attempts` times, then degrades to an
/// empty result for the slot. Every other error propagates on the first hit.
async fn run_with_retries<F, Fut>(
    attempts: u32,
    delay: Duration,
    mut fetch: F,
) -> Result<Vec<StockRow>, ScanError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ScanError>>,
{
    for attempt in 1..=attempts {
        let body = fetch().await?;
        match scan_attempt(&body) {
            Err(ScanError::Maintenance(msg)) if attempt < attempts => {
                warn!(
                    attempt,
                    attempts,
                    delay_secs = delay.as_secs(),
                    "{msg}, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(ScanError::Maintenance(msg)) => {
                // Treat the slot as empty rather than failing the scan.
                warn!("{msg}, giving up for this slot");
                return Ok(Vec::new());
            }
            other => return other,
        }
    }
    Ok(Vec::new())
}

fn extract_csrf(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let meta = Selector::parse(r#"meta[name="csrf-token"]"#).unwrap();
    if let Some(el) = doc.select(&meta).next() {
        if let Some(token) = el.value().attr("content") {
            return Some(token.to_string());
        }
    }
    let input = Selector::parse(r#"input[name="_token"]"#).unwrap();
    doc.select(&input)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(|v| v.to_string())
}

/// Scan the page text for the screener's maintenance/overload banners and
/// return the matching element text when found.
fn detect_maintenance(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let page_text = doc.root_element().text().collect::<String>().to_lowercase();
    let keyword = MAINTENANCE_KEYWORDS
        .iter()
        .find(|k| page_text.contains(**k))?;

    let blocks = Selector::parse("div, p, span, h1, h2, h3").unwrap();
    for el in doc.select(&blocks) {
        let text = el.text().collect::<String>().trim().to_string();
        if text.to_lowercase().contains(keyword) && text.len() < 200 {
            return Some(format!("chartink: {text}"));
        }
    }
    Some("chartink scanner is under maintenance".to_string())
}

/// Rows come from result-table entries whose stock link carries a `symbol=`
/// query parameter; price and % change are taken from sibling cells when
/// they parse. Output is deduplicated and sorted by symbol.
fn parse_rows(html: &str) -> Vec<StockRow> {
    let doc = Html::parse_document(html);
    let tr_sel = Selector::parse("table tbody tr").unwrap();
    let td_sel = Selector::parse("td").unwrap();
    let a_sel = Selector::parse("a[href]").unwrap();

    let mut rows: BTreeMap<String, StockRow> = BTreeMap::new();

    for tr in doc.select(&tr_sel) {
        let Some(symbol) = tr
            .select(&a_sel)
            .filter_map(|a| symbol_from_href(a.value().attr("href")?))
            .next()
        else {
            continue;
        };

        let mut price = None;
        let mut pct_change = None;
        for td in tr.select(&td_sel) {
            let text = td.text().collect::<String>().trim().to_string();
            if let Some(stripped) = text.strip_suffix('%') {
                pct_change = pct_change.or_else(|| parse_decimal(stripped));
            } else if text.contains('.') {
                // The serial column is a bare integer, skip it.
                price = price.or_else(|| parse_decimal(&text));
            }
        }

        rows.entry(symbol.clone()).or_insert(StockRow {
            symbol,
            price,
            pct_change,
        });
    }

    // Some scan layouts put result links outside a table body.
    for a in doc.select(&a_sel) {
        if let Some(symbol) = a.value().attr("href").and_then(symbol_from_href) {
            rows.entry(symbol.clone())
                .or_insert_with(|| StockRow::bare(symbol));
        }
    }

    rows.into_values().collect()
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    s.trim()
        .trim_start_matches('+')
        .replace(',', "")
        .parse::<Decimal>()
        .ok()
}

/// Pull the uppercase symbol out of hrefs like `...?symbol=PNB&...`.
fn symbol_from_href(href: &str) -> Option<String> {
    let start = href.find("symbol=")? + "symbol=".len();
    let symbol: String = href[start..]
        .chars()
        .take_while(|c| c.is_ascii_uppercase())
        .collect();
    if symbol.is_empty() { None } else { Some(symbol) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const MAINTENANCE_PAGE: &str =
        "<html><body><div>Scanner under maintenance, please retry later.</div></body></html>";

    const SCAN_PAGE: &str = r#"
        <html><body>
        <table class="table table-striped">
          <tbody>
            <tr>
              <td>1</td>
              <td><a href="/stocks/PNB.html?symbol=PNB&ref=scan">Punjab National Bank</a></td>
              <td>102.50</td>
              <td>+3.2%</td>
            </tr>
            <tr>
              <td>2</td>
              <td><a href="/stocks/SBIN.html?symbol=SBIN">State Bank of India</a></td>
              <td>612.00</td>
              <td>-0.8%</td>
            </tr>
            <tr>
              <td>3</td>
              <td><a href="/stocks/PNB.html?symbol=PNB">Punjab National Bank (dup)</a></td>
              <td>102.50</td>
              <td>+3.2%</td>
            </tr>
          </tbody>
        </table>
        <a href="/about">about</a>
        </body></html>
    "#;

    #[test]
    fn test_symbol_from_href() {
        assert_eq!(symbol_from_href("/x?symbol=PNB&y=1"), Some("PNB".to_string()));
        assert_eq!(symbol_from_href("?symbol=TCS"), Some("TCS".to_string()));
        assert_eq!(symbol_from_href("/about"), None);
        assert_eq!(symbol_from_href("?symbol="), None);
    }

    #[test]
    fn test_parse_rows_dedupes_and_sorts() {
        let rows = parse_rows(SCAN_PAGE);
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["PNB", "SBIN"]);
    }

    #[test]
    fn test_parse_rows_extracts_price_and_pct() {
        let rows = parse_rows(SCAN_PAGE);
        let pnb = &rows[0];
        assert_eq!(pnb.price, Some("102.50".parse().unwrap()));
        assert_eq!(pnb.pct_change, Some("3.2".parse().unwrap()));
        let sbin = &rows[1];
        assert_eq!(sbin.pct_change, Some("-0.8".parse().unwrap()));
    }

    #[test]
    fn test_parse_rows_empty_page() {
        assert!(parse_rows("<html><body>No results</body></html>").is_empty());
    }

    #[test]
    fn test_detect_maintenance() {
        let msg = detect_maintenance(MAINTENANCE_PAGE).unwrap();
        assert!(msg.to_lowercase().contains("maintenance"));
        assert!(detect_maintenance(SCAN_PAGE).is_none());
    }

    #[test]
    fn test_scan_attempt_classifies_maintenance() {
        assert!(matches!(
            scan_attempt(MAINTENANCE_PAGE),
            Err(ScanError::Maintenance(_))
        ));
        assert_eq!(scan_attempt(SCAN_PAGE).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_maintenance_exhausts_retries_then_degrades_to_empty() {
        let calls = AtomicU32::new(0);
        let rows = run_with_retries(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ScanError>(MAINTENANCE_PAGE.to_string()) }
        })
        .await
        .unwrap();

        assert!(rows.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_maintenance_clears_on_retry() {
        let calls = AtomicU32::new(0);
        let rows = run_with_retries(3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, ScanError>(if n == 0 {
                    MAINTENANCE_PAGE.to_string()
                } else {
                    SCAN_PAGE.to_string()
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_without_retry() {
        let calls = AtomicU32::new(0);
        let err = run_with_retries(3, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<String, _>(ScanError::Auth("session expired".to_string())) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ScanError::Auth(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extract_csrf_meta_and_input() {
        let meta = r#"<html><head><meta name="csrf-token" content="tok-1"></head></html>"#;
        assert_eq!(extract_csrf(meta), Some("tok-1".to_string()));

        let input = r#"<form><input type="hidden" name="_token" value="tok-2"></form>"#;
        assert_eq!(extract_csrf(input), Some("tok-2".to_string()));

        assert_eq!(extract_csrf("<html></html>"), None);
    }
}
