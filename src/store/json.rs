use crate::core::error::StoreError;
use crate::store::SeenStore;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One JSON file per scan id, stamped with the trading day it belongs to.
/// A file from an earlier day loads as empty, so a process started the next
/// morning begins the day fresh without an explicit reset record.
#[derive(Debug, Serialize, Deserialize)]
struct SeenFile {
    day: NaiveDate,
    symbols: Vec<String>,
}

pub struct JsonSeenStore {
    dir: PathBuf,
    tz: Tz,
}

impl JsonSeenStore {
    pub fn new(dir: impl Into<PathBuf>, tz: Tz) -> Self {
        Self {
            dir: dir.into(),
            tz,
        }
    }

    fn path(&self, scan_id: &str) -> PathBuf {
        self.dir.join(format!("seen_stocks_{scan_id}.json"))
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }
}

impl SeenStore for JsonSeenStore {
    fn load(&self, scan_id: &str) -> Result<HashSet<String>, StoreError> {
        let path = self.path(scan_id);
        if !path.exists() {
            return Ok(HashSet::new());
        }
        let raw = fs::read_to_string(&path)?;
        let file: SeenFile =
            serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if file.day != self.today() {
            return Ok(HashSet::new());
        }
        Ok(file.symbols.into_iter().collect())
    }

    fn save(&self, scan_id: &str, seen: &HashSet<String>) -> Result<(), StoreError> {
        let mut symbols: Vec<String> = seen.iter().cloned().collect();
        symbols.sort();
        let body = serde_json::to_string_pretty(&SeenFile {
            day: self.today(),
            symbols,
        })
        .map_err(std::io::Error::other)?;

        fs::create_dir_all(&self.dir)?;
        let path = self.path(scan_id);
        let tmp = tmp_path(&path);
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
