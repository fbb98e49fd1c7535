use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub http: HttpCfg,
    pub chartink: ChartinkCfg,
    pub scans: Vec<ScanCfg>,
    pub notify: NotifyCfg,
    #[serde(default)]
    pub schedule: ScheduleCfg,
    #[serde(default)]
    pub simulation: SimulationCfg,
    #[serde(default)]
    pub storage: StorageCfg,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpCfg {
    #[serde(rename = "userAgent", default = "default_ua")]
    pub user_agent: String,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(
        rename = "poolIdleTimeout",
        with = "humantime_serde",
        default = "default_pool_idle"
    )]
    pub pool_idle_timeout: Duration,
    #[serde(
        rename = "tcpKeepAlive",
        with = "humantime_serde",
        default = "default_keep_alive"
    )]
    pub tcp_keep_alive: Duration,
    #[serde(rename = "poolMaxIdlePerHost", default = "default_pool")]
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            user_agent: default_ua(),
            timeout: default_timeout(),
            pool_idle_timeout: default_pool_idle(),
            tcp_keep_alive: default_keep_alive(),
            pool_max_idle_per_host: default_pool(),
        }
    }
}
fn default_ua() -> String {
    "chartwatch/0.1".into()
}
fn default_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_pool_idle() -> Duration {
    Duration::from_secs(90)
}
fn default_keep_alive() -> Duration {
    Duration::from_secs(60)
}
fn default_pool() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartinkCfg {
    #[serde(rename = "baseUrl", default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "maintenanceRetries", default = "default_retries")]
    pub maintenance_retries: u32,
    #[serde(
        rename = "retryDelay",
        with = "humantime_serde",
        default = "default_retry_delay"
    )]
    pub retry_delay: Duration,
}

impl Default for ChartinkCfg {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            email: "".to_string(),
            password: "".to_string(),
            maintenance_retries: default_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}
fn default_base_url() -> String {
    "https://chartink.com".to_string()
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanCfg {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NotifyCfg {
    #[serde(rename = "alwaysNotify", default)]
    pub always_notify: bool,
    #[serde(default)]
    pub discord: Option<DiscordCfg>,
    #[serde(default)]
    pub telegram: Option<TelegramCfg>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordCfg {
    #[serde(rename = "webhookUrl")]
    pub webhook_url: String,
    #[serde(rename = "mentionRoleId", default)]
    pub mention_role_id: String,
    #[serde(rename = "mentionUserId", default)]
    pub mention_user_id: String,
    #[serde(rename = "pingHere", default)]
    pub ping_here: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramCfg {
    #[serde(rename = "botToken")]
    pub bot_token: String,
    #[serde(rename = "chatId")]
    pub chat_id: String,
}

/// Market trading window. Times are "HH:MM" strings in the market timezone,
/// parsed into a `MarketHours` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleCfg {
    #[serde(default = "default_tz")]
    pub timezone: String,
    #[serde(default = "default_open")]
    pub open: String,
    #[serde(default = "default_close")]
    pub close: String,
    #[serde(with = "humantime_serde", default = "default_interval")]
    pub interval: Duration,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            timezone: default_tz(),
            open: default_open(),
            close: default_close(),
            interval: default_interval(),
        }
    }
}
fn default_tz() -> String {
    "Asia/Kolkata".to_string()
}
fn default_open() -> String {
    "09:15".to_string()
}
fn default_close() -> String {
    "15:15".to_string()
}
fn default_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationCfg {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sim_runs")]
    pub runs: u32,
    #[serde(
        with = "humantime_serde",
        default = "default_sim_interval"
    )]
    pub interval: Duration,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            runs: default_sim_runs(),
            interval: default_sim_interval(),
        }
    }
}
fn default_sim_runs() -> u32 {
    3
}
fn default_sim_interval() -> Duration {
    Duration::from_secs(60)
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageCfg {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from(".")
}

impl AppCfg {
    pub fn load(path: &str) -> Result<Self> {
        let cfg = Config::builder()
            .add_source(File::with_name(path))
            .add_source(config::Environment::default().separator("__"))
            .build()
            .context("building config")?;

        let app: AppCfg = cfg.try_deserialize().context("deserializing config")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.scans.iter().any(|s| s.enabled && !s.url.is_empty()),
            "scans: at least one enabled scan with a url is required"
        );
        anyhow::ensure!(
            self.notify.discord.is_some() || self.notify.telegram.is_some(),
            "notify: at least one channel (discord or telegram) must be configured"
        );
        if let Some(d) = &self.notify.discord {
            anyhow::ensure!(!d.webhook_url.is_empty(), "notify.discord.webhookUrl missing");
        }
        if let Some(t) = &self.notify.telegram {
            anyhow::ensure!(!t.bot_token.is_empty(), "notify.telegram.botToken missing");
            anyhow::ensure!(!t.chat_id.is_empty(), "notify.telegram.chatId missing");
        }
        if !self.simulation.enabled {
            anyhow::ensure!(!self.chartink.email.is_empty(), "chartink.email missing");
            anyhow::ensure!(!self.chartink.password.is_empty(), "chartink.password missing");
        }
        Ok(())
    }
}
