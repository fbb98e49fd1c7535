use crate::config::config::TelegramCfg;
use crate::core::error::NotifyError;
use crate::notify::Notifier;
use reqwest::Client;
use serde_json::json;

pub struct TelegramNotifier {
    client: Client,
    cfg: TelegramCfg,
}

impl TelegramNotifier {
    pub fn new(client: Client, cfg: TelegramCfg) -> Self {
        Self { client, cfg }
    }

    fn api_url(&self) -> String {
        format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.cfg.bot_token
        )
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let body = json!({
            "chat_id": self.cfg.chat_id,
            "text": message,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });
        self.client
            .post(self.api_url())
            .json(&body)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| NotifyError {
                channel: self.name(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
