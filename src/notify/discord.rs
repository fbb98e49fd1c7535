use crate::config::config::DiscordCfg;
use crate::core::error::NotifyError;
use crate::notify::Notifier;
use reqwest::Client;
use serde_json::{Value, json};

pub struct DiscordNotifier {
    client: Client,
    cfg: DiscordCfg,
}

impl DiscordNotifier {
    pub fn new(client: Client, cfg: DiscordCfg) -> Self {
        Self { client, cfg }
    }

    /// Webhook payload with explicit `allowed_mentions`: only the configured
    /// role/user/@here may ping, everything else stays silent.
    fn payload(&self, message: &str) -> Value {
        let mut prefixes: Vec<String> = Vec::new();
        let mut parse: Vec<&str> = Vec::new();
        let mut mentions = json!({});

        if self.cfg.ping_here {
            prefixes.push("@here".to_string());
            // 'everyone' enables both @everyone and @here parsing
            parse.push("everyone");
        }
        if !self.cfg.mention_role_id.is_empty() {
            prefixes.push(format!("<@&{}>", self.cfg.mention_role_id));
            mentions["roles"] = json!([self.cfg.mention_role_id]);
        }
        if !self.cfg.mention_user_id.is_empty() {
            prefixes.push(format!("<@{}>", self.cfg.mention_user_id));
            mentions["users"] = json!([self.cfg.mention_user_id]);
        }
        mentions["parse"] = json!(parse);

        let content = if prefixes.is_empty() {
            message.to_string()
        } else {
            format!("{} {}", prefixes.join(" "), message)
        };

        json!({
            "content": content,
            "allowed_mentions": mentions,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        self.client
            .post(&self.cfg.webhook_url)
            .json(&self.payload(message))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> DiscordCfg {
        DiscordCfg {
            webhook_url: "https://discord.test/hook".to_string(),
            mention_role_id: "".to_string(),
            mention_user_id: "".to_string(),
            ping_here: false,
        }
    }

    #[test]
    fn test_plain_payload_has_no_mentions() {
        let n = DiscordNotifier::new(Client::new(), cfg());
        let p = n.payload("hello");
        assert_eq!(p["content"], "hello");
        assert_eq!(p["allowed_mentions"]["parse"], json!([]));
    }

    #[test]
    fn test_mention_prefixes_and_allow_list() {
        let mut c = cfg();
        c.ping_here = true;
        c.mention_role_id = "42".to_string();
        c.mention_user_id = "7".to_string();
        let n = DiscordNotifier::new(Client::new(), c);
        let p = n.payload("alert");

        let content = p["content"].as_str().unwrap();
        assert!(content.starts_with("@here <@&42> <@7> "));
        assert!(content.ends_with("alert"));
        assert_eq!(p["allowed_mentions"]["parse"], json!(["everyone"]));
        assert_eq!(p["allowed_mentions"]["roles"], json!(["42"]));
        assert_eq!(p["allowed_mentions"]["users"], json!(["7"]));
    }
}
