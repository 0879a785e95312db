// # Telegram Notifier
//
// Sends loop notifications to a chat through the Telegram Bot API
// `sendMessage` method. An optional proxy covers networks where
// api.telegram.org is not reachable directly.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use uddns_core::config::NotifierConfig;
use uddns_core::traits::{Notification, Notifier, NotifierFactory};
use uddns_core::{ComponentRegistry, Error, Result};

/// Telegram Bot API base URL
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Notifier posting to a Telegram chat
pub struct TelegramNotifier {
    /// Bot token
    /// ⚠️ NEVER log this value, it is part of the request URL
    token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("token", &"<REDACTED>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramNotifier {
    /// Create a new Telegram notifier
    ///
    /// # Parameters
    ///
    /// - `token`: Bot token from @BotFather
    /// - `chat_id`: Target chat (numeric id or `@channel`)
    /// - `proxy`: Optional proxy URL (`http://`, `https://` or `socks5://`)
    pub fn new(
        token: impl Into<String>,
        chat_id: impl Into<String>,
        proxy: Option<&str>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| Error::config(format!("telegram: invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            token: token.into(),
            chat_id: chat_id.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            client,
        })
    }

    /// Point the notifier at a different API base
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": notification.to_text(),
        });

        // reqwest errors carry the URL, and with it the token
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::notify(format!("[telegram] request failed: {}", e.without_url())))?;

        let status = response.status();
        let reply: Option<ApiReply> = response.json().await.ok();
        match reply {
            Some(ApiReply { ok: true, .. }) if status.is_success() => {
                tracing::debug!("[telegram] Message delivered to {}", self.chat_id);
                Ok(())
            }
            Some(ApiReply { description, .. }) => Err(Error::notify(format!(
                "[telegram] sendMessage failed ({}): {}",
                status,
                description.unwrap_or_else(|| "no description".to_string())
            ))),
            None => Err(Error::notify(format!(
                "[telegram] sendMessage failed ({}): unreadable reply",
                status
            ))),
        }
    }

    fn notifier_name(&self) -> &'static str {
        "telegram"
    }
}

/// Factory for creating Telegram notifiers
pub struct TelegramFactory;

impl NotifierFactory for TelegramFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        match config {
            NotifierConfig::Telegram {
                token,
                chat_id,
                proxy,
            } => {
                if token.is_empty() || chat_id.is_empty() {
                    return Err(Error::config("telegram: token and chat_id are required"));
                }
                Ok(Box::new(TelegramNotifier::new(
                    token.clone(),
                    chat_id.clone(),
                    proxy.as_deref(),
                )?))
            }
            _ => Err(Error::config("Invalid config for telegram notifier")),
        }
    }
}

/// Register the Telegram notifier with a registry
pub fn register(registry: &mut ComponentRegistry) {
    registry.register_notifier("telegram", Box::new(TelegramFactory));
}
