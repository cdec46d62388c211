use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::clip;
use crate::pipeline::types::Publisher;

const API_BASE: &str = "https://api.telegram.org";
/// Bot API limit for a text message.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Posts to a Telegram channel through the Bot API `sendMessage` method.
#[derive(Clone)]
pub struct TelegramPublisher {
    channel_id: String,
    token: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramPublisher {
    pub fn new(channel_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            token: token.into(),
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Total attempts for a send answered with 5xx. Transport errors and
    /// timeouts are never retried: the message may already be posted.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Option<SentMessage>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[async_trait]
impl Publisher for TelegramPublisher {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn publish(&self, text: &str) -> Result<String> {
        let text = clip(text, MAX_MESSAGE_CHARS);
        let payload = SendMessage {
            chat_id: &self.channel_id,
            text: &text,
            disable_web_page_preview: true,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(self.url())
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let rsp = res.map_err(|e| anyhow!("telegram request failed: {e}"))?;

            // 5xx only; a 4xx will not change on resend.
            if rsp.status().is_server_error() && attempt < self.max_retries {
                tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                continue;
            }

            let status = rsp.status();
            let body: ApiResponse = rsp
                .json()
                .await
                .with_context(|| format!("decoding telegram response (status {status})"))?;
            if !body.ok {
                return Err(anyhow!(
                    "telegram rejected message (status {status}): {}",
                    body.description.unwrap_or_default()
                ));
            }
            let sent = body
                .result
                .ok_or_else(|| anyhow!("telegram response has no result"))?;
            return Ok(sent.message_id.to_string());
        }
    }
}
