use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::clip;
use crate::pipeline::types::Publisher;

/// Discord caps message content at 2000 characters.
const MAX_CONTENT_CHARS: usize = 2000;

/// Posts through a Discord webhook. `?wait=true` makes Discord return the
/// created message, whose id becomes the publication id.
#[derive(Clone)]
pub struct DiscordPublisher {
    channel_id: String,
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordPublisher {
    pub fn new(channel_id: impl Into<String>, webhook: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            webhook: webhook.into(),
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Total attempts for a send answered with 5xx. Transport errors,
    /// timeouts and 4xx are never retried.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct CreatedMessage {
    id: String,
}

#[async_trait]
impl Publisher for DiscordPublisher {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn publish(&self, text: &str) -> Result<String> {
        let content = clip(text, MAX_CONTENT_CHARS);
        let payload = WebhookPayload { content: &content };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .query(&[("wait", "true")])
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let rsp = res.map_err(|e| anyhow!("Discord webhook request failed: {e}"))?;

            if rsp.status().is_server_error() && attempt < self.max_retries {
                tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                continue;
            }
            if let Err(e) = rsp.error_for_status_ref() {
                return Err(anyhow!("Discord webhook HTTP error: {e}"));
            }
            let created: CreatedMessage = rsp.json().await.context("decoding discord message")?;
            return Ok(created.id);
        }
    }
}
