//! Chat-completions backed composer.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compose::published_today;
use crate::models::{ComposedItem, RawItem};
use crate::pipeline::types::Enricher;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const DEFAULT_PROMPT: &str = "You are a financial news editor. You receive a JSON array of news \
items with fields id, title and description. For every item worth a market-focused post, write a short \
neutral summary (at most 3 sentences, no emojis) and return a JSON array of objects with fields: \
id (copied unchanged), text, tickers (stock tickers mentioned or directly affected), markets \
(e.g. US stocks, EU bonds, commodities, housing) and hashtags (e.g. #inflation, #fed). \
Use empty arrays when nothing applies. Omit items that are not relevant to markets. \
Output only the JSON array.";

pub struct OpenAiComposer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
    prompt: String,
}

impl OpenAiComposer {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("fin-thread/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building openai http client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Compose as if the current time were `now`.
    pub async fn compose_at(
        &self,
        items: &[RawItem],
        now: DateTime<Utc>,
    ) -> Result<Vec<ComposedItem>> {
        let today = published_today(items, now);
        if today.is_empty() {
            return Ok(Vec::new());
        }
        if self.api_key.is_empty() {
            bail!("openai api key is not set");
        }

        #[derive(Serialize)]
        struct Content<'a> {
            id: &'a str,
            title: &'a str,
            description: &'a str,
        }
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let payload: Vec<Content<'_>> = today
            .iter()
            .map(|n| Content {
                id: &n.id,
                title: &n.title,
                description: &n.description,
            })
            .collect();
        let user = serde_json::to_string(&payload).context("encoding compose payload")?;

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &self.prompt,
                },
                Msg {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: 1.0,
            max_tokens: 2048,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("openai request")?
            .error_for_status()
            .context("openai non-2xx")?;

        let body: Resp = resp.json().await.context("decoding openai response")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| anyhow!("openai response has no choices"))?;

        parse_composed(content)
    }
}

/// Parse the model reply: a JSON array, optionally wrapped in a code fence.
pub fn parse_composed(content: &str) -> Result<Vec<ComposedItem>> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body).with_context(|| format!("parsing composed news from: {body}"))
}

#[async_trait]
impl Enricher for OpenAiComposer {
    async fn compose(&self, items: &[RawItem]) -> Result<Vec<ComposedItem>> {
        self.compose_at(items, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_fenced_arrays() {
        let plain = r##"[{"id":"a","text":"t","tickers":["AAPL"],"markets":[],"hashtags":["#tech"]}]"##;
        let out = parse_composed(plain).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tickers, vec!["AAPL"]);
        assert_eq!(out[0].hashtags, vec!["#tech"]);

        let fenced = format!("```json\n{plain}\n```");
        assert_eq!(parse_composed(&fenced).unwrap(), out);
    }

    #[test]
    fn missing_arrays_default_to_empty() {
        let out = parse_composed(r#"[{"id":"a","text":"t"}]"#).unwrap();
        assert!(out[0].meta().is_empty());
    }

    #[test]
    fn malformed_reply_is_an_error() {
        assert!(parse_composed("Sorry, I can't help with that.").is_err());
    }

    #[tokio::test]
    async fn nothing_from_today_means_no_call() {
        // Endpoint is unroutable: reaching it would fail the test.
        let c = OpenAiComposer::new("key")
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/never");
        let old = RawItem::new(
            "P",
            "t",
            "d",
            "u",
            DateTime::from_timestamp(0, 0).unwrap(),
        );
        assert!(c.compose(&[old]).await.unwrap().is_empty());
    }
}
