pub mod discord;
pub mod telegram;

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::pipeline::types::Publisher;

pub use discord::DiscordPublisher;
pub use telegram::TelegramPublisher;

/// Cut `text` to at most `max_chars` characters, marking the cut with an ellipsis.
pub(crate) fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Dry-run publisher: logs the message and hands out sequential ids.
pub struct StdoutPublisher {
    channel_id: String,
    next: AtomicU64,
}

impl StdoutPublisher {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            next: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Publisher for StdoutPublisher {
    fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn publish(&self, text: &str) -> Result<String> {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        tracing::info!(channel = %self.channel_id, id, "dry-run publish:\n{text}");
        Ok(format!("dry-run-{id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_keeps_short_text() {
        assert_eq!(clip("abc", 3), "abc");
    }

    #[test]
    fn clip_marks_cut() {
        let out = clip("abcdef", 4);
        assert_eq!(out, "abc…");
        assert_eq!(out.chars().count(), 4);
    }

    #[tokio::test]
    async fn stdout_ids_are_sequential() {
        let p = StdoutPublisher::new("dry");
        assert_eq!(p.publish("a").await.unwrap(), "dry-run-1");
        assert_eq!(p.publish("b").await.unwrap(), "dry-run-2");
        assert_eq!(p.channel_id(), "dry");
    }
}
