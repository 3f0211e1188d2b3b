use anyhow::Result;
use async_trait::async_trait;

pub mod anthropic;
pub mod elevenlabs;
pub mod fal;

/// A hosted text-generation model answering one system + user prompt pair.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String>;

    /// Ledger service name billed for each completion.
    fn service(&self) -> &str {
        "claude"
    }
}

pub(crate) fn snippet(raw: &str, max_chars: usize) -> String {
    raw.chars().take(max_chars).collect()
}
