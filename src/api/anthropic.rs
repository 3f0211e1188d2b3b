use crate::api::{TextGenerator, snippet};
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::Client;
use serde_json::json;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(client: Client, api_key: &str, model: Option<&str>) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
        }
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String> {
        let body = json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": system,
            "messages": [
                {"role": "user", "content": user},
            ],
        });

        let resp = self
            .client
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .timeout(std::time::Duration::from_secs(300))
            .send()
            .await
            .context("Claude API request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = extract_error_message(&raw).unwrap_or_else(|| snippet(&raw, 800));
            anyhow::bail!("Claude API error (HTTP {}): {}", status.as_u16(), message);
        }

        match extract_output_text(&raw) {
            Some(text) => Ok(text),
            None => {
                logw("Claude response parse failed.");
                if !raw.is_empty() {
                    logw(format!("Claude raw body: {}", snippet(&raw, 800)));
                }
                anyhow::bail!("Claude API returned no text content")
            }
        }
    }
}

fn extract_error_message(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;
    let err = root.get("error")?;
    let message = err.get("message").and_then(|v| v.as_str())?;
    match err.get("type").and_then(|v| v.as_str()) {
        Some(typ) => Some(format!("{} ({})", message, typ)),
        None => Some(message.to_string()),
    }
}

fn extract_output_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;
    let content = root.get("content")?.as_array()?;
    let mut out = String::new();
    for block in content {
        if block.get("type").and_then(|v| v.as_str()) == Some("text") {
            if let Some(text) = block.get("text").and_then(|v| v.as_str()) {
                out.push_str(text);
            }
        }
    }
    if out.is_empty() { None } else { Some(out) }
}

/// Pulls the outermost `{...}` block out of a model reply and parses it.
pub fn extract_json_object(reply: &str) -> Result<serde_json::Value> {
    let re = json_block_regex()?;
    let candidate = re.find(reply).map(|m| m.as_str()).unwrap_or(reply);
    serde_json::from_str(candidate).with_context(|| {
        format!(
            "Model reply is not valid JSON: {}",
            snippet(reply.trim(), 200)
        )
    })
}

fn json_block_regex() -> Result<&'static Regex> {
    static JSON_RE: OnceCell<Regex> = OnceCell::new();
    JSON_RE.get_or_try_init(|| Regex::new(r"(?s)\{.*\}").context("failed to compile JSON block regex"))
}
