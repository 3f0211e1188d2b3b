use crate::api::snippet;
use crate::logi;
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;

const QUEUE_BASE: &str = "https://queue.fal.run";
const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 900;

pub struct FalClient {
    client: Client,
    key: String,
}

#[derive(Debug, Deserialize)]
struct QueueTicket {
    request_id: String,
    status_url: String,
    response_url: String,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
}

impl FalClient {
    pub fn new(client: Client, key: &str) -> Self {
        Self {
            client,
            key: key.to_string(),
        }
    }

    /// Submits a job to the queue and waits for its result payload.
    pub async fn run(
        &self,
        model: &str,
        arguments: &serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}", QUEUE_BASE, model);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Key {}", self.key))
            .json(arguments)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .context("fal.ai submit request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("fal.ai submit HTTP {}: {}", status.as_u16(), snippet(&raw, 600));
        }
        let ticket: QueueTicket = serde_json::from_str(&raw)
            .with_context(|| format!("Unexpected fal.ai submit response: {}", snippet(&raw, 300)))?;
        logi(format!("fal.ai request queued: {}", ticket.request_id));

        let started = Instant::now();
        loop {
            let state = self.status(&ticket.status_url).await?;
            match state.as_str() {
                "COMPLETED" => break,
                "IN_QUEUE" | "IN_PROGRESS" => {}
                other => anyhow::bail!("fal.ai request {} ended with status {}", ticket.request_id, other),
            }
            if started.elapsed() > timeout {
                anyhow::bail!(
                    "fal.ai request {} still {} after {}s",
                    ticket.request_id,
                    state,
                    timeout.as_secs()
                );
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        let resp = self
            .client
            .get(&ticket.response_url)
            .header("Authorization", format!("Key {}", self.key))
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .context("fal.ai result request failed")?;
        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("fal.ai result HTTP {}: {}", status.as_u16(), snippet(&raw, 600));
        }
        serde_json::from_str(&raw).context("fal.ai result is not JSON")
    }

    async fn status(&self, status_url: &str) -> Result<String> {
        let resp = self
            .client
            .get(status_url)
            .header("Authorization", format!("Key {}", self.key))
            .timeout(Duration::from_secs(60))
            .send()
            .await
            .context("fal.ai status request failed")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("fal.ai status HTTP {}", status.as_u16());
        }
        let state: QueueStatus = resp.json().await.context("fal.ai status is not JSON")?;
        Ok(state.status)
    }

    pub async fn download(&self, url: &str, out_path: &Path) -> Result<()> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(600))
            .send()
            .await
            .context("Failed to download video")?;
        if !resp.status().is_success() {
            anyhow::bail!("Failed to download video: HTTP {}", resp.status().as_u16());
        }
        let bytes = resp.bytes().await.context("Video download read failed")?;
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(out_path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        Ok(())
    }
}

/// Inlines a local file as a `data:` URI accepted by fal.ai file inputs.
pub async fn file_data_uri(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(format!("data:{};base64,{}", mime_for(path), STANDARD.encode(bytes)))
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// Video location in a lip-sync result; the model family decides the shape.
pub fn extract_video_url(result: &serde_json::Value) -> Option<String> {
    result
        .get("video")
        .and_then(|v| v.get("url"))
        .or_else(|| result.get("video_url"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
