use crate::api::snippet;
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tokio::fs;

pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

pub struct VoiceRequest<'a> {
    pub api_key: &'a str,
    pub voice_id: &'a str,
    pub model_id: &'a str,
    pub stability: f32,
    pub text: &'a str,
}

pub async fn elevenlabs_tts_to_mp3(
    client: &Client,
    req: &VoiceRequest<'_>,
    out_mp3_path: &Path,
) -> Result<()> {
    let url = format!(
        "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=mp3_44100_128",
        req.voice_id
    );

    let body = serde_json::json!({
        "text": req.text,
        "model_id": req.model_id,
        "voice_settings": {
            "stability": req.stability,
            "similarity_boost": 0.75,
        },
    });

    let resp = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("xi-api-key", req.api_key)
        .json(&body)
        .timeout(std::time::Duration::from_secs(300))
        .send()
        .await
        .context("ElevenLabs request failed")?;

    let status = resp.status();
    if !status.is_success() {
        let raw = resp.text().await.unwrap_or_default();
        anyhow::bail!(
            "ElevenLabs TTS failed HTTP {}: {}",
            status.as_u16(),
            snippet(&raw, 400)
        );
    }

    let bytes = resp.bytes().await.context("ElevenLabs response read failed")?;
    if bytes.is_empty() {
        anyhow::bail!("ElevenLabs returned an empty audio body");
    }
    if let Some(parent) = out_mp3_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    fs::write(out_mp3_path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", out_mp3_path.display()))?;

    Ok(())
}
