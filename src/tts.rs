use crate::api::elevenlabs::{self, VoiceRequest};
use crate::budget::BudgetTracker;
use crate::config::{Actor, Config, Credentials};
use crate::error::StudioError;
use crate::ffmpeg;
use crate::script::{Script, estimate_speech_seconds, word_count};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

pub const CHATTERBOX_SAMPLE_RATE: u32 = 22_050;
pub const DEFAULT_STABILITY: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsEngine {
    Chatterbox,
    ElevenLabs,
}

impl TtsEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            TtsEngine::Chatterbox => "chatterbox",
            TtsEngine::ElevenLabs => "elevenlabs",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            TtsEngine::Chatterbox => "wav",
            TtsEngine::ElevenLabs => "mp3",
        }
    }
}

impl fmt::Display for TtsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TtsEngine {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatterbox" => Ok(TtsEngine::Chatterbox),
            "elevenlabs" => Ok(TtsEngine::ElevenLabs),
            _ => Err(StudioError::InvalidChoice {
                kind: "TTS engine",
                value: s.to_string(),
                allowed: "chatterbox, elevenlabs",
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub engine: String,
    pub characters: usize,
    pub duration_seconds: f64,
}

/// Turns narration text into an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn engine(&self) -> TtsEngine;

    async fn synthesize(&self, text: &str, actor: &Actor, stability: f32, out_path: &Path) -> Result<()>;
}

/// Local stand-in engine: silent PCM sized to the spoken-length estimate.
pub struct ChatterboxMock;

#[async_trait]
impl SpeechSynthesizer for ChatterboxMock {
    fn engine(&self) -> TtsEngine {
        TtsEngine::Chatterbox
    }

    async fn synthesize(&self, text: &str, _actor: &Actor, _stability: f32, out_path: &Path) -> Result<()> {
        let seconds = estimate_speech_seconds(word_count(text)).max(1.0);
        write_silent_wav(out_path, seconds).await
    }
}

pub struct ElevenLabsVoice {
    http: reqwest::Client,
    api_key: String,
    default_voice_id: String,
    model_id: String,
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsVoice {
    fn engine(&self) -> TtsEngine {
        TtsEngine::ElevenLabs
    }

    async fn synthesize(&self, text: &str, actor: &Actor, stability: f32, out_path: &Path) -> Result<()> {
        let voice_id = actor
            .voice_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or(&self.default_voice_id);
        let req = VoiceRequest {
            api_key: &self.api_key,
            voice_id,
            model_id: &self.model_id,
            stability,
            text,
        };
        elevenlabs::elevenlabs_tts_to_mp3(&self.http, &req, out_path).await
    }
}

pub fn create_synthesizer(
    engine: TtsEngine,
    http: &reqwest::Client,
    config: &Config,
    credentials: &Credentials,
) -> Result<Box<dyn SpeechSynthesizer>> {
    match engine {
        TtsEngine::Chatterbox => Ok(Box::new(ChatterboxMock)),
        TtsEngine::ElevenLabs => {
            let api_key = credentials.elevenlabs()?;
            let settings = config.tts_engine(engine.as_str());
            Ok(Box::new(ElevenLabsVoice {
                http: http.clone(),
                api_key: api_key.to_string(),
                default_voice_id: settings
                    .voice_id
                    .unwrap_or_else(|| elevenlabs::DEFAULT_VOICE_ID.to_string()),
                model_id: settings
                    .model_id
                    .unwrap_or_else(|| elevenlabs::DEFAULT_MODEL_ID.to_string()),
            }))
        }
    }
}

pub fn validate_stability(stability: f32) -> Result<(), StudioError> {
    if !(0.0..=1.0).contains(&stability) {
        return Err(StudioError::OutOfRange(format!(
            "Stability must be between 0.0 and 1.0, got {}",
            stability
        )));
    }
    Ok(())
}

/// Narration text of a script; empty scripts cannot be voiced.
pub fn narration_text(script: &Script) -> Result<&str> {
    let text = script.full_text.trim();
    if text.is_empty() {
        anyhow::bail!("Script {} has no text to synthesize", script.id);
    }
    Ok(text)
}

pub fn character_count(text: &str) -> usize {
    text.chars().count()
}

pub fn default_audio_path(audio_dir: &Path, script: &Script, engine: TtsEngine) -> PathBuf {
    audio_dir.join(format!("audio_{}.{}", script.id, engine.extension()))
}

/// Voices `script` into `out_path` and records the per-character cost.
pub async fn synthesize_script(
    synth: &dyn SpeechSynthesizer,
    budget: &mut BudgetTracker,
    script: &Script,
    actor: &Actor,
    stability: f32,
    out_path: &Path,
) -> Result<AudioArtifact> {
    validate_stability(stability)?;
    let text = narration_text(script)?;
    let engine = synth.engine();
    let characters = character_count(text);
    let estimate = budget.prices().estimate(engine.as_str(), characters as f64)?;
    logi(format!(
        "Synthesizing {} characters with {} (estimated ${:.3})",
        characters, engine, estimate
    ));

    synth
        .synthesize(text, actor, stability, out_path)
        .await
        .with_context(|| format!("{} synthesis failed", engine))?;

    budget
        .append(
            engine.as_str(),
            characters as f64,
            &format!("Audio for script {}", script.id),
        )
        .await?;

    let duration_seconds = audio_duration_seconds(out_path).await?;
    logok(format!(
        "Audio generated: {} ({:.1}s)",
        out_path.display(),
        duration_seconds
    ));
    Ok(AudioArtifact {
        path: out_path.to_path_buf(),
        engine: engine.as_str().to_string(),
        characters,
        duration_seconds,
    })
}

pub fn silent_wav_bytes(seconds: f64, sample_rate: u32) -> Vec<u8> {
    let samples = (seconds * sample_rate as f64).round() as u32;
    let data_len = samples * 2;
    let mut out = Vec::with_capacity(44 + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(44 + data_len as usize, 0);
    out
}

async fn write_silent_wav(path: &Path, seconds: f64) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, silent_wav_bytes(seconds, CHATTERBOX_SAMPLE_RATE))
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Duration from a canonical PCM WAV header, walking chunks until `data`.
pub fn wav_duration_seconds(bytes: &[u8]) -> Option<f64> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }
    let read_u32 = |at: usize| -> Option<u32> {
        bytes
            .get(at..at + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    };

    let mut byte_rate = None;
    let mut pos = 12;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = read_u32(pos + 4)? as usize;
        if id == b"fmt " {
            byte_rate = read_u32(pos + 16);
        } else if id == b"data" {
            let rate = byte_rate.filter(|r| *r > 0)?;
            return Some(size as f64 / rate as f64);
        }
        pos += 8 + size + (size & 1);
    }
    None
}

/// ffprobe first, then the WAV header, then a size-based guess.
pub async fn audio_duration_seconds(path: &Path) -> Result<f64> {
    if !path.exists() {
        return Err(StudioError::missing_file(path).into());
    }
    match ffmpeg::ffprobe_duration_seconds(path).await {
        Ok(seconds) => return Ok(seconds),
        Err(err) => tracing::debug!("ffprobe unavailable for {}: {}", path.display(), err),
    }

    let bytes = fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if let Some(seconds) = wav_duration_seconds(&bytes) {
        return Ok(seconds);
    }
    logw("Could not determine audio duration, estimating from file size");
    Ok((bytes.len() as f64 / 50_000.0).max(10.0))
}
