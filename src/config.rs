use crate::error::StudioError;
use crate::init::Layout;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub actors: BTreeMap<String, Actor>,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub engines: EnginesConfig,
    #[serde(default)]
    pub formats: BTreeMap<String, FormatConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    #[serde(default)]
    pub age_range: String,
    #[serde(default)]
    pub category: String,
    #[serde(default = "default_gender")]
    pub gender: String,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default)]
    pub persona: String,
    #[serde(default)]
    pub portrait: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_sample: Option<PathBuf>,
    #[serde(default = "default_voice_style")]
    pub voice_style: String,
    /// ElevenLabs voice used for this actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_monthly_limit")]
    pub monthly_limit: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            monthly_limit: default_monthly_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnginesConfig {
    #[serde(default)]
    pub text: BTreeMap<String, TextEngineConfig>,
    #[serde(default)]
    pub tts: BTreeMap<String, TtsEngineConfig>,
    #[serde(default)]
    pub video: BTreeMap<String, VideoEngineConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextEngineConfig {
    pub cost_per_request: Option<f64>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsEngineConfig {
    pub cost_per_char: Option<f64>,
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoEngineConfig {
    pub cost_per_second: Option<f64>,
    pub max_duration_seconds: Option<f64>,
    pub model: Option<String>,
    pub poll_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    pub resolution: String,
}

fn default_gender() -> String {
    "female".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["fr".to_string()]
}

fn default_language() -> String {
    "fr".to_string()
}

fn default_voice_style() -> String {
    "neutral".to_string()
}

fn default_monthly_limit() -> f64 {
    100.0
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(StudioError::MissingFile(format!(
                "configuration file {}",
                path.display()
            ))
            .into());
        }
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn actor(&self, actor_id: &str) -> Result<&Actor, StudioError> {
        self.actors
            .get(actor_id)
            .ok_or_else(|| StudioError::UnknownActor(actor_id.to_string()))
    }

    pub fn actor_ids(&self) -> Vec<&str> {
        self.actors.keys().map(String::as_str).collect()
    }

    /// Auto-selection used when no actor is named.
    pub fn default_actor_id(&self) -> Option<&str> {
        self.actors.keys().next().map(String::as_str)
    }

    pub fn resolution(&self, format: &str) -> Option<(u32, u32)> {
        let cfg = self.formats.get(format)?;
        parse_resolution(&cfg.resolution)
    }

    pub fn text_engine(&self, name: &str) -> TextEngineConfig {
        self.engines.text.get(name).cloned().unwrap_or_default()
    }

    pub fn tts_engine(&self, name: &str) -> TtsEngineConfig {
        self.engines.tts.get(name).cloned().unwrap_or_default()
    }

    pub fn video_engine(&self, name: &str) -> VideoEngineConfig {
        self.engines.video.get(name).cloned().unwrap_or_default()
    }
}

pub fn parse_resolution(text: &str) -> Option<(u32, u32)> {
    let (w, h) = text.trim().split_once('x')?;
    let w = w.parse::<u32>().ok()?;
    let h = h.parse::<u32>().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some((w, h))
}

/// Writes `budget.monthly_limit` into `config.json`, leaving every other key untouched.
pub async fn set_monthly_limit(path: &Path, amount: f64) -> Result<()> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let mut root: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;

    let obj = root
        .as_object_mut()
        .context("config.json: top level must be an object")?;
    let budget = obj
        .entry("budget")
        .or_insert_with(|| serde_json::json!({}));
    let budget = budget
        .as_object_mut()
        .context("config.json: budget must be an object")?;
    budget.insert("monthly_limit".to_string(), serde_json::json!(amount));

    let text = serde_json::to_string_pretty(&root)?;
    fs::write(path, text)
        .await
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(())
}

/// Service credentials, read from the process environment after `.env` is merged in.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub anthropic_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub fal_key: Option<String>,
}

impl Credentials {
    pub fn load(layout: &Layout) -> Self {
        let env_file = layout.env_file();
        if env_file.exists() {
            if let Err(err) = dotenv::from_path(&env_file) {
                tracing::warn!("Failed to load {}: {}", env_file.display(), err);
            }
        }
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            elevenlabs_api_key: non_empty_var("ELEVENLABS_API_KEY"),
            fal_key: non_empty_var("FAL_KEY"),
        }
    }

    pub fn anthropic(&self) -> Result<&str, StudioError> {
        self.anthropic_api_key
            .as_deref()
            .ok_or(StudioError::MissingCredential("ANTHROPIC_API_KEY"))
    }

    pub fn elevenlabs(&self) -> Result<&str, StudioError> {
        self.elevenlabs_api_key
            .as_deref()
            .ok_or(StudioError::MissingCredential("ELEVENLABS_API_KEY"))
    }

    pub fn fal(&self) -> Result<&str, StudioError> {
        self.fal_key
            .as_deref()
            .ok_or(StudioError::MissingCredential("FAL_KEY"))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
