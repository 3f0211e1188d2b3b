//! Lip-synced talking-head clips rendered from an actor portrait and a
//! narration track.

use crate::api::fal::{self, FalClient};
use crate::budget::{BudgetTracker, PriceTable};
use crate::config::{Config, Credentials};
use crate::error::StudioError;
use crate::init::{self, Layout};
use crate::tts::audio_duration_seconds;
use crate::{logi, logok};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_DURATION_SECS: f64 = 20.0;
pub const DEFAULT_SEEDANCE_MODEL: &str = "fal-ai/seedance-2";
pub const DEFAULT_MOTION: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFormat {
    Vertical,
    Square,
    Horizontal,
}

impl VideoFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoFormat::Vertical => "vertical",
            VideoFormat::Square => "square",
            VideoFormat::Horizontal => "horizontal",
        }
    }

    pub fn default_resolution(self) -> (u32, u32) {
        match self {
            VideoFormat::Vertical => (1080, 1920),
            VideoFormat::Square => (1080, 1080),
            VideoFormat::Horizontal => (1920, 1080),
        }
    }

    /// `formats.<name>.resolution` from config, else the built-in size.
    pub fn resolution(self, config: &Config) -> (u32, u32) {
        config
            .resolution(self.as_str())
            .unwrap_or_else(|| self.default_resolution())
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoFormat {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" => Ok(VideoFormat::Vertical),
            "square" => Ok(VideoFormat::Square),
            "horizontal" => Ok(VideoFormat::Horizontal),
            _ => Err(StudioError::InvalidChoice {
                kind: "format",
                value: s.to_string(),
                allowed: "vertical, square, horizontal",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEngine {
    Seedance,
    Kling,
}

impl VideoEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoEngine::Seedance => "seedance",
            VideoEngine::Kling => "kling",
        }
    }

    pub fn max_duration_seconds(self, config: &Config) -> f64 {
        config
            .video_engine(self.as_str())
            .max_duration_seconds
            .unwrap_or(DEFAULT_MAX_DURATION_SECS)
    }

    pub fn check_duration(self, config: &Config, seconds: f64) -> Result<(), StudioError> {
        let max = self.max_duration_seconds(config);
        if seconds > max {
            return Err(StudioError::DurationCap {
                engine: self.as_str().to_string(),
                seconds,
                max,
            });
        }
        Ok(())
    }
}

impl fmt::Display for VideoEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoEngine {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seedance" => Ok(VideoEngine::Seedance),
            "kling" => Ok(VideoEngine::Kling),
            _ => Err(StudioError::InvalidChoice {
                kind: "video engine",
                value: s.to_string(),
                allowed: "seedance, kling",
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoArtifact {
    pub path: PathBuf,
    pub format: String,
    pub actor: String,
    #[serde(rename = "final")]
    pub is_final: bool,
}

pub struct LipSyncJob<'a> {
    pub portrait: &'a Path,
    pub audio: &'a Path,
    pub width: u32,
    pub height: u32,
    pub motion: f32,
}

#[async_trait]
pub trait LipSyncRenderer: Send + Sync {
    fn engine(&self) -> VideoEngine;

    async fn render(&self, job: &LipSyncJob<'_>, out_path: &Path) -> Result<()>;
}

pub struct SeedanceFal {
    fal: FalClient,
    model: String,
    timeout: Duration,
}

pub fn seedance_arguments(portrait_uri: &str, audio_uri: &str, width: u32, height: u32, motion: f32) -> serde_json::Value {
    serde_json::json!({
        "portrait_image_url": portrait_uri,
        "audio_url": audio_uri,
        "width": width,
        "height": height,
        "motion_level": motion,
        "enable_lipsync": true,
        "quality": "high",
    })
}

#[async_trait]
impl LipSyncRenderer for SeedanceFal {
    fn engine(&self) -> VideoEngine {
        VideoEngine::Seedance
    }

    async fn render(&self, job: &LipSyncJob<'_>, out_path: &Path) -> Result<()> {
        logi("Encoding portrait and audio for fal.ai...");
        let portrait = fal::file_data_uri(job.portrait).await?;
        let audio = fal::file_data_uri(job.audio).await?;
        let args = seedance_arguments(&portrait, &audio, job.width, job.height, job.motion);

        logi(format!("Generating video with {}...", self.model));
        let result = self.fal.run(&self.model, &args, self.timeout).await?;
        let url = fal::extract_video_url(&result).with_context(|| {
            format!(
                "Unexpected response from fal.ai: {}",
                crate::api::snippet(&result.to_string(), 300)
            )
        })?;

        logi("Downloading generated video...");
        self.fal.download(&url, out_path).await
    }
}

pub fn create_renderer(
    engine: VideoEngine,
    http: &reqwest::Client,
    config: &Config,
    credentials: &Credentials,
) -> Result<Box<dyn LipSyncRenderer>> {
    match engine {
        VideoEngine::Kling => Err(StudioError::EngineUnavailable(engine.as_str().to_string()).into()),
        VideoEngine::Seedance => {
            let key = credentials.fal()?;
            let settings = config.video_engine(engine.as_str());
            Ok(Box::new(SeedanceFal {
                fal: FalClient::new(http.clone(), key),
                model: settings
                    .model
                    .unwrap_or_else(|| DEFAULT_SEEDANCE_MODEL.to_string()),
                timeout: Duration::from_secs(
                    settings
                        .poll_timeout_seconds
                        .unwrap_or(fal::DEFAULT_POLL_TIMEOUT_SECS),
                ),
            }))
        }
    }
}

pub fn validate_motion(motion: f32) -> Result<(), StudioError> {
    if !(0.0..=1.0).contains(&motion) {
        return Err(StudioError::OutOfRange(format!(
            "Motion must be between 0.0 and 1.0, got {}",
            motion
        )));
    }
    Ok(())
}

/// Everything checked and priced before a render is paid for.
#[derive(Debug, Clone)]
pub struct VideoPlan {
    pub actor_id: String,
    pub portrait: PathBuf,
    pub audio: PathBuf,
    pub audio_seconds: f64,
    pub engine: VideoEngine,
    pub format: VideoFormat,
    pub width: u32,
    pub height: u32,
    pub motion: f32,
    pub estimated_cost: f64,
}

#[allow(clippy::too_many_arguments)]
pub async fn plan_video(
    layout: &Layout,
    config: &Config,
    prices: &PriceTable,
    audio: &Path,
    actor_id: &str,
    format: VideoFormat,
    engine: VideoEngine,
    motion: f32,
) -> Result<VideoPlan> {
    validate_motion(motion)?;
    if !audio.exists() {
        return Err(StudioError::missing_file(audio).into());
    }
    let actor = config.actor(actor_id)?;
    let portrait = layout.resolve(&actor.portrait);
    if !portrait.is_file() {
        return Err(StudioError::MissingFile(format!(
            "portrait for actor '{}': {}",
            actor_id,
            portrait.display()
        ))
        .into());
    }

    let audio_seconds = audio_duration_seconds(audio).await?;
    engine.check_duration(config, audio_seconds)?;
    let (width, height) = format.resolution(config);
    let estimated_cost = prices.estimate(engine.as_str(), audio_seconds)?;

    Ok(VideoPlan {
        actor_id: actor_id.to_string(),
        portrait,
        audio: audio.to_path_buf(),
        audio_seconds,
        engine,
        format,
        width,
        height,
        motion,
        estimated_cost,
    })
}

pub fn print_plan(plan: &VideoPlan, config: &Config) {
    let name = config
        .actor(&plan.actor_id)
        .map(|a| a.name.as_str())
        .unwrap_or("?");
    println!("Video Generation Summary");
    println!("{:<16} {}", "Engine", plan.engine);
    println!("{:<16} {} ({})", "Actor", plan.actor_id, name);
    println!("{:<16} {} ({}x{})", "Format", plan.format, plan.width, plan.height);
    println!("{:<16} {:.1}s", "Audio duration", plan.audio_seconds);
    println!("{:<16} {}", "Motion level", plan.motion);
    println!("{:<16} ${:.3}", "Estimated cost", plan.estimated_cost);
}

pub fn default_raw_video_path(video_raw_dir: &Path, actor_id: &str) -> PathBuf {
    video_raw_dir.join(format!("video_{}_{}.mp4", actor_id, init::unix_timestamp()))
}

pub async fn render_video(
    renderer: &dyn LipSyncRenderer,
    budget: &mut BudgetTracker,
    plan: &VideoPlan,
    out_path: &Path,
) -> Result<VideoArtifact> {
    let job = LipSyncJob {
        portrait: &plan.portrait,
        audio: &plan.audio,
        width: plan.width,
        height: plan.height,
        motion: plan.motion,
    };
    renderer
        .render(&job, out_path)
        .await
        .with_context(|| format!("{} video generation failed", renderer.engine()))?;

    budget
        .append(
            renderer.engine().as_str(),
            plan.audio_seconds,
            &format!("Video generation for {}", plan.actor_id),
        )
        .await?;
    logok(format!("Video generated: {}", out_path.display()));

    Ok(VideoArtifact {
        path: out_path.to_path_buf(),
        format: plan.format.as_str().to_string(),
        actor: plan.actor_id.clone(),
        is_final: false,
    })
}
