//! End-to-end run: hook → script → audio → video → final cut.
//!
//! Steps run in-process and strictly in order. Every engine and credential
//! is resolved before the first paid call, so a bad argument never costs
//! money. Dry runs write the hook and a template script, then stop short
//! of every paid step and leave the ledger untouched.

use crate::api::TextGenerator;
use crate::assemble::{self, AssembleOptions, Template};
use crate::briefing::{self, text_at};
use crate::budget::PriceTable;
use crate::config::Config;
use crate::hooks::{self, Hook, HookSet};
use crate::init;
use crate::script::{self, Language, ScriptRequest};
use crate::studio::Studio;
use crate::tts::{self, DEFAULT_STABILITY, SpeechSynthesizer, TtsEngine};
use crate::video::{self, DEFAULT_MOTION, LipSyncRenderer, VideoEngine, VideoFormat};
use crate::{logi, logok, logw};
use anyhow::Result;
use serde_json::Value;
use std::path::PathBuf;

const TTS_CHARS_PER_SECOND: f64 = 10.0;
const STEPS: usize = 5;

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub hook_text: String,
    pub actor_id: String,
    pub duration: u32,
    pub format: VideoFormat,
    pub template: Option<Template>,
    pub language: Language,
    pub tts_engine: TtsEngine,
    pub video_engine: VideoEngine,
    pub dry_run: bool,
    pub auto_confirm: bool,
}

impl PipelineRequest {
    pub fn template(&self) -> Template {
        self.template.unwrap_or_else(|| Template::for_format(self.format))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub tts_characters: f64,
    pub tts_cost: f64,
    pub video_seconds: f64,
    pub video_cost: f64,
    pub text_cost: f64,
}

impl CostEstimate {
    pub fn total(&self) -> f64 {
        self.tts_cost + self.video_cost + self.text_cost
    }
}

pub fn estimate_cost(prices: &PriceTable, req: &PipelineRequest) -> Result<CostEstimate> {
    let tts_characters = req.duration as f64 * TTS_CHARS_PER_SECOND;
    let video_seconds = req.duration as f64;
    Ok(CostEstimate {
        tts_characters,
        tts_cost: prices.estimate(req.tts_engine.as_str(), tts_characters)?,
        video_seconds,
        video_cost: prices.estimate(req.video_engine.as_str(), video_seconds)?,
        text_cost: prices.estimate("claude", 1.0)?,
    })
}

#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub id: String,
    pub hook_file: PathBuf,
    pub script_file: PathBuf,
    pub audio_file: PathBuf,
    pub video_file: PathBuf,
    pub final_file: PathBuf,
    pub estimated_cost: f64,
}

/// Paid engines, built up front so missing credentials fail before any spend.
pub struct PipelineEngines {
    pub text: Box<dyn TextGenerator>,
    pub speech: Box<dyn SpeechSynthesizer>,
    pub video: Box<dyn LipSyncRenderer>,
}

impl PipelineEngines {
    pub fn from_studio(studio: &Studio, req: &PipelineRequest) -> Result<Self> {
        Ok(Self {
            text: studio.text_generator()?,
            speech: tts::create_synthesizer(req.tts_engine, &studio.http, &studio.config, &studio.credentials)?,
            video: video::create_renderer(req.video_engine, &studio.http, &studio.config, &studio.credentials)?,
        })
    }
}

/// Argument checks shared by real and dry runs.
pub fn preflight(studio: &Studio, req: &PipelineRequest) -> Result<()> {
    script::validate_duration(req.duration)?;
    let actor = studio.config.actor(&req.actor_id)?;

    let portrait = studio.layout.resolve(&actor.portrait);
    let cap = req.video_engine.check_duration(&studio.config, req.duration as f64);
    if req.dry_run {
        if !portrait.is_file() {
            logw(format!("Portrait missing for '{}': {}", req.actor_id, portrait.display()));
        }
        if let Err(err) = cap {
            logw(format!("{} (a real run would stop here)", err));
        }
        return Ok(());
    }

    if !portrait.is_file() {
        return Err(crate::StudioError::MissingFile(format!(
            "portrait for actor '{}': {}",
            req.actor_id,
            portrait.display()
        ))
        .into());
    }
    cap?;
    Ok(())
}

fn pipeline_hook(req: &PipelineRequest, dna: &Value) -> Hook {
    let app = text_at(dna, &["app", "name"], script::DEFAULT_APP_NAME);
    let cta = text_at(dna, &["cta", "primary"], "");
    Hook {
        id: hooks::hook_id(1),
        text: req.hook_text.trim().to_string(),
        style: "custom".to_string(),
        estimated_duration: req.duration,
        call_to_action: if cta.is_empty() {
            format!("Télécharge {} maintenant!", app)
        } else {
            cta
        },
    }
}

fn step(n: usize, label: &str) {
    logi(format!("Step {}/{}: {}", n, STEPS, label));
}

/// Runs the whole chain. `confirm` receives the estimated total and is
/// consulted only for real runs without `auto_confirm`; `Ok(None)` means
/// the operator declined.
pub async fn run_pipeline<F>(studio: &Studio, req: &PipelineRequest, confirm: F) -> Result<Option<PipelineOutputs>>
where
    F: FnOnce(f64) -> Result<bool>,
{
    run_pipeline_with(studio, req, confirm, PipelineEngines::from_studio).await
}

/// [`run_pipeline`] with the paid engines supplied by `build_engines`,
/// called once for real runs after preflight has passed.
pub async fn run_pipeline_with<F, E>(
    studio: &Studio,
    req: &PipelineRequest,
    confirm: F,
    build_engines: E,
) -> Result<Option<PipelineOutputs>>
where
    F: FnOnce(f64) -> Result<bool>,
    E: FnOnce(&Studio, &PipelineRequest) -> Result<PipelineEngines>,
{
    let estimate = estimate_cost(&studio.price_table(), req)?;
    logi(format!(
        "Pipeline: actor={} duration={}s format={} template={}",
        req.actor_id,
        req.duration,
        req.format,
        req.template()
    ));
    logi(format!("Estimated total cost: ${:.3}", estimate.total()));

    if !req.dry_run && !req.auto_confirm && !confirm(estimate.total())? {
        logw("Pipeline cancelled");
        return Ok(None);
    }

    preflight(studio, req)?;
    let engines = if req.dry_run {
        None
    } else {
        Some(build_engines(studio, req)?)
    };

    let id = init::generate_file_id();
    logi(format!("Pipeline ID: {}", id));
    let layout = &studio.layout;
    let dna = briefing::load_dna_optional(layout).await;
    let mut budget = studio.budget().await?;

    step(1, "Creating hook");
    let hook = pipeline_hook(req, &dna);
    let set = HookSet {
        id: id.clone(),
        ..HookSet::new("custom", vec![hook.clone()])
    };
    let hook_file = hooks::default_hooks_path(&layout.hooks_dir(), &set);
    hooks::save_hook_set(&set, &hook_file).await?;

    step(2, "Generating script");
    let script_req = ScriptRequest {
        hook,
        actor_id: Some(req.actor_id.clone()),
        duration: req.duration,
        language: req.language,
        fillers: true,
        use_remote: engines.is_some(),
    };
    let script = script::generate_script(
        &studio.config,
        engines.as_ref().map(|e| e.text.as_ref()),
        &mut budget,
        &dna,
        &script_req,
    )
    .await?;
    let script_file = script::default_script_path(&layout.scripts_dir(), &script);
    script::save_script(&script, &script_file).await?;

    let template = req.template();
    let audio_file = tts::default_audio_path(&layout.audio_dir(), &script, req.tts_engine);
    let video_file = video::default_raw_video_path(&layout.video_raw_dir(), &req.actor_id);
    let final_file = assemble::default_final_path(&layout.video_final_dir(), template);

    let Some(engines) = engines else {
        for (n, label) in [(3, "audio"), (4, "video"), (5, "final cut")] {
            step(n, &format!("[DRY RUN] skipping {}", label));
        }
        logok("Dry run complete, nothing was charged");
        return Ok(Some(PipelineOutputs {
            id,
            hook_file,
            script_file,
            audio_file,
            video_file,
            final_file,
            estimated_cost: estimate.total(),
        }));
    };

    step(3, "Generating audio");
    let actor = studio.config.actor(&req.actor_id)?;
    tts::synthesize_script(
        engines.speech.as_ref(),
        &mut budget,
        &script,
        actor,
        DEFAULT_STABILITY,
        &audio_file,
    )
    .await?;

    step(4, "Generating video");
    let plan = video::plan_video(
        layout,
        &studio.config,
        budget.prices(),
        &audio_file,
        &req.actor_id,
        req.format,
        req.video_engine,
        DEFAULT_MOTION,
    )
    .await?;
    video::render_video(engines.video.as_ref(), &mut budget, &plan, &video_file).await?;

    step(5, "Assembling final video");
    let options = AssembleOptions {
        template: Some(template),
        format: req.format,
        ..AssembleOptions::default()
    };
    assemble::assemble_video(layout, &video_file, Some(&script), &options, &final_file).await?;

    logok("Pipeline complete");
    Ok(Some(PipelineOutputs {
        id,
        hook_file,
        script_file,
        audio_file,
        video_file,
        final_file,
        estimated_cost: estimate.total(),
    }))
}

pub fn print_outputs(outputs: &PipelineOutputs) {
    println!("Outputs ({})", outputs.id);
    println!("  - Hook:   {}", outputs.hook_file.display());
    println!("  - Script: {}", outputs.script_file.display());
    println!("  - Audio:  {}", outputs.audio_file.display());
    println!("  - Video:  {}", outputs.video_file.display());
    println!("  - Final:  {}", outputs.final_file.display());
}

fn greeting(language: Language, name: &str, app: &str) -> String {
    match language {
        Language::Fr => format!("Bonjour ! Je suis {}, et je teste le moteur vidéo de {}.", name, app),
        Language::En => format!("Hi! I'm {}, and I'm testing the {} video engine.", name, app),
        Language::Es => format!("¡Hola! Soy {} y estoy probando el motor de vídeo de {}.", name, app),
    }
}

/// Five-second greeting run used to check an actor's portrait and voice.
pub fn test_actor_request(
    config: &Config,
    dna: &Value,
    actor_id: &str,
    format: VideoFormat,
    dry_run: bool,
) -> Result<PipelineRequest> {
    let actor = config.actor(actor_id)?;
    let language = actor.default_language.parse::<Language>().unwrap_or(Language::Fr);
    let app = text_at(dna, &["app", "name"], script::DEFAULT_APP_NAME);
    Ok(PipelineRequest {
        hook_text: greeting(language, &actor.name, &app),
        actor_id: actor_id.to_string(),
        duration: 5,
        format,
        template: Some(Template::TalkingHead),
        language,
        tts_engine: TtsEngine::Chatterbox,
        video_engine: VideoEngine::Seedance,
        dry_run,
        auto_confirm: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(duration: u32) -> PipelineRequest {
        PipelineRequest {
            hook_text: "Marre du casse-tête des repas ?".to_string(),
            actor_id: "alex".to_string(),
            duration,
            format: VideoFormat::Vertical,
            template: None,
            language: Language::Fr,
            tts_engine: TtsEngine::ElevenLabs,
            video_engine: VideoEngine::Seedance,
            dry_run: false,
            auto_confirm: false,
        }
    }

    #[test]
    fn estimate_sums_text_tts_and_video() {
        let est = estimate_cost(&PriceTable::default(), &request(15)).unwrap();
        assert_eq!(est.tts_characters, 150.0);
        assert!((est.tts_cost - 0.045).abs() < 1e-9);
        assert!((est.video_cost - 1.8).abs() < 1e-9);
        assert!((est.total() - (0.045 + 1.8 + 0.01)).abs() < 1e-9);
    }

    #[test]
    fn hook_without_dna_falls_back_to_default_app() {
        let hook = pipeline_hook(&request(15), &Value::Null);
        assert_eq!(
            hook.call_to_action,
            format!("Télécharge {} maintenant!", script::DEFAULT_APP_NAME)
        );

        let config = Config::from_json(r#"{"actors": {"alex": {"name": "Alex"}}}"#).unwrap();
        let req = test_actor_request(&config, &Value::Null, "alex", VideoFormat::Vertical, true).unwrap();
        assert!(req.hook_text.contains(script::DEFAULT_APP_NAME));
    }

    #[test]
    fn template_defaults_from_format() {
        let mut req = request(15);
        req.format = VideoFormat::Square;
        assert_eq!(req.template(), Template::ProblemSolution);
        req.template = Some(Template::SplitScreen);
        assert_eq!(req.template(), Template::SplitScreen);
    }

    #[test]
    fn test_actor_uses_greeting_in_actor_language() {
        let config = Config::from_json(
            r#"{"actors": {"maria": {"name": "María", "languages": ["es"], "default_language": "es"}}}"#,
        )
        .unwrap();
        let req = test_actor_request(&config, &Value::Null, "maria", VideoFormat::Square, true).unwrap();
        assert_eq!(req.duration, 5);
        assert_eq!(req.language, Language::Es);
        assert!(req.hook_text.contains("María"));
        assert!(req.auto_confirm);
        assert!(test_actor_request(&config, &Value::Null, "nobody", VideoFormat::Square, true).is_err());
    }
}
