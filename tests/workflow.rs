use ad_studio::api::TextGenerator;
use ad_studio::briefing;
use ad_studio::config::{Config, Credentials};
use ad_studio::hooks::{self, Hook, HookRequest, HookStyle};
use ad_studio::init::Layout;
use ad_studio::pipeline::{self, PipelineEngines, PipelineRequest};
use ad_studio::script::{self, Language, ScriptRequest};
use ad_studio::tts::{self, ChatterboxMock, TtsEngine};
use ad_studio::video::{LipSyncJob, LipSyncRenderer, VideoEngine, VideoFormat};
use ad_studio::{Studio, StudioError};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const CONFIG: &str = r#"{
    "actors": {
        "sophie": {"name": "Sophie", "age_range": "30-35", "category": "mum", "languages": ["fr", "en"], "persona": "Busy mum", "portrait": "actors/sophie.png"},
        "alex": {"name": "Alex", "age_range": "28-32", "category": "dad", "gender": "male", "languages": ["fr"], "persona": "Tech dad", "portrait": "actors/alex.png"}
    },
    "budget": {"monthly_limit": 50}
}"#;

const DNA: &str = r#"{
    "app": {"name": "Mila", "tagline": "Tes repas de la semaine en 2 minutes"},
    "problem": {"main": "Le stress des repas du soir", "emotional_triggers": ["culpabilité"]},
    "solution": {"core_value": "Des menus prêts", "differentiators": ["IA"]},
    "target": {"primary": "Parents actifs"},
    "tone": {"voice": "Une amie bienveillante"},
    "cta": {"primary": "Essaie gratuitement"}
}"#;

/// Replays a fixed reply and counts calls instead of reaching the network.
struct CannedText {
    reply: String,
    calls: AtomicUsize,
}

impl CannedText {
    fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for CannedText {
    async fn complete(&self, _system: &str, _user: &str, _max_tokens: u32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Writes a placeholder clip and remembers which audio track it was given.
struct PlaceholderClip {
    audio_seen: Arc<Mutex<Option<PathBuf>>>,
}

#[async_trait]
impl LipSyncRenderer for PlaceholderClip {
    fn engine(&self) -> VideoEngine {
        VideoEngine::Seedance
    }

    async fn render(&self, job: &LipSyncJob<'_>, out_path: &Path) -> Result<()> {
        *self.audio_seen.lock().unwrap() = Some(job.audio.to_path_buf());
        std::fs::write(out_path, b"placeholder clip")?;
        Ok(())
    }
}

fn only_file(dir: &Path) -> PathBuf {
    let files = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .collect::<Vec<_>>();
    assert_eq!(files.len(), 1, "{}: {:?}", dir.display(), files);
    files.into_iter().next().unwrap()
}

async fn open_studio(root: &Path) -> Studio {
    std::fs::create_dir_all(root.join("actors")).unwrap();
    std::fs::write(root.join("config.json"), CONFIG).unwrap();
    std::fs::write(root.join("dna.json"), DNA).unwrap();
    std::fs::write(root.join("actors/alex.png"), b"png").unwrap();
    std::fs::write(root.join("actors/sophie.png"), b"png").unwrap();

    let layout = Layout::new(root);
    let config = Config::load(layout.config_file()).await.unwrap();
    Studio::from_parts(layout, config, Credentials::default()).await.unwrap()
}

fn hooks_reply(n: usize) -> String {
    let hooks = (1..=n)
        .map(|i| format!(r#"{{"id": "hook_{:03}", "text": "Hook numéro {}", "style": "problem"}}"#, i, i))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Voici tes hooks :\n{{\"hooks\": [{}]}}\nBonne chance !", hooks)
}

fn fixed_hook() -> Hook {
    Hook {
        id: "hook_001".to_string(),
        text: "Marre de jeter de la nourriture chaque semaine ?".to_string(),
        style: "problem".to_string(),
        estimated_duration: 5,
        call_to_action: "Essaie gratuitement".to_string(),
    }
}

#[tokio::test]
async fn list_actors_returns_registry_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    assert_eq!(studio.config.actor_ids(), vec!["alex", "sophie"]);

    let json = serde_json::to_value(&studio.config.actors).unwrap();
    let mut keys = json.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
    keys.sort();
    assert_eq!(keys, vec!["alex", "sophie"]);
}

#[tokio::test]
async fn generate_hooks_returns_exactly_count() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    let (brief, _) = briefing::generate_briefing(&studio.layout, None, None).await.unwrap();
    let model = CannedText::new(hooks_reply(12));
    let mut budget = studio.budget().await.unwrap();

    for count in [1, 4, 10] {
        let req = HookRequest {
            style: HookStyle::Problem,
            count,
            dry_run: false,
        };
        let set = hooks::generate_hooks(Some(&model), &mut budget, &brief, &req).await.unwrap();
        assert_eq!(set.hooks.len(), count);
        assert_eq!(set.count, count);
        assert!(set.hooks.iter().all(|h| h.call_to_action == "Essaie gratuitement"));
    }
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
    assert_eq!(budget.ledger().transactions.len(), 3);

    let short = CannedText::new(hooks_reply(2));
    let req = HookRequest {
        style: HookStyle::Curiosity,
        count: 3,
        dry_run: false,
    };
    assert!(hooks::generate_hooks(Some(&short), &mut budget, &brief, &req).await.is_err());

    let req = HookRequest {
        style: HookStyle::All,
        count: 11,
        dry_run: true,
    };
    let err = hooks::generate_hooks(None, &mut budget, &brief, &req).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<StudioError>(), Some(StudioError::OutOfRange(_))));
}

#[tokio::test]
async fn dry_run_hooks_are_free() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    let (brief, _) = briefing::generate_briefing(&studio.layout, None, None).await.unwrap();
    let mut budget = studio.budget().await.unwrap();

    let req = HookRequest {
        style: HookStyle::Solution,
        count: 5,
        dry_run: true,
    };
    let set = hooks::generate_hooks(None, &mut budget, &brief, &req).await.unwrap();
    assert_eq!(set.hooks.len(), 5);
    assert!(set.hooks[0].text.starts_with("[SIMULATED]"));
    assert!(!studio.layout.ledger_file().exists());

    let path = hooks::default_hooks_path(&studio.layout.hooks_dir(), &set);
    hooks::save_hook_set(&set, &path).await.unwrap();
    let (found, file) = hooks::find_hook_by_id(&studio.layout.hooks_dir(), "hook_003")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found, set.hooks[2]);
    assert_eq!(file, path);
}

#[tokio::test]
async fn budget_total_matches_unit_prices() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    let mut budget = studio.budget().await.unwrap();

    let calls = [
        ("claude", 1.0),
        ("elevenlabs", 420.0),
        ("chatterbox", 310.0),
        ("seedance", 14.5),
        ("claude", 1.0),
    ];
    let mut expected = 0.0;
    for (service, quantity) in calls {
        budget.append(service, quantity, "test").await.unwrap();
        expected += studio.price_table().unit_price(service).unwrap() * quantity;
    }

    let reloaded = studio.budget().await.unwrap();
    let summary = reloaded.summary();
    assert_eq!(summary.transactions, calls.len());
    assert!((summary.total_spent - expected).abs() < 1e-9);
    assert!((summary.monthly_spent - expected).abs() < 1e-9);
    assert!((summary.remaining - (50.0 - expected)).abs() < 1e-9);
}

#[tokio::test]
async fn template_script_for_alex_fits_thirty_seconds() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    let dna = briefing::load_dna_optional(&studio.layout).await;
    let mut budget = studio.budget().await.unwrap();

    let req = ScriptRequest {
        hook: fixed_hook(),
        actor_id: Some("alex".to_string()),
        duration: 30,
        language: Language::Fr,
        fillers: true,
        use_remote: false,
    };
    let script = script::generate_script(&studio.config, None, &mut budget, &dna, &req).await.unwrap();

    assert_eq!(script.actor, "alex");
    assert!(script.estimated_speech_duration >= 24.0, "{}", script.estimated_speech_duration);
    assert!(script.estimated_speech_duration <= 36.0, "{}", script.estimated_speech_duration);
    assert_eq!(script.script_sections.iter().map(|s| s.duration).sum::<u32>(), 30);
    assert!(script.full_text.contains("Mila"));
    assert!(budget.ledger().transactions.is_empty());

    let path = script::default_script_path(&studio.layout.scripts_dir(), &script);
    script::save_script(&script, &path).await.unwrap();
    let loaded = script::load_script(&path).await.unwrap();
    assert_eq!(loaded.full_text, script.full_text);
}

#[tokio::test]
async fn remote_script_is_rescaled_and_billed() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    let mut budget = studio.budget().await.unwrap();
    let model = CannedText::new(
        r#"{"script_sections": [
            {"section": "hook", "text": "Marre de jeter de la nourriture ?", "duration": 4, "tone": "engaging"},
            {"section": "cta", "text": "Essaie gratuitement", "duration": 2, "tone": "urgent"}
        ]}"#,
    );

    let req = ScriptRequest {
        hook: fixed_hook(),
        actor_id: None,
        duration: 15,
        language: Language::En,
        fillers: false,
        use_remote: true,
    };
    let script = script::generate_script(&studio.config, Some(&model), &mut budget, &serde_json::Value::Null, &req)
        .await
        .unwrap();

    assert_eq!(script.actor, "alex");
    assert_eq!(script.language, Language::Fr);
    assert_eq!(script.script_sections.iter().map(|s| s.duration).sum::<u32>(), 15);
    assert!(script.script_sections.iter().all(|s| s.fillers.is_empty()));
    assert_eq!(budget.ledger().transactions.len(), 1);
    assert_eq!(budget.ledger().transactions[0].service, "claude");
}

#[tokio::test]
async fn unknown_actor_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    let mut budget = studio.budget().await.unwrap();
    let req = ScriptRequest {
        hook: fixed_hook(),
        actor_id: Some("nobody".to_string()),
        duration: 30,
        language: Language::Fr,
        fillers: true,
        use_remote: false,
    };
    let err = script::generate_script(&studio.config, None, &mut budget, &serde_json::Value::Null, &req)
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<StudioError>(), Some(StudioError::UnknownActor(_))));
}

#[tokio::test]
async fn chatterbox_audio_is_free_but_recorded() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    let mut budget = studio.budget().await.unwrap();
    let req = ScriptRequest {
        hook: fixed_hook(),
        actor_id: Some("sophie".to_string()),
        duration: 15,
        language: Language::Fr,
        fillers: false,
        use_remote: false,
    };
    let script = script::generate_script(&studio.config, None, &mut budget, &serde_json::Value::Null, &req)
        .await
        .unwrap();

    let out = tts::default_audio_path(&studio.layout.audio_dir(), &script, TtsEngine::Chatterbox);
    let actor = studio.config.actor("sophie").unwrap();
    let audio = tts::synthesize_script(&ChatterboxMock, &mut budget, &script, actor, 0.5, &out)
        .await
        .unwrap();

    assert!(out.is_file());
    assert_eq!(audio.engine, "chatterbox");
    assert_eq!(audio.characters, script.full_text.chars().count());
    assert!(audio.duration_seconds >= 1.0);
    assert_eq!(budget.ledger().transactions.len(), 1);
    assert_eq!(budget.total(), 0.0);
}

fn pipeline_request(dry_run: bool) -> PipelineRequest {
    PipelineRequest {
        hook_text: "Marre du casse-tête des repas ?".to_string(),
        actor_id: "alex".to_string(),
        duration: 15,
        format: VideoFormat::Vertical,
        template: None,
        language: Language::Fr,
        tts_engine: TtsEngine::ElevenLabs,
        video_engine: VideoEngine::Seedance,
        dry_run,
        auto_confirm: false,
    }
}

#[tokio::test]
async fn full_pipeline_dry_run_never_touches_the_ledger() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;

    let outputs = pipeline::run_pipeline(&studio, &pipeline_request(true), |_| {
        panic!("dry runs never ask for confirmation")
    })
    .await
    .unwrap()
    .unwrap();

    assert!(outputs.hook_file.is_file());
    assert!(outputs.script_file.is_file());
    assert!(!outputs.audio_file.exists());
    assert!(!outputs.final_file.exists());
    assert!(outputs.estimated_cost > 0.0);
    assert!(studio.budget().await.unwrap().ledger().transactions.is_empty());
    assert!(!studio.layout.ledger_file().exists());
}

#[tokio::test]
async fn declined_pipeline_stops_before_any_step() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;

    let outputs = pipeline::run_pipeline(&studio, &pipeline_request(false), |_| Ok(false))
        .await
        .unwrap();
    assert!(outputs.is_none());
    assert_eq!(std::fs::read_dir(studio.layout.hooks_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn missing_credentials_fail_before_spending() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;

    let err = pipeline::run_pipeline(&studio, &pipeline_request(false), |_| Ok(true))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StudioError>(),
        Some(StudioError::MissingCredential(_))
    ));
    assert!(!studio.layout.ledger_file().exists());
    assert_eq!(std::fs::read_dir(studio.layout.scripts_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn over_cap_duration_fails_preflight() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    let mut req = pipeline_request(false);
    req.duration = 30;
    req.auto_confirm = true;

    let err = pipeline::run_pipeline(&studio, &req, |_| Ok(true)).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StudioError>(),
        Some(StudioError::DurationCap { .. })
    ));
}

#[tokio::test]
async fn real_pipeline_bills_each_step_once_and_chains_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    let studio = open_studio(tmp.path()).await;
    let mut req = pipeline_request(false);
    req.tts_engine = TtsEngine::Chatterbox;
    req.auto_confirm = true;

    let audio_seen = Arc::new(Mutex::new(None));
    let clip = PlaceholderClip {
        audio_seen: Arc::clone(&audio_seen),
    };
    let script_reply = r#"{"script_sections": [
        {"section": "hook", "text": "Marre du casse-tête des repas ?", "duration": 6, "tone": "engaging"},
        {"section": "solution", "text": "Mila prépare tes menus de la semaine.", "duration": 6, "tone": "confident"},
        {"section": "cta", "text": "Essaie gratuitement", "duration": 3, "tone": "urgent"}
    ]}"#;

    // the placeholder clip is not a real video, so the final cut cannot succeed
    let result = pipeline::run_pipeline_with(
        &studio,
        &req,
        |_| panic!("auto-confirmed runs never prompt"),
        move |_, _| {
            Ok(PipelineEngines {
                text: Box::new(CannedText::new(script_reply)),
                speech: Box::new(ChatterboxMock),
                video: Box::new(clip),
            })
        },
    )
    .await;
    assert!(result.is_err());

    let ledger = studio.budget().await.unwrap();
    let services = ledger
        .ledger()
        .transactions
        .iter()
        .map(|t| t.service.as_str())
        .collect::<Vec<_>>();
    assert_eq!(services, vec!["claude", "chatterbox", "seedance"]);

    let script = script::load_script(&only_file(&studio.layout.scripts_dir())).await.unwrap();
    assert_eq!(script.hook_text, req.hook_text);
    assert_eq!(script.script_sections.len(), 3);
    assert_eq!(script.script_sections.iter().map(|s| s.duration).sum::<u32>(), 15);

    let audio = only_file(&studio.layout.audio_dir());
    assert!(audio.file_name().unwrap().to_string_lossy().contains(&script.id));
    assert_eq!(audio_seen.lock().unwrap().as_deref(), Some(audio.as_path()));

    let raw = only_file(&studio.layout.video_raw_dir());
    assert_eq!(std::fs::read(&raw).unwrap(), b"placeholder clip");
    assert!(std::fs::read_dir(studio.layout.video_final_dir()).unwrap().next().is_none());
}
