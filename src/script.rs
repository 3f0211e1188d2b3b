//! Narration scripts built from a hook.
//!
//! A script is an ordered list of sections (hook, problem, solution, ...,
//! cta) whose `duration`s always sum to the requested target. Remote
//! generation asks the text model for the sections and rescales their
//! timings; template generation is free and pads the body with stock
//! supporting lines until the spoken-length estimate (`words / 2.5`)
//! lands within [`DURATION_TOLERANCE`] of the target.

use crate::api::TextGenerator;
use crate::api::anthropic::extract_json_object;
use crate::briefing::{str_list, text_at};
use crate::budget::{BudgetTracker, truncate_label};
use crate::config::{Actor, Config};
use crate::error::StudioError;
use crate::hooks::Hook;
use crate::init;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

pub const ALLOWED_DURATIONS: &[u32] = &[5, 15, 30, 60];
pub const WORDS_PER_SECOND: f64 = 2.5;
pub const DURATION_TOLERANCE: f64 = 0.2;
pub const DEFAULT_APP_NAME: &str = "Mila";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Fr,
    En,
    Es,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Fr => "fr",
            Language::En => "en",
            Language::Es => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fr" => Ok(Language::Fr),
            "en" => Ok(Language::En),
            "es" => Ok(Language::Es),
            _ => Err(StudioError::InvalidChoice {
                kind: "language",
                value: s.to_string(),
                allowed: "fr, en, es",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Engaging,
    Relatable,
    Confident,
    Urgent,
    Thoughtful,
    Excited,
    #[serde(other)]
    Neutral,
}

impl Tone {
    fn fillers(self) -> &'static [&'static str] {
        match self {
            Tone::Engaging | Tone::Relatable => &["euh", "tu vois", "en fait"],
            Tone::Thoughtful => &["alors", "effectivement", "donc"],
            _ => &[],
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tone::Engaging => "engaging",
            Tone::Relatable => "relatable",
            Tone::Confident => "confident",
            Tone::Urgent => "urgent",
            Tone::Thoughtful => "thoughtful",
            Tone::Excited => "excited",
            Tone::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

fn default_section_duration() -> u32 {
    5
}

fn default_tone() -> Tone {
    Tone::Engaging
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSection {
    pub section: String,
    pub text: String,
    #[serde(default = "default_section_duration")]
    pub duration: u32,
    #[serde(default = "default_tone")]
    pub tone: Tone,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fillers: Vec<String>,
}

impl ScriptSection {
    fn new(section: &str, text: String, duration: u32, tone: Tone) -> Self {
        Self {
            section: section.to_string(),
            text,
            duration,
            tone,
            fillers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub id: String,
    pub timestamp: String,
    pub hook_id: String,
    pub hook_text: String,
    pub actor: String,
    pub actor_config: Actor,
    pub language: Language,
    pub duration: u32,
    pub script_sections: Vec<ScriptSection>,
    pub full_text: String,
    pub word_count: usize,
    pub estimated_speech_duration: f64,
}

#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub hook: Hook,
    pub actor_id: Option<String>,
    pub duration: u32,
    pub language: Language,
    pub fillers: bool,
    pub use_remote: bool,
}

pub fn validate_duration(duration: u32) -> Result<(), StudioError> {
    if !ALLOWED_DURATIONS.contains(&duration) {
        return Err(StudioError::OutOfRange(format!(
            "Duration must be one of 5, 15, 30 or 60 seconds, got {}",
            duration
        )));
    }
    Ok(())
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn estimate_speech_seconds(words: usize) -> f64 {
    words as f64 / WORDS_PER_SECOND
}

pub fn within_tolerance(estimate: f64, target: u32) -> bool {
    let target = target as f64;
    (estimate - target).abs() <= target * DURATION_TOLERANCE
}

/// Rescales section timings so they sum to exactly `target` seconds.
///
/// Every section keeps at least one second, so when there are more
/// sections than seconds the body sections before the CTA are folded
/// into their predecessor first.
pub fn fit_durations(sections: &mut Vec<ScriptSection>, target: u32) {
    if sections.is_empty() {
        return;
    }
    let target = target.max(1);
    while sections.len() > target as usize {
        let i = if sections.len() >= 3 { sections.len() - 2 } else { sections.len() - 1 };
        let folded = sections.remove(i);
        let keep = &mut sections[i - 1];
        keep.text = format!("{} {}", keep.text.trim(), folded.text.trim());
        keep.duration = keep.duration.saturating_add(folded.duration);
    }

    let goal = u64::from(target);
    let total: u64 = sections.iter().map(|s| u64::from(s.duration)).sum();
    if total == goal {
        return;
    }
    if total == 0 {
        let each = (target / sections.len() as u32).max(1);
        sections.iter_mut().for_each(|s| s.duration = each);
    } else {
        let ratio = goal as f64 / total as f64;
        for s in sections.iter_mut() {
            s.duration = ((s.duration as f64 * ratio).round() as u32).max(1);
        }
    }

    let mut sum: u64 = sections.iter().map(|s| u64::from(s.duration)).sum();
    while sum > goal {
        let Some(longest) = sections
            .iter_mut()
            .filter(|s| s.duration > 1)
            .max_by_key(|s| s.duration)
        else {
            break;
        };
        let cut = (sum - goal).min(u64::from(longest.duration - 1));
        longest.duration -= cut as u32;
        sum -= cut;
    }
    if sum < goal {
        if let Some(longest) = sections.iter_mut().max_by_key(|s| s.duration) {
            longest.duration += (goal - sum) as u32;
        }
    }
}

struct TemplateText {
    problem: &'static str,
    solution: &'static str,
    problem_intro: &'static str,
    problem_detail: &'static str,
    solution_long: &'static str,
    benefits: &'static str,
    cta_short: &'static str,
    cta_long: &'static str,
    supporting: &'static [&'static str],
}

const FR: TemplateText = TemplateText {
    problem: "Tu connais ce moment où tu perds du temps sur des tâches répétitives ?",
    solution: "Avec {app}, ton assistant IA personnel, fini la perte de temps !",
    problem_intro: "Chaque jour, nous perdons des heures sur des tâches qui pourraient être automatisées.",
    problem_detail: "Emails, planification, recherches... Ces petites tâches s'accumulent et nous épuisent.",
    solution_long: "C'est exactement pourquoi nous avons créé {app}, ton assistant IA qui comprend tes besoins.",
    benefits: "Plus intelligent, plus rapide, et surtout... il apprend de toi pour devenir encore plus utile.",
    cta_short: "Télécharge {app} maintenant !",
    cta_long: "Télécharge {app} maintenant et reprends le contrôle de ton temps !",
    supporting: &[
        "Entre le travail, la maison et les enfants, les journées filent sans prévenir.",
        "On accumule des petites tâches qui finissent par nous épuiser.",
        "{app} s'en occupe pour toi, simplement, sans rien compliquer.",
        "Tu configures une fois, et ensuite tout se fait presque tout seul.",
        "Moins de charge mentale, plus de temps pour ce qui compte vraiment.",
        "Franchement, c'est le premier outil que j'utilise vraiment tous les jours.",
        "Tu gardes la main sur tout, et tu ajustes en un clic.",
        "Des milliers de parents l'utilisent déjà chaque semaine.",
        "Essaie une semaine, tu verras tout de suite la différence.",
        "C'est simple, concret, et ça change vraiment le quotidien.",
    ],
};

const EN: TemplateText = TemplateText {
    problem: "You know that moment when repetitive little tasks eat your whole evening?",
    solution: "With {app}, your personal AI assistant, that wasted time is over.",
    problem_intro: "Every day we lose hours on tasks that could simply run on their own.",
    problem_detail: "Emails, planning, research... the small stuff piles up and wears us out.",
    solution_long: "That is exactly why we built {app}, an AI assistant that understands what you need.",
    benefits: "Smarter, faster, and above all it learns from you to become even more useful.",
    cta_short: "Download {app} now!",
    cta_long: "Download {app} now and take back control of your time!",
    supporting: &[
        "Between work, home and the kids, the days just slip away.",
        "All those little tasks keep piling up until you are exhausted.",
        "{app} takes care of them for you, simply, without any fuss.",
        "You set it up once, and then it pretty much runs by itself.",
        "Less mental load, more time for what really matters.",
        "Honestly, it is the first tool I actually use every single day.",
        "You stay in control, and you can adjust anything in one tap.",
        "Thousands of parents already use it every week.",
        "Try it for one week and you will see the difference right away.",
        "It is simple, it is concrete, and it really changes everyday life.",
    ],
};

const ES: TemplateText = TemplateText {
    problem: "¿Conoces ese momento en que pierdes tiempo en tareas repetitivas?",
    solution: "Con {app}, tu asistente personal con IA, se acabó perder el tiempo.",
    problem_intro: "Cada día perdemos horas en tareas que podrían hacerse solas.",
    problem_detail: "Correos, planificación, búsquedas... Las pequeñas tareas se acumulan y nos agotan.",
    solution_long: "Por eso creamos {app}, un asistente con IA que entiende lo que necesitas.",
    benefits: "Más inteligente, más rápido y, sobre todo, aprende de ti para ser aún más útil.",
    cta_short: "¡Descarga {app} ahora!",
    cta_long: "¡Descarga {app} ahora y recupera el control de tu tiempo!",
    supporting: &[
        "Entre el trabajo, la casa y los niños, los días se escapan sin avisar.",
        "Las pequeñas tareas se acumulan hasta que terminas agotada.",
        "{app} se encarga de ellas por ti, de forma simple y sin complicaciones.",
        "Lo configuras una vez y después casi todo se hace solo.",
        "Menos carga mental y más tiempo para lo que de verdad importa.",
        "Sinceramente, es la primera herramienta que uso de verdad cada día.",
        "Tú mantienes el control y lo ajustas todo con un clic.",
        "Miles de familias ya lo usan cada semana.",
        "Pruébalo una semana y verás la diferencia enseguida.",
        "Es simple, concreto y cambia de verdad el día a día.",
    ],
};

fn template_text(language: Language) -> &'static TemplateText {
    match language {
        Language::Fr => &FR,
        Language::En => &EN,
        Language::Es => &ES,
    }
}

fn fill(text: &str, app: &str) -> String {
    text.replace("{app}", app)
}

/// Free, offline script: fixed section skeleton for the duration, padded to length.
pub fn template_sections(hook: &Hook, duration: u32, language: Language, app: &str) -> Vec<ScriptSection> {
    let t = template_text(language);
    let hook_cta = Some(hook.call_to_action.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let hook_text = hook.text.clone();

    let mut sections = if duration <= 15 {
        vec![
            ScriptSection::new("hook", hook_text, 10, Tone::Engaging),
            ScriptSection::new(
                "cta",
                hook_cta.unwrap_or_else(|| fill(t.cta_short, app)),
                5,
                Tone::Urgent,
            ),
        ]
    } else if duration <= 30 {
        vec![
            ScriptSection::new("hook", hook_text, 8, Tone::Engaging),
            ScriptSection::new("problem", fill(t.problem, app), 7, Tone::Relatable),
            ScriptSection::new("solution", fill(t.solution, app), 10, Tone::Confident),
            ScriptSection::new(
                "cta",
                hook_cta.unwrap_or_else(|| fill(t.cta_short, app)),
                5,
                Tone::Urgent,
            ),
        ]
    } else {
        vec![
            ScriptSection::new("hook", hook_text, 10, Tone::Engaging),
            ScriptSection::new("problem_intro", fill(t.problem_intro, app), 12, Tone::Thoughtful),
            ScriptSection::new("problem_detail", fill(t.problem_detail, app), 13, Tone::Relatable),
            ScriptSection::new("solution", fill(t.solution_long, app), 15, Tone::Confident),
            ScriptSection::new("benefits", fill(t.benefits, app), 7, Tone::Excited),
            ScriptSection::new(
                "cta",
                hook_cta.unwrap_or_else(|| fill(t.cta_long, app)),
                3,
                Tone::Urgent,
            ),
        ]
    };

    pad_to_duration(&mut sections, duration, t.supporting, app);
    fit_durations(&mut sections, duration);
    sections
}

/// Appends supporting lines to the body section (the one before the CTA)
/// until the spoken estimate reaches the target, skipping any line that
/// would cross the upper tolerance bound.
fn pad_to_duration(sections: &mut [ScriptSection], duration: u32, supporting: &[&str], app: &str) {
    let target_words = duration as f64 * WORDS_PER_SECOND;
    let max_words = (target_words * (1.0 + DURATION_TOLERANCE)).floor() as usize;

    let mut words: usize = sections.iter().map(|s| word_count(&s.text)).sum();
    let body = sections.len().saturating_sub(2);

    for line in supporting {
        if words as f64 >= target_words {
            break;
        }
        let line = fill(line, app);
        let extra = word_count(&line);
        if words + extra > max_words {
            continue;
        }
        let section = &mut sections[body];
        section.text.push(' ');
        section.text.push_str(&line);
        words += extra;
    }
}

const SCRIPT_SYSTEM_PROMPT: &str = "You are an expert copywriter for short video ads. You write engaging scripts for 15, 30 or 60 second videos.

Rules:
- Conversational, natural style, like talking to a friend
- Tone: kind, pragmatic, a little imperfect, honest
- Avoid superlatives (\"magic\", \"incredible\", \"revolutionary\")
- Every section carries a realistic duration in seconds
- The closing CTA is clear and actionable
- Speak at about 2.5 words per second, so the word count must match the duration

Return ONLY valid JSON with this shape:
{
  \"script_sections\": [
    {\"section\": \"hook\", \"text\": \"...\", \"duration\": 5, \"tone\": \"engaging\"},
    {\"section\": \"problem\", \"text\": \"...\", \"duration\": 7, \"tone\": \"relatable\"},
    {\"section\": \"solution\", \"text\": \"...\", \"duration\": 10, \"tone\": \"confident\"},
    {\"section\": \"cta\", \"text\": \"...\", \"duration\": 5, \"tone\": \"urgent\"}
  ]
}

Sections by duration:
- 15s: hook + cta
- 30s: hook + problem + solution + cta
- 60s: hook + problem_intro + problem_detail + solution + benefits + cta

Valid tones: engaging, relatable, confident, urgent, thoughtful, excited";

fn script_user_prompt(hook: &Hook, dna: &Value, actor_id: &str, actor: &Actor, duration: u32, language: Language) -> String {
    let secondary = str_list(dna, &["problem", "secondary"])
        .into_iter()
        .take(2)
        .collect::<Vec<_>>()
        .join(", ");
    let features = dna
        .get("solution")
        .and_then(|s| s.get("key_features"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(2)
                .filter_map(|f| f.get("name").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();

    format!(
        "Write a {duration}-second video ad script.\n\nOpening hook: \"{hook}\"\n\nProduct context:\n- App: {app} - {tagline}\n- Main problem: {problem}\n- Secondary problems: {secondary}\n- Key features: {features}\n- Core value: {value}\n- CTA: {cta}\n\nActor \"{actor_id}\": {name}, age {age}, persona: {persona}\nLanguage: {language}\n\nExact total timing: {duration} seconds. Spread the timings across the sections to hit exactly {duration}s.",
        duration = duration,
        hook = hook.text,
        app = text_at(dna, &["app", "name"], DEFAULT_APP_NAME),
        tagline = text_at(dna, &["app", "tagline"], ""),
        problem = text_at(dna, &["problem", "main"], ""),
        secondary = secondary,
        features = features,
        value = text_at(dna, &["solution", "core_value"], ""),
        cta = hook.call_to_action,
        actor_id = actor_id,
        name = actor.name,
        age = actor.age_range,
        persona = actor.persona,
        language = language,
    )
}

#[derive(Debug, Deserialize)]
struct ScriptReply {
    #[serde(default)]
    script_sections: Vec<ScriptSection>,
}

/// Parses the model's sections, dropping empty ones and capping each
/// timing at `target` seconds.
pub fn parse_script_reply(reply: &str, target: u32) -> Result<Vec<ScriptSection>> {
    let value = extract_json_object(reply)?;
    let parsed: ScriptReply = serde_json::from_value(value).context("Unexpected script JSON shape")?;
    let sections = parsed
        .script_sections
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|mut s| {
            s.duration = s.duration.min(target);
            s
        })
        .collect::<Vec<_>>();
    if sections.is_empty() {
        anyhow::bail!("Model returned no script sections");
    }
    Ok(sections)
}

/// Resolves the actor (auto-selecting the first registered one) and the spoken language.
pub fn resolve_actor<'a>(
    config: &'a Config,
    actor_id: Option<&str>,
    language: Language,
) -> Result<(String, &'a Actor, Language)> {
    let actor_id = match actor_id {
        Some(id) => id.to_string(),
        None => {
            let id = config
                .default_actor_id()
                .ok_or_else(|| StudioError::UnknownActor("<none registered>".to_string()))?;
            logi(format!("Auto-selected actor: {}", id));
            id.to_string()
        }
    };
    let actor = config.actor(&actor_id)?;

    let language = if actor.languages.iter().any(|l| l.eq_ignore_ascii_case(language.as_str())) {
        language
    } else {
        let fallback = actor.default_language.parse::<Language>().unwrap_or(Language::Fr);
        logw(format!(
            "Actor '{}' doesn't support '{}', using '{}'",
            actor_id, language, fallback
        ));
        fallback
    };
    Ok((actor_id, actor, language))
}

pub async fn generate_script(
    config: &Config,
    generator: Option<&dyn TextGenerator>,
    budget: &mut BudgetTracker,
    dna: &Value,
    req: &ScriptRequest,
) -> Result<Script> {
    validate_duration(req.duration)?;
    let (actor_id, actor, language) = resolve_actor(config, req.actor_id.as_deref(), req.language)?;

    let mut sections = if req.use_remote {
        let generator = generator.context("A text generator is required for remote script generation")?;
        logi("Generating script with Claude...");
        let prompt = script_user_prompt(&req.hook, dna, &actor_id, actor, req.duration, language);
        let reply = generator.complete(SCRIPT_SYSTEM_PROMPT, &prompt, 2000).await?;
        let mut sections = parse_script_reply(&reply, req.duration)?;

        let total: u64 = sections.iter().map(|s| u64::from(s.duration)).sum();
        if total != u64::from(req.duration) || sections.len() > req.duration as usize {
            logw(format!("Timing adjusted: {}s -> {}s", total, req.duration));
            fit_durations(&mut sections, req.duration);
        }
        budget
            .append(
                generator.service(),
                1.0,
                &format!("Script generation for {}s", req.duration),
            )
            .await?;
        logok(format!("Script generated with Claude ({} sections)", sections.len()));
        sections
    } else {
        logi("Using template script generation...");
        let app = text_at(dna, &["app", "name"], DEFAULT_APP_NAME);
        template_sections(&req.hook, req.duration, language, &app)
    };

    if req.fillers {
        for section in sections.iter_mut() {
            section.fillers = section.tone.fillers().iter().map(|s| s.to_string()).collect();
        }
    }

    let full_text = sections
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let words = word_count(&full_text);
    let estimate = estimate_speech_seconds(words);
    if !within_tolerance(estimate, req.duration) {
        logw(format!(
            "Estimated speech {:.1}s is outside {:.0}% of the {}s target",
            estimate,
            DURATION_TOLERANCE * 100.0,
            req.duration
        ));
    }

    Ok(Script {
        id: init::generate_file_id(),
        timestamp: init::now_iso(),
        hook_id: req.hook.id.clone(),
        hook_text: req.hook.text.clone(),
        actor: actor_id,
        actor_config: actor.clone(),
        language,
        duration: req.duration,
        script_sections: sections,
        full_text,
        word_count: words,
        estimated_speech_duration: estimate,
    })
}

pub fn default_script_path(scripts_dir: &Path, script: &Script) -> PathBuf {
    scripts_dir.join(format!("script_{}.json", script.id))
}

pub async fn save_script(script: &Script, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, serde_json::to_string_pretty(script)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    logok(format!("Script generated: {}", path.display()));
    Ok(())
}

pub async fn load_script(path: &Path) -> Result<Script> {
    if !path.exists() {
        return Err(StudioError::missing_file(path).into());
    }
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse script {}", path.display()))
}

pub fn print_script_summary(script: &Script) {
    println!("Script Summary ({}s)", script.duration);
    println!("{:<16} {:<53} {:>8}  {}", "Section", "Text", "Duration", "Tone");
    for s in &script.script_sections {
        println!(
            "{:<16} {:<53} {:>8}  {}",
            s.section,
            truncate_label(&s.text, 50),
            format!("{}s", s.duration),
            s.tone
        );
    }
    println!(
        "Total: {} words, ~{:.1}s speech",
        script.word_count, script.estimated_speech_duration
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(text: &str) -> Hook {
        Hook {
            id: "hook_001".to_string(),
            text: text.to_string(),
            style: "problem".to_string(),
            estimated_duration: 5,
            call_to_action: "Essaie gratuitement".to_string(),
        }
    }

    #[test]
    fn durations_are_validated() {
        assert!(validate_duration(30).is_ok());
        assert!(validate_duration(45).is_err());
    }

    #[test]
    fn fit_durations_hits_target_exactly() {
        let mut sections = vec![
            ScriptSection::new("hook", "a".into(), 4, Tone::Engaging),
            ScriptSection::new("problem", "b".into(), 6, Tone::Relatable),
            ScriptSection::new("cta", "c".into(), 3, Tone::Urgent),
        ];
        fit_durations(&mut sections, 30);
        assert_eq!(sections.iter().map(|s| s.duration).sum::<u32>(), 30);

        let mut zeros = vec![
            ScriptSection::new("hook", "a".into(), 0, Tone::Engaging),
            ScriptSection::new("cta", "c".into(), 0, Tone::Urgent),
        ];
        fit_durations(&mut zeros, 15);
        assert_eq!(zeros.iter().map(|s| s.duration).sum::<u32>(), 15);
    }

    #[test]
    fn more_sections_than_seconds_fold_into_the_body() {
        let names = ["hook", "problem", "detail", "solution", "benefits", "cta"];
        let mut sections = names
            .iter()
            .map(|n| ScriptSection::new(n, n.to_string(), 5, Tone::Engaging))
            .collect::<Vec<_>>();
        fit_durations(&mut sections, 5);

        assert_eq!(sections.len(), 5);
        assert_eq!(sections.iter().map(|s| s.duration).sum::<u32>(), 5);
        assert!(sections.iter().all(|s| s.duration >= 1));
        assert_eq!(sections[0].section, "hook");
        assert_eq!(sections[4].section, "cta");
        assert_eq!(sections[3].text, "solution benefits");
    }

    #[test]
    fn huge_model_durations_are_capped_before_fitting() {
        let reply = r#"{"script_sections": [
            {"section": "hook", "text": "Yo", "duration": 4294967295},
            {"section": "cta", "text": "Go", "duration": 4294967295}
        ]}"#;
        let mut sections = parse_script_reply(reply, 15).unwrap();
        assert!(sections.iter().all(|s| s.duration == 15));
        fit_durations(&mut sections, 15);
        assert_eq!(sections.iter().map(|s| s.duration).sum::<u32>(), 15);

        let mut raw = vec![
            ScriptSection::new("hook", "a".into(), u32::MAX, Tone::Engaging),
            ScriptSection::new("cta", "b".into(), u32::MAX, Tone::Urgent),
        ];
        fit_durations(&mut raw, 30);
        assert_eq!(raw.iter().map(|s| s.duration).sum::<u32>(), 30);
    }

    #[test]
    fn templates_land_within_tolerance_for_every_language() {
        for language in [Language::Fr, Language::En, Language::Es] {
            for duration in [15, 30, 60] {
                let sections = template_sections(
                    &hook("Marre de perdre du temps chaque soir ?"),
                    duration,
                    language,
                    "Mila",
                );
                let words: usize = sections.iter().map(|s| word_count(&s.text)).sum();
                let estimate = estimate_speech_seconds(words);
                assert!(
                    within_tolerance(estimate, duration),
                    "{language} {duration}s: {estimate:.1}s"
                );
                assert_eq!(sections.iter().map(|s| s.duration).sum::<u32>(), duration);
                assert_eq!(sections.last().unwrap().section, "cta");
            }
        }
    }

    #[test]
    fn template_uses_hook_cta_and_app_name() {
        let sections = template_sections(&hook("Hi"), 30, Language::En, "Acme");
        assert_eq!(sections[0].text, "Hi");
        assert_eq!(sections[3].text, "Essaie gratuitement");
        assert!(sections[2].text.contains("Acme"));
        assert!(!sections.iter().any(|s| s.text.contains("{app}")));
    }

    #[test]
    fn unknown_tones_deserialize_as_neutral() {
        let reply = r#"{"script_sections": [{"section": "hook", "text": "Yo", "duration": 3, "tone": "sarcastic"}, {"section": "cta", "text": ""}]}"#;
        let sections = parse_script_reply(reply, 15).unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].tone, Tone::Neutral);
    }

    #[test]
    fn language_parse() {
        assert_eq!("EN".parse::<Language>().unwrap(), Language::En);
        assert!("de".parse::<Language>().is_err());
    }
}
