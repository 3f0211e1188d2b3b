use crate::api::TextGenerator;
use crate::api::anthropic::extract_json_object;
use crate::briefing::Brief;
use crate::budget::{BudgetTracker, truncate_label};
use crate::error::StudioError;
use crate::init;
use crate::{logi, logok};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

pub const MIN_HOOKS: usize = 1;
pub const MAX_HOOKS: usize = 10;
const DEFAULT_HOOK_SECONDS: u32 = 5;
const FALLBACK_CTA: &str = "Essaie gratuitement";
pub const DEFAULT_HOOK_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStyle {
    Problem,
    Solution,
    Curiosity,
    All,
}

impl HookStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            HookStyle::Problem => "problem",
            HookStyle::Solution => "solution",
            HookStyle::Curiosity => "curiosity",
            HookStyle::All => "all",
        }
    }

    fn guidance(self) -> &'static str {
        match self {
            HookStyle::Problem => "Lead with the pain point (e.g. 'Tired of throwing food away?')",
            HookStyle::Solution => "Lead with the benefit (e.g. '2 minutes to plan your meals')",
            HookStyle::Curiosity => "Create intrigue (e.g. 'What organised parents do differently')",
            HookStyle::All => "A mix of problem, solution and curiosity hooks",
        }
    }
}

impl fmt::Display for HookStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookStyle {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "problem" => Ok(HookStyle::Problem),
            "solution" => Ok(HookStyle::Solution),
            "curiosity" => Ok(HookStyle::Curiosity),
            "all" => Ok(HookStyle::All),
            _ => Err(StudioError::InvalidChoice {
                kind: "style",
                value: s.to_string(),
                allowed: "problem, solution, curiosity, all",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    pub id: String,
    pub text: String,
    pub style: String,
    pub estimated_duration: u32,
    pub call_to_action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookSet {
    pub id: String,
    pub timestamp: String,
    pub style: String,
    pub count: usize,
    pub hooks: Vec<Hook>,
}

impl HookSet {
    pub fn new(style: &str, hooks: Vec<Hook>) -> Self {
        Self {
            id: init::generate_file_id(),
            timestamp: init::now_iso(),
            style: style.to_string(),
            count: hooks.len(),
            hooks,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HookRequest {
    pub style: HookStyle,
    pub count: usize,
    pub dry_run: bool,
}

pub fn hook_id(index: usize) -> String {
    format!("hook_{:03}", index)
}

pub fn validate_count(count: usize) -> Result<(), StudioError> {
    if !(MIN_HOOKS..=MAX_HOOKS).contains(&count) {
        return Err(StudioError::OutOfRange(format!(
            "Hook count must be between {} and {}, got {}",
            MIN_HOOKS, MAX_HOOKS, count
        )));
    }
    Ok(())
}

/// Placeholder hooks produced without calling the model.
pub fn simulated_hooks(brief: &Brief, style: HookStyle, count: usize) -> Vec<Hook> {
    let target = brief.primary_target();
    let target = if target.is_empty() { "parents".to_string() } else { target };
    let cta = brief
        .primary_cta()
        .unwrap_or_else(|| format!("Télécharge {} maintenant!", brief.app_name()));
    (1..=count)
        .map(|i| Hook {
            id: hook_id(i),
            text: format!("[SIMULATED] Hook #{} for {} style targeting {}", i, style, target),
            style: style.to_string(),
            estimated_duration: 30,
            call_to_action: cta.clone(),
        })
        .collect()
}

const HOOK_SYSTEM_PROMPT: &str = "You are an expert marketing copywriter writing short-form video ad hooks.

Rules:
- Hooks are short: 5-15 words ideally, 20 words at most
- Authentic style, like a friend sharing a solution
- Avoid superlatives (\"revolutionary\", \"magic\", \"incredible\")
- Prefer simple words: simple, concrete, true, finally, free
- Tone: kind, pragmatic, a little imperfect, honest
- Write in the language of the product tagline

Return ONLY valid JSON with this exact shape:
{
  \"hooks\": [
    {\"id\": \"hook_001\", \"text\": \"...\", \"estimated_duration\": 5, \"call_to_action\": \"...\", \"style\": \"problem\"}
  ]
}";

fn hook_user_prompt(brief: &Brief, style: HookStyle, count: usize) -> String {
    format!(
        "Generate {count} hooks in the '{style}' style for {app}.\n\nStyle '{style}' means: {guidance}\n\nContext:\n- Tagline: \"{tagline}\"\n- Main problem: {problem}\n- Target audience: {target}\n- Tone: {voice}\n\nGenerate {count} hooks, all different.",
        count = count,
        style = style,
        app = brief.app_name(),
        guidance = style.guidance(),
        tagline = brief.tagline(),
        problem = brief.main_problem(),
        target = brief.primary_target(),
        voice = brief.voice(),
    )
}

#[derive(Debug, Deserialize)]
struct HookReply {
    #[serde(default)]
    hooks: Vec<HookDraft>,
}

#[derive(Debug, Deserialize)]
struct HookDraft {
    id: Option<String>,
    text: Option<String>,
    style: Option<String>,
    estimated_duration: Option<u32>,
    call_to_action: Option<String>,
}

/// Parses a model reply into exactly `count` hooks, filling missing fields.
pub fn parse_hooks_reply(
    reply: &str,
    style: HookStyle,
    count: usize,
    default_cta: &str,
) -> Result<Vec<Hook>> {
    let value = extract_json_object(reply)?;
    let parsed: HookReply = serde_json::from_value(value).context("Unexpected hook JSON shape")?;

    let hooks = parsed
        .hooks
        .into_iter()
        .filter_map(|draft| {
            let text = draft.text?.trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some((draft.id, text, draft.style, draft.estimated_duration, draft.call_to_action))
        })
        .take(count)
        .enumerate()
        .map(|(i, (id, text, hook_style, duration, cta))| Hook {
            id: id.filter(|s| !s.is_empty()).unwrap_or_else(|| hook_id(i + 1)),
            text,
            style: hook_style.unwrap_or_else(|| style.to_string()),
            estimated_duration: duration.unwrap_or(DEFAULT_HOOK_SECONDS),
            call_to_action: cta
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default_cta.to_string()),
        })
        .collect::<Vec<_>>();

    if hooks.len() < count {
        anyhow::bail!("Model returned {} usable hooks, expected {}", hooks.len(), count);
    }
    Ok(hooks)
}

/// Produces a hook set; dry runs never reach the model or the ledger.
pub async fn generate_hooks(
    generator: Option<&dyn TextGenerator>,
    budget: &mut BudgetTracker,
    brief: &Brief,
    req: &HookRequest,
) -> Result<HookSet> {
    validate_count(req.count)?;

    if req.dry_run {
        logi("[DRY RUN] Simulating hook generation...");
        return Ok(HookSet::new(req.style.as_str(), simulated_hooks(brief, req.style, req.count)));
    }

    let generator = generator.context("A text generator is required outside dry-run")?;
    logi("Generating hooks with Claude...");
    let reply = generator
        .complete(HOOK_SYSTEM_PROMPT, &hook_user_prompt(brief, req.style, req.count), 2000)
        .await?;

    let default_cta = brief.primary_cta().unwrap_or_else(|| FALLBACK_CTA.to_string());
    let hooks = parse_hooks_reply(&reply, req.style, req.count, &default_cta)?;
    logok(format!("Generated {} hooks using Claude", hooks.len()));

    budget
        .append(
            generator.service(),
            1.0,
            &format!("Generated {} hooks", req.count),
        )
        .await?;

    Ok(HookSet::new(req.style.as_str(), hooks))
}

pub fn default_hooks_path(hooks_dir: &Path, set: &HookSet) -> PathBuf {
    hooks_dir.join(format!("hooks_{}.json", set.id))
}

pub async fn save_hook_set(set: &HookSet, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, serde_json::to_string_pretty(set)?)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    logok(format!("Hooks saved: {}", path.display()));
    Ok(())
}

/// Reads either a hook set (`{"hooks": [...]}`) or a single hook object.
pub async fn load_hooks_file(path: &Path) -> Result<Vec<Hook>> {
    if !path.exists() {
        return Err(StudioError::missing_file(path).into());
    }
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;

    if let Some(list) = value.get("hooks") {
        let hooks: Vec<Hook> = serde_json::from_value(list.clone())
            .with_context(|| format!("Unexpected hooks in {}", path.display()))?;
        return Ok(hooks);
    }
    let hook: Hook = serde_json::from_value(value)
        .with_context(|| format!("{} holds neither a hook set nor a hook", path.display()))?;
    Ok(vec![hook])
}

/// Looks `hook_id` up across every `hooks_*.json` in `hooks_dir`, newest file first.
pub async fn find_hook_by_id(hooks_dir: &Path, hook_id: &str) -> Result<Option<(Hook, PathBuf)>> {
    if !hooks_dir.is_dir() {
        return Ok(None);
    }
    let mut files = Vec::new();
    let mut entries = fs::read_dir(hooks_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("hooks_") && name.ends_with(".json") {
            files.push(path);
        }
    }
    files.sort();
    files.reverse();

    for file in files {
        let hooks = match load_hooks_file(&file).await {
            Ok(hooks) => hooks,
            Err(err) => {
                tracing::warn!("Skipping unreadable hooks file {}: {:#}", file.display(), err);
                continue;
            }
        };
        if let Some(hook) = hooks.into_iter().find(|h| h.id == hook_id) {
            return Ok(Some((hook, file)));
        }
    }
    Ok(None)
}

pub fn print_hooks_table(set: &HookSet) {
    println!("Generated Hooks ({} style)", set.style);
    println!("{:<10} {:<60} {}", "ID", "Hook Text", "CTA");
    for hook in &set.hooks {
        println!(
            "{:<10} {:<60} {}",
            hook.id,
            truncate_label(&hook.text, 57),
            truncate_label(&hook.call_to_action, 25)
        );
    }
}

/// Where a generated set goes: an explicit `output` is always written,
/// otherwise the default path unless saving is turned off.
pub fn save_target(hooks_dir: &Path, set: &HookSet, save: bool, output: Option<PathBuf>) -> Option<PathBuf> {
    match output {
        Some(path) => Some(path),
        None if save => Some(default_hooks_path(hooks_dir, set)),
        None => None,
    }
}

/// Picks the hook a script is written from: the first hook of an existing
/// `hook_file`, else `hook_id` looked up across saved sets.
pub async fn select_hook(hooks_dir: &Path, hook_file: Option<&Path>, hook_id: Option<&str>) -> Result<Hook> {
    if let Some(file) = hook_file.filter(|f| f.exists()) {
        return load_hooks_file(file)
            .await?
            .into_iter()
            .next()
            .with_context(|| format!("No hooks in {}", file.display()));
    }
    if let Some(id) = hook_id {
        let (hook, file) = find_hook_by_id(hooks_dir, id)
            .await?
            .with_context(|| format!("Hook '{}' not found in {}", id, hooks_dir.display()))?;
        logi(format!("Found hook {} in {}", id, file.display()));
        return Ok(hook);
    }
    match hook_file {
        Some(file) => Err(StudioError::missing_file(file).into()),
        None => anyhow::bail!("Provide a hooks file or --hook-id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved_set(dir: &Path, ids: &[&str]) -> (HookSet, PathBuf) {
        let hooks = ids
            .iter()
            .map(|id| Hook {
                id: id.to_string(),
                text: format!("Text of {}", id),
                style: "problem".to_string(),
                estimated_duration: 5,
                call_to_action: FALLBACK_CTA.to_string(),
            })
            .collect();
        let set = HookSet::new("problem", hooks);
        (set.clone(), default_hooks_path(dir, &set))
    }

    #[test]
    fn explicit_output_is_written_even_without_save() {
        let dir = Path::new("outputs/hooks");
        let (set, default) = saved_set(dir, &["hook_001"]);
        let custom = PathBuf::from("mine.json");
        assert_eq!(save_target(dir, &set, false, Some(custom.clone())), Some(custom.clone()));
        assert_eq!(save_target(dir, &set, true, Some(custom.clone())), Some(custom));
        assert_eq!(save_target(dir, &set, true, None), Some(default));
        assert_eq!(save_target(dir, &set, false, None), None);
    }

    #[tokio::test]
    async fn hook_file_takes_priority_over_hook_id() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let (older, older_path) = saved_set(dir, &["hook_007"]);
        save_hook_set(&older, &older_path).await.unwrap();
        let file = dir.join("picked.json");
        let (picked, _) = saved_set(dir, &["hook_001", "hook_002"]);
        save_hook_set(&picked, &file).await.unwrap();

        let hook = select_hook(dir, Some(file.as_path()), Some("hook_007")).await.unwrap();
        assert_eq!(hook.id, "hook_001");

        let missing = dir.join("gone.json");
        let hook = select_hook(dir, Some(missing.as_path()), Some("hook_007")).await.unwrap();
        assert_eq!(hook.id, "hook_007");

        let err = select_hook(dir, Some(missing.as_path()), None).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<StudioError>(), Some(StudioError::MissingFile(_))));
        assert!(select_hook(dir, None, None).await.is_err());
    }

    #[test]
    fn style_parsing_rejects_unknown_tags() {
        assert_eq!("Curiosity".parse::<HookStyle>().unwrap(), HookStyle::Curiosity);
        let err = "funny".parse::<HookStyle>().unwrap_err();
        assert!(err.to_string().contains("problem, solution, curiosity, all"));
    }

    #[test]
    fn default_count_is_three() {
        assert_eq!(DEFAULT_HOOK_COUNT, 3);
        assert!(validate_count(DEFAULT_HOOK_COUNT).is_ok());
    }

    #[test]
    fn count_bounds() {
        assert!(validate_count(1).is_ok());
        assert!(validate_count(10).is_ok());
        assert!(validate_count(0).is_err());
        assert!(validate_count(11).is_err());
    }

    #[test]
    fn reply_fields_are_defaulted() {
        let reply = r#"Sure! {"hooks": [{"text": "Marre de jeter de la nourriture ?"}, {"id": "h2", "text": "Enfin simple", "call_to_action": "Go", "estimated_duration": 7}]}"#;
        let hooks = parse_hooks_reply(reply, HookStyle::Problem, 2, "Essaie").unwrap();
        assert_eq!(hooks[0].id, "hook_001");
        assert_eq!(hooks[0].style, "problem");
        assert_eq!(hooks[0].estimated_duration, 5);
        assert_eq!(hooks[0].call_to_action, "Essaie");
        assert_eq!(hooks[1].id, "h2");
        assert_eq!(hooks[1].estimated_duration, 7);
    }

    #[test]
    fn extra_hooks_are_truncated_and_missing_ones_fail() {
        let reply = r#"{"hooks": [{"text": "a"}, {"text": "b"}, {"text": "c"}]}"#;
        assert_eq!(parse_hooks_reply(reply, HookStyle::All, 2, "x").unwrap().len(), 2);
        assert!(parse_hooks_reply(reply, HookStyle::All, 4, "x").is_err());
    }

    #[tokio::test]
    async fn single_hook_files_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("one.json");
        std::fs::write(
            &path,
            r#"{"id": "hook_009", "text": "Hi", "style": "custom", "estimated_duration": 5, "call_to_action": "Go"}"#,
        )
        .unwrap();
        let hooks = load_hooks_file(&path).await.unwrap();
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].id, "hook_009");
    }

    #[tokio::test]
    async fn hook_lookup_scans_hook_sets() {
        let tmp = tempfile::tempdir().unwrap();
        let set = HookSet::new(
            "problem",
            vec![Hook {
                id: "hook_042".to_string(),
                text: "Found me".to_string(),
                style: "problem".to_string(),
                estimated_duration: 5,
                call_to_action: "Go".to_string(),
            }],
        );
        save_hook_set(&set, &default_hooks_path(tmp.path(), &set)).await.unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let (hook, file) = find_hook_by_id(tmp.path(), "hook_042").await.unwrap().unwrap();
        assert_eq!(hook.text, "Found me");
        assert!(file.file_name().unwrap().to_string_lossy().starts_with("hooks_"));
        assert!(find_hook_by_id(tmp.path(), "hook_999").await.unwrap().is_none());
    }
}
