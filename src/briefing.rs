use crate::error::StudioError;
use crate::init::{self, Layout};
use crate::{logi, logok};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Marketing brief derived from the product description (`dna.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brief {
    pub id: String,
    pub timestamp: String,
    #[serde(default)]
    pub app: Value,
    #[serde(default)]
    pub problem: Value,
    #[serde(default)]
    pub solution: Value,
    #[serde(default)]
    pub target: Value,
    #[serde(default)]
    pub tone: Value,
    #[serde(default)]
    pub proof: Value,
    #[serde(default)]
    pub cta: Value,
    #[serde(default)]
    pub marketing_angles: MarketingAngles,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketingAngles {
    #[serde(default)]
    pub problem: Vec<String>,
    #[serde(default)]
    pub solution: Vec<String>,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub tone: String,
}

impl Brief {
    pub fn from_dna(dna: &Value) -> Self {
        let section = |key: &str| dna.get(key).cloned().unwrap_or_else(|| Value::Object(Default::default()));
        Self {
            id: init::generate_file_id(),
            timestamp: init::now_iso(),
            app: section("app"),
            problem: section("problem"),
            solution: section("solution"),
            target: section("target"),
            tone: section("tone"),
            proof: section("proof"),
            cta: section("cta"),
            marketing_angles: MarketingAngles {
                problem: str_list(dna, &["problem", "emotional_triggers"]),
                solution: str_list(dna, &["solution", "differentiators"]),
                target_audience: text_at(dna, &["target", "primary"], ""),
                tone: text_at(dna, &["tone", "voice"], ""),
            },
        }
    }

    pub fn app_name(&self) -> String {
        text_at(&self.app, &["name"], "the app")
    }

    pub fn tagline(&self) -> String {
        text_at(&self.app, &["tagline"], "")
    }

    pub fn main_problem(&self) -> String {
        text_at(&self.problem, &["main"], "")
    }

    pub fn primary_target(&self) -> String {
        text_at(&self.target, &["primary"], "")
    }

    pub fn voice(&self) -> String {
        text_at(&self.tone, &["voice"], "")
    }

    pub fn primary_cta(&self) -> Option<String> {
        self.cta
            .get("primary")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// String at a nested path, or `default` when absent.
pub fn text_at(value: &Value, path: &[&str], default: &str) -> String {
    let mut cur = value;
    for key in path {
        match cur.get(key) {
            Some(next) => cur = next,
            None => return default.to_string(),
        }
    }
    cur.as_str().unwrap_or(default).to_string()
}

pub fn str_list(value: &Value, path: &[&str]) -> Vec<String> {
    let mut cur = value;
    for key in path {
        match cur.get(key) {
            Some(next) => cur = next,
            None => return Vec::new(),
        }
    }
    cur.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// First existing product description among `explicit` and the layout candidates.
pub fn find_dna_file(layout: &Layout, explicit: Option<&Path>) -> Result<PathBuf> {
    let mut searched = Vec::new();
    if let Some(path) = explicit {
        searched.push(path.to_path_buf());
    }
    searched.extend(layout.dna_candidates());

    for path in &searched {
        if path.is_file() {
            return Ok(path.clone());
        }
    }

    let list = searched
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    anyhow::bail!("DNA file not found. Searched in:\n{}", list)
}

pub async fn load_dna(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read DNA file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("DNA file corrupted: {}", path.display()))
}

/// DNA content if a description file exists; scripts fall back to an empty context.
pub async fn load_dna_optional(layout: &Layout) -> Value {
    match find_dna_file(layout, None) {
        Ok(path) => load_dna(&path).await.unwrap_or(Value::Null),
        Err(_) => Value::Null,
    }
}

pub async fn generate_briefing(
    layout: &Layout,
    dna_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(Brief, PathBuf)> {
    let dna_file = find_dna_file(layout, dna_path)?;
    logi(format!("Loading DNA from: {}", dna_file.display()));
    let dna = load_dna(&dna_file).await?;

    let brief = Brief::from_dna(&dna);
    let out = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| layout.briefing_file());
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&out, serde_json::to_string_pretty(&brief)?)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    logok(format!("Briefing generated: {}", out.display()));
    Ok((brief, out))
}

pub async fn load_briefing(layout: &Layout) -> Result<Brief> {
    let path = layout.briefing_file();
    if !path.exists() {
        return Err(StudioError::MissingFile(format!(
            "briefing {} (run 'briefing' first)",
            path.display()
        ))
        .into());
    }
    let content = fs::read_to_string(&path).await?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn print_summary(brief: &Brief) {
    println!("Marketing Brief Summary");
    println!("{:<16} {}", "App", brief.app_name());
    println!("{:<16} {}", "Tagline", brief.tagline());
    println!("{:<16} {}", "Target", brief.primary_target());
    println!("{:<16} {}", "Key Problems", brief.marketing_angles.problem.len());
    println!("{:<16} {}", "Differentiators", brief.marketing_angles.solution.len());
}
