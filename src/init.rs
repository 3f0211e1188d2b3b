use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const OUTPUT_SUBDIRS: &[&str] = &[
    "hooks",
    "scripts",
    "audio",
    "video_raw",
    "video_final",
    "logs",
];

/// Path conventions of a studio directory.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    /// Product description candidates, most specific first.
    pub fn dna_candidates(&self) -> Vec<PathBuf> {
        let mut out = vec![self.root.join("dna.json")];
        if let Some(parent) = self.root.parent() {
            out.push(parent.join("dna.json"));
        }
        out
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn logo_file(&self) -> PathBuf {
        self.assets_dir().join("logo.png")
    }

    pub fn music_file(&self, template: &str) -> PathBuf {
        self.assets_dir()
            .join("music")
            .join(format!("{}_music.mp3", template))
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join("outputs")
    }

    pub fn output_subdir(&self, name: &str) -> PathBuf {
        self.outputs_dir().join(name)
    }

    pub fn briefing_file(&self) -> PathBuf {
        self.outputs_dir().join("briefing.json")
    }

    pub fn ledger_file(&self) -> PathBuf {
        self.outputs_dir().join("expenses.json")
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.output_subdir("hooks")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.output_subdir("scripts")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.output_subdir("audio")
    }

    pub fn video_raw_dir(&self) -> PathBuf {
        self.output_subdir("video_raw")
    }

    pub fn video_final_dir(&self) -> PathBuf {
        self.output_subdir("video_final")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.output_subdir("logs")
    }

    /// Resolves a config-relative path (actor portraits, voice samples).
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

pub async fn ensure_directories(layout: &Layout) -> Result<()> {
    for dir in OUTPUT_SUBDIRS {
        let path = layout.output_subdir(dir);
        if !path.exists() {
            fs::create_dir_all(&path).await?;
            tracing::debug!("Created directory: {}", path.display());
        }
    }
    Ok(())
}

/// `<unix-seconds>-<8 hex chars>`, used to name every generated artifact.
pub fn generate_file_id() -> String {
    format!("{}-{:08x}", unix_timestamp(), rand::random::<u32>())
}

pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn now_iso() -> String {
    chrono::Local::now().to_rfc3339()
}
