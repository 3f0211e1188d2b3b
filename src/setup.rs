use crate::briefing;
use crate::config::{Config, Credentials};
use crate::ffmpeg;
use crate::init::{Layout, OUTPUT_SUBDIRS};
use crate::{logi, logok, logw};
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

/// Outcome of `test-setup`; errors fail the check, warnings do not.
#[derive(Debug, Default)]
pub struct SetupReport {
    pub passed: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl SetupReport {
    fn pass(&mut self, message: String) {
        logok(&message);
        self.passed.push(message);
    }

    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    fn fail(&mut self, message: String) {
        self.errors.push(message);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn print_summary(&self) {
        println!("Setup Test Summary");
        if !self.errors.is_empty() {
            println!("Critical errors:");
            for e in &self.errors {
                println!("  - {}", e);
            }
        }
        if !self.warnings.is_empty() {
            println!("Warnings:");
            for w in &self.warnings {
                println!("  - {}", w);
            }
        }
        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("All tests passed! Setup is complete.");
        } else if self.errors.is_empty() {
            println!("Setup is functional, some optional pieces are missing.");
        }
    }
}

pub fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

pub async fn run_setup_check(layout: &Layout) -> SetupReport {
    let mut report = SetupReport::default();

    logi("Checking DNA file...");
    match briefing::find_dna_file(layout, None) {
        Ok(path) => match briefing::load_dna(&path).await {
            Ok(_) => report.pass(format!("DNA file parsed: {}", path.display())),
            Err(err) => report.fail(format!("DNA file corrupted: {:#}", err)),
        },
        Err(_) => report.fail("DNA file not found".to_string()),
    }

    logi("Checking config file...");
    let config = match Config::load(layout.config_file()).await {
        Ok(config) => {
            report.pass(format!("Config loaded: {} actors", config.actors.len()));
            config
        }
        Err(err) => {
            report.fail(format!("Config loading failed: {:#}", err));
            Config::default()
        }
    };

    logi("Checking actor portraits...");
    for (actor_id, actor) in &config.actors {
        let portrait = layout.resolve(&actor.portrait);
        if portrait.is_file() {
            report.pass(format!("{}: portrait found", actor_id));
        } else {
            report.warn(format!("Actor {}: portrait missing ({})", actor_id, portrait.display()));
        }
    }

    logi("Checking output directories...");
    for name in OUTPUT_SUBDIRS {
        let dir = layout.output_subdir(name);
        if dir.is_dir() {
            report.pass(format!("{}: {} files", name, count_files(&dir)));
        } else {
            match fs::create_dir_all(&dir).await {
                Ok(()) => report.pass(format!("{}: created", name)),
                Err(err) => report.fail(format!("Cannot create {}: {}", dir.display(), err)),
            }
        }
    }

    logi("Checking external tools...");
    if ffmpeg::ffmpeg_available().await {
        report.pass("FFmpeg: available".to_string());
    } else {
        report.warn("FFmpeg not found - post-production will not work".to_string());
    }

    logi("Checking credentials...");
    let credentials = Credentials::load(layout);
    match credentials.anthropic() {
        Ok(_) => report.pass("Claude: API key found".to_string()),
        Err(err) => report.warn(format!("{} - hook and script generation will not work", err)),
    }
    report.pass("Chatterbox: local engine built in".to_string());
    match credentials.elevenlabs() {
        Ok(_) => report.pass("ElevenLabs: API key found".to_string()),
        Err(_) => logw("ElevenLabs: no API key (optional)"),
    }
    match credentials.fal() {
        Ok(_) => report.pass("fal.ai: API key found".to_string()),
        Err(err) => report.warn(format!("{} - video generation will not work", err)),
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_nested_files_only() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        std::fs::write(tmp.path().join("a/one.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("a/b/two.json"), "{}").unwrap();
        assert_eq!(count_files(tmp.path()), 2);
    }

    #[tokio::test]
    async fn missing_dna_and_config_are_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path().join("studio"));
        let report = run_setup_check(&layout).await;
        assert!(!report.is_ok());
        assert!(report.errors.iter().any(|e| e == "DNA file not found"));
        assert!(report.errors.iter().any(|e| e.starts_with("Config loading failed")));
        assert!(layout.hooks_dir().is_dir());
    }

    #[tokio::test]
    async fn complete_setup_has_no_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("studio");
        std::fs::create_dir_all(root.join("actors")).unwrap();
        std::fs::write(root.join("dna.json"), r#"{"app": {"name": "Mila"}}"#).unwrap();
        std::fs::write(
            root.join("config.json"),
            r#"{"actors": {"alex": {"name": "Alex", "portrait": "actors/alex.png"}, "zoe": {"name": "Zoé", "portrait": "actors/zoe.png"}}}"#,
        )
        .unwrap();
        std::fs::write(root.join("actors/alex.png"), b"png").unwrap();

        let report = run_setup_check(&Layout::new(&root)).await;
        assert!(report.is_ok(), "{:?}", report.errors);
        assert!(report.warnings.iter().any(|w| w.contains("zoe")));
        assert!(report.passed.iter().any(|p| p == "Config loaded: 2 actors"));
    }
}
