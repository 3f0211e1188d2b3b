use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub mod api;
pub mod assemble;
pub mod briefing;
pub mod budget;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod hooks;
pub mod init;
pub mod pipeline;
pub mod script;
pub mod setup;
pub mod studio;
pub mod tts;
pub mod video;

pub use error::StudioError;
pub use studio::Studio;

pub type StudioLogHook = Arc<Mutex<dyn Fn(&str) + Send + Sync + 'static>>;

static LOG_HOOK: Lazy<Mutex<Option<StudioLogHook>>> = Lazy::new(|| Mutex::new(None));

pub fn set_log_hook(hook: Option<StudioLogHook>) {
    if let Ok(mut guard) = LOG_HOOK.lock() {
        *guard = hook;
    }
}

/// Mirrors every tagged console line into `path` for the rest of the process.
pub fn install_log_file(path: &Path) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    let file = Mutex::new(file);

    let hook: StudioLogHook = Arc::new(Mutex::new(move |line: &str| {
        if let Ok(mut f) = file.lock() {
            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let _ = writeln!(f, "{} {}", stamp, line);
        }
    }));
    set_log_hook(Some(hook));
    Ok(())
}

pub(crate) fn logv(tag: &str, message: &str) {
    eprintln!("[{}] {}", tag, message);

    if let Ok(guard) = LOG_HOOK.lock() {
        if let Some(hook) = guard.as_ref() {
            if let Ok(callback) = hook.lock() {
                let line = format!("[{}] {}", tag, message);
                callback(&line);
            }
        }
    }
}

pub fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}

pub fn loge(message: impl AsRef<str>) {
    logv("ERROR", message.as_ref());
}
