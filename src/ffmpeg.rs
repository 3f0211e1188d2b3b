use crate::api::snippet;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::process::Command;

/// Runs `args[0]` with the remaining args; a failure carries the tail of stderr.
pub(crate) async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    tracing::debug!("exec: {}", args.join(" "));
    let output = cmd
        .output()
        .await
        .with_context(|| format!("Failed to start {}", args[0]))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr
            .lines()
            .rev()
            .filter(|l| !l.trim().is_empty())
            .take(8)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        return Err(anyhow::anyhow!(
            "{} failed ({}): {}",
            args[0],
            output.status,
            snippet(&tail, 2000)
        ));
    }

    Ok(())
}

pub async fn ffmpeg_available() -> bool {
    match Command::new("ffmpeg").arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Container duration in seconds as reported by ffprobe.
pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(path)
        .output()
        .await
        .with_context(|| format!("Failed to run ffprobe on {}", path.display()))?;
    if !output.status.success() {
        anyhow::bail!("ffprobe could not read {}", path.display());
    }

    let reported = String::from_utf8_lossy(&output.stdout);
    match reported.trim().parse::<f64>() {
        Ok(seconds) if seconds > 0.1 => Ok(seconds),
        _ => anyhow::bail!(
            "ffprobe reported no usable duration for {}: '{}'",
            path.display(),
            reported.trim()
        ),
    }
}

/// Runs a prepared ffmpeg invocation and confirms the output landed.
pub async fn ffmpeg_render(args: &[String], out_mp4: &Path) -> Result<bool> {
    run_cmd(args).await?;
    Ok(out_mp4.exists())
}
