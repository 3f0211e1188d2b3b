//! Post-production: logo overlay, timed captions and background music on
//! top of a raw clip, in one ffmpeg pass.

use crate::error::StudioError;
use crate::ffmpeg;
use crate::init::{self, Layout};
use crate::script::Script;
use crate::video::{VideoArtifact, VideoFormat};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

const CAPTION_WRAP_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    TalkingHead,
    SplitScreen,
    ProblemSolution,
}

/// Where captions sit and how large they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtitleStyle {
    pub y: &'static str,
    pub font_size: u32,
}

impl Template {
    pub fn as_str(self) -> &'static str {
        match self {
            Template::TalkingHead => "talking_head",
            Template::SplitScreen => "split_screen",
            Template::ProblemSolution => "problem_solution",
        }
    }

    pub fn for_format(format: VideoFormat) -> Self {
        match format {
            VideoFormat::Vertical => Template::TalkingHead,
            VideoFormat::Horizontal => Template::SplitScreen,
            VideoFormat::Square => Template::ProblemSolution,
        }
    }

    pub fn subtitle_style(self) -> SubtitleStyle {
        match self {
            Template::TalkingHead => SubtitleStyle {
                y: "h-th-100",
                font_size: 32,
            },
            Template::SplitScreen => SubtitleStyle { y: "50", font_size: 28 },
            Template::ProblemSolution => SubtitleStyle {
                y: "h-th-80",
                font_size: 30,
            },
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Template {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "talking_head" => Ok(Template::TalkingHead),
            "split_screen" => Ok(Template::SplitScreen),
            "problem_solution" => Ok(Template::ProblemSolution),
            _ => Err(StudioError::InvalidChoice {
                kind: "template",
                value: s.to_string(),
                allowed: "talking_head, split_screen, problem_solution",
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssembleOptions {
    pub template: Option<Template>,
    pub format: VideoFormat,
    pub subtitles: bool,
    pub music: bool,
    pub logo: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            template: None,
            format: VideoFormat::Vertical,
            subtitles: true,
            music: true,
            logo: true,
        }
    }
}

impl AssembleOptions {
    pub fn template(&self) -> Template {
        self.template.unwrap_or_else(|| Template::for_format(self.format))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// One caption per script section, timed by the cumulative section durations.
pub fn caption_timeline(script: &Script) -> Vec<Caption> {
    let mut captions = Vec::new();
    let mut t = 0.0;
    for section in &script.script_sections {
        let start = t;
        t += section.duration as f64;
        let text = section.text.trim();
        if !text.is_empty() {
            captions.push(Caption {
                text: text.to_string(),
                start,
                end: t,
            });
        }
    }
    if captions.is_empty() && !script.full_text.trim().is_empty() {
        captions.push(Caption {
            text: script.full_text.trim().to_string(),
            start: 0.0,
            end: script.duration as f64,
        });
    }
    captions
}

pub fn wrap_words(text: &str, max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines.join("\n")
}

/// Escapes a filter option value for both the option and the filtergraph level.
pub fn escape_filter_value(value: &str) -> String {
    let mut option = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            option.push('\\');
        }
        option.push(c);
    }

    let mut graph = String::with_capacity(option.len());
    for c in option.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph.push('\\');
        }
        graph.push(c);
    }
    graph
}

fn drawtext_filter(textfile: &Path, caption: &Caption, style: SubtitleStyle) -> String {
    format!(
        "drawtext=textfile={}:expansion=none:x=(w-text_w)/2:y={}:fontsize={}:fontcolor=white:bordercolor=black:borderw=2:line_spacing=8:enable={}",
        escape_filter_value(&textfile.to_string_lossy()),
        style.y,
        style.font_size,
        escape_filter_value(&format!(
            "between(t,{:.3},{:.3})",
            caption.start, caption.end
        )),
    )
}

/// Optional layers resolved on disk, ready to turn into an ffmpeg command line.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInputs {
    pub logo: Option<PathBuf>,
    pub music: Option<PathBuf>,
    /// Caption and the text file holding its wrapped lines.
    pub captions: Vec<(Caption, PathBuf)>,
}

pub fn build_ffmpeg_args(
    input: &Path,
    output: &Path,
    template: Template,
    inputs: &AssemblyInputs,
) -> Vec<String> {
    let mut args = vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        input.display().to_string(),
    ];
    let mut filters: Vec<String> = Vec::new();
    let mut video = "0:v".to_string();
    let mut audio = "0:a?".to_string();
    let mut next_input = 1;

    if let Some(logo) = &inputs.logo {
        args.push("-i".to_string());
        args.push(logo.display().to_string());
        filters.push(format!("[0:v][{}:v]overlay=W-w-20:H-h-20[logo]", next_input));
        next_input += 1;
        video = "[logo]".to_string();
    }

    if !inputs.captions.is_empty() {
        let style = template.subtitle_style();
        let chain = inputs
            .captions
            .iter()
            .map(|(caption, file)| drawtext_filter(file, caption, style))
            .collect::<Vec<_>>()
            .join(",");
        let source = if video.starts_with('[') {
            video.clone()
        } else {
            format!("[{}]", video)
        };
        filters.push(format!("{}{}[subtitled]", source, chain));
        video = "[subtitled]".to_string();
    }

    if let Some(music) = &inputs.music {
        args.push("-i".to_string());
        args.push(music.display().to_string());
        filters.push(format!(
            "[0:a][{}:a]amix=inputs=2:duration=first:weights=1 0.2[audio_out]",
            next_input
        ));
        audio = "[audio_out]".to_string();
    }

    if !filters.is_empty() {
        args.push("-filter_complex".to_string());
        args.push(filters.join(";"));
        args.push("-map".to_string());
        args.push(video);
        args.push("-map".to_string());
        args.push(audio);
    }

    args.extend(
        [
            "-c:v",
            "libx264",
            "-preset",
            "fast",
            "-crf",
            "23",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-movflags",
            "+faststart",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(output.display().to_string());
    args
}

fn captions_dir(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "final".to_string());
    output.with_file_name(format!("{}_captions", stem))
}

/// Checks optional assets and writes caption text files next to `output`.
pub async fn prepare_inputs(
    layout: &Layout,
    script: Option<&Script>,
    options: &AssembleOptions,
    output: &Path,
) -> Result<AssemblyInputs> {
    let mut inputs = AssemblyInputs::default();

    if options.logo {
        let logo = layout.logo_file();
        if logo.is_file() {
            inputs.logo = Some(logo);
        } else {
            logw("Logo not found, skipping logo overlay");
        }
    }

    if options.music {
        let music = layout.music_file(options.template().as_str());
        if music.is_file() {
            inputs.music = Some(music);
        } else {
            logw("Background music not found, skipping");
        }
    }

    if options.subtitles {
        match script {
            Some(script) => {
                let dir = captions_dir(output);
                fs::create_dir_all(&dir)
                    .await
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
                for (i, caption) in caption_timeline(script).into_iter().enumerate() {
                    let file = dir.join(format!("{:02}.txt", i + 1));
                    fs::write(&file, wrap_words(&caption.text, CAPTION_WRAP_CHARS)).await?;
                    inputs.captions.push((caption, file));
                }
            }
            None => logw("No script file provided, subtitles will be disabled"),
        }
    }

    Ok(inputs)
}

pub fn default_final_path(video_final_dir: &Path, template: Template) -> PathBuf {
    video_final_dir.join(format!("final_{}_{}.mp4", template, init::unix_timestamp()))
}

pub async fn assemble_video(
    layout: &Layout,
    video: &Path,
    script: Option<&Script>,
    options: &AssembleOptions,
    output: &Path,
) -> Result<VideoArtifact> {
    if !video.exists() {
        return Err(StudioError::missing_file(video).into());
    }
    if !ffmpeg::ffmpeg_available().await {
        anyhow::bail!("FFmpeg not found. Install FFmpeg to use post-production");
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).await?;
    }

    let template = options.template();
    logi(format!("Assembling video with template: {}", template));
    let inputs = prepare_inputs(layout, script, options, output).await?;
    let args = build_ffmpeg_args(video, output, template, &inputs);

    let rendered = ffmpeg::ffmpeg_render(&args, output).await;
    if !inputs.captions.is_empty() {
        let _ = fs::remove_dir_all(captions_dir(output)).await;
    }
    if !rendered? {
        anyhow::bail!("ffmpeg finished but {} was not written", output.display());
    }

    let size_mb = fs::metadata(output)
        .await
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0);
    logok(format!("Video assembled: {} ({:.1} MB)", output.display(), size_mb));

    Ok(VideoArtifact {
        path: output.to_path_buf(),
        format: options.format.as_str().to_string(),
        actor: script.map(|s| s.actor.clone()).unwrap_or_default(),
        is_final: true,
    })
}
