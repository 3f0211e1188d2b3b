use ad_studio::assemble::{self, AssembleOptions, Template};
use ad_studio::briefing;
use ad_studio::budget::truncate_label;
use ad_studio::config;
use ad_studio::hooks::{self, HookRequest, HookStyle};
use ad_studio::init::{self, Layout};
use ad_studio::pipeline::{self, PipelineRequest};
use ad_studio::script::{self, Language, ScriptRequest};
use ad_studio::setup;
use ad_studio::tts::{self, TtsEngine};
use ad_studio::video::{self, VideoEngine, VideoFormat};
use ad_studio::{Studio, install_log_file, loge, logi, logok, logw};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "studio")]
#[command(about = "Short ad video studio: hooks, scripts, voice, lip-sync and final cut", long_about = None)]
struct Cli {
    /// Studio directory holding config.json, .env, assets/ and outputs/
    #[arg(long, global = true, env = "STUDIO_ROOT", default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the marketing brief from the product description
    Briefing {
        #[arg(long)]
        dna: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate marketing hooks from the brief
    GenerateHooks {
        /// problem | solution | curiosity | all
        #[arg(short, long, default_value = "problem")]
        style: HookStyle,
        #[arg(short, long, default_value_t = hooks::DEFAULT_HOOK_COUNT)]
        count: usize,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        no_save: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a narration script from a hook
    GenerateScript {
        /// Hooks JSON file (first hook is used); wins over --hook-id when it exists
        hook_file: Option<PathBuf>,
        /// Hook id looked up across saved hook files
        #[arg(long)]
        hook_id: Option<String>,
        #[arg(short, long)]
        actor: Option<String>,
        /// 15 | 30 | 60
        #[arg(short, long, default_value_t = 30)]
        duration: u32,
        #[arg(short, long, default_value = "fr")]
        lang: Language,
        #[arg(long)]
        no_fillers: bool,
        /// Use the free template generator instead of Claude
        #[arg(long)]
        no_claude: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List registered actors
    ListActors {
        #[arg(short, long, value_enum, default_value_t = ListFormat::Table)]
        format: ListFormat,
    },

    /// Show and manage the expense ledger
    Budget {
        #[command(subcommand)]
        action: Option<BudgetAction>,
    },

    /// Voice a script
    GenerateAudio {
        script_file: PathBuf,
        #[arg(short, long, default_value = "chatterbox")]
        engine: TtsEngine,
        #[arg(long, default_value_t = tts::DEFAULT_STABILITY)]
        stability: f32,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a lip-synced clip of an actor speaking an audio file
    GenerateVideo {
        audio_file: PathBuf,
        actor: String,
        #[arg(short, long, default_value = "vertical")]
        format: VideoFormat,
        #[arg(short, long, default_value = "seedance")]
        engine: VideoEngine,
        #[arg(long, default_value_t = video::DEFAULT_MOTION)]
        motion: f32,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Five-second greeting clip for one actor
    TestActor {
        actor: String,
        #[arg(short, long, default_value = "vertical")]
        format: VideoFormat,
        #[arg(long)]
        dry_run: bool,
    },

    /// Add subtitles, music and logo to a raw clip
    Assemble {
        video_file: PathBuf,
        script_file: Option<PathBuf>,
        #[command(flatten)]
        post: PostArgs,
    },

    /// Same as assemble, without subtitles from a script
    PostProd {
        video_file: PathBuf,
        #[command(flatten)]
        post: PostArgs,
    },

    /// hook → script → audio → video → final cut
    FullPipeline {
        hook_text: String,
        #[arg(short, long)]
        actor: String,
        #[arg(short, long, default_value_t = 15)]
        duration: u32,
        #[arg(short, long, default_value = "vertical")]
        format: VideoFormat,
        #[arg(short, long)]
        template: Option<Template>,
        #[arg(short, long, default_value = "fr")]
        lang: Language,
        #[arg(long, default_value = "chatterbox")]
        tts_engine: TtsEngine,
        #[arg(long, default_value = "seedance")]
        video_engine: VideoEngine,
        #[arg(long, conflicts_with = "confirm")]
        dry_run: bool,
        /// Skip the cost confirmation prompt
        #[arg(long)]
        confirm: bool,
    },

    /// Check configuration, assets, tools and credentials
    TestSetup,
}

#[derive(clap::Args)]
struct PostArgs {
    /// talking_head | split_screen | problem_solution (default follows --format)
    #[arg(short, long)]
    template: Option<Template>,
    #[arg(short, long, default_value = "vertical")]
    format: VideoFormat,
    #[arg(long)]
    no_subtitles: bool,
    #[arg(long)]
    no_music: bool,
    #[arg(long)]
    no_logo: bool,
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl PostArgs {
    fn options(&self) -> AssembleOptions {
        AssembleOptions {
            template: self.template,
            format: self.format,
            subtitles: !self.no_subtitles,
            music: !self.no_music,
            logo: !self.no_logo,
        }
    }
}

#[derive(Subcommand)]
enum BudgetAction {
    Show,
    Set { amount: f64 },
    Reset,
    Export {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ListFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            loge(format!("{:#}", err));
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let layout = Layout::new(&cli.root);
    // test-setup reports on missing directories itself
    if !matches!(cli.command, Commands::TestSetup) {
        init::ensure_directories(&layout)
            .await
            .context("Failed to create output directories")?;
    }
    if layout.logs_dir().is_dir() {
        let log_path = layout
            .logs_dir()
            .join(format!("studio_{}.log", init::generate_file_id()));
        if let Err(err) = install_log_file(&log_path) {
            logw(format!("{:#}", err));
        }
    }

    match cli.command {
        Commands::Briefing { dna, output } => {
            let (brief, _) = briefing::generate_briefing(&layout, dna.as_deref(), output.as_deref()).await?;
            briefing::print_summary(&brief);
        }

        Commands::TestSetup => {
            let report = setup::run_setup_check(&layout).await;
            report.print_summary();
            return Ok(if report.is_ok() { 0 } else { 1 });
        }

        Commands::GenerateHooks {
            style,
            count,
            dry_run,
            no_save,
            output,
        } => {
            let studio = Studio::open(&cli.root).await?;
            let brief = briefing::load_briefing(&studio.layout).await?;
            let generator = if dry_run { None } else { Some(studio.text_generator()?) };
            let mut budget = studio.budget().await?;
            let req = HookRequest { style, count, dry_run };
            let set = hooks::generate_hooks(generator.as_deref(), &mut budget, &brief, &req).await?;
            hooks::print_hooks_table(&set);
            if let Some(path) = hooks::save_target(&studio.layout.hooks_dir(), &set, !no_save, output) {
                hooks::save_hook_set(&set, &path).await?;
            }
        }

        Commands::GenerateScript {
            hook_file,
            hook_id,
            actor,
            duration,
            lang,
            no_fillers,
            no_claude,
            output,
        } => {
            let studio = Studio::open(&cli.root).await?;
            let hook = hooks::select_hook(&studio.layout.hooks_dir(), hook_file.as_deref(), hook_id.as_deref()).await?;

            let generator = if no_claude { None } else { Some(studio.text_generator()?) };
            let dna = briefing::load_dna_optional(&studio.layout).await;
            let mut budget = studio.budget().await?;
            let req = ScriptRequest {
                hook,
                actor_id: actor,
                duration,
                language: lang,
                fillers: !no_fillers,
                use_remote: !no_claude,
            };
            let script = script::generate_script(&studio.config, generator.as_deref(), &mut budget, &dna, &req).await?;
            let path = output.unwrap_or_else(|| script::default_script_path(&studio.layout.scripts_dir(), &script));
            script::save_script(&script, &path).await?;
            script::print_script_summary(&script);
        }

        Commands::ListActors { format } => {
            let studio = Studio::open(&cli.root).await?;
            match format {
                ListFormat::Json => println!("{}", serde_json::to_string_pretty(&studio.config.actors)?),
                ListFormat::Table => print_actor_table(&studio),
            }
        }

        Commands::Budget { action } => {
            let studio = Studio::open(&cli.root).await?;
            match action.unwrap_or(BudgetAction::Show) {
                BudgetAction::Show => studio.budget().await?.print_report(),
                BudgetAction::Set { amount } => {
                    if !amount.is_finite() || amount < 0.0 {
                        anyhow::bail!("Budget amount must be a positive number, got {}", amount);
                    }
                    config::set_monthly_limit(&studio.layout.config_file(), amount).await?;
                    logok(format!("Monthly budget set to ${:.2}", amount));
                }
                BudgetAction::Reset => {
                    studio.budget().await?.reset_monthly().await?;
                    logok("Monthly spending reset");
                }
                BudgetAction::Export { file } => {
                    let path = file.unwrap_or_else(|| {
                        studio
                            .layout
                            .outputs_dir()
                            .join(format!("expenses_{}.csv", init::unix_timestamp()))
                    });
                    studio.budget().await?.export_csv(&path).await?;
                }
            }
        }

        Commands::GenerateAudio {
            script_file,
            engine,
            stability,
            dry_run,
            output,
        } => {
            let studio = Studio::open(&cli.root).await?;
            tts::validate_stability(stability)?;
            let script = script::load_script(&script_file).await?;
            let actor = studio.config.actor(&script.actor)?;
            let characters = tts::character_count(tts::narration_text(&script)?);
            let estimate = studio.price_table().estimate(engine.as_str(), characters as f64)?;

            println!("Audio Generation Summary");
            println!("{:<16} {}", "Engine", engine);
            println!("{:<16} {} ({})", "Actor", script.actor, actor.name);
            println!("{:<16} {}", "Characters", characters);
            println!("{:<16} ${:.3}", "Estimated cost", estimate);
            if dry_run {
                logi("[DRY RUN] Audio generation simulated");
                return Ok(0);
            }

            let synth = tts::create_synthesizer(engine, &studio.http, &studio.config, &studio.credentials)?;
            let out = output.unwrap_or_else(|| tts::default_audio_path(&studio.layout.audio_dir(), &script, engine));
            let mut budget = studio.budget().await?;
            tts::synthesize_script(synth.as_ref(), &mut budget, &script, actor, stability, &out).await?;
        }

        Commands::GenerateVideo {
            audio_file,
            actor,
            format,
            engine,
            motion,
            dry_run,
            output,
        } => {
            let studio = Studio::open(&cli.root).await?;
            let plan = video::plan_video(
                &studio.layout,
                &studio.config,
                &studio.price_table(),
                &audio_file,
                &actor,
                format,
                engine,
                motion,
            )
            .await?;
            video::print_plan(&plan, &studio.config);
            if dry_run {
                logi("[DRY RUN] Video generation simulated");
                return Ok(0);
            }

            let renderer = video::create_renderer(engine, &studio.http, &studio.config, &studio.credentials)?;
            let out = output.unwrap_or_else(|| video::default_raw_video_path(&studio.layout.video_raw_dir(), &actor));
            let mut budget = studio.budget().await?;
            video::render_video(renderer.as_ref(), &mut budget, &plan, &out).await?;
        }

        Commands::Assemble {
            video_file,
            script_file,
            post,
        } => {
            let script = match script_file {
                Some(path) => Some(script::load_script(&path).await?),
                None => None,
            };
            run_assemble(&layout, &video_file, script.as_ref(), &post).await?;
        }

        Commands::PostProd { video_file, post } => {
            run_assemble(&layout, &video_file, None, &post).await?;
        }

        Commands::TestActor {
            actor,
            format,
            dry_run,
        } => {
            let studio = Studio::open(&cli.root).await?;
            let dna = briefing::load_dna_optional(&studio.layout).await;
            let req = pipeline::test_actor_request(&studio.config, &dna, &actor, format, dry_run)?;
            logi(format!("Testing actor: {}", actor));
            if let Some(outputs) = pipeline::run_pipeline(&studio, &req, |_| Ok(true)).await? {
                pipeline::print_outputs(&outputs);
                logok(format!("Actor {} test completed", actor));
            }
        }

        Commands::FullPipeline {
            hook_text,
            actor,
            duration,
            format,
            template,
            lang,
            tts_engine,
            video_engine,
            dry_run,
            confirm,
        } => {
            let studio = Studio::open(&cli.root).await?;
            let req = PipelineRequest {
                hook_text,
                actor_id: actor,
                duration,
                format,
                template,
                language: lang,
                tts_engine,
                video_engine,
                dry_run,
                auto_confirm: confirm,
            };
            match pipeline::run_pipeline(&studio, &req, confirm_cost).await? {
                Some(outputs) => pipeline::print_outputs(&outputs),
                None => return Ok(0),
            }
        }
    }

    Ok(0)
}

fn confirm_cost(total: f64) -> Result<bool> {
    inquire::Confirm::new(&format!("Proceed with pipeline? (Cost: ${:.3})", total))
        .with_default(false)
        .prompt()
        .context("Confirmation prompt failed")
}

async fn run_assemble(layout: &Layout, video_file: &Path, script: Option<&script::Script>, post: &PostArgs) -> Result<()> {
    let options = post.options();
    let out = post
        .output
        .clone()
        .unwrap_or_else(|| assemble::default_final_path(&layout.video_final_dir(), options.template()));
    logi(format!("Input: {}", video_file.display()));
    logi(format!("Output: {}", out.display()));
    assemble::assemble_video(layout, video_file, script, &options, &out).await?;
    Ok(())
}

fn print_actor_table(studio: &Studio) {
    println!("Available Actors");
    println!(
        "{:<12} {:<12} {:<8} {:<14} {:<12} {}",
        "ID", "Name", "Age", "Category", "Languages", "Persona"
    );
    for (id, actor) in &studio.config.actors {
        println!(
            "{:<12} {:<12} {:<8} {:<14} {:<12} {}",
            id,
            actor.name,
            actor.age_range,
            actor.category,
            actor.languages.join(", "),
            truncate_label(&actor.persona, 30)
        );
    }
}
