//! booksplit - split a plain-text book into verified chapters and sections

use anyhow::{Context, Result};
use booksplit::{LlmClient, Pipeline, Report, SplitterConfig};
use clap::{Parser, Subcommand};
use llm_client::{Config, ModelPreset};
use log::info;
use std::path::PathBuf;

const PROGRAM_NAME: &str = "booksplit";

#[derive(Parser, Debug)]
#[command(
    name = "booksplit",
    about = "Split a book into chapters and sections using AI",
    long_about = "Reads a plain-text book, asks an LLM where chapters and sections begin, \
                  repairs boundaries that cut sentences, and writes a JSON report"
)]
#[command(version)]
struct Args {
    /// Plain-text book to split
    input: Option<PathBuf>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Book title (overrides the one found in the text)
    #[arg(long)]
    title: Option<String>,

    /// Model preset to use (overrides default from config)
    #[arg(short, long)]
    model: Option<String>,

    /// Generate improved titles, summaries and keywords
    #[arg(long)]
    enrich: bool,

    /// Enable debug mode for verbose output
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    /// Configuration subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// List available presets
    List,
    /// Set the default model preset
    SetDefault {
        /// Name of the preset to use as default
        preset: String,
    },
    /// Add a new preset
    AddPreset {
        /// Preset name
        name: String,
        /// Provider (openai, openrouter)
        #[arg(short, long)]
        provider: String,
        /// Model identifier
        #[arg(short = 'M', long)]
        model: String,
    },
    /// Set the analysis window size and overlap (characters)
    SetWindow {
        size: usize,
        overlap: usize,
    },
    /// Set the confidence threshold for boundary proposals
    SetThreshold {
        threshold: f32,
    },
}

/// Handle config subcommands
fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let llm_config = Config::load()?;
            let splitter = SplitterConfig::load()?;
            println!("LLM config file: {}", Config::config_path()?.display());
            println!("Splitter config file: {}", SplitterConfig::config_path()?.display());
            println!();
            println!("{:#?}", splitter);
            println!();
            println!(
                "Default preset: {}",
                llm_config.get_default_for_program(PROGRAM_NAME)
            );
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let current_default = config.get_default_for_program(PROGRAM_NAME);
            println!("Available presets:");
            let mut names: Vec<_> = config.presets.keys().collect();
            names.sort();
            for name in names {
                let preset = &config.presets[name];
                let default_marker = if name == current_default {
                    " (default)"
                } else {
                    ""
                };
                println!(
                    "  {} - {} / {}{}",
                    name, preset.provider, preset.model, default_marker
                );
            }
        }
        ConfigAction::SetDefault { preset } => {
            let mut config = Config::load()?;
            // Verify preset exists
            config.get_preset(preset)?;
            config
                .defaults
                .insert(PROGRAM_NAME.to_string(), preset.clone());
            config.save()?;
            println!("Default preset for {} set to: {}", PROGRAM_NAME, preset);
        }
        ConfigAction::AddPreset {
            name,
            provider,
            model,
        } => {
            let mut config = Config::load()?;
            config.presets.insert(
                name.clone(),
                ModelPreset {
                    provider: provider.clone(),
                    model: model.clone(),
                },
            );
            config.save()?;
            println!("Added preset: {}", name);
        }
        ConfigAction::SetWindow { size, overlap } => {
            let mut config = SplitterConfig::load()?;
            config.window_size = *size;
            config.overlap = *overlap;
            config.validate()?;
            config.save()?;
            println!("Window set to {} characters with {} overlap", size, overlap);
        }
        ConfigAction::SetThreshold { threshold } => {
            let mut config = SplitterConfig::load()?;
            config.confidence_threshold = *threshold;
            config.validate()?;
            config.save()?;
            println!("Confidence threshold set to {}", threshold);
        }
    }
    Ok(())
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    // Handle config subcommands first (before LLM initialization)
    if let Some(Commands::Config { action }) = &args.command {
        return handle_config_command(action);
    }

    let input = args
        .input
        .as_deref()
        .context("No input file given (see --help)")?;
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let config = SplitterConfig::load().context("Failed to load booksplit configuration")?;
    let llm = LlmClient::from_preset(args.model.as_deref(), config.retry_policy())?;
    let pipeline = Pipeline::new(llm, config)?;

    let outcome = pipeline.run(&text, args.title.as_deref()).await?;
    info!(
        "Split into {} chunks ({} merged, {} rewritten)",
        outcome.repair.final_count, outcome.repair.merged_count, outcome.repair.rewritten_count
    );

    let source = Some(input.display().to_string());
    let report = if args.enrich {
        let title = outcome.book_title.clone();
        let chunks = outcome.chunks.clone();
        let (title, enriched) = pipeline.enrich(&title, chunks).await;
        Report::new(source, outcome).with_enrichment(title, enriched)
    } else {
        Report::new(source, outcome)
    };

    report.write(args.output.as_deref())?;
    if let Some(path) = &args.output {
        eprintln!("Report written to {}", path.display());
    }

    Ok(())
}
