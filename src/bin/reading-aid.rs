//! reading-aid CLI
//! Extract, simplify, score and read aloud documents from the command line.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::info;

use reading_aid::config::Config;
use reading_aid::document::Document;
use reading_aid::engines::{EngineKind, TtsConfig};
use reading_aid::pipeline::{Pipeline, PipelineReport};
use reading_aid::simplify::SimplifierModel;
use reading_aid::text::{self, ReadingComparison};

#[derive(Parser, Debug)]
#[command(name = "reading-aid", version, about = "Simplify documents and read them aloud")]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the text of a PDF, image or text file
    Extract { file: PathBuf },
    /// Simplify text and compare reading levels
    Simplify {
        /// Model family: t5 or bart
        #[arg(short, long)]
        model: Option<SimplifierModel>,
        /// Text, or a path to a document
        input: String,
    },
    /// Print the reading level of text
    Level {
        /// Text, or a path to a document
        input: String,
    },
    /// Read text aloud into a WAV file
    Speak {
        #[command(flatten)]
        voice: VoiceArgs,
        /// Copy the audio here as well
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Text, or a path to a document
        input: String,
    },
    /// List the voices of an engine
    Voices {
        #[arg(short, long, default_value = "standard")]
        engine: EngineKind,
    },
    /// Extract, simplify, score and read a document
    Run {
        #[command(flatten)]
        voice: VoiceArgs,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Text, or a path to a document
        input: String,
    },
}

#[derive(Args, Debug)]
struct VoiceArgs {
    /// Words per minute (50-300)
    #[arg(short, long)]
    rate: Option<u32>,
    /// 0.0-1.0
    #[arg(long)]
    volume: Option<f32>,
    /// Voice name from the config (male, female) or numeric id
    #[arg(long)]
    voice: Option<String>,
    /// standard or natural
    #[arg(short, long)]
    engine: Option<EngineKind>,
}

impl VoiceArgs {
    fn request(&self, pipeline: &Pipeline) -> Result<TtsConfig> {
        let voice_id = match &self.voice {
            Some(name) => Some(
                pipeline
                    .config()
                    .tts
                    .voice_id(name)
                    .with_context(|| format!("unknown voice '{name}'"))?,
            ),
            None => None,
        };
        Ok(pipeline.tts_request(self.rate, self.volume, voice_id, self.engine))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    let mut pipeline = Pipeline::new(config);

    match cli.command {
        Command::Extract { file } => {
            let document = open_document(&file)?;
            let extracted = pipeline.extract(&document)?;
            info!("{} page(s)", extracted.pages);
            println!("{}", extracted.text);
        }
        Command::Simplify { model, input } => {
            let original = read_input(&mut pipeline, &input)?;
            let outcome = pipeline.simplify(&original, model);
            println!("{}", outcome.value());
            print_comparison(&ReadingComparison::new(&original, outcome.value()));
        }
        Command::Level { input } => {
            let text = read_input(&mut pipeline, &input)?;
            let level = text::estimate(&text);
            let stats = text::reading_level::stats(&text);
            println!("Reading level: {:.2} ({})", level.level, level.complexity);
            println!(
                "Words: {}, sentences: {}, words per sentence: {:.1}",
                stats.words, stats.sentences, stats.avg_words_per_sentence
            );
        }
        Command::Speak { voice, out, input } => {
            let text = read_input(&mut pipeline, &input)?;
            let request = voice.request(&pipeline)?;
            let outcome = pipeline.speak(&text, request)?;
            if let Some(reason) = outcome.reason() {
                eprintln!("warning: {reason}");
            }
            let speech = outcome.into_value();
            println!(
                "{} ({:.1}s, {} voice)",
                speech.path.display(),
                speech.duration_secs,
                speech.engine
            );
            if let Some(out) = out {
                std::fs::copy(&speech.path, &out)
                    .with_context(|| format!("failed to copy audio to {}", out.display()))?;
                println!("Saved to {}", out.display());
            }
        }
        Command::Voices { engine } => {
            for voice in pipeline.list_voices(engine)? {
                println!(
                    "{:>2}  {:<24} {:<8} {}",
                    voice.id,
                    voice.name,
                    voice.language.as_deref().unwrap_or("-"),
                    voice.gender.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Run { voice, json, input } => {
            let path = Path::new(&input);
            let document = if path.is_file() {
                open_document(path)?
            } else {
                Document::from_text(input.as_str())
            };
            let request = voice.request(&pipeline)?;
            let report = pipeline.run(&document, request)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
    }
    Ok(())
}

fn open_document(path: &Path) -> Result<Document> {
    match Document::open(path).with_context(|| format!("failed to read {}", path.display()))? {
        Some(document) => Ok(document),
        None => bail!("{} is not a PDF, image or text file", path.display()),
    }
}

/// Treat `input` as a document path if one exists, otherwise as the text itself.
fn read_input(pipeline: &mut Pipeline, input: &str) -> Result<String> {
    let path = Path::new(input);
    if !path.is_file() {
        return Ok(input.to_string());
    }
    let document = open_document(path)?;
    Ok(pipeline.extract(&document)?.text.clone())
}

fn print_comparison(comparison: &ReadingComparison) {
    println!(
        "Reading level: {:.2} ({}) -> {:.2} ({}), {:+.2}",
        comparison.original.level,
        comparison.original.complexity,
        comparison.simplified.level,
        comparison.simplified.complexity,
        -comparison.reduction()
    );
}

fn print_report(report: &PipelineReport) {
    println!("Extracted {} page(s):\n{}\n", report.pages, report.extracted_text);
    if let Some(simplified) = &report.simplified_text {
        println!("Simplified:\n{simplified}\n");
    }
    if let Some(original) = &report.original_level {
        println!("Original level: {:.2} ({})", original.level, original.complexity);
    }
    if let Some(simplified) = &report.simplified_level {
        println!(
            "Simplified level: {:.2} ({})",
            simplified.level, simplified.complexity
        );
    }
    if let Some(audio) = &report.audio {
        println!(
            "Audio: {} ({:.1}s, {} voice)",
            audio.path.display(),
            audio.duration_secs,
            audio.engine
        );
    }
    for event in &report.events {
        eprintln!("warning: {:?} fell back: {}", event.stage, event.reason);
    }
}
