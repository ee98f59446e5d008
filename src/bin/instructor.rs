//! YAML Instructor CLI
//!
//! Inspects the grammar compiled for a JSON Schema and replays recorded model
//! completions through it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use yaml_instructor::{ExtractConfig, Extractor, Prefill, Schema, ScriptedEngine};

#[derive(Parser)]
#[command(name = "yaml-instructor")]
#[command(about = "Compile schemas into YAML grammars and extract structured values")]
struct Cli {
    /// Configuration file (defaults to yaml-instructor.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the grammar compiled for a JSON Schema
    Grammar {
        /// JSON Schema file
        #[arg(short, long)]
        schema: PathBuf,
        /// JSON object of pre-filled top-level fields
        #[arg(short, long)]
        prefill: Option<PathBuf>,
        /// Maximum number of rules to print
        #[arg(short, long, default_value_t = 32)]
        rules: usize,
    },

    /// Replay a recorded completion and print the extracted value
    Extract {
        /// JSON Schema file
        #[arg(short, long)]
        schema: PathBuf,
        /// Recorded completion, markers included
        #[arg(long)]
        completion: PathBuf,
        /// JSON object of pre-filled top-level fields
        #[arg(short, long)]
        prefill: Option<PathBuf>,
        /// Prompt text preceding the completion
        #[arg(long, default_value = "")]
        prompt: String,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().to_string());
    let config = ExtractConfig::load_from(config_path.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Grammar {
            schema,
            prefill,
            rules,
        } => {
            let extractor = Extractor::new(load_schema(&schema)?, &config)?;
            let prefill = load_prefill(prefill.as_deref())?;

            let recursive = extractor.analysis().recursive();
            if !recursive.is_empty() {
                let names: Vec<&str> = recursive.iter().map(String::as_str).collect();
                println!("# recursive records: {}", names.join(", "));
            }
            print!("{}", extractor.grammar(&prefill)?.render(rules)?);
            Ok(())
        }

        Commands::Extract {
            schema,
            completion,
            prefill,
            prompt,
        } => {
            let extractor = Extractor::new(load_schema(&schema)?, &config)?;
            let prefill = load_prefill(prefill.as_deref())?;
            let script = fs::read_to_string(&completion)
                .with_context(|| format!("Failed to read {}", completion.display()))?;

            let mut engine = ScriptedEngine::new(prompt).with_script(script);
            let value = extractor.generate_value(&mut engine, &prefill)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_schema(path: &Path) -> anyhow::Result<Schema> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON in {}", path.display()))?;
    Ok(Schema::from_json_schema(document)?)
}

fn load_prefill(path: Option<&Path>) -> anyhow::Result<Prefill> {
    let Some(path) = path else {
        return Ok(Prefill::new());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    match serde_json::from_str::<Value>(&content)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Pre-fill in {} must be a JSON object, got {}", path.display(), other),
    }
}
