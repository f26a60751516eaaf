use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use newsvec_core::{EngineConfig, NewDocument, NewsEngine, SledStore};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Ingest headlines and maintain the similarity vocabulary", long_about = None)]
struct Cli {
    /// Corpus database directory
    #[arg(long, global = true, default_value = "./newsvec-db")]
    db: PathBuf,
    /// Optional TOML file with engine settings (NEWSVEC_* env vars override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store headlines from JSON/JSONL files or a directory of them
    Ingest {
        #[arg(long)]
        input: PathBuf,
    },
    /// Rebuild the vocabulary and re-vectorize every stored headline
    Rebuild,
    /// Ingest, then rebuild
    Build {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print headlines similar to the given document as JSON
    Similar {
        #[arg(long)]
        id: u32,
        /// Maximum number of results to print
        #[arg(long, default_value_t = 10)]
        k: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let config = EngineConfig::load(cli.config.as_deref())?;
    let engine = NewsEngine::new(SledStore::open(&cli.db)?, config)?;

    match cli.command {
        Commands::Ingest { input } => {
            ingest(&engine, &input)?;
        }
        Commands::Rebuild => {
            engine.rebuild_vocabulary_and_vectors()?;
        }
        Commands::Build { input } => {
            ingest(&engine, &input)?;
            engine.rebuild_vocabulary_and_vectors()?;
        }
        Commands::Similar { id, k } => {
            let mut ranking = engine.find_similar(id)?;
            ranking.hits.truncate(k.max(1));
            println!("{}", serde_json::to_string_pretty(&ranking)?);
        }
    }
    engine.store().flush()?;
    Ok(())
}

fn ingest(engine: &NewsEngine<SledStore>, input: &Path) -> Result<()> {
    let docs = read_documents(input)?;
    let report = engine.ingest(docs)?;
    tracing::info!(input = %input.display(), inserted = report.inserted.len(), "ingest complete");
    Ok(())
}

/// Collect `.json`/`.jsonl` files under `input`, in file-name order so the corpus order is reproducible.
fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("input path {} does not exist", input.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if p.is_file() {
            if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                if matches!(ext, "json" | "jsonl") {
                    files.push(p.to_path_buf());
                }
            }
        }
    }
    Ok(files)
}

fn read_documents(input: &Path) -> Result<Vec<NewDocument>> {
    let mut docs = Vec::new();
    for file in input_files(input)? {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
    }
    Ok(docs)
}

fn read_jsonl(file: &Path, docs: &mut Vec<NewDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<NewDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(serde_json::from_value(v)?);
            }
        }
        serde_json::Value::Object(_) => docs.push(serde_json::from_value(json)?),
        _ => tracing::warn!(file = %file.display(), "skipping file without headline objects"),
    }
    Ok(())
}
