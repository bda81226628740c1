//! Command-line front-end over the fingerprinting engine: `ingest`,
//! `ingest-dir` (batch, mirroring the original system's batch-upload
//! script), `recognize`, `stats`, `list`, `delete`, and `clear`.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use landmarkfp::{Config, Engine};
use tracing_subscriber::EnvFilter;

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "flac", "ogg"];

#[derive(Parser)]
#[command(name = "landmarkfp-cli", about = "Audio fingerprinting and recognition")]
struct Cli {
    /// Path to the SQLite fingerprint database.
    #[arg(long, global = true, default_value = "fingerprints.sqlite3")]
    db: PathBuf,

    /// Optional TOML config file supplying engine defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a single audio file under a track name.
    Ingest {
        #[arg(long)]
        name: String,
        file: PathBuf,
    },
    /// Ingest every recognized audio file in a directory, naming each track
    /// from its file stem. Continues past per-file failures.
    IngestDir { directory: PathBuf },
    /// Recognize a short audio sample against the database.
    Recognize {
        #[arg(long, default_value_t = 5)]
        min_matches: u32,
        file: PathBuf,
    },
    /// Print track and posting counts.
    Stats,
    /// List all track names, sorted ascending.
    List,
    /// Delete a track and its postings.
    Delete { name: String },
    /// Remove every track and posting.
    Clear {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let engine = Engine::open_sqlite(config, &cli.db)?;

    match cli.command {
        Command::Ingest { name, file } => ingest_one(&engine, &name, &file)?,
        Command::IngestDir { directory } => ingest_dir(&engine, &directory)?,
        Command::Recognize { min_matches, file } => recognize(&engine, &file, min_matches)?,
        Command::Stats => {
            let stats = engine.stats()?;
            println!("tracks: {}", stats.tracks);
            println!("postings: {}", stats.postings);
        }
        Command::List => {
            for name in engine.list()? {
                println!("{}", name);
            }
        }
        Command::Delete { name } => {
            let (found, deleted) = engine.delete(&name)?;
            if found {
                println!("deleted '{}' ({} postings)", name, deleted);
            } else {
                println!("no such track: '{}'", name);
            }
        }
        Command::Clear { yes } => {
            if !yes {
                let stats = engine.stats()?;
                print!(
                    "this will delete {} tracks and {} postings. continue? (yes/no): ",
                    stats.tracks, stats.postings
                );
                io::stdout().flush()?;
                let mut response = String::new();
                io::stdin().read_line(&mut response)?;
                if !matches!(response.trim().to_lowercase().as_str(), "yes" | "y") {
                    println!("cancelled");
                    return Ok(());
                }
            }
            engine.clear()?;
            println!("cleared");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(p) => Ok(Config::from_toml_file(p)?),
        None => Ok(Config::default()),
    }
}

fn ingest_one(engine: &Engine, name: &str, file: &Path) -> anyhow::Result<()> {
    let pcm = landmarkfp::audio::decode_and_resample(file, engine.config().sample_rate)?;
    let inserted = engine.ingest(name, &pcm)?;
    println!("ingested '{}': {} fingerprints", name, inserted);
    Ok(())
}

fn ingest_dir(engine: &Engine, directory: &Path) -> anyhow::Result<()> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(directory)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut succeeded = 0;
    let mut failed = 0;
    for file in &files {
        let name = extract_track_name(file);
        match landmarkfp::audio::decode_and_resample(file, engine.config().sample_rate)
            .and_then(|pcm| engine.ingest(&name, &pcm))
        {
            Ok(inserted) => {
                println!("ingested '{}' ({}): {} fingerprints", name, file.display(), inserted);
                succeeded += 1;
            }
            Err(e) => {
                eprintln!("failed '{}' ({}): {}", name, file.display(), e);
                failed += 1;
            }
        }
    }
    println!("done: {} succeeded, {} failed", succeeded, failed);
    Ok(())
}

fn extract_track_name(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("unknown").to_string()
}

fn recognize(engine: &Engine, file: &Path, min_matches: u32) -> anyhow::Result<()> {
    let pcm = landmarkfp::audio::decode_and_resample(file, engine.config().sample_rate)?;
    match engine.recognize(&pcm, min_matches)? {
        Some(result) => {
            println!(
                "match: {} ({} matches, confidence {:.3})",
                result.track_name, result.match_count, result.confidence
            );
        }
        None => println!("no match"),
    }
    Ok(())
}
