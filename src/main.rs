//! Songbase command line entry point
//!
//! Owns the catalog for the lifetime of the process: opens it once, runs one
//! command, and closes it on every exit path, Ctrl-C included.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use songbase::probe::probe_tags;
use songbase::{AudioFormat, Database, JsonMeta, MediaLocation, NewMusic, Settings};

#[derive(Parser)]
#[command(name = "songbase")]
#[command(about = "Embedded music catalog", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file, overriding the settings file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a track; a missing mp3 or flac file is transcoded from the other
    Register {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        /// Path or URL of the mp3 file, or NONE
        #[arg(long)]
        mp3: Option<String>,
        /// Path or URL of the flac file, or NONE
        #[arg(long)]
        flac: Option<String>,
        /// Metadata string stored verbatim
        #[arg(long)]
        meta: Option<String>,
        /// Read tags from the given file to fill title, artist and metadata
        #[arg(long)]
        probe: bool,
    },
    /// Show a track by id
    Get { id: i64 },
    /// List ids whose "artist - title" contains the fragment (case-sensitive)
    Search { fragment: String },
    /// Show where the bytes of one format of a track live
    Locate {
        id: i64,
        #[arg(long, default_value = "mp3")]
        format: AudioFormat,
    },
    /// Read or update in-database config entries
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Get {
        name: String,
        /// Value returned when the entry is missing
        #[arg(long)]
        default: Option<String>,
        /// Persist the default when the entry is missing
        #[arg(long, requires = "default")]
        create: bool,
    },
    /// Update an existing entry (never creates one)
    Set { name: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load();
    if let Some(path) = cli.database {
        settings.database_path = path;
    }

    let db = Database::from_settings(&settings)
        .await
        .with_context(|| format!("Failed to open {}", settings.database_path.display()))?;

    let result = tokio::select! {
        result = run(&db, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, closing database");
            Err(anyhow!("interrupted"))
        }
    };

    db.close().await?;
    result
}

async fn run(db: &Database, command: Commands) -> Result<()> {
    match command {
        Commands::Register {
            title,
            artist,
            mp3,
            flac,
            meta,
            probe,
        } => {
            let mut music = NewMusic {
                title: title.unwrap_or_default(),
                artist: artist.unwrap_or_default(),
                file_mp3: mp3,
                file_flac: flac,
                json_meta: meta.map(JsonMeta::Raw).unwrap_or_default(),
            };
            if probe {
                apply_probe(&mut music)?;
            }
            if music.title.is_empty() || music.artist.is_empty() {
                return Err(anyhow!("--title and --artist are required (or use --probe)"));
            }

            let id = db.register(music).await?;
            print_json(&json!({ "id": id }))
        }
        Commands::Get { id } => print_json(&db.get_by_id(id).await?),
        Commands::Search { fragment } => print_json(&db.search_by_name(&fragment).await?),
        Commands::Locate { id, format } => {
            let (info, location) = db.resolve_media(id, format).await?;
            let (kind, target) = match location {
                MediaLocation::Missing => ("missing", None),
                MediaLocation::Remote(url) => ("remote", Some(url)),
                MediaLocation::Local(path) => ("local", Some(path.display().to_string())),
            };
            print_json(&json!({
                "id": info.id,
                "kind": kind,
                "target": target,
                "mime_type": format.mime_type(),
                "download_name": info.download_name(format),
            }))
        }
        Commands::Config { command } => match command {
            ConfigCommand::Get {
                name,
                default,
                create,
            } => {
                let value = db.get_config(&name, default.as_deref(), create).await?;
                print_json(&json!({ "name": name, "value": value }))
            }
            ConfigCommand::Set { name, value } => {
                if db.set_config(&name, &value).await? == 0 {
                    warn!("Config entry {} does not exist, nothing updated", name);
                }
                Ok(())
            }
        },
    }
}

/// Fill title, artist and metadata from the tags of the first local file given
fn apply_probe(music: &mut NewMusic) -> Result<()> {
    let source = [&music.file_mp3, &music.file_flac]
        .into_iter()
        .flatten()
        .find(|f| MediaLocation::parse(f).is_local())
        .cloned()
        .ok_or_else(|| anyhow!("--probe needs a local --mp3 or --flac file"))?;

    let tags = probe_tags(Path::new(&source))?;
    if music.title.is_empty() {
        music.title = tags.title.clone().unwrap_or_default();
    }
    if music.artist.is_empty() {
        music.artist = tags.artist.clone().unwrap_or_default();
    }
    if music.json_meta == JsonMeta::default() {
        music.json_meta = JsonMeta::Structured(tags.to_json());
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
