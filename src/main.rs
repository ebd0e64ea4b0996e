mod cli;

use trackwave::{
    config::{self, Config},
    ingest::IngestPipeline,
    server::{self, AppState},
};
use trackwave_av::{FfmpegEngine, ToolRegistry, TranscodeEngine};
use trackwave_db::models::NewTrack;
use trackwave_db::pool::init_pool;
use trackwave_db::SqliteMetadataStore;
use trackwave_media::{check_constant_bitrate, FrameStats};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;

/// Open the database and resolve the encoder from `config`.
fn open_backends(config: &Config) -> Result<(SqliteMetadataStore, Arc<FfmpegEngine>)> {
    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {:?}",
            config.storage.data_dir
        )
    })?;

    let db_path = config.storage.db_path();
    let db_path_str = db_path.to_string_lossy();
    tracing::info!("Initializing database at {}", db_path_str);
    let store = SqliteMetadataStore::new(init_pool(&db_path_str)?);

    let tools = ToolRegistry::discover(&config.tools.tool_paths());
    if !tools.is_complete() {
        tracing::warn!("ffmpeg/ffprobe not found; uploads will fail until they are installed");
    }
    let engine = Arc::new(FfmpegEngine::new(tools).with_timeout(config.ingest.tool_timeout()));

    Ok((store, engine))
}

async fn start_server(host: String, port: u16, config_path: Option<&Path>) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting Trackwave server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let (store, engine) = open_backends(&config)?;
    let state = AppState::new(config, store, engine);
    server::start_server(state).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            // Verbose mode: trace for trackwave, debug for HTTP
            "trackwave=trace,trackwave_media=trace,trackwave_av=debug,trackwave_db=debug,trackwave_common=debug,tower_http=debug".to_string()
        } else {
            // Normal mode: debug for trackwave crates, info for HTTP requests
            "trackwave=debug,trackwave_av=info,trackwave_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Ingest {
            file,
            owner,
            artist,
            title,
            album,
            genre,
            description,
            year,
        } => {
            let mut new = NewTrack::new(owner.parse()?, artist, title);
            new.album_name = album;
            new.genre = genre;
            new.description = description;
            new.release_year = year;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(ingest_file(&file, new, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::Frames { file, bitrate } => scan_frames(&file, bitrate, cli.config.as_deref()),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("trackwave {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn ingest_file(file: &Path, new: NewTrack, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    if !file.exists() {
        anyhow::bail!("Input file does not exist: {:?}", file);
    }
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;

    let (store, engine) = open_backends(&config)?;
    let pipeline = IngestPipeline::new(&config, Arc::new(store), engine);
    let outcome = pipeline.ingest(new, &data).await?;

    println!("Ingested track {}", outcome.track.id);
    println!("  Title: {} - {}", outcome.track.artist_name, outcome.track.title);
    println!("  Directory: {}", outcome.dir.display());
    println!("  Segments: {}", outcome.segment_count);
    println!("  Frames: {}", outcome.frames.frame_count);
    if let Some(bps) = outcome.frames.average_bitrate() {
        println!("  Measured bitrate: {:.1} kbit/s", bps / 1000.0);
    }

    Ok(())
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let engine = FfmpegEngine::new(ToolRegistry::discover(&config.tools.tool_paths()))
        .with_timeout(config.ingest.tool_timeout());
    let info = engine.probe(file).await?;

    if json {
        let json_str = serde_json::to_string_pretty(&info)?;
        println!("{}", json_str);
    } else {
        println!("File: {}", file.display());
        println!("Container: {}", info.container);
        println!("Codec: {}", info.codec);
        if let Some(secs) = info.duration.map(|d| d.as_secs()) {
            let mins = secs / 60;
            let hours = mins / 60;
            println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
        }
        if let Some(kbps) = info.bitrate_kbps() {
            println!("Bitrate: {} kbit/s", kbps);
        }
        if let Some(rate) = info.sample_rate {
            println!("Sample rate: {} Hz", rate);
        }
        if let Some(channels) = info.channels {
            println!("Channels: {}", channels);
        }
    }

    Ok(())
}

fn scan_frames(file: &Path, bitrate_kbps: Option<u32>, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let data = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;

    let stats = FrameStats::scan(&data);
    println!("File: {}", file.display());
    println!("Size: {} bytes", data.len());
    println!("Frames: {}", stats.frame_count);
    println!("Skipped bytes: {}", stats.skipped_bytes);
    if let Some(rate) = stats.sample_rate {
        println!("Sample rate: {} Hz", rate);
    }
    if let Some(channels) = stats.channel_config {
        println!("Channel configuration: {}", channels);
    }
    println!("Duration: {:.3}s", stats.duration_secs);
    if let Some(bps) = stats.average_bitrate() {
        println!("Average bitrate: {:.1} kbit/s", bps / 1000.0);
    }

    let assumed_kbps = bitrate_kbps.unwrap_or(config.stream.assumed_bitrate_kbps);
    println!();
    match check_constant_bitrate(&data, assumed_kbps * 1000, config.stream.cbr_tolerance) {
        Ok(check) => println!(
            "✓ Constant bitrate at {} kbit/s (max deviation {:.1}%)",
            assumed_kbps,
            check.max_deviation * 100.0
        ),
        Err(e) => println!("✗ {}", e),
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = ToolRegistry::discover(&config.tools.tool_paths()).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable ingestion.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Data dir: {}", config.storage.data_dir.display());
            println!(
                "  Ingest: {} kbit/s, {}s segments, {} concurrent jobs",
                config.ingest.target_bitrate_kbps,
                config.ingest.segment_seconds,
                config.ingest.max_concurrent_jobs
            );
            println!(
                "  Stream: {} frames per batch, CBR policy {:?}",
                config.stream.batch_frames, config.stream.cbr_policy
            );
            println!(
                "  Plays: stream rule {:?}, segment rule {:?}",
                config.plays.stream_rule, config.plays.segment_rule
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
