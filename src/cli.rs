use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "trackwave")]
#[command(author, version, about = "Audio track ingestion and streaming server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP and streaming server
    Start {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Ingest an audio file into the library
    Ingest {
        /// Audio file to ingest
        #[arg(required = true)]
        file: PathBuf,

        /// Uploading account
        #[arg(long)]
        owner: String,

        #[arg(long)]
        artist: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        album: Option<String>,

        #[arg(long)]
        genre: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        year: Option<i32>,
    },

    /// Probe an audio file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan an ADTS bitstream and check it is constant bitrate
    Frames {
        /// ADTS file to scan
        #[arg(required = true)]
        file: PathBuf,

        /// Assumed bitrate in kbit/s (defaults to stream.assumed_bitrate_kbps)
        #[arg(long)]
        bitrate: Option<u32>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
