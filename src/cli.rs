use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidlock")]
#[command(author, version, about = "Video watermarking, encryption and publishing processor")]
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
    /// Run the processor: consume ready notifications until interrupted
    Serve,

    /// Process a single uploaded video by ID
    Process {
        /// Video ID whose chunks are already in the stream
        #[arg(required = true)]
        video_id: String,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload a local file as chunks and announce it for processing
    Ingest {
        /// File to upload
        #[arg(required = true)]
        file: PathBuf,

        /// Video ID to use (generated when omitted)
        #[arg(long)]
        video_id: Option<String>,

        /// Uploading user, sent as the User-ID header
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Create or extend the durable stream with the required subjects
    EnsureStream,

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
