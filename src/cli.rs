use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vidforge_common::{Quality, VideoId};

#[derive(Parser)]
#[command(name = "vidforge")]
#[command(author, version, about = "Self-hosted video sharing server and client")]
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

/// Credentials for commands that log in first.
#[derive(clap::Args)]
pub struct Login {
    /// Account name
    #[arg(short, long)]
    pub username: String,

    /// Account password
    #[arg(short, long, env = "VIDFORGE_PASSWORD")]
    pub password: String,

    /// Server address (overrides [client].server)
    #[arg(long)]
    pub server: Option<String>,
}

/// Server address for commands that need no account.
#[derive(clap::Args)]
pub struct Remote {
    /// Server address (overrides [client].server)
    #[arg(long)]
    pub server: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Host to bind to (overrides [server].host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Log in and upload a video file
    Upload {
        /// Video file to upload
        #[arg(required = true)]
        file: PathBuf,

        /// Title shown in listings (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,

        #[command(flatten)]
        login: Login,
    },

    /// List registered users
    Users {
        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: u32,

        #[command(flatten)]
        remote: Remote,
    },

    /// List ready videos
    Videos {
        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Only videos by this author
        #[arg(short, long)]
        author: Option<String>,

        #[command(flatten)]
        remote: Remote,
    },

    /// Download one segment into the client cache
    Fetch {
        video_id: VideoId,

        /// Rendition label, e.g. 240p (defaults to the video's best)
        #[arg(short, long)]
        quality: Option<Quality>,

        /// Zero-based segment index
        #[arg(short, long, default_value_t = 0)]
        segment: u32,

        #[command(flatten)]
        remote: Remote,
    },

    /// Probe a video file and show what the pipeline would encode
    Probe {
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
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

    /// Generate a bcrypt password hash
    HashPassword {
        /// Password to hash
        password: String,
    },
}
