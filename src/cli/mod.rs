use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "reelrelay",
    about = "Reel Relay - fetch Facebook and Instagram videos and shrink them to fit chat upload limits",
    version,
    long_about = "Resolves a social-media video link through an extraction API, downloads the video, compresses it with ffmpeg when it is over the size limit and delivers it. Every temporary file is removed when the request finishes."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the video behind a link, as the /link command would
    Link {
        /// Facebook or Instagram video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Identity of the requester
        #[arg(long, value_name = "ID", env = "RELAY_REQUESTER", default_value = "console")]
        requester: String,

        /// Directory delivered videos are copied to (overrides the config file)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Scan a chat message and fetch the first supported link in it
    Scan {
        /// Message text
        #[arg(value_name = "MESSAGE")]
        message: String,

        /// Identity of the requester
        #[arg(long, value_name = "ID", env = "RELAY_REQUESTER", default_value = "console")]
        requester: String,

        /// Directory delivered videos are copied to (overrides the config file)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Delete expired files from the scratch workspace
    Sweep {
        /// Maximum age in seconds (defaults to the configured retention)
        #[arg(long, value_name = "SECS")]
        max_age: Option<u64>,
    },

    /// Show or locate the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported platforms
    Platforms,
}
