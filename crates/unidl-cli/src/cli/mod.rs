//! CLI for the unidl media downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use unidl_core::config;
use unidl_core::platform::Platform;
use unidl_core::store::SqliteJobStore;

use commands::{run_detect, run_get, run_status, GetArgs};

/// Top-level CLI for unidl.
#[derive(Debug, Parser)]
#[command(name = "unidl")]
#[command(about = "unidl: fetch media from YouTube, Instagram, TikTok and more", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one URL, choosing the quality when formats are found.
    Get {
        /// Media URL (video, short, reel, post or playlist).
        url: String,

        /// Platform to record for the job. Detected from the URL when omitted.
        #[arg(long, value_name = "PLATFORM")]
        platform: Option<Platform>,

        /// Format id to pick without prompting.
        #[arg(long, value_name = "ID")]
        format: Option<String>,

        /// Output directory (defaults to the configured one).
        #[arg(long, value_name = "DIR")]
        output: Option<String>,

        /// Treat the URL as a playlist request even without a `list` parameter.
        #[arg(long)]
        playlist: bool,

        /// Make the simulated engine fail with this message after the selection.
        #[arg(long, hide = true, value_name = "MSG")]
        fail_with: Option<String>,
    },

    /// Show the most recent jobs.
    Status {
        /// Number of jobs to show.
        #[arg(long, default_value = "5", value_name = "N")]
        limit: u32,
    },

    /// Print the platform detected for a URL.
    Detect {
        /// URL to inspect.
        url: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = SqliteJobStore::open_default().await?;

        match cli.command {
            CliCommand::Get {
                url,
                platform,
                format,
                output,
                playlist,
                fail_with,
            } => {
                let args = GetArgs {
                    url,
                    platform,
                    format,
                    output,
                    playlist,
                    fail_with,
                };
                run_get(&store, &cfg, args).await?;
            }
            CliCommand::Status { limit } => run_status(&store, limit).await?,
            CliCommand::Detect { url } => run_detect(&url)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
