//! Top-level CLI definition

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use super::{PathCommand, ValidateCommand};
use crate::config::{ArchiverConfig, RawConfig};

/// Channel archiver
#[derive(Parser, Debug)]
#[command(name = "channel-archiver")]
#[command(
    about = "Archive chat channel and thread attachments to local storage",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Configuration (flags override environment and .env)
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate configuration, then print it
    Validate(ValidateCommand),
    /// Print the archive directory for a server/channel/thread
    Path(PathCommand),
}

/// Configuration flags, each backed by an environment variable
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Bot token
    #[arg(long, env = "DISCORD_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Archive root directory [default: ./downloads]
    #[arg(long, env = "DOWNLOAD_DIRECTORY", global = true)]
    pub download_dir: Option<PathBuf>,

    /// Seconds between network operations [default: 0.25]
    #[arg(long, env = "DOWNLOAD_DELAY", global = true)]
    pub download_delay: Option<String>,

    /// User id of the bot owner
    #[arg(long, env = "OWNER_ID", global = true)]
    pub owner_id: Option<String>,

    /// Comma-separated user ids allowed to use the bot
    #[arg(long, env = "APPROVED_USERS", global = true)]
    pub approved_users: Option<String>,
}

impl ConfigArgs {
    /// Resolve into an [`ArchiverConfig`]
    pub fn to_config(&self) -> ArchiverConfig {
        ArchiverConfig::load(RawConfig {
            token: self.token.clone(),
            download_dir: self.download_dir.clone(),
            download_delay: self.download_delay.clone(),
            owner_id: self.owner_id.clone(),
            approved_users: self.approved_users.clone(),
        })
    }
}
