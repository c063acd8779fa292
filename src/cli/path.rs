//! Path subcommand

use clap::Parser;

use super::CliError;
use crate::config::ArchiverConfig;
use crate::output::ArchivePathBuilder;
use std::path::PathBuf;

/// Print where attachments of a channel or thread are stored
#[derive(Parser, Debug)]
pub struct PathCommand {
    /// Server name
    #[arg(long)]
    pub server: String,

    /// Channel name (the parent channel for threads)
    #[arg(long)]
    pub channel: String,

    /// Thread name
    #[arg(long)]
    pub thread: Option<String>,
}

impl PathCommand {
    /// Resolve the directory below the configured archive root
    pub fn resolve(&self, config: &ArchiverConfig) -> Result<PathBuf, CliError> {
        Ok(ArchivePathBuilder::new(config.download_dir.clone())
            .with_server(&self.server)
            .with_channel(&self.channel)
            .with_thread(self.thread.as_deref())
            .build()?)
    }

    /// Execute the path command
    pub fn execute(&self, config: &ArchiverConfig) -> Result<(), CliError> {
        println!("{}", self.resolve(config)?.display());
        Ok(())
    }
}
