//! Validation subcommand

use clap::Parser;
use serde::Serialize;

use super::CliError;
use crate::config::ArchiverConfig;

/// Validate configuration and create the download directory
#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// Print the effective configuration as JSON
    #[arg(long)]
    pub json: bool,
}

/// Effective configuration, with the token masked
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ConfigReport {
    /// Archive root
    pub download_dir: String,
    /// Delay between network operations in milliseconds
    pub download_delay_ms: u64,
    /// Owner id
    pub owner_id: u64,
    /// Number of approved users besides the owner
    pub approved_users: usize,
    /// Token with everything but the last four characters hidden
    pub token: String,
}

impl ValidateCommand {
    /// Execute the validation command
    pub fn execute(&self, config: &ArchiverConfig) -> Result<(), CliError> {
        config.prepare()?;
        let report = report(config)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("Configuration OK");
            println!("  Download directory: {}", report.download_dir);
            println!("  Download delay: {}ms", report.download_delay_ms);
            println!("  Owner ID: {}", report.owner_id);
            println!("  Approved users: {}", report.approved_users);
            println!("  Token: {}", report.token);
        }
        Ok(())
    }
}

/// Build the printable summary of a valid configuration
pub fn report(config: &ArchiverConfig) -> Result<ConfigReport, CliError> {
    Ok(ConfigReport {
        download_dir: config.download_dir.display().to_string(),
        download_delay_ms: config.download_delay().as_millis() as u64,
        owner_id: config.owner()?.0,
        approved_users: config.approved_users.len(),
        token: mask_token(config.token.as_deref().unwrap_or_default()),
    })
}

fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{visible}", "*".repeat(chars.len() - 4))
}
