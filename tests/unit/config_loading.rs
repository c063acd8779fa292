use channel_archiver::cli::Cli;
use channel_archiver::config::{ArchiverConfig, ConfigError, RawConfig};
use channel_archiver::UserId;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_flags_resolve_into_config() {
    let cli = Cli::parse_from([
        "channel-archiver",
        "--token",
        "abc",
        "--owner-id",
        "42",
        "--download-delay",
        "0.5",
        "--approved-users",
        "1,2",
        "--download-dir",
        "/srv/archive",
        "validate",
    ]);

    let config = cli.config.to_config();
    assert!(config.validate().is_ok());
    assert_eq!(config.download_dir, PathBuf::from("/srv/archive"));
    assert_eq!(config.download_delay(), Duration::from_millis(500));
    assert_eq!(config.approved_users, vec![UserId(1), UserId(2)]);
}

#[test]
fn test_zero_delay_disables_throttling() {
    let config = ArchiverConfig::load(RawConfig {
        download_delay: Some("0".into()),
        ..RawConfig::default()
    });
    assert_eq!(config.download_delay(), Duration::ZERO);
}

#[test]
fn test_blank_token_counts_as_missing() {
    let config = ArchiverConfig::load(RawConfig {
        token: Some("   ".into()),
        owner_id: Some("1".into()),
        ..RawConfig::default()
    });
    assert_eq!(config.validate(), Err(ConfigError::MissingToken));
}
