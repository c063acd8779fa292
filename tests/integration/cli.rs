//! Binary behavior through `assert_cmd`

use assert_cmd::Command;
use std::path::Path;
use tempfile::TempDir;

/// Command with a clean environment running inside `dir`, so no `.env` leaks in
fn archiver(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("channel-archiver").unwrap();
    cmd.env_clear().current_dir(dir);
    cmd
}

#[test]
fn test_validate_fails_without_token() {
    let temp_dir = TempDir::new().unwrap();

    let output = archiver(temp_dir.path())
        .args(["--owner-id", "42", "validate"])
        .assert()
        .failure()
        .get_output()
        .clone();

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DISCORD_TOKEN"), "got: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn test_validate_rejects_placeholder_token_from_dotenv() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join(".env"),
        "DISCORD_TOKEN=your_bot_token_here\nOWNER_ID=42\n",
    )
    .unwrap();

    archiver(temp_dir.path()).arg("validate").assert().failure();
}

#[test]
fn test_validate_creates_download_directory_and_reports_json() {
    let temp_dir = TempDir::new().unwrap();
    let archive = temp_dir.path().join("archive");

    let output = archiver(temp_dir.path())
        .env("DISCORD_TOKEN", "token-from-env-1234")
        .env("OWNER_ID", "42")
        .env("APPROVED_USERS", "7,8")
        .args(["--download-dir", archive.to_str().unwrap(), "validate", "--json"])
        .assert()
        .success()
        .get_output()
        .clone();

    assert!(archive.is_dir());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["owner_id"], 42);
    assert_eq!(report["approved_users"], 2);
    assert_eq!(report["download_delay_ms"], 250);
    let token = report["token"].as_str().unwrap();
    assert!(token.ends_with("1234"));
    assert!(!token.contains("token-from-env"));
}

#[test]
fn test_path_prints_sanitized_directory() {
    let temp_dir = TempDir::new().unwrap();

    let output = archiver(temp_dir.path())
        .args([
            "--download-dir",
            "root",
            "path",
            "--server",
            "My Server",
            "--channel",
            "general",
            "--thread",
            "q&a?",
        ])
        .assert()
        .success()
        .get_output()
        .clone();

    let printed = String::from_utf8(output.stdout).unwrap();
    let expected = Path::new("root").join("My Server").join("general").join("q&a_");
    assert_eq!(printed.trim_end(), expected.display().to_string());
}
