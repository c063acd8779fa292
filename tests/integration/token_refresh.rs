//! Session refresh behavior seen through whole jobs

use channel_archiver::downloader::{JobFailure, JobTarget};
use channel_archiver::platform::mock::MockEvent;
use channel_archiver::platform::PlatformError;
use channel_archiver::{ContainerId, Job, JobStatus};
use tempfile::TempDir;
use tokio_test::assert_ok;

use crate::support::{self, ALICE};

#[tokio::test]
async fn test_expired_token_is_refreshed_once_and_retried() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let message = platform.push_message(ContainerId(100), 1, ALICE, &[("a.txt", b"hello")]);
    let url = message.attachments[0].url.clone();
    platform.fail_download_unauthorized(&url, 1);
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;

    assert_eq!(platform.refresh_count(), 1);
    let downloads: Vec<_> = platform
        .events()
        .into_iter()
        .filter(|event| matches!(event, MockEvent::Download(_)))
        .collect();
    assert_eq!(downloads.len(), 2);

    let report = &summary.jobs[0];
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.counts.files_saved, 1);
    assert_eq!(report.counts.files_failed, 0);
    let saved = std::fs::read(temp_dir.path().join("Test Server/general/a.txt")).unwrap();
    assert_eq!(saved, b"hello");
}

#[tokio::test]
async fn test_second_authorization_failure_fails_the_job() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    platform.push_message(ContainerId(100), 1, ALICE, &[("older.txt", b"old")]);
    let message = platform.push_message(
        ContainerId(100),
        2,
        ALICE,
        &[("bad.txt", b"x"), ("after.txt", b"y")],
    );
    platform.fail_download_unauthorized(&message.attachments[0].url, 2);
    platform.push_message(ContainerId(101), 1, ALICE, &[("next.txt", b"n")]);
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(101, "random")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;

    assert_eq!(platform.refresh_count(), 1);

    let failed = &summary.jobs[0];
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(matches!(failed.failure, Some(JobFailure::AuthExhausted(_))));
    assert_eq!(failed.counts.files_saved, 0);
    assert_eq!(failed.counts.files_failed, 1);
    assert_eq!(failed.counts.files_skipped, 1);
    assert!(!temp_dir.path().join("Test Server/general/older.txt").exists());
    assert!(!temp_dir.path().join("Test Server/general/bad.txt").exists());

    // The next job still runs
    assert_eq!(summary.jobs[1].status, JobStatus::Completed);

    let (_, notice) = &platform.direct_messages()[0];
    assert!(notice.contains("**Authorization expired**"));
}

#[tokio::test]
async fn test_failed_refresh_exhausts_the_session() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let message = platform.push_message(ContainerId(100), 1, ALICE, &[("a.txt", b"a")]);
    platform.fail_download_unauthorized(&message.attachments[0].url, 1);
    platform.fail_refresh(PlatformError::Network("gateway unreachable".to_string()));
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;

    assert_eq!(platform.refresh_count(), 1);
    assert!(summary.jobs[0].auth_exhausted());
}

#[tokio::test]
async fn test_history_resumes_after_mid_stream_refresh() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let channel = ContainerId(100);
    for id in 1..=4 {
        platform.push_message(channel, id, ALICE, &[(format!("f{id}.txt").as_str(), b"z")]);
    }
    platform.fail_history_once_after(channel, 2);
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;

    assert_eq!(platform.refresh_count(), 1);
    assert_eq!(platform.listed_containers(), vec![channel, channel]);

    let report = &summary.jobs[0];
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.counts.files_saved, 4);
    assert_eq!(report.counts.messages_scanned, 4);
    // Nothing was saved twice
    assert!(!temp_dir.path().join("Test Server/general/f4_1.txt").exists());
}
