//! Incremental and full archives, threads and file naming

use channel_archiver::downloader::JobTarget;
use channel_archiver::platform::PlatformError;
use channel_archiver::{ContainerId, Job, JobStatus, ThreadState};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio_test::assert_ok;

use crate::support::{self, ALICE, BOB, BOT};

fn files_in(dir: &Path) -> HashSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| {
            let entry = entry.unwrap();
            entry
                .file_type()
                .unwrap()
                .is_file()
                .then(|| entry.file_name().to_string_lossy().into_owned())
        })
        .collect()
}

#[tokio::test]
async fn test_incremental_saves_messages_newer_than_bot_marker() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let channel = ContainerId(100);
    platform.push_message(channel, 1, BOT, &[]);
    platform.push_message(channel, 2, ALICE, &[("from-alice.png", b"AAAA")]);
    platform.push_message(channel, 3, BOB, &[("from-bob.png", b"BBBB")]);
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::incremental(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;

    let report = &summary.jobs[0];
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.counts.files_saved, 2);
    assert_eq!(report.counts.bytes_saved, 8);

    let dest = temp_dir.path().join("Test Server").join("general");
    assert_eq!(
        files_in(&dest),
        HashSet::from(["from-alice.png".to_string(), "from-bob.png".to_string()])
    );
}

#[tokio::test]
async fn test_incremental_without_marker_reads_whole_history() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let channel = ContainerId(100);
    for id in 1..=3 {
        platform.push_message(channel, id, ALICE, &[(format!("{id}.bin").as_str(), b"1")]);
    }
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::incremental(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;
    assert_eq!(summary.jobs[0].counts.files_saved, 3);
}

#[tokio::test]
async fn test_full_mode_sums_channel_and_archived_threads() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let channel = ContainerId(100);
    platform.push_message(channel, 10, ALICE, &[("channel.txt", b"c")]);
    platform.push_message(channel, 11, BOT, &[]);
    platform.add_thread(channel, 200, "design", ThreadState::Archived);
    platform.add_thread(channel, 201, "release notes", ThreadState::Archived);
    platform.push_message(ContainerId(200), 1, ALICE, &[("mock.png", b"m")]);
    platform.push_message(ContainerId(201), 1, BOB, &[("v1.md", b"1")]);
    platform.push_message(ContainerId(201), 2, BOB, &[("v2.md", b"2"), ("v2.pdf", b"p")]);
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelWithThreads(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;

    let report = &summary.jobs[0];
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.counts.files_saved, 5);
    assert_eq!(report.counts.containers_scanned, 3);

    let general = temp_dir.path().join("Test Server").join("general");
    assert!(general.join("channel.txt").exists());
    assert!(general.join("design").join("mock.png").exists());
    assert_eq!(files_in(&general.join("release notes")).len(), 3);
}

#[tokio::test]
async fn test_incremental_skips_threads_older_than_marker() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let channel = ContainerId(100);
    platform.add_thread(channel, 50, "old thread", ThreadState::Active);
    platform.push_message(channel, 60, BOT, &[]);
    platform.add_thread(channel, 70, "new thread", ThreadState::Active);
    platform.push_message(channel, 80, ALICE, &[("fresh.txt", b"f")]);
    platform.push_message(ContainerId(50), 1, ALICE, &[("stale.txt", b"s")]);
    platform.push_message(ContainerId(70), 1, ALICE, &[("thread.txt", b"t")]);
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::incremental(
        JobTarget::ChannelWithThreads(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;

    assert_eq!(summary.jobs[0].counts.files_saved, 2);
    assert_eq!(
        platform.listed_containers(),
        vec![ContainerId(100), ContainerId(70)]
    );
    let general = temp_dir.path().join("Test Server").join("general");
    assert!(general.join("new thread").join("thread.txt").exists());
    assert!(!general.join("old thread").exists());
}

#[tokio::test]
async fn test_thread_listing_failure_keeps_channel_results() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let channel = ContainerId(100);
    platform.push_message(channel, 1, ALICE, &[("a.txt", b"a")]);
    platform.fail_thread_listing(channel, PlatformError::PermissionDenied("threads".into()));
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelWithThreads(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;

    let report = &summary.jobs[0];
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.counts.files_saved, 1);
    assert_eq!(report.failed_items.len(), 1);
}

#[tokio::test]
async fn test_colliding_names_get_numbered() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let channel = ContainerId(100);
    platform.push_message(channel, 1, ALICE, &[("photo.png", b"1st")]);
    platform.push_message(channel, 2, BOB, &[("photo.png", b"2nd")]);
    platform.push_message(channel, 3, BOB, &[("photo.png", b"3rd"), ("photo.png", b"4th")]);
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;
    assert_eq!(summary.jobs[0].counts.files_saved, 4);

    let dest = temp_dir.path().join("Test Server").join("general");
    assert_eq!(
        files_in(&dest),
        HashSet::from([
            "photo.png".to_string(),
            "photo_1.png".to_string(),
            "photo_2.png".to_string(),
            "photo_3.png".to_string(),
        ])
    );
    let mut bodies: Vec<Vec<u8>> = files_in(&dest)
        .iter()
        .map(|name| fs::read(dest.join(name)).unwrap())
        .collect();
    bodies.sort();
    let mut expected: Vec<Vec<u8>> = ["1st", "2nd", "3rd", "4th"]
        .iter()
        .map(|body| body.as_bytes().to_vec())
        .collect();
    expected.sort();
    assert_eq!(bodies, expected);
}

#[tokio::test]
async fn test_unsafe_names_are_sanitized() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    platform.push_message(ContainerId(100), 1, ALICE, &[("what?.txt", b"q"), ("...", b"d")]);
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(100, "a/b")),
        ALICE,
    )));
    support::drain(&queue).await;

    let dest = temp_dir.path().join("Test Server").join("a_b");
    assert_eq!(
        files_in(&dest),
        HashSet::from(["what_.txt".to_string(), "unnamed_file".to_string()])
    );
}

#[tokio::test]
async fn test_single_failed_attachment_does_not_stop_the_job() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let channel = ContainerId(100);
    let broken =
        platform.push_message(channel, 1, ALICE, &[("gone.zip", b"z"), ("kept.txt", b"k")]);
    platform.fail_download(
        &broken.attachments[0].url,
        PlatformError::NotFound("deleted".into()),
    );
    platform.push_message(channel, 2, ALICE, &[("later.txt", b"l")]);
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    let summary = support::drain(&queue).await;

    let report = &summary.jobs[0];
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.counts.files_saved, 2);
    assert_eq!(report.counts.files_failed, 1);
    assert_eq!(report.failed_items[0].name, "gone.zip");
    assert_eq!(report.failed_items[0].link, broken.jump_url);
    assert!(!temp_dir.path().join("Test Server/general/gone.zip").exists());
}
