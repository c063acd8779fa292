//! Queue ordering, duplicate rejection, clearing and stopping

use channel_archiver::downloader::JobTarget;
use channel_archiver::queue::Enqueued;
use channel_archiver::{ContainerId, Job, JobStatus, QueueError};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

use crate::support::{self, ALICE, BOB, OWNER};

#[tokio::test]
async fn test_jobs_run_one_at_a_time_in_fifo_order() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    for (id, name) in [(100, "alpha"), (101, "beta"), (102, "gamma")] {
        platform.push_message(ContainerId(id), 1, ALICE, &[(format!("{name}.txt").as_str(), b"x")]);
        platform.push_message(ContainerId(id), 2, ALICE, &[("second.txt", b"yy")]);
    }
    platform.hold_downloads();
    let queue = support::queue(&platform, temp_dir.path());

    let first = assert_ok!(queue.enqueue(Job::incremental(
        JobTarget::ChannelOnly(support::channel(100, "alpha")),
        ALICE,
    )));
    let second = assert_ok!(queue.enqueue(Job::incremental(
        JobTarget::ChannelOnly(support::channel(101, "beta")),
        BOB,
    )));
    let third = assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(102, "gamma")),
        OWNER,
    )));

    assert!(matches!(first, Enqueued::Started(_)));
    assert!(matches!(second, Enqueued::Queued { position: 1, .. }));
    assert!(matches!(third, Enqueued::Queued { position: 2, .. }));

    support::wait_for_downloads(&platform, 1).await;
    platform.release_downloads();
    let summary = support::drain(&queue).await;

    assert!(platform.max_concurrent_downloads() <= 1);
    assert_eq!(
        platform.listed_containers(),
        vec![ContainerId(100), ContainerId(101), ContainerId(102)]
    );
    let order: Vec<_> = summary.jobs.iter().map(|job| job.id).collect();
    assert_eq!(order, vec![first.job_id(), second.job_id(), third.job_id()]);
    assert!(summary
        .jobs
        .iter()
        .all(|job| job.status == JobStatus::Completed && job.counts.files_saved == 2));
}

#[tokio::test]
async fn test_duplicate_targets_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    platform.push_message(ContainerId(100), 1, ALICE, &[("a.txt", b"a")]);
    platform.hold_downloads();
    let queue = support::queue(&platform, temp_dir.path());
    let general = support::channel(100, "general");
    let random = support::channel(101, "random");

    assert_ok!(queue.enqueue(Job::incremental(JobTarget::ChannelOnly(general.clone()), ALICE)));
    assert_ok!(queue.enqueue(Job::incremental(JobTarget::ChannelOnly(random.clone()), ALICE)));

    // Running target, even in another mode or scope
    let err = assert_err!(queue.enqueue(Job::full(JobTarget::ChannelWithThreads(general), BOB)));
    assert!(matches!(err, QueueError::DuplicateTarget(_)));

    // Pending target
    let err = assert_err!(queue.enqueue(Job::incremental(JobTarget::ChannelOnly(random), BOB)));
    assert!(matches!(err, QueueError::DuplicateTarget(_)));

    assert_eq!(queue.status().pending.len(), 1);
    platform.release_downloads();
    let summary = support::drain(&queue).await;
    assert_eq!(summary.jobs.len(), 2);
}

#[tokio::test]
async fn test_clear_pending_leaves_running_job_alone() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    platform.push_message(ContainerId(100), 1, ALICE, &[("a.txt", b"a")]);
    platform.hold_downloads();
    let queue = support::queue(&platform, temp_dir.path());

    let running = assert_ok!(queue.enqueue(Job::incremental(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    for id in [101, 102] {
        assert_ok!(queue.enqueue(Job::incremental(
            JobTarget::ChannelOnly(support::channel(id, "other")),
            ALICE,
        )));
    }

    assert_eq!(queue.clear_pending(), 2);
    let status = queue.status();
    assert!(status.pending.is_empty());
    let current = status.running.expect("running job survives clear");
    assert_eq!(current.id, running.job_id());
    assert!(!current.stopping);

    assert_eq!(queue.clear_pending(), 0);

    platform.release_downloads();
    let summary = support::drain(&queue).await;
    assert_eq!(summary.jobs.len(), 1);
    assert_eq!(summary.jobs[0].status, JobStatus::Completed);
    assert_eq!(summary.jobs[0].counts.files_saved, 1);
}

#[tokio::test]
async fn test_stop_cancels_running_job_and_keeps_counts() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let channel = ContainerId(100);
    for id in 1..=3 {
        platform.push_message(channel, id, ALICE, &[(format!("file{id}.txt").as_str(), b"data")]);
    }
    platform.push_message(ContainerId(101), 1, BOB, &[("next.txt", b"n")]);
    platform.hold_downloads();
    let queue = support::queue(&platform, temp_dir.path());

    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(100, "general")),
        ALICE,
    )));
    assert_ok!(queue.enqueue(Job::full(
        JobTarget::ChannelOnly(support::channel(101, "random")),
        BOB,
    )));

    support::wait_for_downloads(&platform, 1).await;
    assert_ok!(queue.stop());
    assert!(queue.status().running.unwrap().stopping);
    assert_eq!(queue.status().pending.len(), 1);

    platform.release_downloads();
    let summary = support::drain(&queue).await;

    assert_eq!(summary.jobs.len(), 2);
    let stopped = &summary.jobs[0];
    assert_eq!(stopped.status, JobStatus::Cancelled);
    // The in-flight download finishes; nothing after it starts
    assert_eq!(stopped.counts.files_saved, 1);
    assert!(temp_dir.path().join("Test Server/general/file3.txt").exists());
    assert!(!temp_dir.path().join("Test Server/general/file2.txt").exists());

    assert_eq!(summary.jobs[1].status, JobStatus::Completed);
    assert_eq!(summary.jobs[1].counts.files_saved, 1);
}

#[tokio::test]
async fn test_stop_on_idle_queue() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    let queue = support::queue(&platform, temp_dir.path());

    assert_eq!(assert_err!(queue.stop()), QueueError::NoActiveJob);
    assert!(queue.status().is_idle());
}

#[tokio::test]
async fn test_new_session_after_drain() {
    let temp_dir = TempDir::new().unwrap();
    let platform = support::platform();
    platform.push_message(ContainerId(100), 1, ALICE, &[("a.txt", b"a")]);
    let queue = support::queue(&platform, temp_dir.path());
    let general = support::channel(100, "general");

    assert_ok!(queue.enqueue(Job::full(JobTarget::ChannelOnly(general.clone()), ALICE)));
    let first = support::drain(&queue).await;

    assert_ok!(queue.enqueue(Job::full(JobTarget::ChannelOnly(general), ALICE)));
    let second = support::drain(&queue).await;

    assert_eq!(first.jobs.len(), 1);
    assert_eq!(second.jobs.len(), 1);
    assert_ne!(first.jobs[0].id, second.jobs[0].id);
    assert!(temp_dir.path().join("Test Server/general/a_1.txt").exists());
    assert_eq!(platform.direct_messages().len(), 4);
}
