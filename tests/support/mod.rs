//! Shared fixtures for the integration tests

#![allow(dead_code)]

use channel_archiver::platform::mock::MockPlatform;
use channel_archiver::queue::QueueSummary;
use channel_archiver::{Container, ContainerId, QueueManager, UserId};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const BOT: UserId = UserId(1);
pub const OWNER: UserId = UserId(42);
pub const ALICE: UserId = UserId(7);
pub const BOB: UserId = UserId(8);

pub const SERVER: &str = "Test Server";

pub fn channel(id: u64, name: &str) -> Container {
    Container::channel(ContainerId(id), SERVER, name)
}

pub fn platform() -> Arc<MockPlatform> {
    Arc::new(MockPlatform::new(BOT))
}

pub fn queue(platform: &Arc<MockPlatform>, root: &Path) -> QueueManager {
    QueueManager::builder(platform.clone(), OWNER, root)
        .download_delay(Duration::ZERO)
        .build()
}

/// Poll until `count` downloads are parked inside the mock
pub async fn wait_for_downloads(platform: &MockPlatform, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while platform.downloads_in_flight() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("downloads never started");
}

/// Wait for the queue to drain and return the session summary
pub async fn drain(queue: &QueueManager) -> QueueSummary {
    tokio::time::timeout(Duration::from_secs(5), queue.wait_until_idle())
        .await
        .expect("queue never drained");
    queue.last_summary().expect("no summary recorded")
}
