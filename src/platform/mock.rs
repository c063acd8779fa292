//! In-memory [`ChatPlatform`] for tests and local experiments.
//!
//! Histories, threads and attachment bodies are registered up front. Failures
//! (expired tokens, broken downloads, rejected direct messages) can be
//! scripted per URL or container, and every call is recorded as a
//! [`MockEvent`] so tests can assert ordering.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use futures_util::stream;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use super::{ByteStream, ChatPlatform, HistoryOrder, MessageStream, PlatformError, PlatformResult};
use crate::{Attachment, ContainerId, Message, MessageId, Thread, ThreadState, UserId};

/// Call recorded by [`MockPlatform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// `list_messages` for a container
    ListMessages(ContainerId),
    /// `list_threads` for a channel
    ListThreads(ContainerId),
    /// `download` for an attachment URL
    Download(String),
    /// `refresh_session`
    Refresh,
    /// `send_direct_message` to a user
    DirectMessage(UserId),
}

#[derive(Default)]
struct MockState {
    /// Stored oldest first
    histories: HashMap<ContainerId, Vec<Message>>,
    threads: HashMap<ContainerId, Vec<Thread>>,
    files: HashMap<String, Vec<u8>>,
    download_auth_failures: HashMap<String, usize>,
    download_errors: HashMap<String, PlatformError>,
    body_auth_failures: HashMap<String, usize>,
    history_auth_failures: HashMap<ContainerId, usize>,
    relist_rejections: HashSet<ContainerId>,
    thread_errors: HashMap<ContainerId, PlatformError>,
    refresh_error: Option<PlatformError>,
    dm_error: Option<PlatformError>,
    sent: Vec<(UserId, String)>,
    events: Vec<MockEvent>,
}

/// Scriptable in-memory chat platform
pub struct MockPlatform {
    bot: UserId,
    state: Mutex<MockState>,
    gate: watch::Sender<bool>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    refreshes: AtomicUsize,
    next_attachment_id: AtomicU64,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockPlatform {
    /// Empty platform whose bot account is `bot`
    pub fn new(bot: UserId) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            bot,
            state: Mutex::new(MockState::default()),
            gate,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            next_attachment_id: AtomicU64::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a message to a container's history (history is kept oldest first)
    pub fn add_message(&self, container: ContainerId, message: Message) {
        let mut state = self.state();
        let history = state.histories.entry(container).or_default();
        history.push(message);
        history.sort_by_key(|m| m.id);
    }

    /// Append a message with the given attachments and register their bodies
    ///
    /// Returns the stored message so tests can read the generated URLs.
    pub fn push_message(
        &self,
        container: ContainerId,
        id: u64,
        author: UserId,
        files: &[(&str, &[u8])],
    ) -> Message {
        let attachments: Vec<Attachment> = files
            .iter()
            .map(|(name, body)| {
                let attachment_id = self.next_attachment_id.fetch_add(1, Ordering::SeqCst);
                Attachment {
                    id: attachment_id,
                    filename: (*name).to_string(),
                    url: format!("mock://{container}/{id}/{attachment_id}/{name}"),
                    size: body.len() as u64,
                }
            })
            .collect();

        {
            let mut state = self.state();
            for (attachment, (_, body)) in attachments.iter().zip(files) {
                state.files.insert(attachment.url.clone(), body.to_vec());
            }
        }

        let message = Message {
            id: MessageId(id),
            author,
            timestamp: Utc
                .timestamp_opt(1_700_000_000 + id as i64, 0)
                .single()
                .unwrap_or_else(Utc::now),
            attachments,
            jump_url: format!("mock://jump/{container}/{id}"),
        };
        self.add_message(container, message.clone());
        message
    }

    /// Register a thread under `channel`
    pub fn add_thread(&self, channel: ContainerId, id: u64, name: &str, state: ThreadState) {
        self.state().threads.entry(channel).or_default().push(Thread {
            id: ContainerId(id),
            name: name.to_string(),
            state,
        });
    }

    /// Reject the next `times` downloads of `url` as unauthorized
    pub fn fail_download_unauthorized(&self, url: &str, times: usize) {
        self.state()
            .download_auth_failures
            .insert(url.to_string(), times);
    }

    /// Cut the next `times` bodies of `url` after the first chunk with an
    /// authorization error
    pub fn fail_body_unauthorized(&self, url: &str, times: usize) {
        self.state().body_auth_failures.insert(url.to_string(), times);
    }

    /// Fail every download of `url` with `error`
    pub fn fail_download(&self, url: &str, error: PlatformError) {
        self.state().download_errors.insert(url.to_string(), error);
    }

    /// Break the next history listing of `container` with an authorization
    /// error after `after` messages have been delivered
    pub fn fail_history_once_after(&self, container: ContainerId, after: usize) {
        self.state().history_auth_failures.insert(container, after);
    }

    /// Reject every listing of `container` after the first as unauthorized
    pub fn reject_history_relisting(&self, container: ContainerId) {
        self.state().relist_rejections.insert(container);
    }

    /// Fail thread listing for `channel`
    pub fn fail_thread_listing(&self, channel: ContainerId, error: PlatformError) {
        self.state().thread_errors.insert(channel, error);
    }

    /// Make every session refresh fail
    pub fn fail_refresh(&self, error: PlatformError) {
        self.state().refresh_error = Some(error);
    }

    /// Make every direct message fail
    pub fn reject_direct_messages(&self, error: PlatformError) {
        self.state().dm_error = Some(error);
    }

    /// Park every download until [`MockPlatform::release_downloads`]
    pub fn hold_downloads(&self) {
        self.gate.send_replace(false);
    }

    /// Let parked and future downloads proceed
    pub fn release_downloads(&self) {
        self.gate.send_replace(true);
    }

    /// Downloads currently inside [`ChatPlatform::download`]
    pub fn downloads_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous downloads observed
    pub fn max_concurrent_downloads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of `refresh_session` calls
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Direct messages delivered so far
    pub fn direct_messages(&self) -> Vec<(UserId, String)> {
        self.state().sent.clone()
    }

    /// Every recorded call, in order
    pub fn events(&self) -> Vec<MockEvent> {
        self.state().events.clone()
    }

    /// Containers whose history was listed, in call order
    pub fn listed_containers(&self) -> Vec<ContainerId> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match event {
                MockEvent::ListMessages(id) => Some(*id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    fn bot_user_id(&self) -> UserId {
        self.bot
    }

    async fn list_messages(
        &self,
        container: ContainerId,
        order: HistoryOrder,
        cursor: Option<MessageId>,
    ) -> PlatformResult<MessageStream> {
        let mut state = self.state();
        let listed_before = state
            .events
            .iter()
            .any(|event| *event == MockEvent::ListMessages(container));
        state.events.push(MockEvent::ListMessages(container));
        if listed_before && state.relist_rejections.contains(&container) {
            return Err(PlatformError::Unauthorized("session still expired".to_string()));
        }

        let mut messages: Vec<Message> = state
            .histories
            .get(&container)
            .cloned()
            .unwrap_or_default();
        if order == HistoryOrder::NewestFirst {
            messages.reverse();
        }
        if let Some(cursor) = cursor {
            messages.retain(|m| match order {
                HistoryOrder::NewestFirst => m.id < cursor,
                HistoryOrder::OldestFirst => m.id > cursor,
            });
        }

        let mut items: Vec<PlatformResult<Message>> = messages.into_iter().map(Ok).collect();
        if let Some(after) = state.history_auth_failures.remove(&container) {
            items.truncate(after);
            items.push(Err(PlatformError::Unauthorized(
                "session expired while listing history".to_string(),
            )));
        }

        Ok(Box::pin(stream::iter(items)))
    }

    async fn list_threads(&self, channel: ContainerId) -> PlatformResult<Vec<Thread>> {
        let mut state = self.state();
        state.events.push(MockEvent::ListThreads(channel));
        if let Some(err) = state.thread_errors.get(&channel) {
            return Err(err.clone());
        }

        let mut threads = state.threads.get(&channel).cloned().unwrap_or_default();
        threads.sort_by_key(|t| t.state == ThreadState::Archived);
        Ok(threads)
    }

    async fn download(&self, attachment: &Attachment) -> PlatformResult<ByteStream> {
        self.state()
            .events
            .push(MockEvent::Download(attachment.url.clone()));

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        // The sender lives as long as `self`, so this only errors during teardown
        let _ = gate.wait_for(|open| *open).await;

        let mut state = self.state();
        if let Some(remaining) = state.download_auth_failures.get_mut(&attachment.url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PlatformError::Unauthorized("token expired".to_string()));
            }
        }
        if let Some(err) = state.download_errors.get(&attachment.url) {
            return Err(err.clone());
        }

        let body = state
            .files
            .get(&attachment.url)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(attachment.url.clone()))?;

        // Two chunks so writers see a real stream
        let mid = body.len() / 2;
        let mut chunks = vec![Ok(Bytes::copy_from_slice(&body[..mid]))];
        match state.body_auth_failures.get_mut(&attachment.url) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                chunks.push(Err(PlatformError::Unauthorized(
                    "token expired mid-body".to_string(),
                )));
            }
            _ => chunks.push(Ok(Bytes::copy_from_slice(&body[mid..]))),
        }
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn refresh_session(&self) -> PlatformResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        state.events.push(MockEvent::Refresh);
        match &state.refresh_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn send_direct_message(&self, user: UserId, text: &str) -> PlatformResult<()> {
        let mut state = self.state();
        state.events.push(MockEvent::DirectMessage(user));
        if let Some(err) = &state.dm_error {
            return Err(err.clone());
        }
        state.sent.push((user, text.to_string()));
        Ok(())
    }
}
