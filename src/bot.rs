//! Owner-facing command layer
//!
//! Translates the five chat commands into queue operations and renders the
//! reply text. The platform client owns command registration and delivery;
//! it builds an [`Invocation`] for each command and posts the returned
//! [`Reply`].
//!
//! Commands invoked inside a thread archive that thread only. Commands
//! invoked in a text channel archive the channel and all of its threads.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::str::FromStr;
use tracing::{info, warn};

use crate::downloader::progress::format_duration;
use crate::downloader::{ArchiveMode, Job, JobTarget};
use crate::queue::{Enqueued, QueueError, QueueManager};
use crate::{Container, MessageId, UserId};

/// Who may issue commands
#[derive(Debug, Clone)]
pub struct Authorizer {
    owner: UserId,
    approved: HashSet<UserId>,
}

impl Authorizer {
    /// The owner plus a list of approved users
    pub fn new(owner: UserId, approved: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            owner,
            approved: approved.into_iter().collect(),
        }
    }

    /// Bot owner
    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Whether `user` may issue commands
    pub fn is_authorized(&self, user: UserId) -> bool {
        user == self.owner || self.approved.contains(&user)
    }
}

/// Chat commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Archive new attachments since the last run
    Download,
    /// Archive everything, including every thread
    DownloadAll,
    /// Stop the running download and clear the queue
    Stop,
    /// Show the queue
    Queue,
    /// Clear pending downloads, keep the running one
    ClearQueue,
}

impl Command {
    /// Every command, in help order
    pub const ALL: [Command; 5] = [
        Command::Download,
        Command::DownloadAll,
        Command::Stop,
        Command::Queue,
        Command::ClearQueue,
    ];

    /// Command name as typed by users
    pub fn name(&self) -> &'static str {
        match self {
            Command::Download => "download",
            Command::DownloadAll => "downloadall",
            Command::Stop => "stop",
            Command::Queue => "queue",
            Command::ClearQueue => "clearqueue",
        }
    }

    /// One-line help text
    pub fn description(&self) -> &'static str {
        match self {
            Command::Download => "Download new attachments from this channel",
            Command::DownloadAll => "Download all attachments from this channel and its threads",
            Command::Stop => "Stop current download and clear the download queue",
            Command::Queue => "View the current download queue",
            Command::ClearQueue => "Clear the download queue without stopping the current download",
        }
    }
}

/// Unrecognized command name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_start_matches('/').to_ascii_lowercase();
        Command::ALL
            .into_iter()
            .find(|command| command.name() == name)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// Context of one command invocation
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Invoking user
    pub user: UserId,
    /// Channel or thread the command was issued in
    pub container: Container,
    /// Bot message already posted in response, if any
    pub status_message: Option<MessageId>,
}

/// Reply to post back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Message text
    pub text: String,
    /// Visible only to the invoking user
    pub ephemeral: bool,
}

impl Reply {
    fn private(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ephemeral: true,
        }
    }

    fn public(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ephemeral: false,
        }
    }
}

/// Executes commands against the queue
#[derive(Clone)]
pub struct CommandHandler {
    queue: QueueManager,
    auth: Authorizer,
}

impl CommandHandler {
    /// Handler for `queue`, gated by `auth`
    pub fn new(queue: QueueManager, auth: Authorizer) -> Self {
        Self { queue, auth }
    }

    /// Underlying queue
    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    /// Run `command` for `invocation`
    pub fn handle(&self, command: Command, invocation: &Invocation) -> Reply {
        if !self.auth.is_authorized(invocation.user) {
            warn!(user = %invocation.user, command = command.name(), "Unauthorized command");
            return Reply::private("**Access Denied**\nYou are not authorized to use this bot.");
        }

        info!(
            user = %invocation.user,
            command = command.name(),
            container = %invocation.container,
            "Command received"
        );
        match command {
            Command::Download => self.download(invocation, ArchiveMode::Incremental),
            Command::DownloadAll => self.download(invocation, ArchiveMode::Full),
            Command::Stop => self.stop(),
            Command::Queue => self.show_queue(),
            Command::ClearQueue => self.clear_queue(),
        }
    }

    fn download(&self, invocation: &Invocation, mode: ArchiveMode) -> Reply {
        let target = target_for(&invocation.container);
        let label = target.to_string();

        let mut job = Job::new(target, mode, invocation.user);
        if let Some(status) = invocation.status_message {
            job = job.with_status_message(status);
        }

        match self.queue.enqueue(job) {
            Ok(Enqueued::Started(_)) => {
                Reply::public(format!("**Download started for {label}** ({mode} mode)"))
            }
            Ok(Enqueued::Queued { position, .. }) => Reply::public(format!(
                "**Download queued for {label}** ({mode} mode)\nPosition in queue: **{position}**"
            )),
            Err(QueueError::DuplicateTarget(_)) => {
                Reply::private(format!("{label} is already queued or downloading."))
            }
            Err(e) => Reply::private(format!("Could not queue download: {e}")),
        }
    }

    fn stop(&self) -> Reply {
        let stopped = self.queue.stop().is_ok();
        let cleared = self.queue.clear_pending();

        if !stopped && cleared == 0 {
            return Reply::private("You don't have any active downloads or queued jobs.");
        }

        let mut parts = Vec::new();
        if stopped {
            parts.push("Stopping current download...".to_string());
        }
        if cleared > 0 {
            parts.push(format!("Cleared {cleared} queued download(s)"));
        }
        Reply::private(parts.join("\n"))
    }

    fn show_queue(&self) -> Reply {
        let status = self.queue.status();
        if status.is_idle() {
            return Reply::private("You have no active downloads or queued jobs.");
        }

        let mut text = String::from("**Download Queue**\n");
        if let Some(running) = &status.running {
            let _ = write!(
                text,
                "\n**Currently downloading:** {} ({} files saved, {} elapsed)",
                running.target,
                running.counts.files_saved,
                format_duration(running.elapsed)
            );
            if running.stopping {
                text.push_str(" [stopping]");
            }
            text.push('\n');
        }
        if !status.pending.is_empty() {
            let _ = write!(text, "\n**Queued downloads:** {}", status.pending.len());
            for (i, pending) in status.pending.iter().enumerate() {
                let _ = write!(text, "\n  {}. {} ({})", i + 1, pending.target, pending.mode);
            }
            text.push('\n');
        }
        text.push_str("\nUse `/stop` to cancel all downloads");
        Reply::private(text)
    }

    fn clear_queue(&self) -> Reply {
        match self.queue.clear_pending() {
            0 => Reply::private("Your download queue is already empty."),
            n => Reply::private(format!(
                "Cleared **{n}** items from the download queue.\n\
                 The current download will continue."
            )),
        }
    }
}

/// Job target for a command issued in `container`
pub fn target_for(container: &Container) -> JobTarget {
    if container.is_thread() {
        JobTarget::ChannelOnly(container.clone())
    } else {
        JobTarget::ChannelWithThreads(container.clone())
    }
}
