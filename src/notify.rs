//! Completion notice sent when the queue drains
//!
//! The notice totals every job run since the queue last became active,
//! points at the archive root, calls out jobs that ended on an exhausted
//! session (so the owner knows to run them again) and lists failed
//! attachments as links. The whole notice is kept under
//! [`NOTIFICATION_CHAR_BUDGET`] characters: target lists that overflow end in
//! "and N more", failed attachments collapse into a "...and N more." line.
//!
//! Delivery failures (direct messages disabled, unknown user) are logged and
//! swallowed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::downloader::config::NOTIFICATION_CHAR_BUDGET;
use crate::downloader::progress::{format_bytes, format_duration};
use crate::downloader::{FailedItem, JobCounts, JobReport, JobStatus};
use crate::platform::ChatPlatform;
use crate::UserId;

/// Aggregate of every job run in one queue session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueueSummary {
    /// Reports in completion order
    pub jobs: Vec<JobReport>,
    /// Time from the first job starting to the queue draining
    pub elapsed: Duration,
}

impl QueueSummary {
    /// Counters summed across jobs
    pub fn totals(&self) -> JobCounts {
        let mut totals = JobCounts::default();
        for job in &self.jobs {
            totals.add(&job.counts);
        }
        totals
    }

    /// Jobs that ended on an exhausted session
    pub fn auth_exhausted(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|job| job.auth_exhausted())
    }

    /// Jobs that failed for any other reason
    pub fn other_failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Failed && !job.auth_exhausted())
    }

    /// Jobs stopped on request
    pub fn cancelled(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Cancelled)
    }

    /// Failed items across all jobs, in order
    pub fn failed_items(&self) -> impl Iterator<Item = &FailedItem> {
        self.jobs.iter().flat_map(|job| job.failed_items.iter())
    }

    /// User who asked for the most recently finished job
    pub fn last_requester(&self) -> Option<UserId> {
        self.jobs.last().map(|job| job.requested_by)
    }
}

/// Composes and delivers the completion notice
pub struct CompletionNotifier {
    platform: Arc<dyn ChatPlatform>,
    owner: UserId,
    download_root: PathBuf,
}

impl CompletionNotifier {
    /// Notifier sending to `owner`
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        owner: UserId,
        download_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            platform,
            owner,
            download_root: download_root.into(),
        }
    }

    /// Recipients: the owner, then the last requester when it is someone else
    pub fn recipients(&self, summary: &QueueSummary) -> Vec<UserId> {
        let mut recipients = vec![self.owner];
        if let Some(requester) = summary.last_requester() {
            if requester != self.owner {
                recipients.push(requester);
            }
        }
        recipients
    }

    /// Send the notice; returns how many recipients received it
    pub async fn notify(&self, summary: &QueueSummary) -> usize {
        let text = compose(summary, &self.download_root);
        let mut delivered = 0;

        for user in self.recipients(summary) {
            match self.platform.send_direct_message(user, &text).await {
                Ok(()) => {
                    info!(user = %user, "Completion notice sent");
                    delivered += 1;
                }
                Err(e) => warn!(user = %user, error = %e, "Failed to send completion notice"),
            }
        }
        delivered
    }
}

/// Render the completion notice
pub fn compose(summary: &QueueSummary, download_root: &Path) -> String {
    let budget = NOTIFICATION_CHAR_BUDGET;
    let totals = summary.totals();
    let mut text = String::from("**All queued downloads complete.**\n");
    text.push_str(&format!(
        "Saved {} file(s) ({}), {} failed, across {} target(s) in {}.\n",
        totals.files_saved,
        format_bytes(totals.bytes_saved),
        totals.files_failed,
        summary.jobs.len(),
        format_duration(summary.elapsed),
    ));
    text.push_str(&format!("Archive: `{}`", download_root.display()));
    clamp(&mut text, budget);

    let exhausted: Vec<String> = summary
        .auth_exhausted()
        .map(|job| job.target.to_string())
        .collect();
    append_targets(
        &mut text,
        "\n\n**Authorization expired** while archiving ",
        &exhausted,
        ". Run the command again to pick up where it stopped.",
        budget,
    );

    let failed: Vec<String> = summary
        .other_failures()
        .map(|job| match &job.failure {
            Some(failure) => format!("{} ({failure})", job.target),
            None => job.target.to_string(),
        })
        .collect();
    append_targets(&mut text, "\n\n**Failed:** ", &failed, "", budget);

    let cancelled: Vec<String> = summary
        .cancelled()
        .map(|job| job.target.to_string())
        .collect();
    append_targets(&mut text, "\n\n**Stopped early:** ", &cancelled, "", budget);

    let items: Vec<&FailedItem> = summary.failed_items().collect();
    if !items.is_empty() {
        let heading = format!("\n\n**{} failed download(s):**", items.len());
        if char_len(&text) + char_len(&heading) < budget {
            text.push_str(&heading);
            append_failures(&mut text, &items, budget);
        }
    }

    text
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Cut `text` so it stays under `budget` characters
fn clamp(text: &mut String, budget: usize) {
    if char_len(text) < budget {
        return;
    }
    let keep = budget.saturating_sub(2);
    if let Some((cut, _)) = text.char_indices().nth(keep) {
        text.truncate(cut);
    }
    text.push('…');
}

fn more_targets(omitted: usize, any_listed: bool) -> String {
    if any_listed {
        format!(" and {omitted} more")
    } else {
        format!("{omitted} target(s)")
    }
}

/// Append a `prefix`, comma-separated `targets`, `suffix` section
///
/// Targets that do not fit are counted instead of listed. A section that
/// cannot fit at all is left out.
fn append_targets(
    text: &mut String,
    prefix: &str,
    targets: &[String],
    suffix: &str,
    budget: usize,
) {
    if targets.is_empty() {
        return;
    }

    let fixed = char_len(text) + char_len(prefix) + char_len(suffix);
    let mut listed: Vec<&str> = Vec::new();
    let mut used = 0;
    for (i, target) in targets.iter().enumerate() {
        let separator = if listed.is_empty() { 0 } else { 2 };
        let left_after = targets.len() - i - 1;
        let reserve = if left_after > 0 {
            char_len(&more_targets(left_after, true))
        } else {
            0
        };

        let entry = separator + char_len(target);
        if fixed + used + entry + reserve < budget {
            listed.push(target);
            used += entry;
        } else {
            break;
        }
    }

    let mut section = format!("{prefix}{}", listed.join(", "));
    let omitted = targets.len() - listed.len();
    if omitted > 0 {
        section.push_str(&more_targets(omitted, !listed.is_empty()));
    }
    section.push_str(suffix);

    if char_len(text) + char_len(&section) < budget {
        text.push_str(&section);
    }
}

fn failure_line(item: &FailedItem) -> String {
    if item.link.is_empty() {
        format!("\n• {}: {}", item.name, item.reason)
    } else {
        format!("\n• [{}]({})", item.name, item.link)
    }
}

fn more_line(remaining: usize) -> String {
    format!("\n• ...and {remaining} more.")
}

/// Append failure lines while the text stays under `budget` characters,
/// leaving room for the closing "...and N more." line
fn append_failures(text: &mut String, items: &[&FailedItem], budget: usize) {
    let mut len = char_len(text);
    for (i, item) in items.iter().enumerate() {
        let line = failure_line(item);
        let left_after = items.len() - i - 1;
        let reserve = if left_after > 0 {
            char_len(&more_line(left_after))
        } else {
            0
        };

        let line_len = char_len(&line);
        if len + line_len + reserve < budget {
            text.push_str(&line);
            len += line_len;
        } else {
            let more = more_line(items.len() - i);
            if len + char_len(&more) < budget {
                text.push_str(&more);
            }
            break;
        }
    }
}
