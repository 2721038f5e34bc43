//! Per-channel acquisition flow: resolve, enumerate, filter, schedule.

use std::sync::Arc;

use crate::filter::filter_messages;
use crate::naming;
use crate::types::{ChannelSummary, Event, FailureRecord, Message, Target};

use super::scheduler::Scheduler;
use super::{ChannelDownloader, RunContext};

impl ChannelDownloader {
    /// Acquire one channel within a run; never fails, errors land in the summary
    pub(super) async fn run_channel(&self, target: &Target, run: &RunContext) -> ChannelSummary {
        let identifier = target.identifier.trim().to_string();
        let mut summary = ChannelSummary {
            identifier: identifier.clone(),
            title: identifier.clone(),
            ..Default::default()
        };

        if run.cancel_token.is_cancelled() {
            tracing::info!(channel = %identifier, "Run cancelled, skipping channel");
            return summary;
        }

        let channel = match self.resolver.resolve(&identifier).await {
            Ok(channel) => channel,
            Err(e) => {
                tracing::error!(channel = %identifier, error = %e, "Failed to resolve channel");
                if e.is_connection() {
                    run.budget.record(&identifier);
                }
                summary.failed = 1;
                summary.failures.push(FailureRecord::from_error(&identifier, &e));
                self.emit_complete(&summary);
                return summary;
            }
        };
        summary.title = channel.title.clone();

        let listing = match self.enumerator.try_list_file_messages(&channel).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::error!(
                    channel = %channel.title,
                    error = %e,
                    "Failed to list messages, treating channel as empty"
                );
                if e.is_connection() {
                    run.budget.record(&identifier);
                }
                Arc::new(Vec::new())
            }
        };
        if listing.is_empty() {
            tracing::info!(channel = %channel.title, "No files found");
            self.emit_complete(&summary);
            return summary;
        }

        // Oldest first; sort_by_key is stable so same-date messages keep listing order.
        let mut messages: Vec<Message> = listing.iter().cloned().collect();
        messages.sort_by_key(|m| m.date);

        let channel_dir = [target.display_name.as_deref(), Some(channel.title.as_str())]
            .into_iter()
            .flatten()
            .find(|name| !name.trim().is_empty())
            .unwrap_or(identifier.as_str());
        let root = self.config.download_dir();
        let layout = &self.config.layout;
        let report = filter_messages(
            channel.id,
            &messages,
            &self.policy,
            &run.claims,
            |message| naming::target_dir(root, layout, channel_dir, message.date),
        )
        .await;

        for (reason, count) in report.skipped.iter() {
            tracing::info!(channel = %channel.title, reason = %reason, count, "{}", reason.label());
        }
        tracing::info!(
            channel = %channel.title,
            messages = messages.len(),
            queued = report.tasks.len(),
            skipped = report.skipped.total(),
            "Channel scanned"
        );
        self.event_tx
            .send(Event::ChannelScanned {
                identifier: identifier.clone(),
                title: channel.title.clone(),
                messages: messages.len(),
                queued: report.tasks.len(),
                skipped: report.skipped.clone(),
            })
            .ok();
        summary.skipped = report.skipped;

        let scheduler = Scheduler::new(
            Arc::clone(&self.client),
            Arc::clone(&self.config),
            self.event_tx.clone(),
            run.cancel_token.clone(),
            Arc::clone(&run.budget),
            &identifier,
        );
        let outcome = scheduler.run(report.tasks).await;
        summary.downloaded = outcome.downloaded;
        summary.failed = outcome.failed;
        summary.cancelled = outcome.cancelled;
        summary.planned = outcome.planned;
        summary.failures = outcome.failures;

        tracing::info!(
            channel = %channel.title,
            downloaded = summary.downloaded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            planned = summary.planned,
            "Channel complete"
        );
        self.emit_complete(&summary);
        summary
    }

    fn emit_complete(&self, summary: &ChannelSummary) {
        self.event_tx
            .send(Event::ChannelComplete {
                identifier: summary.identifier.clone(),
                downloaded: summary.downloaded,
                failed: summary.failed,
            })
            .ok();
    }
}
