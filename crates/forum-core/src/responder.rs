use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow};
use tracing::{debug, info, warn};

use crate::{
    ChannelId, ChannelKind, ForumPlatform, IncomingMessage, ReplyGenerator, TagId, Thread,
    ThreadLocks, sanitize_line,
};

/// How many of the latest messages are searched for the question.
pub const DEFAULT_HISTORY_LIMIT: u8 = 10;

#[derive(Debug, Clone, Copy)]
pub struct ResponderConfig {
    pub forum_channel: ChannelId,
    pub ai_replied_tag: TagId,
    pub human_replied_tag: TagId,
    pub history_limit: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Replied,
    AlreadyReplied,
    NoHumanMessage,
    /// Thread lives under some other channel.
    OtherChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    Added,
    AlreadyPresent,
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub replied: usize,
    pub skipped_tagged: usize,
    pub skipped_empty: usize,
    pub failed: usize,
}

/// Answers the first question of every forum thread exactly once.
///
/// All state lives in the thread tags on the platform. Work on a single
/// thread is serialized through [`ThreadLocks`] so that concurrent tag writes
/// never overwrite each other.
pub struct Responder {
    platform: Arc<dyn ForumPlatform>,
    generator: Arc<dyn ReplyGenerator>,
    config: ResponderConfig,
    locks: ThreadLocks,
}

impl core::fmt::Debug for Responder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Responder")
            .field("config", &self.config)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl Responder {
    pub fn new(
        platform: Arc<dyn ForumPlatform>,
        generator: Arc<dyn ReplyGenerator>,
        config: ResponderConfig,
    ) -> Self {
        Self {
            platform,
            generator,
            config,
            locks: ThreadLocks::new(),
        }
    }

    /// Replies to the first human message of `thread` and tags it as answered.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the thread, generating the reply, posting
    /// it or writing the tags fails. The thread stays untagged in that case.
    pub async fn handle_thread(&self, thread: &Thread) -> Result<DispatchOutcome> {
        let _guard = self.locks.lock(thread.id).await;

        // The snapshot may predate a reply made while we waited for the lock.
        let current = self.current_thread(thread.id).await?;
        if current.has_tag(self.config.ai_replied_tag) {
            debug!(thread = %thread.id, "Thread already answered");
            return Ok(DispatchOutcome::AlreadyReplied);
        }

        let messages = self
            .platform
            .recent_messages(thread.id, self.config.history_limit)
            .await
            .with_context(|| format!("fetching messages of thread {}", thread.id))?;
        let Some(question) = messages.iter().rev().find(|m| !m.author_is_bot) else {
            debug!(thread = %thread.id, fetched = messages.len(), "No human message in thread");
            return Ok(DispatchOutcome::NoHumanMessage);
        };

        info!(
            thread = %thread.id,
            question = %sanitize_line(&question.content, 120),
            "Generating reply"
        );
        let reply = self
            .generator
            .generate_reply(&question.content)
            .await
            .with_context(|| format!("generating reply for thread {}", thread.id))?;

        self.platform
            .send_message(thread.id, &reply)
            .await
            .with_context(|| format!("sending reply to thread {}", thread.id))?;

        if let Some(tags) = current.tags_with(self.config.ai_replied_tag) {
            self.platform
                .set_applied_tags(thread.id, &tags)
                .await
                .with_context(|| format!("tagging thread {} as answered", thread.id))?;
        }
        info!(thread = %thread.id, chars = reply.chars().count(), "Replied to thread");
        Ok(DispatchOutcome::Replied)
    }

    /// Catches up on threads created while the bot was offline.
    ///
    /// Returns `None` when the configured channel is not a forum. A failure on
    /// one thread is logged and the scan moves on to the next.
    ///
    /// # Errors
    ///
    /// Returns an error if the forum channel or its active threads cannot be read.
    pub async fn scan_unanswered_threads(&self) -> Result<Option<ScanReport>> {
        let forum = self.config.forum_channel;
        let kind = self
            .platform
            .channel_kind(forum)
            .await
            .with_context(|| format!("fetching forum channel {forum}"))?;
        if kind != ChannelKind::Forum {
            warn!(channel = %forum, kind = ?kind, "Configured question channel is not a forum; skipping scan");
            return Ok(None);
        }

        let threads = self
            .platform
            .active_threads(forum)
            .await
            .with_context(|| format!("listing active threads of {forum}"))?;
        info!(channel = %forum, threads = threads.len(), "Scanning for unanswered threads");

        let mut report = ScanReport::default();
        for thread in &threads {
            report.scanned += 1;
            if thread.has_tag(self.config.ai_replied_tag) {
                report.skipped_tagged += 1;
                continue;
            }
            match self.handle_thread(thread).await {
                Ok(DispatchOutcome::Replied) => report.replied += 1,
                Ok(DispatchOutcome::AlreadyReplied | DispatchOutcome::OtherChannel) => {
                    report.skipped_tagged += 1;
                }
                Ok(DispatchOutcome::NoHumanMessage) => report.skipped_empty += 1,
                Err(err) => {
                    report.failed += 1;
                    let error = format!("{err:#}");
                    warn!(thread = %thread.id, error = %error, "Failed to answer thread during scan");
                }
            }
        }

        info!(
            scanned = report.scanned,
            replied = report.replied,
            skipped_tagged = report.skipped_tagged,
            skipped_empty = report.skipped_empty,
            failed = report.failed,
            "Scan complete"
        );
        Ok(Some(report))
    }

    /// Answers a freshly created thread if it belongs to the forum.
    ///
    /// # Errors
    ///
    /// Propagates the failure of [`Self::handle_thread`].
    pub async fn on_thread_created(&self, thread: &Thread) -> Result<DispatchOutcome> {
        if thread.parent_id != Some(self.config.forum_channel) {
            return Ok(DispatchOutcome::OtherChannel);
        }
        if thread.has_tag(self.config.ai_replied_tag) {
            return Ok(DispatchOutcome::AlreadyReplied);
        }
        self.handle_thread(thread).await
    }

    /// Marks a thread as having a human participant.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be read or the tags cannot be written.
    pub async fn on_message_created(&self, message: &IncomingMessage) -> Result<TagOutcome> {
        if message.author_is_bot {
            return Ok(TagOutcome::Ignored);
        }
        let _guard = self.locks.lock(message.channel_id).await;

        let Some(thread) = self
            .platform
            .thread(message.channel_id)
            .await
            .with_context(|| format!("fetching channel {}", message.channel_id))?
        else {
            return Ok(TagOutcome::Ignored);
        };

        let Some(tags) = thread.tags_with(self.config.human_replied_tag) else {
            return Ok(TagOutcome::AlreadyPresent);
        };
        self.platform
            .set_applied_tags(thread.id, &tags)
            .await
            .with_context(|| format!("tagging thread {} as human-replied", thread.id))?;
        info!(thread = %thread.id, "Tagged thread as human-replied");
        Ok(TagOutcome::Added)
    }

    async fn current_thread(&self, id: ChannelId) -> Result<Thread> {
        self.platform
            .thread(id)
            .await
            .with_context(|| format!("fetching thread {id}"))?
            .ok_or_else(|| anyhow!("channel {id} is not a thread"))
    }
}
