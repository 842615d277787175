mod locks;
mod responder;

pub use locks::{ThreadGuard, ThreadLocks};
pub use responder::{
    DEFAULT_HISTORY_LIMIT, DispatchOutcome, Responder, ResponderConfig, ScanReport, TagOutcome,
};

use core::fmt;

use anyhow::Result;
use async_trait::async_trait;

/// Discord snowflake of a channel. Threads are channels too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

/// Snowflake of a forum tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Forum,
    Thread,
    Other,
}

/// A forum post as seen by the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    pub id: ChannelId,
    pub parent_id: Option<ChannelId>,
    pub applied_tags: Vec<TagId>,
}

impl Thread {
    #[must_use]
    pub fn has_tag(&self, tag: TagId) -> bool {
        self.applied_tags.contains(&tag)
    }

    /// Tag set with `tag` appended, or `None` when it is already applied.
    #[must_use]
    pub fn tags_with(&self, tag: TagId) -> Option<Vec<TagId>> {
        if self.has_tag(tag) {
            return None;
        }
        let mut tags = self.applied_tags.clone();
        tags.push(tag);
        Some(tags)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumMessage {
    pub author_is_bot: bool,
    pub content: String,
}

/// A message delivered by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingMessage {
    pub channel_id: ChannelId,
    pub author_is_bot: bool,
}

/// Everything the bot needs from the chat platform.
#[async_trait]
pub trait ForumPlatform: Send + Sync {
    async fn channel_kind(&self, channel: ChannelId) -> Result<ChannelKind>;

    /// Active (non-archived) threads whose parent is `forum`.
    async fn active_threads(&self, forum: ChannelId) -> Result<Vec<Thread>>;

    /// Current state of a thread; `None` when the channel is not a thread.
    async fn thread(&self, channel: ChannelId) -> Result<Option<Thread>>;

    /// Latest `limit` messages of a thread, newest first.
    async fn recent_messages(&self, thread: ChannelId, limit: u8) -> Result<Vec<ForumMessage>>;

    async fn send_message(&self, thread: ChannelId, content: &str) -> Result<()>;

    /// Replaces the whole applied tag set of a thread.
    async fn set_applied_tags(&self, thread: ChannelId, tags: &[TagId]) -> Result<()>;
}

#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate_reply(&self, question: &str) -> Result<String>;
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Single-line, length-capped rendition of user text for log fields.
#[must_use]
pub fn sanitize_line(s: &str, max: usize) -> String {
    let compact = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&compact, max)
}
