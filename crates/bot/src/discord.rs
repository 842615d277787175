//! `ForumPlatform` backed by serenity's HTTP client.

use std::{collections::HashMap, sync::Arc};

use anyhow::{Context as _, Result};
use forum_core::{ChannelId, ChannelKind, ForumMessage, ForumPlatform, TagId, Thread};
use serenity::{
    async_trait,
    builder::{CreateMessage, EditThread, GetMessages},
    http::Http,
    model::{
        channel::{ChannelType, GuildChannel},
        id::{ChannelId as DiscordChannelId, ForumTagId},
    },
};

#[derive(Debug, Clone)]
pub struct DiscordForum {
    http: Arc<Http>,
}

impl DiscordForum {
    pub const fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn guild_channel(&self, channel: ChannelId) -> Result<Option<GuildChannel>> {
        let fetched = self
            .http
            .get_channel(DiscordChannelId::new(channel.0))
            .await
            .with_context(|| format!("GET channel {channel}"))?;
        Ok(fetched.guild())
    }
}

#[expect(clippy::wildcard_enum_match_arm)]
pub fn kind_of(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Forum => ChannelKind::Forum,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
            ChannelKind::Thread
        }
        _ => ChannelKind::Other,
    }
}

pub fn to_thread(channel: &GuildChannel) -> Thread {
    Thread {
        id: ChannelId(channel.id.get()),
        parent_id: channel.parent_id.map(|p| ChannelId(p.get())),
        applied_tags: channel.applied_tags.iter().map(|t| TagId(t.get())).collect(),
    }
}

/// Keeps the threads of a guild-wide listing that live under `forum`.
pub fn forum_threads(threads: &[GuildChannel], forum: ChannelId) -> Vec<Thread> {
    threads
        .iter()
        .filter(|t| t.parent_id.map(|p| p.get()) == Some(forum.0))
        .map(to_thread)
        .collect()
}

/// Kind of `channel` as seen by the gateway cache of its guild.
///
/// The cache keeps threads apart from regular channels. `None` means the
/// cache has not seen the channel.
pub fn cached_kind(
    channels: &HashMap<DiscordChannelId, GuildChannel>,
    threads: &[GuildChannel],
    channel: DiscordChannelId,
) -> Option<ChannelKind> {
    if threads.iter().any(|t| t.id == channel) {
        return Some(ChannelKind::Thread);
    }
    channels.get(&channel).map(|c| kind_of(c.kind))
}

#[async_trait]
impl ForumPlatform for DiscordForum {
    async fn channel_kind(&self, channel: ChannelId) -> Result<ChannelKind> {
        Ok(self
            .guild_channel(channel)
            .await?
            .map_or(ChannelKind::Other, |c| kind_of(c.kind)))
    }

    async fn active_threads(&self, forum: ChannelId) -> Result<Vec<Thread>> {
        let Some(channel) = self.guild_channel(forum).await? else {
            return Ok(Vec::new());
        };
        // Discord only lists active threads per guild.
        let data = self
            .http
            .get_guild_active_threads(channel.guild_id)
            .await
            .with_context(|| format!("GET active threads of guild {}", channel.guild_id))?;
        Ok(forum_threads(&data.threads, forum))
    }

    async fn thread(&self, channel: ChannelId) -> Result<Option<Thread>> {
        Ok(self
            .guild_channel(channel)
            .await?
            .filter(|c| kind_of(c.kind) == ChannelKind::Thread)
            .as_ref()
            .map(to_thread))
    }

    async fn recent_messages(&self, thread: ChannelId, limit: u8) -> Result<Vec<ForumMessage>> {
        let messages = DiscordChannelId::new(thread.0)
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await
            .with_context(|| format!("GET messages of {thread}"))?;
        Ok(messages
            .into_iter()
            .map(|m| ForumMessage {
                author_is_bot: m.author.bot,
                content: m.content,
            })
            .collect())
    }

    async fn send_message(&self, thread: ChannelId, content: &str) -> Result<()> {
        DiscordChannelId::new(thread.0)
            .send_message(&*self.http, CreateMessage::new().content(content))
            .await
            .with_context(|| format!("POST message to {thread}"))?;
        Ok(())
    }

    async fn set_applied_tags(&self, thread: ChannelId, tags: &[TagId]) -> Result<()> {
        let tags = tags.iter().map(|t| ForumTagId::new(t.0));
        DiscordChannelId::new(thread.0)
            .edit_thread(&*self.http, EditThread::new().applied_tags(tags))
            .await
            .with_context(|| format!("PATCH applied tags of {thread}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const GUILD: u64 = 500;
    const FORUM: u64 = 100;

    fn channel(id: u64, kind: u8, parent: Option<u64>, tags: &[u64]) -> GuildChannel {
        serde_json::from_value(json!({
            "id": id.to_string(),
            "guild_id": GUILD.to_string(),
            "type": kind,
            "name": format!("channel-{id}"),
            "position": 0,
            "nsfw": false,
            "permission_overwrites": [],
            "parent_id": parent.map(|p| p.to_string()),
            "applied_tags": tags.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    fn thread(id: u64, parent: Option<u64>, tags: &[u64]) -> GuildChannel {
        channel(id, 11, parent, tags)
    }

    #[test]
    fn forum_threads_keeps_only_children_of_the_forum() {
        let listing = [
            thread(1, Some(FORUM), &[7]),
            thread(2, Some(200), &[]),
            thread(3, None, &[]),
            thread(4, Some(FORUM), &[]),
        ];

        let threads = forum_threads(&listing, ChannelId(FORUM));

        let ids: Vec<_> = threads.iter().map(|t| t.id).collect();
        assert_eq!(ids, [ChannelId(1), ChannelId(4)]);
    }

    #[test]
    fn forum_threads_of_empty_listing() {
        assert!(forum_threads(&[], ChannelId(FORUM)).is_empty());
    }

    #[test]
    fn to_thread_maps_parent_and_tags() {
        let mapped = to_thread(&thread(9, Some(FORUM), &[7, 8]));
        assert_eq!(mapped.id, ChannelId(9));
        assert_eq!(mapped.parent_id, Some(ChannelId(FORUM)));
        assert_eq!(mapped.applied_tags, [TagId(7), TagId(8)]);

        let orphan = to_thread(&thread(10, None, &[]));
        assert_eq!(orphan.parent_id, None);
        assert!(orphan.applied_tags.is_empty());
    }

    #[test]
    fn cached_kind_tells_threads_from_channels() {
        let text = channel(20, 0, None, &[]);
        let forum = channel(FORUM, 15, None, &[]);
        let channels = HashMap::from([(text.id, text), (forum.id, forum)]);
        let threads = [thread(1, Some(FORUM), &[])];

        let kind = |id| cached_kind(&channels, &threads, DiscordChannelId::new(id));
        assert_eq!(kind(1), Some(ChannelKind::Thread));
        assert_eq!(kind(20), Some(ChannelKind::Other));
        assert_eq!(kind(FORUM), Some(ChannelKind::Forum));
        assert_eq!(kind(99), None);
    }

    #[test]
    fn thread_types_map_to_thread() {
        assert_eq!(kind_of(ChannelType::PublicThread), ChannelKind::Thread);
        assert_eq!(kind_of(ChannelType::PrivateThread), ChannelKind::Thread);
        assert_eq!(kind_of(ChannelType::NewsThread), ChannelKind::Thread);
    }

    #[test]
    fn forum_and_others() {
        assert_eq!(kind_of(ChannelType::Forum), ChannelKind::Forum);
        assert_eq!(kind_of(ChannelType::Text), ChannelKind::Other);
        assert_eq!(kind_of(ChannelType::Voice), ChannelKind::Other);
    }
}
