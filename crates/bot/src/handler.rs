//! Gateway events routed into the [`Responder`].

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use forum_core::{ChannelId, ChannelKind, IncomingMessage, Responder};
use serenity::{
    async_trait,
    model::{channel::GuildChannel, channel::Message, gateway::Ready},
    prelude::{Context, EventHandler, TypeMapKey},
};
use tracing::{debug, error, info, warn};

use crate::discord::{cached_kind, to_thread};

#[derive(Debug)]
pub struct ResponderKey;

impl TypeMapKey for ResponderKey {
    type Value = Arc<Responder>;
}

/// serenity runs every event in its own task, so these callbacks overlap.
#[derive(Debug, Default)]
pub struct Handler {
    scanned: AtomicBool,
}

impl Handler {
    /// True only for the first `ready` of the process.
    fn first_ready(&self) -> bool {
        !self.scanned.swap(true, Ordering::SeqCst)
    }
}

async fn responder(ctx: &Context) -> Option<Arc<Responder>> {
    let data = ctx.data.read().await;
    let found = data.get::<ResponderKey>().map(Arc::clone);
    if found.is_none() {
        error!("Responder not found in client data");
    }
    found
}

/// Channel kind from the gateway cache, without a REST call.
fn cached_channel_kind(ctx: &Context, msg: &Message) -> Option<ChannelKind> {
    let guild = msg.guild(&ctx.cache)?;
    cached_kind(&guild.channels, &guild.threads, msg.channel_id)
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "Logged in to Discord");

        // Reconnects deliver `ready` again; catching up once per process is enough.
        if !self.first_ready() {
            return;
        }
        let Some(responder) = responder(&ctx).await else {
            return;
        };
        if let Err(err) = responder.scan_unanswered_threads().await {
            let error = format!("{err:#}");
            warn!(error = %error, "Startup scan failed");
        }
    }

    async fn thread_create(&self, ctx: Context, thread: GuildChannel) {
        let Some(responder) = responder(&ctx).await else {
            return;
        };
        let thread = to_thread(&thread);
        match responder.on_thread_created(&thread).await {
            Ok(outcome) => debug!(thread = %thread.id, outcome = ?outcome, "Handled new thread"),
            Err(err) => {
                let error = format!("{err:#}");
                warn!(thread = %thread.id, error = %error, "Failed to answer new thread");
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        if matches!(
            cached_channel_kind(&ctx, &msg),
            Some(ChannelKind::Forum | ChannelKind::Other)
        ) {
            return;
        }
        let Some(responder) = responder(&ctx).await else {
            return;
        };
        let incoming = IncomingMessage {
            channel_id: ChannelId(msg.channel_id.get()),
            author_is_bot: msg.author.bot,
        };
        match responder.on_message_created(&incoming).await {
            Ok(outcome) => debug!(channel = %incoming.channel_id, outcome = ?outcome, "Handled message"),
            Err(err) => {
                let error = format!("{err:#}");
                warn!(channel = %incoming.channel_id, error = %error, "Failed to tag thread as human-replied");
            }
        }
    }
}
