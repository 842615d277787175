mod config;
mod discord;
mod handler;
mod logging;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use clap::Parser;
use forum_core::{ChannelId, Responder, ResponderConfig, TagId};
use reply_ai::OpenAiReplier;
use serenity::{Client, model::gateway::GatewayIntents};
use tracing::{info, warn};

use crate::{
    config::GenerationOverrides,
    discord::DiscordForum,
    handler::{Handler, ResponderKey},
    logging::{LogFormat, init_tracing},
};

#[derive(Parser, Debug)]
#[command(
    name = "forum-answer-bot",
    version,
    about = "Answers the first question of every Discord forum thread once"
)]
struct Args {
    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: String,

    /// API key for the chat completions endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    /// Forum channel whose threads get answered
    #[arg(long, env = "QUESTION_CHANNEL_ID")]
    question_channel_id: u64,

    /// Forum tag applied once the AI has replied
    #[arg(long, env = "AI_REPLIED_TAG_ID")]
    ai_replied_tag_id: u64,

    /// Forum tag applied once a human has posted
    #[arg(long, env = "HUMAN_REPLIED_TAG_ID")]
    human_replied_tag_id: u64,

    /// Optional YAML file with generation overrides
    #[arg(long, env = "BOT_CONFIG", default_value = "./config.yaml")]
    config: PathBuf,

    /// Model name (overrides the config file)
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// Sampling temperature (overrides the config file)
    #[arg(long, env = "OPENAI_TEMPERATURE")]
    temperature: Option<f32>,

    /// Base URL of an OpenAI-compatible API (overrides the config file)
    #[arg(long, env = "OPENAI_API_BASE")]
    openai_api_base: Option<String>,

    /// Log output format
    #[arg(long, env = "RUST_LOG_MODE", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present so clap can pick up env vars.
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(args.log_format)?;

    let file_config = config::load_file_config(&args.config)?;
    let generation = config::generation_config(
        &file_config,
        args.openai_api_key,
        GenerationOverrides {
            model: args.model,
            temperature: args.temperature,
            api_base: args.openai_api_base,
        },
    )?;
    let history_limit = config::history_limit(&file_config)?;
    let generator = Arc::new(OpenAiReplier::new(generation)?);

    let responder_config = ResponderConfig {
        forum_channel: ChannelId(args.question_channel_id),
        ai_replied_tag: TagId(args.ai_replied_tag_id),
        human_replied_tag: TagId(args.human_replied_tag_id),
        history_limit,
    };
    info!(
        forum = %responder_config.forum_channel,
        ai_tag = %responder_config.ai_replied_tag,
        human_tag = %responder_config.human_replied_tag,
        history_limit,
        "Watching forum channel"
    );

    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;
    let mut client = Client::builder(&args.discord_token, intents)
        .event_handler(Handler::default())
        .await
        .context("building Discord client")?;

    let platform = Arc::new(DiscordForum::new(Arc::clone(&client.http)));
    let responder = Arc::new(Responder::new(platform, generator, responder_config));
    client.data.write().await.insert::<ResponderKey>(responder);

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("Shutdown signal received, stopping Discord client");
        shard_manager.shutdown_all().await;
    });

    info!("Connecting to Discord gateway… Press Ctrl+C to stop.");
    client
        .start()
        .await
        .context("Discord client terminated")?;
    info!("Discord client stopped");
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "Cannot listen for SIGTERM; only Ctrl+C stops the bot");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
