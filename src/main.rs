mod commands;
mod constants;
mod models;
mod schedule;
mod status;
mod utils;
mod voice;

use poise::serenity_prelude as serenity;
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

use crate::commands::{compliment, dm, join, leave, play, remind};
use crate::constants::{DEFAULT_SCHEDULE_FILE, DEFAULT_STATUS_ADDR, LOG_DIRECTIVE};
use crate::models::Data;
use crate::schedule::{DeliveryWorker, DiscordMessenger, ScheduledMessageStore};
use crate::voice::{DiscordVoiceGateway, VoiceManager};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    initialize_logging();

    // Load configuration from environment
    let config = match load_configuration() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Create and start the bot
    if let Err(e) = start_bot(config).await {
        error!("Bot error: {}", e);
        std::process::exit(1);
    }
}

/// Configuration loaded from environment variables
struct Config {
    discord_token: String,
    schedule_file: String,
    status_addr: String,
    dev_guild_id: Option<u64>,
}

/// Initialize the logging system
fn initialize_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(LOG_DIRECTIVE.parse().expect("valid log directive")),
        )
        .init();
}

/// Load configuration from environment variables
fn load_configuration() -> Result<Config, Box<dyn std::error::Error>> {
    let discord_token = std::env::var("DISCORD_TOKEN")
        .map_err(|_| "DISCORD_TOKEN environment variable not set. Set it with: export DISCORD_TOKEN=your_bot_token")?;

    let schedule_file =
        std::env::var("SCHEDULE_FILE").unwrap_or_else(|_| DEFAULT_SCHEDULE_FILE.to_string());

    let status_addr =
        std::env::var("STATUS_ADDR").unwrap_or_else(|_| DEFAULT_STATUS_ADDR.to_string());

    // Optional: development guild ID for faster command registration
    let dev_guild_id = std::env::var("DEV_GUILD_ID")
        .ok()
        .and_then(|id| id.parse::<u64>().ok());

    if dev_guild_id.is_some() {
        info!("Development mode: Commands will be registered to guild only");
    }

    Ok(Config {
        discord_token,
        schedule_file,
        status_addr,
        dev_guild_id,
    })
}

/// Create and start the Discord bot
async fn start_bot(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let store = Arc::new(ScheduledMessageStore::new(&config.schedule_file));
    let songbird = Songbird::serenity();
    let voice = Arc::new(VoiceManager::new(Arc::new(DiscordVoiceGateway::new(
        songbird.clone(),
    ))));

    let store_for_setup = store.clone();
    let voice_for_setup = voice.clone();
    let dev_guild_id = config.dev_guild_id;

    // Create framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![compliment(), dm(), remind(), join(), play(), leave()],
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            let http = ctx.http.clone();
            Box::pin(async move {
                // Register commands based on dev_guild_id
                if let Some(guild_id) = dev_guild_id {
                    let guild = serenity::GuildId::new(guild_id);
                    info!("Registering commands in development guild: {}", guild_id);
                    poise::builtins::register_in_guild(ctx, &framework.options().commands, guild)
                        .await?;
                    info!(
                        "Commands registered in guild {} (instant updates)",
                        guild_id
                    );
                } else {
                    info!("Registering commands globally (may take up to 1 hour)");
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                    info!("Commands registered globally");
                }

                info!("Bot is ready!");

                Ok(Data::new(
                    store_for_setup,
                    voice_for_setup,
                    Arc::new(DiscordMessenger::new(http)),
                ))
            })
        })
        .build();

    // Create client with required intents
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let mut client = serenity::ClientBuilder::new(config.discord_token, intents)
        .framework(framework)
        .register_songbird_with(songbird)
        .await?;

    // The delivery worker talks to the REST API only, so it can start
    // before the gateway is ready
    let worker = Arc::new(DeliveryWorker::new(
        store.clone(),
        Arc::new(DiscordMessenger::new(client.http.clone())),
    ));
    worker.start().await;

    // Status service
    let status_store = store.clone();
    let status_voice = voice.clone();
    let status_addr = config.status_addr.clone();
    tokio::spawn(async move {
        if let Err(e) = status::serve(&status_addr, status_store, status_voice).await {
            error!("Status service failed: {}", e);
        }
    });

    // Graceful shutdown: stop the worker, unwind voice sessions, then
    // drop the gateway shards
    let shard_manager = client.shard_manager.clone();
    let worker_for_shutdown = worker.clone();
    let voice_for_shutdown = voice.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            worker_for_shutdown.stop().await;
            voice_for_shutdown.destroy_all().await;
            shard_manager.shutdown_all().await;
        }
    });

    // Start the bot
    info!("Starting bot...");
    client.start().await?;

    Ok(())
}
