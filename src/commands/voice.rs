use poise::serenity_prelude::{ChannelType, GuildChannel};
use tracing::error;

use crate::models::{Context, Error};
use crate::utils::messages::{format_error, format_success};
use crate::utils::translations::translate;
use crate::voice::{ChannelKind, VoiceCapabilities, VoiceChannelTarget};

/// Join a voice channel (yours by default)
#[poise::command(slash_command, guild_only)]
pub async fn join(
    ctx: Context<'_>,
    #[description = "Voice channel to join"]
    #[channel_types("Voice", "Stage")]
    channel: Option<GuildChannel>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(format_error("This command must be used in a server"))
            .await?;
        return Ok(());
    };

    // Default to the invoker's current voice channel
    let channel = match channel {
        Some(channel) => channel,
        None => {
            let current = ctx.guild().and_then(|guild| {
                guild
                    .voice_states
                    .get(&ctx.author().id)
                    .and_then(|state| state.channel_id)
                    .and_then(|id| guild.channels.get(&id).cloned())
            });
            match current {
                Some(channel) => channel,
                None => {
                    ctx.say(format_error(
                        "Join a voice channel first, or name one explicitly",
                    ))
                    .await?;
                    return Ok(());
                }
            }
        }
    };

    // The bot's own membership must resolve before permissions can be computed
    let bot_id = ctx.serenity_context().cache.current_user().id;
    let bot_member = match guild_id.member(ctx.serenity_context(), bot_id).await {
        Ok(member) => member,
        Err(e) => {
            error!(
                "Failed to resolve own membership in guild {}: {}",
                guild_id, e
            );
            ctx.say(format_error(
                "Could not resolve my membership in this server",
            ))
            .await?;
            return Ok(());
        }
    };

    let Some(capabilities) = ctx.guild().map(|guild| {
        let permissions = guild.user_permissions_in(&channel, &bot_member);
        VoiceCapabilities {
            can_connect: permissions.connect(),
            can_speak: permissions.speak(),
        }
    }) else {
        ctx.say(format_error("Could not resolve this server from the cache"))
            .await?;
        return Ok(());
    };

    let target = VoiceChannelTarget {
        channel_id: channel.id,
        guild_id: Some(channel.guild_id),
        kind: channel_kind(channel.kind),
    };

    // The readiness handshake may take longer than the interaction
    // acknowledgment deadline allows
    ctx.defer().await?;

    match ctx.data().voice.join(&target, capabilities).await {
        Ok(_) => {
            ctx.say(format_success(&format!(
                "{} <#{}>",
                translate(ctx.locale(), "voice_joined"),
                channel.id
            )))
            .await?;
        }
        Err(e) => {
            ctx.say(format_error(&e.to_string())).await?;
        }
    }
    Ok(())
}

/// Play an audio clip from the host filesystem
#[poise::command(slash_command, guild_only)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Path to an opus/ogg clip"] file: String,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(format_error("This command must be used in a server"))
            .await?;
        return Ok(());
    };

    ctx.defer().await?;

    match ctx.data().voice.play(guild_id, &file).await {
        Ok(()) => {
            ctx.say(format_success(&format!(
                "{} `{}`",
                translate(ctx.locale(), "playing"),
                file
            )))
            .await?;
        }
        Err(e) => {
            ctx.say(format_error(&e.to_string())).await?;
        }
    }
    Ok(())
}

/// Leave the current voice channel
#[poise::command(slash_command, guild_only)]
pub async fn leave(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(format_error("This command must be used in a server"))
            .await?;
        return Ok(());
    };

    if ctx.data().voice.leave(guild_id).await {
        ctx.say(format_success(translate(ctx.locale(), "voice_left")))
            .await?;
    } else {
        ctx.say(format_error(translate(ctx.locale(), "voice_not_connected")))
            .await?;
    }
    Ok(())
}

fn channel_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Voice => ChannelKind::Voice,
        ChannelType::Stage => ChannelKind::Stage,
        _ => ChannelKind::Other,
    }
}
