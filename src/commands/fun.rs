use poise::serenity_prelude as serenity;
use tracing::info;

use crate::constants::COMPLIMENTS;
use crate::models::{Context, Error};
use crate::utils::messages::{format_error, format_success};
use crate::utils::translations::translate;

/// Compliment yourself or another member
#[poise::command(slash_command)]
pub async fn compliment(
    ctx: Context<'_>,
    #[description = "Who to compliment"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target = user.map(|u| u.id).unwrap_or_else(|| ctx.author().id);
    let line = COMPLIMENTS[rand::random_range(0..COMPLIMENTS.len())];

    ctx.say(format!("<@{}>, {}", target, line)).await?;
    Ok(())
}

/// Send a direct message to a member through the bot
#[poise::command(slash_command)]
pub async fn dm(
    ctx: Context<'_>,
    #[description = "Recipient"] user: serenity::User,
    #[description = "Message to deliver"] message: String,
) -> Result<(), Error> {
    match ctx
        .data()
        .messenger
        .send_direct_message(&user.id.to_string(), &message)
        .await
    {
        Ok(()) => {
            info!(
                "Relayed a direct message from {} to {}",
                ctx.author().id,
                user.id
            );
            ctx.say(format_success(translate(ctx.locale(), "dm_sent")))
                .await?;
        }
        Err(e) => {
            ctx.say(format_error(&format!("Could not deliver the message: {}", e)))
                .await?;
        }
    }
    Ok(())
}
