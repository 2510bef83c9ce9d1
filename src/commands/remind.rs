use poise::serenity_prelude as serenity;
use tracing::{error, info};

use crate::models::{Context, Error};
use crate::utils::datetime::{parse_utc_timestamp, timestamp_format_help};
use crate::utils::messages::{build_apology, format_error, format_success};
use crate::utils::translations::translate;

/// Schedule a direct message for later delivery
#[poise::command(slash_command)]
pub async fn remind(
    ctx: Context<'_>,
    #[description = "Recipient"] user: serenity::User,
    #[description = "Message to deliver"] message: String,
    #[description = "When to deliver it (UTC), e.g. 2025-03-15 18:30"] when: String,
) -> Result<(), Error> {
    // The store accepts any timestamp; validating the input is on us
    let Some(send_at) = parse_utc_timestamp(&when) else {
        ctx.say(format_error(&timestamp_format_help())).await?;
        return Ok(());
    };

    match ctx
        .data()
        .store
        .schedule(
            &user.id.to_string(),
            &message,
            send_at,
            Some(&ctx.author().id.to_string()),
        )
        .await
    {
        Ok(scheduled) => {
            info!(
                "Scheduled message {} for user {} at {}",
                scheduled.id, user.id, scheduled.send_at
            );
            ctx.say(format_success(&format!(
                "{} {}",
                translate(ctx.locale(), "reminder_scheduled"),
                scheduled.send_at.format("%Y-%m-%d %H:%M UTC")
            )))
            .await?;
        }
        Err(e) => {
            error!("Failed to persist a scheduled message: {}", e);
            ctx.say(build_apology()).await?;
        }
    }
    Ok(())
}
