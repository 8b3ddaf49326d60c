use super::issue;
use crate::db::entities::infractions::InfractionType;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

/// Ban a user, optionally for a limited time
#[poise::command(slash_command, guild_only, default_member_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "The user to ban"] user: serenity::User,
    #[description = "How long, e.g. 7d. Permanent if omitted"] duration: Option<String>,
    #[description = "Reason for the ban"] reason: Option<String>,
    #[description = "Delete the last day of their messages"] purge: Option<bool>,
) -> Result<(), Error> {
    issue(
        ctx,
        InfractionType::Ban,
        user,
        duration,
        reason,
        purge.unwrap_or(false),
    )
    .await
}

/// Kick a member
#[poise::command(slash_command, guild_only, default_member_permissions = "KICK_MEMBERS")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "The member to kick"] user: serenity::User,
    #[description = "Reason for the kick"] reason: Option<String>,
) -> Result<(), Error> {
    issue(ctx, InfractionType::Kick, user, None, reason, false).await
}

/// Time a member out. One hour if no duration is given, at most 28 days
#[poise::command(slash_command, guild_only, default_member_permissions = "MODERATE_MEMBERS")]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "The member to time out"] user: serenity::User,
    #[description = "How long, e.g. 1h30m"] duration: Option<String>,
    #[description = "Reason for the timeout"] reason: Option<String>,
) -> Result<(), Error> {
    issue(ctx, InfractionType::Timeout, user, duration, reason, false).await
}

/// Server-mute a member in voice channels
#[poise::command(slash_command, guild_only, default_member_permissions = "MUTE_MEMBERS")]
pub async fn voicemute(
    ctx: Context<'_>,
    #[description = "The member to mute"] user: serenity::User,
    #[description = "How long, e.g. 1h. Permanent if omitted"] duration: Option<String>,
    #[description = "Reason for the mute"] reason: Option<String>,
) -> Result<(), Error> {
    issue(ctx, InfractionType::VoiceMute, user, duration, reason, false).await
}

/// Warn a user. They are notified by DM
#[poise::command(slash_command, guild_only, default_member_permissions = "MODERATE_MEMBERS")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "The user to warn"] user: serenity::User,
    #[description = "Reason for the warning"] reason: String,
) -> Result<(), Error> {
    issue(ctx, InfractionType::Warning, user, None, Some(reason), false).await
}

/// Add a note to a user's history. They are not notified
#[poise::command(slash_command, guild_only, default_member_permissions = "MODERATE_MEMBERS")]
pub async fn note(
    ctx: Context<'_>,
    #[description = "The user the note is about"] user: serenity::User,
    #[description = "The note"] reason: String,
) -> Result<(), Error> {
    issue(ctx, InfractionType::Note, user, None, Some(reason), false).await
}
