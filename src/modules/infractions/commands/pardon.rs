use crate::db::entities::infractions::InfractionType;
use crate::services::infraction::TargetUser;
use crate::{Context, Error};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;

/// Lift an active infraction before it expires
#[poise::command(
    slash_command,
    guild_only,
    subcommands("pardon_ban", "pardon_timeout", "pardon_voicemute"),
    subcommand_required,
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn pardon(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn run(
    ctx: Context<'_>,
    kind: InfractionType,
    user: serenity::User,
    reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .context("Infractions are only available in guilds")?;
    ctx.defer().await?;

    let target = TargetUser {
        id: user.id.get(),
        name: Some(user.name.clone()),
    };
    let message = ctx
        .data()
        .infractions
        .pardon_infraction(guild_id.get(), ctx.author().id.get(), kind, &target, reason)
        .await?;
    ctx.say(message).await?;
    Ok(())
}

/// Unban a user
#[poise::command(
    slash_command,
    guild_only,
    rename = "ban",
    default_member_permissions = "BAN_MEMBERS"
)]
pub async fn pardon_ban(
    ctx: Context<'_>,
    #[description = "The banned user"] user: serenity::User,
    #[description = "Why the ban is lifted"] reason: Option<String>,
) -> Result<(), Error> {
    run(ctx, InfractionType::Ban, user, reason).await
}

/// End a member's timeout
#[poise::command(
    slash_command,
    guild_only,
    rename = "timeout",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn pardon_timeout(
    ctx: Context<'_>,
    #[description = "The timed out member"] user: serenity::User,
    #[description = "Why the timeout is lifted"] reason: Option<String>,
) -> Result<(), Error> {
    run(ctx, InfractionType::Timeout, user, reason).await
}

/// Unmute a member in voice channels
#[poise::command(
    slash_command,
    guild_only,
    rename = "voicemute",
    default_member_permissions = "MUTE_MEMBERS"
)]
pub async fn pardon_voicemute(
    ctx: Context<'_>,
    #[description = "The muted member"] user: serenity::User,
    #[description = "Why the mute is lifted"] reason: Option<String>,
) -> Result<(), Error> {
    run(ctx, InfractionType::VoiceMute, user, reason).await
}
