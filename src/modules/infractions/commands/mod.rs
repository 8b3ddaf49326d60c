pub mod apply;
pub mod history;
pub mod pardon;

use crate::db::entities::infractions::InfractionType;
use crate::modules::infractions::duration_parser::parse_expiry;
use crate::services::infraction::{check_hierarchy, HierarchyError, InfractionRequest, TargetUser};
use crate::services::localization::ContextL10nExt;
use crate::{Context, Error};
use anyhow::Context as _;
use chrono::Utc;
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;

/// Highest role position among the given roles, looked up in the cached guild.
fn top_position(guild: &serenity::Guild, roles: &[serenity::RoleId]) -> u16 {
    roles
        .iter()
        .filter_map(|id| guild.roles.get(id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

/// Checks that both the moderator and the bot outrank a member target.
async fn hierarchy(
    ctx: &Context<'_>,
    guild_id: serenity::GuildId,
    target: &serenity::Member,
) -> Result<Result<(), HierarchyError>, Error> {
    let bot_id = ctx.cache().current_user().id;
    let bot = guild_id.member(*ctx, bot_id).await?;
    let actor = guild_id.member(*ctx, ctx.author().id).await?;

    let guild = ctx.guild().context("Guild is not cached")?;
    Ok(check_hierarchy(
        top_position(&guild, &actor.roles),
        top_position(&guild, &target.roles),
        top_position(&guild, &bot.roles),
        guild.owner_id == actor.user.id,
        guild.owner_id == target.user.id,
    ))
}

fn hierarchy_key(err: HierarchyError) -> &'static str {
    match err {
        HierarchyError::ActorTooLow => "infraction-hierarchy-actor",
        HierarchyError::BotTooLow => "infraction-hierarchy-bot",
        HierarchyError::TargetIsOwner => "infraction-hierarchy-owner",
    }
}

/// Kicks, timeouts and voice mutes act on members; the rest work on any user.
fn requires_membership(kind: InfractionType) -> bool {
    matches!(
        kind,
        InfractionType::Kick | InfractionType::Timeout | InfractionType::VoiceMute
    )
}

/// Shared body of the infraction commands.
pub(crate) async fn issue(
    ctx: Context<'_>,
    kind: InfractionType,
    user: serenity::User,
    duration: Option<String>,
    reason: Option<String>,
    purge: bool,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .context("Infractions are only available in guilds")?;
    let l10n = ctx.l10n_user();
    let mut args = FluentArgs::new();
    args.set("user", format!("<@{}>", user.id));

    if user.bot && kind != InfractionType::Note {
        ctx.say(l10n.t("infraction-target-bot", Some(&args))).await?;
        return Ok(());
    }
    if user.id == ctx.author().id {
        ctx.say(l10n.t("infraction-target-self", None)).await?;
        return Ok(());
    }

    let expires_at = match duration.as_deref() {
        Some(text) => match parse_expiry(text, Utc::now()) {
            Some(expiry) => Some(expiry),
            None => {
                args.set("input", text.to_string());
                ctx.say(l10n.t("invalid-duration", Some(&args))).await?;
                return Ok(());
            }
        },
        None => None,
    };

    ctx.defer().await?;

    match guild_id.member(ctx, user.id).await {
        Ok(member) => {
            if let Err(err) = hierarchy(&ctx, guild_id, &member).await? {
                ctx.say(l10n.t(hierarchy_key(err), Some(&args))).await?;
                return Ok(());
            }
        }
        Err(_) if requires_membership(kind) => {
            ctx.say(l10n.t("infraction-not-member", Some(&args))).await?;
            return Ok(());
        }
        Err(_) => {}
    }

    let request = InfractionRequest {
        guild_id: guild_id.get(),
        actor_id: ctx.author().id.get(),
        target: TargetUser {
            id: user.id.get(),
            name: Some(user.name.clone()),
        },
        kind,
        reason: reason.filter(|r| !r.is_empty()),
        expires_at,
        purge,
        jump_url: None,
    };

    let outcome = ctx.data().infractions.infract(request).await?;
    ctx.say(outcome.message).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_only_infractions() {
        assert!(requires_membership(InfractionType::Kick));
        assert!(requires_membership(InfractionType::Timeout));
        assert!(!requires_membership(InfractionType::Ban));
        assert!(!requires_membership(InfractionType::Warning));
    }
}
