use crate::db::entities::guild_configs;
use crate::services::localization::ContextL10nExt;
use crate::services::logger::{LogLevel, ModLog, ModLogEntry};
use crate::{Context, Error};
use anyhow::Context as _;
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tracing::error;

/// Where moderation logs and alerts go, and who gets pinged
#[poise::command(
    slash_command,
    guild_only,
    subcommands("channel", "alerts", "modrole", "alertrole", "show"),
    subcommand_required,
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn modlog(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Loads the guild's configuration row, creating an empty one if needed.
async fn load_or_create(ctx: &Context<'_>) -> Result<guild_configs::Model, Error> {
    let db = &ctx.data().db;
    let guild_id = ctx
        .guild_id()
        .context("Configuration is only available in guilds")?
        .get() as i64;

    match guild_configs::Entity::find_by_id(guild_id).one(db).await? {
        Some(m) => Ok(m),
        None => {
            let m = guild_configs::ActiveModel {
                guild_id: Set(guild_id),
                ..Default::default()
            };
            Ok(m.insert(db).await?)
        }
    }
}

async fn save<F>(ctx: &Context<'_>, edit: F) -> Result<(), Error>
where
    F: FnOnce(&mut guild_configs::ActiveModel),
{
    let mut config: guild_configs::ActiveModel = load_or_create(ctx).await?.into();
    edit(&mut config);
    config.update(&ctx.data().db).await?;
    Ok(())
}

async fn confirm(ctx: &Context<'_>, key: &str, value: String) -> Result<(), Error> {
    let mut args = FluentArgs::new();
    args.set("value", value.clone());
    ctx.say(ctx.l10n_user().t(key, Some(&args))).await?;

    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let mut entry = ModLogEntry::new(guild_id.get(), LogLevel::Audit, "Moderation settings changed");
    entry.description = ctx.l10n_user().t(key, Some(&args));
    entry.fields = vec![("Moderator".to_string(), format!("<@{}>", ctx.author().id))];
    if let Err(e) = ctx.data().logger.send(entry).await {
        error!("Failed to log config change in guild {}: {:?}", guild_id, e);
    }
    Ok(())
}

/// Set the channel infraction logs are sent to
#[poise::command(slash_command, guild_only, default_member_permissions = "ADMINISTRATOR")]
pub async fn channel(
    ctx: Context<'_>,
    #[description = "The mod log channel"] channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let id = channel.id.get() as i64;
    save(&ctx, |c| c.log_channel_id = Set(Some(id))).await?;
    confirm(&ctx, "config-log-channel-set", format!("<#{}>", channel.id)).await
}

/// Set the channel filter alerts are sent to
#[poise::command(slash_command, guild_only, default_member_permissions = "ADMINISTRATOR")]
pub async fn alerts(
    ctx: Context<'_>,
    #[description = "The alert channel. Leave empty to use the mod log"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let id = channel.as_ref().map(|c| c.id.get() as i64);
    save(&ctx, |c| c.alert_channel_id = Set(id)).await?;
    let value = match channel {
        Some(channel) => format!("<#{}>", channel.id),
        None => "the mod log channel".to_string(),
    };
    confirm(&ctx, "config-alert-channel-set", value).await
}

/// Set the role pinged when an infraction fails
#[poise::command(slash_command, guild_only, default_member_permissions = "ADMINISTRATOR")]
pub async fn modrole(
    ctx: Context<'_>,
    #[description = "The moderator role"] role: Option<serenity::Role>,
) -> Result<(), Error> {
    let id = role.as_ref().map(|r| r.id.get() as i64);
    save(&ctx, |c| c.mod_role_id = Set(id)).await?;
    let value = role.map_or_else(|| "nobody".to_string(), |r| format!("<@&{}>", r.id));
    confirm(&ctx, "config-mod-role-set", value).await
}

/// Set the role pinged by filter alerts and failed expirations
#[poise::command(slash_command, guild_only, default_member_permissions = "ADMINISTRATOR")]
pub async fn alertrole(
    ctx: Context<'_>,
    #[description = "The role to ping. Leave empty to use the moderator role"] role: Option<
        serenity::Role,
    >,
) -> Result<(), Error> {
    let id = role.as_ref().map(|r| r.id.get() as i64);
    save(&ctx, |c| c.mod_alert_role_id = Set(id)).await?;
    let value = role.map_or_else(|| "the moderator role".to_string(), |r| format!("<@&{}>", r.id));
    confirm(&ctx, "config-alert-role-set", value).await
}

/// Show the current moderation settings
#[poise::command(slash_command, guild_only, default_member_permissions = "ADMINISTRATOR")]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let config = load_or_create(&ctx).await?;
    let embed = serenity::CreateEmbed::new()
        .title(ctx.l10n_user().t("config-show-title", None))
        .description(describe(&config))
        .color(0x95a5a6);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

fn describe(config: &guild_configs::Model) -> String {
    let channel = |id: Option<i64>| id.map_or_else(|| "not set".to_string(), |id| format!("<#{id}>"));
    let role = |id: Option<i64>| id.map_or_else(|| "not set".to_string(), |id| format!("<@&{id}>"));
    [
        format!("**Mod log:** {}", channel(config.log_channel_id)),
        format!("**Alerts:** {}", channel(config.alert_channel_id)),
        format!("**Moderator role:** {}", role(config.mod_role_id)),
        format!("**Alert role:** {}", role(config.mod_alert_role_id)),
    ]
    .join("\n")
}
