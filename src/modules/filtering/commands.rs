use crate::db::entities::filter_lists::ListType;
use crate::db::entities::infractions::InfractionType;
use crate::modules::infractions::duration_parser::parse_duration;
use crate::services::filtering::invite::process_invite_input;
use crate::services::filtering::settings::{InfractionSetting, ListSettings, ValidationSettings};
use crate::services::infraction::time::humanize_delta;
use crate::services::localization::ContextL10nExt;
use crate::services::logger::{LogLevel, ModLog, ModLogEntry};
use crate::{Context, Error};
use anyhow::Context as _;
use fluent::FluentArgs;
use poise::ChoiceParameter as _;
use poise::serenity_prelude as serenity;
use tracing::error;

const MAX_LIST_LEN: usize = 4000;

/// Where a channel or category sits in a list's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ScopeMode {
    #[name = "enable"]
    Enable,
    #[name = "disable"]
    Disable,
    #[name = "reset"]
    Reset,
}

fn guild_id(ctx: &Context<'_>) -> Result<u64, Error> {
    ctx.guild_id()
        .map(|id| id.get())
        .context("Invite filter commands are only available in guilds")
}

async fn audit(ctx: &Context<'_>, title: &str, description: String) {
    let Some(guild_id) = ctx.guild_id() else {
        return;
    };
    let mut entry = ModLogEntry::new(guild_id.get(), LogLevel::Audit, title);
    entry.description = description;
    entry.fields = vec![
        ("Moderator".to_string(), format!("<@{}>", ctx.author().id)),
        ("Channel".to_string(), format!("<#{}>", ctx.channel_id())),
    ];
    if let Err(e) = ctx.data().logger.send(entry).await {
        error!("Failed to log invite list change in guild {}: {:?}", guild_id, e);
    }
}

/// Manage the invite allow and deny lists
#[poise::command(
    slash_command,
    guild_only,
    subcommands("allow", "deny", "remove", "list", "settings", "bypass", "channel"),
    subcommand_required,
    default_member_permissions = "MANAGE_GUILD"
)]
pub async fn invites(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

async fn add_entry(
    ctx: Context<'_>,
    list_type: ListType,
    invite: String,
    description: Option<String>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let guild_id = guild_id(&ctx)?;
    let l10n = ctx.l10n_user();

    let (target, description) =
        match process_invite_input(&invite, description.as_deref(), ctx.http()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                ctx.say(format!(":x: {e}")).await?;
                return Ok(());
            }
        };

    let mut args = FluentArgs::new();
    args.set("list", list_type.to_string());
    args.set("guild", target.to_string());

    match ctx
        .data()
        .filters
        .add_filter(guild_id, list_type, target, Some(description.clone()))
        .await?
    {
        Some(filter) => {
            args.set("id", filter.id);
            args.set("description", description.clone());
            ctx.say(l10n.t("invites-filter-added", Some(&args))).await?;
            audit(
                &ctx,
                "Invite filter added",
                format!(
                    "#{} `{}` added to the {} list: {}",
                    filter.id, target, list_type, description
                ),
            )
            .await;
        }
        None => {
            ctx.say(l10n.t("invites-filter-exists", Some(&args))).await?;
        }
    }
    Ok(())
}

/// Allow invites to a guild
#[poise::command(slash_command, guild_only, default_member_permissions = "MANAGE_GUILD")]
pub async fn allow(
    ctx: Context<'_>,
    #[description = "An invite link or code to the guild"] invite: String,
    #[description = "Why the guild is listed"] description: Option<String>,
) -> Result<(), Error> {
    add_entry(ctx, ListType::Allow, invite, description).await
}

/// Deny invites to a guild
#[poise::command(slash_command, guild_only, default_member_permissions = "MANAGE_GUILD")]
pub async fn deny(
    ctx: Context<'_>,
    #[description = "An invite link or code to the guild"] invite: String,
    #[description = "Why the guild is listed"] description: Option<String>,
) -> Result<(), Error> {
    add_entry(ctx, ListType::Deny, invite, description).await
}

/// Remove an entry from either list
#[poise::command(slash_command, guild_only, default_member_permissions = "MANAGE_GUILD")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "The filter ID shown by /invites list"] id: i32,
) -> Result<(), Error> {
    let guild_id = guild_id(&ctx)?;
    let l10n = ctx.l10n_user();
    let mut args = FluentArgs::new();
    args.set("id", id);

    if ctx.data().filters.remove_filter(guild_id, id).await? {
        ctx.say(l10n.t("invites-filter-removed", Some(&args))).await?;
        audit(&ctx, "Invite filter removed", format!("Filter #{id} was removed")).await;
    } else {
        ctx.say(l10n.t("invites-filter-missing", Some(&args))).await?;
    }
    Ok(())
}

/// Show the entries of the invite lists
#[poise::command(slash_command, guild_only, default_member_permissions = "MANAGE_GUILD")]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Only show this list"] list_type: Option<ListType>,
) -> Result<(), Error> {
    let guild_id = guild_id(&ctx)?;
    let l10n = ctx.l10n_user();
    let entries = ctx.data().filters.entries(guild_id).await?;

    let mut embed = serenity::CreateEmbed::new()
        .title(l10n.t("invites-list-title", None))
        .color(0x3498db);
    let mut any = false;
    for (list, filters) in entries {
        if list_type.is_some_and(|wanted| wanted != list.list_type) {
            continue;
        }
        any = true;
        let lines: Vec<String> = filters
            .iter()
            .map(|f| match &f.description {
                Some(description) => format!("`#{}` {} - {}", f.id, f.content, description),
                None => format!("`#{}` {}", f.id, f.content),
            })
            .collect();
        let body = if lines.is_empty() {
            l10n.t("invites-list-empty", None)
        } else {
            truncate_lines(&lines, MAX_LIST_LEN / 4)
        };
        embed = embed.field(list.list_type.to_string(), body, false);
    }

    if !any {
        ctx.say(l10n.t("invites-list-none", None)).await?;
        return Ok(());
    }
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Change what a list does and where it applies
#[allow(clippy::too_many_arguments)]
#[poise::command(slash_command, guild_only, default_member_permissions = "MANAGE_GUILD")]
pub async fn settings(
    ctx: Context<'_>,
    #[description = "The list to configure"] list_type: ListType,
    #[description = "Turn the list on or off"] enabled: Option<bool>,
    #[description = "Delete offending messages"] remove_message: Option<bool>,
    #[description = "Send an alert to moderators"] alert: Option<bool>,
    #[description = "Infraction to apply"] infraction: Option<InfractionType>,
    #[description = "Infraction duration, e.g. 1h30m"] duration: Option<String>,
    #[description = "Infraction reason"] reason: Option<String>,
    #[description = "Stop applying an infraction"] clear_infraction: Option<bool>,
    #[description = "Message sent to the author"] dm: Option<String>,
    #[description = "Also filter direct messages"] filter_dm: Option<bool>,
) -> Result<(), Error> {
    let guild_id = guild_id(&ctx)?;
    let l10n = ctx.l10n_user();

    if lacks_infraction(
        infraction.is_some() && clear_infraction != Some(true),
        duration.is_some(),
        reason.is_some(),
    ) {
        ctx.say(l10n.t("invites-infraction-required", None)).await?;
        return Ok(());
    }

    let duration_secs = match duration.as_deref() {
        Some(text) => match parse_duration(text) {
            Some(parsed) => Some(parsed.num_seconds()),
            None => {
                let mut args = FluentArgs::new();
                args.set("input", text.to_string());
                ctx.say(l10n.t("invalid-duration", Some(&args))).await?;
                return Ok(());
            }
        },
        None => None,
    };

    let updated = ctx
        .data()
        .filters
        .update_settings(guild_id, list_type, |s| {
            if let Some(enabled) = enabled {
                s.validations.enabled = enabled;
            }
            if let Some(remove) = remove_message {
                s.actions.remove_context = remove;
            }
            if let Some(alert) = alert {
                s.actions.send_alert = alert;
            }
            if let Some(filter_dm) = filter_dm {
                s.validations.filter_dm = filter_dm;
            }
            if let Some(dm) = dm {
                s.actions.dm_content = Some(dm).filter(|d| !d.is_empty());
            }
            if clear_infraction == Some(true) {
                s.actions.infraction = None;
            } else if let Some(kind) = infraction {
                s.actions.infraction = Some(InfractionSetting {
                    infraction_type: kind,
                    duration_secs,
                    reason,
                });
            }
        })
        .await?;

    let summary = describe_settings(&updated);
    let reply = serenity::CreateEmbed::new()
        .title(format!("{} list settings", list_type))
        .description(&summary)
        .color(0x3498db);
    ctx.send(poise::CreateReply::default().embed(reply)).await?;
    audit(
        &ctx,
        "Invite list settings changed",
        format!("The {} list now uses:\n{}", list_type, summary),
    )
    .await;
    Ok(())
}

/// Toggle a role that bypasses a list
#[poise::command(slash_command, guild_only, default_member_permissions = "MANAGE_GUILD")]
pub async fn bypass(
    ctx: Context<'_>,
    #[description = "The list to configure"] list_type: ListType,
    #[description = "Members with this role are not filtered"] role: serenity::Role,
) -> Result<(), Error> {
    let guild_id = guild_id(&ctx)?;
    let role_id = role.id.get();
    let mut added = false;

    ctx.data()
        .filters
        .update_settings(guild_id, list_type, |s| {
            added = toggle(&mut s.validations.bypass_roles, role_id);
        })
        .await?;

    let mut args = FluentArgs::new();
    args.set("role", format!("<@&{}>", role_id));
    args.set("list", list_type.to_string());
    let key = if added { "invites-bypass-added" } else { "invites-bypass-removed" };
    ctx.say(ctx.l10n_user().t(key, Some(&args))).await?;
    Ok(())
}

/// Enable or disable a list in a channel or category
#[poise::command(slash_command, guild_only, default_member_permissions = "MANAGE_GUILD")]
pub async fn channel(
    ctx: Context<'_>,
    #[description = "The list to configure"] list_type: ListType,
    #[description = "A channel or category"] channel: serenity::GuildChannel,
    #[description = "Enable, disable, or remove from both"] mode: ScopeMode,
) -> Result<(), Error> {
    let guild_id = guild_id(&ctx)?;
    let is_category = channel.kind == serenity::ChannelType::Category;

    ctx.data()
        .filters
        .update_settings(guild_id, list_type, |s| {
            apply_scope(&mut s.validations, channel.id.get(), is_category, mode);
        })
        .await?;

    let mut args = FluentArgs::new();
    args.set("channel", format!("<#{}>", channel.id));
    args.set("list", list_type.to_string());
    args.set("mode", mode.name().to_string());
    ctx.say(ctx.l10n_user().t("invites-scope-updated", Some(&args)))
        .await?;
    Ok(())
}

/// Duration and reason only mean something alongside a new infraction.
fn lacks_infraction(sets_infraction: bool, has_duration: bool, has_reason: bool) -> bool {
    !sets_infraction && (has_duration || has_reason)
}

/// Adds the ID if missing, removes it otherwise. Returns whether it was added.
fn toggle(ids: &mut Vec<u64>, id: u64) -> bool {
    if let Some(pos) = ids.iter().position(|x| *x == id) {
        ids.remove(pos);
        false
    } else {
        ids.push(id);
        true
    }
}

fn apply_scope(validations: &mut ValidationSettings, id: u64, is_category: bool, mode: ScopeMode) {
    let (enabled, disabled) = if is_category {
        (&mut validations.enabled_categories, &mut validations.disabled_categories)
    } else {
        (&mut validations.enabled_channels, &mut validations.disabled_channels)
    };
    enabled.retain(|x| *x != id);
    disabled.retain(|x| *x != id);
    match mode {
        ScopeMode::Enable => enabled.push(id),
        ScopeMode::Disable => disabled.push(id),
        ScopeMode::Reset => {}
    }
}

fn truncate_lines(lines: &[String], max: usize) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if out.len() + line.len() + 1 > max {
            out.push_str(&format!("... and {} more", lines.len() - i));
            break;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn mentions(ids: &[u64], prefix: &str) -> String {
    if ids.is_empty() {
        return "None".to_string();
    }
    ids.iter()
        .map(|id| format!("<{prefix}{id}>"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human readable summary of a list's defaults.
pub fn describe_settings(settings: &ListSettings) -> String {
    let actions = &settings.actions;
    let v = &settings.validations;
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    let infraction = match &actions.infraction {
        Some(setting) => {
            let duration = setting
                .duration_secs
                .map(|secs| humanize_delta(chrono::Duration::seconds(secs)))
                .unwrap_or_else(|| "permanent".to_string());
            format!("{} ({})", setting.infraction_type, duration)
        }
        None => "none".to_string(),
    };

    [
        format!("**Enabled:** {}", yes_no(v.enabled)),
        format!("**Delete message:** {}", yes_no(actions.remove_context)),
        format!("**Alert:** {}", yes_no(actions.send_alert)),
        format!("**Infraction:** {}", infraction),
        format!(
            "**DM:** {}",
            actions.dm_content.as_deref().unwrap_or("none")
        ),
        format!("**Filter DMs:** {}", yes_no(v.filter_dm)),
        format!("**Bypass roles:** {}", mentions(&v.bypass_roles, "@&")),
        format!("**Enabled channels:** {}", mentions(&v.enabled_channels, "#")),
        format!("**Disabled channels:** {}", mentions(&v.disabled_channels, "#")),
        format!("**Enabled categories:** {}", mentions(&v.enabled_categories, "#")),
        format!("**Disabled categories:** {}", mentions(&v.disabled_categories, "#")),
    ]
    .join("\n")
}
