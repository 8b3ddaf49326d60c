use crate::db::entities::infractions;
use crate::services::infraction::time::{discord_timestamp, humanize_delta};
use crate::services::localization::ContextL10nExt;
use crate::{Context, Error};
use anyhow::Context as _;
use fluent::FluentArgs;
use poise::serenity_prelude as serenity;

const MAX_DESCRIPTION: usize = 4000;

/// Show a user's infraction history
#[poise::command(
    slash_command,
    guild_only,
    rename = "infractions",
    default_member_permissions = "MODERATE_MEMBERS"
)]
pub async fn history(
    ctx: Context<'_>,
    #[description = "The user to look up"] user: serenity::User,
    #[description = "Only show active infractions"] active_only: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .context("Infractions are only available in guilds")?;

    let mut records = ctx
        .data()
        .infractions
        .store()
        .for_user(guild_id.get(), user.id.get())
        .await?;
    if active_only.unwrap_or(false) {
        records.retain(|r| r.active);
    }

    if records.is_empty() {
        let mut args = FluentArgs::new();
        args.set("user", format!("<@{}>", user.id));
        ctx.say(ctx.l10n_user().t("infraction-history-empty", Some(&args)))
            .await?;
        return Ok(());
    }

    let active = records.iter().filter(|r| r.active).count();
    let embed = serenity::CreateEmbed::new()
        .title(format!("Infractions for {}", user.name))
        .description(render_history(&records, MAX_DESCRIPTION))
        .footer(serenity::CreateEmbedFooter::new(format!(
            "{} total, {} active",
            records.len(),
            active
        )))
        .color(0xe67e22);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;
    Ok(())
}

/// One line per infraction, newest first.
pub fn history_line(record: &infractions::Model) -> String {
    let mut line = format!(
        "`#{}` **{}** {} by <@{}>",
        record.id,
        record.infraction_type,
        discord_timestamp(record.inserted_at),
        record.actor_id
    );
    if let Some(expires_at) = record.expires_at {
        line.push_str(&format!(" for {}", humanize_delta(expires_at - record.last_applied)));
    }
    if record.active {
        line.push_str(" (active)");
    }
    if record.hidden {
        line.push_str(" (hidden)");
    }
    if let Some(reason) = record.reason.as_deref().filter(|r| !r.is_empty()) {
        line.push_str(&format!("\n> {}", reason));
    }
    line
}

fn render_history(records: &[infractions::Model], max: usize) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        let line = history_line(record);
        if out.len() + line.len() + 2 > max {
            out.push_str(&format!("... and {} more", records.len() - i));
            break;
        }
        out.push_str(&line);
        out.push_str("\n\n");
    }
    out.trim_end().to_string()
}
