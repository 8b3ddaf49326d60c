use crate::db::entities::filter_lists::ListType;
use crate::services::filtering::context::{AuthorInfo, ChannelInfo, Event, FilterContent, FilterContext};
use crate::services::filtering::invite::ListEvaluation;
use crate::services::filtering::settings::{ActionSettings, InfractionSetting};
use crate::services::infraction::{InfractionRequest, TargetUser};
use crate::services::logger::{LogChannel, LogLevel, ModLog, ModLogEntry, Ping};
use crate::{Data, Error};
use chrono::{Duration, Utc};
use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};

const DEFAULT_INFRACTION_REASON: &str = "Posted a disallowed invite";
const ALERT_PREVIEW_LEN: usize = 1000;

pub fn handler<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(async move {
        match event {
            serenity::FullEvent::Message { new_message } => {
                handle_message(ctx, new_message, Event::Message, data).await?;
            }
            serenity::FullEvent::MessageUpdate {
                old_if_available,
                new,
                event,
            } => {
                let old = old_if_available.as_ref().map(|m| m.content.as_str());
                if !content_changed(old, event.content.as_deref()) {
                    return Ok(());
                }

                let message = match new {
                    Some(message) => message.clone(),
                    None => event.channel_id.message(&ctx.http, event.id).await?,
                };
                handle_message(ctx, &message, Event::MessageEdit, data).await?;
            }
            _ => {}
        }
        Ok(())
    })
}

/// Whether an edit should be filtered again. Embed-only updates carry no content; an
/// uncached old message counts as changed.
pub fn content_changed(old_content: Option<&str>, new_content: Option<&str>) -> bool {
    match (old_content, new_content) {
        (_, None) => false,
        (Some(old), Some(new)) => old != new,
        (None, Some(_)) => true,
    }
}

/// Category of the channel, looked up in the cache. Threads report their parent's category.
fn category_of(ctx: &serenity::Context, guild_id: serenity::GuildId, channel_id: serenity::ChannelId) -> Option<u64> {
    let guild = ctx.cache.guild(guild_id)?;
    let channel = guild.channels.get(&channel_id).or_else(|| {
        let parent = guild.threads.iter().find(|t| t.id == channel_id)?.parent_id?;
        guild.channels.get(&parent)
    })?;
    channel.parent_id.map(|id| id.get())
}

fn filter_context(ctx: &serenity::Context, message: &serenity::Message, event: Event) -> FilterContext {
    let author = AuthorInfo {
        id: message.author.id.get(),
        role_ids: message
            .member
            .as_ref()
            .map(|m| m.roles.iter().map(|r| r.get()).collect())
            .unwrap_or_default(),
        is_bot: message.author.bot,
    };
    let channel = ChannelInfo {
        id: message.channel_id.get(),
        category_id: message
            .guild_id
            .and_then(|guild_id| category_of(ctx, guild_id, message.channel_id)),
        is_dm: message.guild_id.is_none(),
    };

    let mut fctx = FilterContext::new(
        event,
        Some(author),
        Some(channel),
        FilterContent::Text(message.content.clone()),
    );
    fctx.message_id = Some(message.id.get());
    fctx.jump_url = Some(message.link());
    fctx
}

async fn handle_message(
    ctx: &serenity::Context,
    message: &serenity::Message,
    event: Event,
    data: &Data,
) -> Result<(), Error> {
    if message.author.bot || message.webhook_id.is_some() {
        return Ok(());
    }
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    let list = data.filters.invite_list(guild_id.get()).await?;
    if list.allow.is_none() && list.deny.is_none() {
        return Ok(());
    }

    let mut fctx = filter_context(ctx, message, event);
    let evaluation = list.actions_for(&mut fctx, &*ctx.http).await?;
    let Some(actions) = evaluation.actions.clone() else {
        return Ok(());
    };

    info!(
        "Invite filter triggered by {} in guild {} ({} matches)",
        message.author.id,
        guild_id,
        fctx.matches.len()
    );
    execute_actions(ctx, data, guild_id, message, &actions, &fctx, &evaluation).await;
    Ok(())
}

async fn execute_actions(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    message: &serenity::Message,
    actions: &ActionSettings,
    fctx: &FilterContext,
    evaluation: &ListEvaluation,
) {
    let mut removed = false;
    if actions.remove_context {
        match message.channel_id.delete_message(&ctx.http, message.id).await {
            Ok(()) => removed = true,
            Err(e) => warn!("Failed to delete message {}: {:?}", message.id, e),
        }
    }

    if let Some(dm) = &actions.dm_content {
        let dm = serenity::CreateMessage::new().content(dm);
        if let Err(e) = message.author.id.direct_message(&ctx.http, dm).await {
            debug!("Could not DM {} about a filtered invite: {:?}", message.author.id, e);
        }
    }

    let mut infraction_result = None;
    if let Some(setting) = &actions.infraction {
        let bot_id = ctx.cache.current_user().id.get();
        let target = TargetUser {
            id: message.author.id.get(),
            name: Some(message.author.name.clone()),
        };
        let request = infraction_request(setting, guild_id.get(), bot_id, target, fctx.jump_url.clone());
        match data.infractions.infract(request).await {
            Ok(outcome) => infraction_result = Some(outcome.message),
            Err(e) => error!("Failed to apply filter infraction in guild {}: {:?}", guild_id, e),
        }
    }

    if actions.send_alert {
        let mut entry = alert_entry(guild_id.get(), message, fctx, evaluation, removed);
        if let Some(result) = infraction_result {
            entry.fields.push(("Infraction".to_string(), result));
        }
        if let Err(e) = data.logger.send(entry).await {
            error!("Failed to send filter alert in guild {}: {:?}", guild_id, e);
        }
    }
}

/// An infraction issued by the bot on behalf of the filter.
pub fn infraction_request(
    setting: &InfractionSetting,
    guild_id: u64,
    bot_id: u64,
    target: TargetUser,
    jump_url: Option<String>,
) -> InfractionRequest {
    InfractionRequest {
        guild_id,
        actor_id: bot_id,
        target,
        kind: setting.infraction_type,
        reason: Some(
            setting
                .reason
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_INFRACTION_REASON.to_string()),
        ),
        expires_at: setting
            .duration_secs
            .filter(|secs| *secs > 0)
            .and_then(|secs| {
                let expiry = Duration::try_seconds(secs)
                    .and_then(|d| Utc::now().checked_add_signed(d));
                if expiry.is_none() {
                    warn!("Filter infraction duration of {}s is out of range, issuing it without expiry", secs);
                }
                expiry
            }),
        purge: false,
        jump_url,
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() <= ALERT_PREVIEW_LEN {
        return content.to_string();
    }
    let cut: String = content.chars().take(ALERT_PREVIEW_LEN).collect();
    format!("{cut}...")
}

pub fn alert_entry(
    guild_id: u64,
    message: &serenity::Message,
    fctx: &FilterContext,
    evaluation: &ListEvaluation,
    removed: bool,
) -> ModLogEntry {
    let event_name = match fctx.event {
        Event::Message => "message",
        Event::MessageEdit => "message edit",
    };
    let mut entry = ModLogEntry::new(
        guild_id,
        LogLevel::Warn,
        format!("Invite filter triggered on {event_name}"),
    );
    entry.channel = LogChannel::Alerts;
    entry.ping = Some(Ping::ModAlertRole);
    entry.description = preview(&message.content);
    entry.thumbnail = message.author.avatar_url();
    entry.footer = Some(format!("User ID: {}", message.author.id));
    entry.embeds = fctx.alert_embeds.clone();

    entry.fields = alert_fields(
        &format!("<@{}> (`{}`)", message.author.id, message.author.name),
        &format!("<#{}>", message.channel_id),
        fctx,
        evaluation,
        removed,
    );
    entry
}

fn alert_fields(
    author: &str,
    channel: &str,
    fctx: &FilterContext,
    evaluation: &ListEvaluation,
    removed: bool,
) -> Vec<(String, String)> {
    let mut fields = vec![
        ("Author".to_string(), author.to_string()),
        ("Channel".to_string(), channel.to_string()),
    ];
    if !evaluation.messages.is_empty() {
        fields.push(("Triggers".to_string(), evaluation.messages.join(", ")));
    }
    if !fctx.matches.is_empty() {
        fields.push(("Matches".to_string(), fctx.matches.join(", ")));
    }
    if !fctx.potential_phish.is_empty() {
        let codes: Vec<_> = fctx.potential_phish.iter().map(|c| format!("`{c}`")).collect();
        fields.push(("Potential phish".to_string(), codes.join(", ")));
    }
    if let Some(denied) = evaluation.triggers.get(&ListType::Deny) {
        fields.push(("Denied filters".to_string(), denied.len().to_string()));
    }
    if let Some(url) = &fctx.jump_url {
        let label = if removed { "Message (deleted)" } else { "Message" };
        fields.push((label.to_string(), url.clone()));
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::infractions::InfractionType;
    use crate::services::filtering::filter_list::Filter;
    use crate::services::filtering::settings::FilterSettings;
    use std::collections::BTreeMap;

    #[test]
    fn filter_infractions_are_issued_by_the_bot() {
        let setting = InfractionSetting {
            infraction_type: InfractionType::Timeout,
            duration_secs: Some(600),
            reason: None,
        };
        let before = Utc::now();
        let request = infraction_request(&setting, 1, 99, TargetUser::new(5), None);

        assert_eq!(request.actor_id, 99);
        assert_eq!(request.kind, InfractionType::Timeout);
        assert_eq!(request.reason.as_deref(), Some(DEFAULT_INFRACTION_REASON));
        let expires = request.expires_at.unwrap() - before;
        assert!(expires >= Duration::seconds(599) && expires <= Duration::seconds(601));
    }

    #[test]
    fn permanent_filter_infractions_have_no_expiry() {
        let setting = InfractionSetting {
            infraction_type: InfractionType::Ban,
            duration_secs: None,
            reason: Some("Scam links".into()),
        };
        let request = infraction_request(&setting, 1, 99, TargetUser::new(5), None);
        assert!(request.expires_at.is_none());
        assert_eq!(request.reason.as_deref(), Some("Scam links"));
    }

    #[test]
    fn out_of_range_durations_drop_the_expiry() {
        let setting = InfractionSetting {
            infraction_type: InfractionType::Ban,
            duration_secs: Some(300_000 * 365 * 86400),
            reason: None,
        };
        let request = infraction_request(&setting, 1, 99, TargetUser::new(5), None);
        assert!(request.expires_at.is_none());

        let setting = InfractionSetting {
            duration_secs: Some(i64::MAX),
            ..setting
        };
        let request = infraction_request(&setting, 1, 99, TargetUser::new(5), None);
        assert!(request.expires_at.is_none());
    }

    #[test]
    fn only_changed_edits_are_filtered() {
        assert!(content_changed(Some("hi"), Some("hi discord.gg/abc")));
        assert!(content_changed(None, Some("discord.gg/abc")));
        assert!(!content_changed(Some("discord.gg/abc"), Some("discord.gg/abc")));
        assert!(!content_changed(Some("discord.gg/abc"), None));
        assert!(!content_changed(None, None));
    }

    #[test]
    fn alert_lists_triggers_matches_and_phish() {
        let mut fctx = FilterContext::new(Event::Message, None, None, FilterContent::Text(String::new()));
        fctx.matches = vec!["discord.gg/abc".into()];
        fctx.potential_phish.insert("abc".into());
        fctx.jump_url = Some("https://discord.com/channels/1/2/3".into());

        let denied = Filter {
            id: 4,
            content: "122".into(),
            description: None,
            settings: FilterSettings::default(),
        };
        let evaluation = ListEvaluation {
            actions: Some(ActionSettings::default()),
            messages: vec!["#4 (`122`)".into(), "`abc`".into()],
            triggers: BTreeMap::from([(ListType::Deny, vec![denied])]),
        };

        let fields = alert_fields("<@5>", "<#2>", &fctx, &evaluation, true);
        let get = |key: &str| fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

        assert_eq!(get("Triggers"), Some("#4 (`122`), `abc`"));
        assert_eq!(get("Matches"), Some("discord.gg/abc"));
        assert_eq!(get("Potential phish"), Some("`abc`"));
        assert_eq!(get("Denied filters"), Some("1"));
        assert_eq!(get("Message (deleted)"), Some("https://discord.com/channels/1/2/3"));
    }

    #[test]
    fn long_messages_are_cut_in_alerts() {
        let text = "a".repeat(ALERT_PREVIEW_LEN + 10);
        assert_eq!(preview(&text).chars().count(), ALERT_PREVIEW_LEN + 3);
        assert_eq!(preview("short"), "short");
    }
}
