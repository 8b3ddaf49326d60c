use crate::Error;
use crate::db::entities::guild_configs;
use crate::services::filtering::context::AlertEmbed;
use poise::serenity_prelude as serenity;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;

const MAX_DESCRIPTION: usize = 4096;
const MAX_FIELD_VALUE: usize = 1024;
const MAX_EMBEDS: usize = 10;
/// Discord's cap on the combined text of every embed in one message.
const MAX_TOTAL_TEXT: usize = 6000;
/// Attached embeds with less room than this for a description are dropped.
const MIN_ALERT_DESCRIPTION: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Audit,
}

impl LogLevel {
    pub fn icon(&self) -> &'static str {
        match self {
            LogLevel::Info => "ℹ️",
            LogLevel::Warn => "⚠️",
            LogLevel::Error => "❌",
            LogLevel::Audit => "📝",
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            LogLevel::Info => 0x3498db,  // Blue
            LogLevel::Warn => 0xf1c40f,  // Yellow
            LogLevel::Error => 0xe74c3c, // Red
            LogLevel::Audit => 0x95a5a6, // Gray
        }
    }
}

/// Which configured channel an entry goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogChannel {
    ModLog,
    /// Filter alerts. Falls back to the mod log when unset.
    Alerts,
}

/// Role mentioned above the embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ping {
    ModRole,
    ModAlertRole,
}

#[derive(Debug, Clone)]
pub struct ModLogEntry {
    pub guild_id: u64,
    pub channel: LogChannel,
    pub level: LogLevel,
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub footer: Option<String>,
    pub thumbnail: Option<String>,
    pub ping: Option<Ping>,
    /// Extra embeds sent along, e.g. the guilds behind matched invites.
    pub embeds: Vec<AlertEmbed>,
}

impl ModLogEntry {
    pub fn new(guild_id: u64, level: LogLevel, title: impl Into<String>) -> Self {
        Self {
            guild_id,
            channel: LogChannel::ModLog,
            level,
            title: title.into(),
            description: String::new(),
            fields: vec![],
            footer: None,
            thumbnail: None,
            ping: None,
            embeds: vec![],
        }
    }
}

/// Destination for moderation log entries.
#[async_trait::async_trait]
pub trait ModLog: Send + Sync {
    async fn send(&self, entry: ModLogEntry) -> Result<(), Error>;
}

pub struct LoggerService {
    db: DatabaseConnection,
    http: Arc<serenity::Http>,
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

fn entry_title(entry: &ModLogEntry) -> String {
    format!("{} {}", entry.level.icon(), entry.title)
}

/// Shortens the entry description and the attached embeds so the whole message stays
/// under Discord's total embed text limit. The entry's own fields are kept whole.
fn fit_to_total(entry: &ModLogEntry) -> (String, Vec<AlertEmbed>) {
    let len = |s: &str| s.chars().count();
    let fixed = len(&entry_title(entry))
        + entry
            .fields
            .iter()
            .map(|(name, value)| len(name) + len(&truncate(value, MAX_FIELD_VALUE)))
            .sum::<usize>()
        + entry.footer.as_deref().map_or(0, len);

    let description = truncate(
        &entry.description,
        MAX_DESCRIPTION.min(MAX_TOTAL_TEXT.saturating_sub(fixed)),
    );
    let mut remaining = MAX_TOTAL_TEXT.saturating_sub(fixed + len(&description));

    let mut alerts = vec![];
    for alert in entry.embeds.iter().take(MAX_EMBEDS - 1) {
        let alert_fixed = len(&alert.title) + alert.footer.as_deref().map_or(0, len);
        if alert_fixed > remaining {
            break;
        }
        let room = remaining - alert_fixed;
        if room < MIN_ALERT_DESCRIPTION.min(len(&alert.description)) {
            break;
        }
        let mut alert = alert.clone();
        alert.description = truncate(&alert.description, MAX_DESCRIPTION.min(room));
        remaining -= alert_fixed + len(&alert.description);
        alerts.push(alert);
    }
    (description, alerts)
}

/// Renders the entry as the first embed of the message.
pub fn render_embed(entry: &ModLogEntry, description: &str) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(entry_title(entry))
        .color(entry.level.color())
        .timestamp(serenity::Timestamp::now());

    if !description.is_empty() {
        embed = embed.description(description);
    }
    for (name, value) in &entry.fields {
        embed = embed.field(name, truncate(value, MAX_FIELD_VALUE), false);
    }
    if let Some(footer) = &entry.footer {
        embed = embed.footer(serenity::CreateEmbedFooter::new(footer));
    }
    if let Some(url) = &entry.thumbnail {
        embed = embed.thumbnail(url);
    }
    embed
}

fn render_alert_embed(alert: &AlertEmbed) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(&alert.title)
        .description(&alert.description);
    if let Some(footer) = &alert.footer {
        embed = embed.footer(serenity::CreateEmbedFooter::new(footer));
    }
    if let Some(url) = &alert.thumbnail {
        embed = embed.thumbnail(url);
    }
    embed
}

impl LoggerService {
    pub fn new(db: DatabaseConnection, http: Arc<serenity::Http>) -> Self {
        Self { db, http }
    }

    /// Resolves the channel and ping role from the guild configuration.
    async fn destination(
        &self,
        entry: &ModLogEntry,
    ) -> Result<Option<(serenity::ChannelId, Option<i64>)>, Error> {
        let Some(config) = guild_configs::Entity::find_by_id(entry.guild_id as i64)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let channel = match entry.channel {
            LogChannel::ModLog => config.log_channel_id,
            LogChannel::Alerts => config.alert_channel_id.or(config.log_channel_id),
        };
        let role = match entry.ping {
            Some(Ping::ModRole) => config.mod_role_id,
            Some(Ping::ModAlertRole) => config.mod_alert_role_id.or(config.mod_role_id),
            None => None,
        };

        Ok(channel.map(|id| (serenity::ChannelId::new(id as u64), role)))
    }
}

#[async_trait::async_trait]
impl ModLog for LoggerService {
    /// Does nothing if the guild has no log channel configured.
    async fn send(&self, entry: ModLogEntry) -> Result<(), Error> {
        let Some((channel_id, role)) = self.destination(&entry).await? else {
            return Ok(());
        };

        let (description, alerts) = fit_to_total(&entry);
        let mut embeds = vec![render_embed(&entry, &description)];
        embeds.extend(alerts.iter().map(render_alert_embed));

        let mut message = serenity::CreateMessage::new().embeds(embeds);
        message = match role {
            Some(role_id) => message
                .content(format!("<@&{}>", role_id))
                .allowed_mentions(
                    serenity::CreateAllowedMentions::new()
                        .roles(vec![serenity::RoleId::new(role_id as u64)]),
                ),
            None => message.allowed_mentions(serenity::CreateAllowedMentions::new()),
        };

        channel_id.send_message(&*self.http, message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_values() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate(&"a".repeat(20), 10);
        assert_eq!(cut, "aaaaaaa...");
        assert_eq!(cut.chars().count(), 10);
    }

    fn guild_embed(n: usize, description_len: usize) -> AlertEmbed {
        AlertEmbed {
            title: format!("Guild {n}"),
            description: "d".repeat(description_len),
            footer: Some(format!("Guild ID: {n}")),
            thumbnail: None,
        }
    }

    fn total_text(entry: &ModLogEntry, description: &str, alerts: &[AlertEmbed]) -> usize {
        let len = |s: &str| s.chars().count();
        len(&entry_title(entry))
            + len(description)
            + entry.fields.iter().map(|(k, v)| len(k) + len(v)).sum::<usize>()
            + entry.footer.as_deref().map_or(0, len)
            + alerts
                .iter()
                .map(|a| len(&a.title) + len(&a.description) + a.footer.as_deref().map_or(0, len))
                .sum::<usize>()
    }

    #[test]
    fn small_alerts_are_sent_whole() {
        let mut entry = ModLogEntry::new(1, LogLevel::Warn, "Invite filter triggered on message");
        entry.description = "discord.gg/abc".into();
        entry.embeds = vec![guild_embed(1, 100), guild_embed(2, 100)];

        let (description, alerts) = fit_to_total(&entry);
        assert_eq!(description, "discord.gg/abc");
        assert_eq!(alerts, entry.embeds);
    }

    #[test]
    fn attached_embeds_share_the_total_text_limit() {
        let mut entry = ModLogEntry::new(1, LogLevel::Warn, "Invite filter triggered on message");
        entry.description = "x".repeat(1000);
        entry.fields = vec![("Matches".into(), "m".repeat(1024))];
        entry.footer = Some("User ID: 5".into());
        entry.embeds = (0..12).map(|n| guild_embed(n, 2000)).collect();

        let (description, alerts) = fit_to_total(&entry);
        assert_eq!(description.chars().count(), 1000);
        assert!(!alerts.is_empty());
        assert!(alerts.len() < MAX_EMBEDS);
        assert!(total_text(&entry, &description, &alerts) <= MAX_TOTAL_TEXT);
    }

    #[test]
    fn oversized_description_is_cut_to_the_total_limit() {
        let mut entry = ModLogEntry::new(1, LogLevel::Audit, "Infraction applied: ban");
        entry.description = "x".repeat(5000);
        entry.fields = (0..3).map(|n| (format!("F{n}"), "v".repeat(1024))).collect();
        entry.embeds = vec![guild_embed(1, 500)];

        let (description, alerts) = fit_to_total(&entry);
        assert!(description.chars().count() < MAX_DESCRIPTION);
        assert!(alerts.is_empty());
        assert!(total_text(&entry, &description, &alerts) <= MAX_TOTAL_TEXT);
    }

    #[test]
    fn entry_defaults_to_mod_log_without_ping() {
        let entry = ModLogEntry::new(1, LogLevel::Audit, "Infraction applied: ban");
        assert_eq!(entry.channel, LogChannel::ModLog);
        assert!(entry.ping.is_none());
        assert!(entry.fields.is_empty());
    }
}
