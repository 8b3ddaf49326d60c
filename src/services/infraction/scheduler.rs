use super::notify::{infraction_notice, pardon_notice};
use super::time::{discord_timestamp, format_with_duration};
use super::{InfractionRequest, InfractionStore, ModerationGateway, NewInfraction, TargetUser};
use crate::db::entities::infractions::{self, InfractionType};
use crate::error::ApiError;
use crate::services::logger::{LogLevel, ModLog, ModLogEntry, Ping};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Discord caps timeouts at 28 days.
pub const MAX_TIMEOUT_DAYS: i64 = 28;
pub const DEFAULT_TIMEOUT_HOURS: i64 = 1;
/// Audit log reasons are limited to 512 characters.
const MAX_AUDIT_REASON: usize = 512;

/// Ordered key/value text describing an infraction for the mod log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFields(Vec<(String, String)>);

impl LogFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value in place if the key exists, otherwise appends.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    /// Adds to an existing failure instead of overwriting it.
    pub fn append_failure(&mut self, line: &str) {
        let value = match self.get("Failure") {
            Some(existing) => format!("{existing} {line}"),
            None => line.to_string(),
        };
        self.insert("Failure", value);
    }

    pub fn extend(&mut self, other: LogFields) {
        for (key, value) in other.0 {
            self.insert(key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// One `Key: value` line per field.
    pub fn render(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub applied: bool,
    /// Confirmation shown to the moderator.
    pub message: String,
}

fn audit_reason(reason: Option<&str>) -> String {
    let reason = reason.filter(|r| !r.is_empty()).unwrap_or("No reason provided.");
    reason.chars().take(MAX_AUDIT_REASON).collect()
}

fn describe_failure(err: &ApiError) -> String {
    match err {
        ApiError::Forbidden => "The bot lacks permissions to do this (role hierarchy?)".to_string(),
        ApiError::NotFound { .. } => "User left the guild.".to_string(),
        ApiError::Http { status, code } => format!(
            "HTTPException with status {} and code {}.",
            status,
            code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
        ),
        ApiError::Other(e) => format!("Unexpected error: {e}"),
    }
}

/// Applies, expires and pardons infractions against the platform and the store.
pub struct InfractionScheduler {
    store: Arc<dyn InfractionStore>,
    gateway: Arc<dyn ModerationGateway>,
    mod_log: Arc<dyn ModLog>,
    supported: Vec<InfractionType>,
}

impl InfractionScheduler {
    pub fn new(
        store: Arc<dyn InfractionStore>,
        gateway: Arc<dyn ModerationGateway>,
        mod_log: Arc<dyn ModLog>,
        supported: &[InfractionType],
    ) -> Self {
        Self {
            store,
            gateway,
            mod_log,
            supported: supported.to_vec(),
        }
    }

    pub fn store(&self) -> &dyn InfractionStore {
        self.store.as_ref()
    }

    pub fn supports(&self, kind: InfractionType) -> bool {
        self.supported.contains(&kind)
    }

    async fn send_log(&self, entry: ModLogEntry) {
        let guild_id = entry.guild_id;
        if let Err(e) = self.mod_log.send(entry).await {
            error!("Failed to send mod log entry in guild {}: {:?}", guild_id, e);
        }
    }

    /// Records a new infraction and applies it.
    pub async fn infract(&self, request: InfractionRequest) -> Result<ApplyOutcome, crate::Error> {
        let kind = request.kind;
        if !self.supports(kind) {
            anyhow::bail!("Infraction type {} is not supported", kind);
        }

        if kind.is_reversible() {
            let active = self
                .store
                .find_active(request.guild_id, request.target.id, kind)
                .await?;
            if let Some(existing) = active.first() {
                return Ok(ApplyOutcome {
                    applied: false,
                    message: format!(
                        ":x: {} already has an active {} infraction (#{}).",
                        request.target.mention(),
                        kind.display_name(),
                        existing.id
                    ),
                });
            }
        }

        let now = Utc::now();
        let expires_at = match kind {
            InfractionType::Timeout => {
                let cap = now + Duration::days(MAX_TIMEOUT_DAYS);
                let requested = request
                    .expires_at
                    .unwrap_or(now + Duration::hours(DEFAULT_TIMEOUT_HOURS));
                Some(requested.min(cap))
            }
            InfractionType::Ban | InfractionType::VoiceMute => request.expires_at,
            _ => None,
        };

        let infraction = self
            .store
            .insert(NewInfraction {
                guild_id: request.guild_id,
                user_id: request.target.id,
                actor_id: request.actor_id,
                kind,
                reason: request.reason,
                expires_at: expires_at.map(|t| t.naive_utc()),
                active: kind.is_reversible(),
                hidden: kind == InfractionType::Note,
                jump_url: request.jump_url,
            })
            .await?;

        let purge_days = if request.purge { 1 } else { 0 };
        Ok(self
            .apply_infraction(&infraction, &request.target, purge_days)
            .await)
    }

    async fn run_action(
        &self,
        infraction: &infractions::Model,
        purge_days: u8,
    ) -> Result<(), ApiError> {
        let guild_id = infraction.guild_id as u64;
        let user_id = infraction.user_id as u64;
        let reason = audit_reason(infraction.reason.as_deref());

        match infraction.infraction_type {
            InfractionType::Ban => {
                self.gateway
                    .ban(guild_id, user_id, purge_days, &reason)
                    .await
            }
            InfractionType::Kick => self.gateway.kick(guild_id, user_id, &reason).await,
            InfractionType::Timeout => {
                let until = infraction
                    .expires_at
                    .map(|t| t.and_utc())
                    .unwrap_or_else(|| Utc::now() + Duration::hours(DEFAULT_TIMEOUT_HOURS));
                self.gateway
                    .timeout(guild_id, user_id, until, &reason)
                    .await
            }
            InfractionType::VoiceMute => {
                self.gateway
                    .set_voice_mute(guild_id, user_id, true, &reason)
                    .await
            }
            InfractionType::Warning | InfractionType::Note => Ok(()),
        }
    }

    /// DMs the user, runs the action and logs the result.
    ///
    /// A record whose action fails is deleted, so the history only holds
    /// infractions that actually took effect.
    pub async fn apply_infraction(
        &self,
        infraction: &infractions::Model,
        target: &TargetUser,
        purge_days: u8,
    ) -> ApplyOutcome {
        let kind = infraction.infraction_type;
        let id = infraction.id;

        let mut dm_prefix = "";
        let mut dm_field = None;
        if !infraction.hidden {
            let notice = infraction_notice(infraction);
            let sent = self.gateway.send_dm(target.id, &notice).await.is_ok();
            if let Err(e) = self.store.set_dm_sent(id, sent).await {
                error!("Failed to record DM status for infraction #{}: {:?}", id, e);
            }
            if sent {
                dm_prefix = ":incoming_envelope: ";
                dm_field = Some("Sent");
            } else {
                dm_prefix = ":warning: ";
                dm_field = Some("**Failed**");
            }
        }

        let mut confirm = ":ok_hand: applied".to_string();
        let mut log_title = "applied".to_string();
        let mut expiry_msg = infraction
            .expires_at
            .map(|t| format!(" until {}", discord_timestamp(t)))
            .unwrap_or_default();

        let applied = match self.run_action(infraction, purge_days).await {
            Ok(()) => true,
            Err(e) => {
                match &e {
                    ApiError::Forbidden => {
                        warn!("Failed to apply {} infraction #{}: bot lacks permissions", kind, id)
                    }
                    ApiError::NotFound { .. } => info!(
                        "Can't apply {} to user {} because they left the guild",
                        kind, target.id
                    ),
                    _ => error!("Failed to apply {} infraction #{}: {:?}", kind, id, e),
                }
                confirm = ":x: failed to apply".to_string();
                log_title = "failed to apply".to_string();
                expiry_msg.clear();

                if let Err(e) = self.store.delete(id).await {
                    error!("Failed to delete infraction #{} after it failed to apply: {:?}", id, e);
                    confirm.push_str(" and failed to delete");
                    log_title.push_str(" and failed to delete");
                }
                false
            }
        };

        let mut fields = LogFields::new();
        fields.insert("Member", target.format());
        fields.insert("Actor", format!("<@{}>", infraction.actor_id));
        if let Some(dm) = dm_field {
            fields.insert("DM", dm);
        }
        if let Some(expires_at) = infraction.expires_at {
            fields.insert("Expires", discord_timestamp(expires_at));
        }
        fields.insert(
            "Reason",
            infraction
                .reason
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "No reason provided.".to_string()),
        );
        if let Some(url) = &infraction.jump_url {
            fields.insert("Jump URL", url.clone());
        }

        let mut entry = ModLogEntry::new(
            infraction.guild_id as u64,
            if applied { LogLevel::Audit } else { LogLevel::Error },
            format!("Infraction {}: {}", log_title, kind.display_name()),
        );
        entry.description = fields.render();
        entry.footer = Some(format!("ID: {}", id));
        if !applied {
            entry.ping = Some(Ping::ModRole);
        }
        self.send_log(entry).await;

        if applied {
            info!("Applied {} infraction #{} to {}", kind, id, target.id);
        } else {
            warn!("Failed to apply {} infraction #{} to {}", kind, id, target.id);
        }
        ApplyOutcome {
            applied,
            message: format!(
                "{}{} **{}** to {}{}.",
                dm_prefix,
                confirm,
                kind.display_name(),
                target.mention(),
                expiry_msg
            ),
        }
    }

    /// Lifts the infraction on the platform. Types with nothing to undo return no fields.
    pub async fn pardon_action(
        &self,
        infraction: &infractions::Model,
        notify: bool,
    ) -> Result<LogFields, ApiError> {
        let guild_id = infraction.guild_id as u64;
        let user_id = infraction.user_id as u64;
        let reason = format!("Infraction #{} deactivated", infraction.id);
        let mut fields = LogFields::new();

        match infraction.infraction_type {
            InfractionType::Ban => {
                self.gateway.unban(guild_id, user_id, &reason).await?;
            }
            kind @ (InfractionType::Timeout | InfractionType::VoiceMute) => {
                if !self.gateway.is_member(guild_id, user_id).await? {
                    fields.insert("Failure", "User was not found in the guild.");
                    return Ok(fields);
                }

                if kind == InfractionType::Timeout {
                    self.gateway
                        .remove_timeout(guild_id, user_id, &reason)
                        .await?;
                } else {
                    self.gateway
                        .set_voice_mute(guild_id, user_id, false, &reason)
                        .await?;
                }

                if notify {
                    if let Some(notice) = pardon_notice(kind) {
                        let sent = self.gateway.send_dm(user_id, &notice).await.is_ok();
                        fields.insert("DM", if sent { "Sent" } else { "**Failed**" });
                    }
                }
            }
            _ => {}
        }

        Ok(fields)
    }

    /// Undoes an infraction and marks it inactive, returning the log text.
    ///
    /// The record is marked inactive even when the platform call fails.
    pub async fn deactivate_infraction(
        &self,
        infraction: &infractions::Model,
        send_log: bool,
        notify: bool,
    ) -> Result<LogFields, crate::Error> {
        let kind = infraction.infraction_type;
        let id = infraction.id;
        if !self.supports(kind) {
            anyhow::bail!("Attempted to deactivate unsupported infraction #{} ({})", id, kind);
        }

        info!("Deactivating {} infraction #{} for user {}", kind, id, infraction.user_id);

        let mut fields = LogFields::new();
        fields.insert("Member", format!("<@{}>", infraction.user_id));
        fields.insert("Actor", format!("<@{}>", infraction.actor_id));
        fields.insert(
            "Reason",
            infraction
                .reason
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "No reason provided.".to_string()),
        );
        fields.insert(
            "Created",
            format_with_duration(infraction.inserted_at, infraction.expires_at),
        );

        match self.pardon_action(infraction, notify).await {
            Ok(extra) => fields.extend(extra),
            Err(e) => {
                match &e {
                    ApiError::Forbidden => {
                        warn!("Failed to deactivate infraction #{} ({}): bot lacks permissions", id, kind)
                    }
                    ApiError::NotFound { .. } => {
                        info!("Infraction #{} ({}): user left the guild", id, kind)
                    }
                    _ => error!("Failed to deactivate infraction #{} ({}): {:?}", id, kind, e),
                }
                fields.insert("Failure", describe_failure(&e));
            }
        }

        if let Err(e) = self.store.set_inactive(id).await {
            error!("Failed to mark infraction #{} inactive: {:?}", id, e);
            fields.append_failure("Database update failed.");
        }

        if send_log {
            let failed = fields.contains("Failure");
            let mut log_fields = fields.clone();
            if let Some(reason) = log_fields.remove("Reason") {
                log_fields.insert("Reason", reason);
            }

            let mut entry = ModLogEntry::new(
                infraction.guild_id as u64,
                if failed { LogLevel::Error } else { LogLevel::Info },
                format!(
                    "Infraction {}: {}",
                    if failed { "expiration failed" } else { "expired" },
                    kind.display_name()
                ),
            );
            entry.description = log_fields.render();
            entry.footer = Some(format!("ID: {}", id));
            if failed {
                entry.ping = Some(Ping::ModAlertRole);
            }
            self.send_log(entry).await;
        }

        Ok(fields)
    }

    /// Deactivates the user's active infraction of `kind` on a moderator's request.
    pub async fn pardon_infraction(
        &self,
        guild_id: u64,
        actor_id: u64,
        kind: InfractionType,
        target: &TargetUser,
        reason: Option<String>,
    ) -> Result<String, crate::Error> {
        let active = self.store.find_active(guild_id, target.id, kind).await?;
        let Some((first, rest)) = active.split_first() else {
            return Ok(format!(
                ":x: There's no active {} infraction for user {}.",
                kind.display_name(),
                target.mention()
            ));
        };

        let mut fields = self.deactivate_infraction(first, false, true).await?;
        fields.insert("Member", target.format());
        fields.insert("Actor", format!("<@{}>", actor_id));
        if let Some(reason) = reason.filter(|r| !r.is_empty()) {
            fields.insert("Pardon reason", reason);
        }

        if !rest.is_empty() {
            warn!(
                "Found more than one active {} infraction for user {}; deactivating the rest",
                kind, target.id
            );
            let mut failed = 0;
            for extra in rest {
                if let Err(e) = self.store.set_inactive(extra.id).await {
                    error!("Failed to deactivate extra infraction #{}: {:?}", extra.id, e);
                    failed += 1;
                }
            }
            if failed > 0 {
                fields.append_failure(&format!(
                    "Failed to deactivate {failed} of {} extra active infractions.",
                    rest.len()
                ));
            } else {
                fields.insert(
                    "Note",
                    format!("{} extra active infractions were also deactivated.", rest.len()),
                );
            }
        }

        let failed = fields.contains("Failure");
        let dm_prefix = match fields.get("DM") {
            Some("Sent") => ":incoming_envelope: ",
            Some(_) => ":warning: ",
            None => "",
        };
        let (confirm, log_title) = if failed {
            (":x: failed to pardon", "pardon failed")
        } else {
            (":ok_hand: pardoned", "pardoned")
        };

        let mut entry = ModLogEntry::new(
            guild_id,
            if failed { LogLevel::Error } else { LogLevel::Audit },
            format!("Infraction {}: {}", log_title, kind.display_name()),
        );
        entry.description = fields.render();
        entry.footer = Some(format!("ID: {}", first.id));
        if failed {
            entry.ping = Some(Ping::ModRole);
        }
        self.send_log(entry).await;

        Ok(format!(
            "{}{} infraction **{}** for {}.",
            dm_prefix,
            confirm,
            kind.display_name(),
            target.mention()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::infraction::fakes::{
        infraction, FakeGateway, FakeModLog, FakeStore, Failure,
    };

    const ALL: [InfractionType; 6] = [
        InfractionType::Ban,
        InfractionType::Kick,
        InfractionType::Timeout,
        InfractionType::Note,
        InfractionType::Warning,
        InfractionType::VoiceMute,
    ];

    struct Harness {
        store: Arc<FakeStore>,
        gateway: Arc<FakeGateway>,
        mod_log: Arc<FakeModLog>,
        scheduler: InfractionScheduler,
    }

    fn harness(store: FakeStore, gateway: FakeGateway) -> Harness {
        let store = Arc::new(store);
        let gateway = Arc::new(gateway);
        let mod_log = Arc::new(FakeModLog::default());
        let scheduler =
            InfractionScheduler::new(store.clone(), gateway.clone(), mod_log.clone(), &ALL);
        Harness {
            store,
            gateway,
            mod_log,
            scheduler,
        }
    }

    fn request(kind: InfractionType) -> InfractionRequest {
        InfractionRequest {
            guild_id: 4567,
            actor_id: 1234,
            target: TargetUser::new(456),
            kind,
            reason: Some("Testing".into()),
            expires_at: None,
            purge: false,
            jump_url: None,
        }
    }

    #[test]
    fn log_fields_keep_order_and_replace_in_place() {
        let mut fields = LogFields::new();
        fields.insert("Member", "a");
        fields.insert("Reason", "b");
        fields.insert("Member", "c");
        assert_eq!(fields.render(), "Member: c\nReason: b");

        fields.append_failure("First.");
        fields.append_failure("Second.");
        assert_eq!(fields.get("Failure"), Some("First. Second."));

        assert_eq!(fields.remove("Reason").as_deref(), Some("b"));
        assert!(!fields.contains("Reason"));
    }

    #[tokio::test]
    async fn deactivate_writes_base_log_fields() {
        let h = harness(FakeStore::default(), FakeGateway::default());
        let logs = h
            .scheduler
            .deactivate_infraction(&infraction(123, InfractionType::Kick), true, true)
            .await
            .unwrap();

        for key in ["Member", "Actor", "Reason", "Created"] {
            assert!(logs.contains(key), "missing {key}");
        }
        assert_eq!(logs.get("Created"), Some("<t:1672531200:f> (1 day)"));
        assert!(!logs.contains("Failure"));
    }

    #[tokio::test]
    async fn deactivate_marks_record_inactive() {
        let h = harness(
            FakeStore::with(vec![infraction(123, InfractionType::Kick)]),
            FakeGateway::default(),
        );
        h.scheduler
            .deactivate_infraction(&infraction(123, InfractionType::Kick), true, true)
            .await
            .unwrap();

        assert_eq!(*h.store.inactive_calls.lock().unwrap(), vec![123]);
        assert!(!h.store.rows.lock().unwrap()[0].active);
    }

    #[tokio::test]
    async fn deactivate_ban_calls_unban() {
        let h = harness(FakeStore::default(), FakeGateway::default());
        h.scheduler
            .deactivate_infraction(&infraction(456, InfractionType::Ban), true, true)
            .await
            .unwrap();

        assert_eq!(h.gateway.calls(), vec!["unban 456"]);
        assert_eq!(h.mod_log.titles(), vec!["Infraction expired: ban"]);
    }

    #[tokio::test]
    async fn deactivate_reports_user_left_guild() {
        let h = harness(FakeStore::default(), FakeGateway::failing(Failure::NotFound));
        let logs = h
            .scheduler
            .deactivate_infraction(&infraction(456, InfractionType::Ban), true, true)
            .await
            .unwrap();

        assert_eq!(logs.get("Failure"), Some("User left the guild."));
        assert_eq!(h.gateway.calls(), vec!["unban 456"]);
        assert_eq!(*h.store.inactive_calls.lock().unwrap(), vec![456]);
    }

    #[tokio::test]
    async fn deactivate_reports_missing_permissions() {
        let h = harness(FakeStore::default(), FakeGateway::failing(Failure::Forbidden));
        let logs = h
            .scheduler
            .deactivate_infraction(&infraction(456, InfractionType::Ban), true, true)
            .await
            .unwrap();

        assert_eq!(
            logs.get("Failure"),
            Some("The bot lacks permissions to do this (role hierarchy?)")
        );
        let entries = h.mod_log.entries.lock().unwrap();
        assert_eq!(entries[0].title, "Infraction expiration failed: ban");
        assert_eq!(entries[0].ping, Some(Ping::ModAlertRole));
        assert!(entries[0].description.ends_with("Reason: Test reason"));
    }

    #[tokio::test]
    async fn deactivate_reports_other_http_errors_and_store_failures() {
        let store = FakeStore {
            fail_updates: true,
            ..Default::default()
        };
        let h = harness(store, FakeGateway::failing(Failure::Http(500, 0)));
        let logs = h
            .scheduler
            .deactivate_infraction(&infraction(456, InfractionType::Ban), false, true)
            .await
            .unwrap();

        assert_eq!(
            logs.get("Failure"),
            Some("HTTPException with status 500 and code 0. Database update failed.")
        );
        assert!(h.mod_log.titles().is_empty());
    }

    #[tokio::test]
    async fn deactivate_rejects_unsupported_types() {
        let store = Arc::new(FakeStore::default());
        let scheduler = InfractionScheduler::new(
            store.clone(),
            Arc::new(FakeGateway::default()),
            Arc::new(FakeModLog::default()),
            &[InfractionType::Ban],
        );

        let result = scheduler
            .deactivate_infraction(&infraction(1, InfractionType::Kick), true, true)
            .await;
        assert!(result.is_err());
        assert!(store.inactive_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pardoning_timeout_of_absent_member_fails() {
        let gateway = FakeGateway {
            is_member: false,
            ..Default::default()
        };
        let h = harness(FakeStore::default(), gateway);
        let fields = h
            .scheduler
            .pardon_action(&infraction(7, InfractionType::Timeout), true)
            .await
            .unwrap();

        assert_eq!(fields.get("Failure"), Some("User was not found in the guild."));
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn pardoning_voice_mute_unmutes_and_notifies() {
        let h = harness(FakeStore::default(), FakeGateway::default());
        let fields = h
            .scheduler
            .pardon_action(&infraction(7, InfractionType::VoiceMute), true)
            .await
            .unwrap();

        assert_eq!(h.gateway.calls(), vec!["voice_mute 456 false"]);
        assert_eq!(fields.get("DM"), Some("Sent"));
        assert_eq!(h.gateway.dms.lock().unwrap()[0].1.title, "You have been unmuted");
    }

    #[tokio::test]
    async fn pardon_without_notify_sends_no_dm() {
        let h = harness(FakeStore::default(), FakeGateway::default());
        let fields = h
            .scheduler
            .pardon_action(&infraction(7, InfractionType::Timeout), false)
            .await
            .unwrap();

        assert_eq!(h.gateway.calls(), vec!["remove_timeout 456"]);
        assert!(!fields.contains("DM"));
        assert!(h.gateway.dms.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_ban_runs_action_once() {
        let h = harness(FakeStore::default(), FakeGateway::default());
        let mut ban = infraction(1234, InfractionType::Ban);
        ban.user_id = 123456789;
        ban.actor_id = 999;
        ban.jump_url = Some("https://discord.com/channels/1/2/3".into());

        let outcome = h
            .scheduler
            .apply_infraction(&ban, &TargetUser::new(123456789), 0)
            .await;

        assert!(outcome.applied);
        assert_eq!(h.gateway.calls(), vec!["ban 123456789 0"]);
        assert!(outcome.message.starts_with(":incoming_envelope: :ok_hand: applied **ban** to <@123456789> until"));
        assert_eq!(*h.store.dm_sent.lock().unwrap(), vec![(1234, true)]);
        assert_eq!(h.mod_log.titles(), vec!["Infraction applied: ban"]);
    }

    #[tokio::test]
    async fn failed_apply_deletes_record() {
        let h = harness(
            FakeStore::with(vec![infraction(5, InfractionType::Kick)]),
            FakeGateway::failing(Failure::Forbidden),
        );
        let outcome = h
            .scheduler
            .apply_infraction(&infraction(5, InfractionType::Kick), &TargetUser::new(456), 0)
            .await;

        assert!(!outcome.applied);
        assert_eq!(outcome.message, ":incoming_envelope: :x: failed to apply **kick** to <@456>.");
        assert_eq!(*h.store.deleted.lock().unwrap(), vec![5]);
        assert!(h.store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_apply_reports_failed_delete() {
        let store = FakeStore {
            fail_deletes: true,
            ..Default::default()
        };
        let h = harness(store, FakeGateway::failing(Failure::NotFound));
        let outcome = h
            .scheduler
            .apply_infraction(&infraction(5, InfractionType::Kick), &TargetUser::new(456), 0)
            .await;

        assert!(outcome.message.contains(":x: failed to apply and failed to delete"));
        assert_eq!(
            h.mod_log.titles(),
            vec!["Infraction failed to apply and failed to delete: kick"]
        );
    }

    #[tokio::test]
    async fn hidden_infractions_are_not_dmed() {
        let h = harness(FakeStore::default(), FakeGateway::default());
        let outcome = h
            .scheduler
            .infract(request(InfractionType::Note))
            .await
            .unwrap();

        assert!(outcome.applied);
        assert_eq!(outcome.message, ":ok_hand: applied **note** to <@456>.");
        assert!(h.gateway.dms.lock().unwrap().is_empty());
        let rows = h.store.rows.lock().unwrap();
        assert!(rows[0].hidden);
        assert!(!rows[0].active);
    }

    #[tokio::test]
    async fn infract_rejects_duplicate_active_infraction() {
        let h = harness(
            FakeStore::with(vec![infraction(9, InfractionType::Ban)]),
            FakeGateway::default(),
        );
        let outcome = h.scheduler.infract(request(InfractionType::Ban)).await.unwrap();

        assert!(!outcome.applied);
        assert_eq!(
            outcome.message,
            ":x: <@456> already has an active ban infraction (#9)."
        );
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn timeouts_get_default_and_capped_durations() {
        let h = harness(FakeStore::default(), FakeGateway::default());
        let before = Utc::now().naive_utc();
        h.scheduler
            .infract(request(InfractionType::Timeout))
            .await
            .unwrap();

        let mut long = request(InfractionType::Timeout);
        long.target = TargetUser::new(457);
        long.expires_at = Some(Utc::now() + Duration::days(60));
        h.scheduler.infract(long).await.unwrap();

        let rows = h.store.rows.lock().unwrap();
        let short = rows[0].expires_at.unwrap() - before;
        assert!(short >= Duration::minutes(59) && short <= Duration::minutes(61));
        let capped = rows[1].expires_at.unwrap() - before;
        assert!(capped <= Duration::days(MAX_TIMEOUT_DAYS) + Duration::minutes(1));
        assert!(capped >= Duration::days(MAX_TIMEOUT_DAYS) - Duration::minutes(1));
    }

    #[tokio::test]
    async fn kicks_never_expire() {
        let h = harness(FakeStore::default(), FakeGateway::default());
        let mut kick = request(InfractionType::Kick);
        kick.expires_at = Some(Utc::now() + Duration::days(1));
        h.scheduler.infract(kick).await.unwrap();

        let rows = h.store.rows.lock().unwrap();
        assert!(rows[0].expires_at.is_none());
        assert!(!rows[0].active);
    }

    #[tokio::test]
    async fn pardon_without_active_infraction() {
        let h = harness(FakeStore::default(), FakeGateway::default());
        let message = h
            .scheduler
            .pardon_infraction(4567, 1234, InfractionType::Ban, &TargetUser::new(456), None)
            .await
            .unwrap();

        assert_eq!(message, ":x: There's no active ban infraction for user <@456>.");
    }

    #[tokio::test]
    async fn pardon_deactivates_all_active_infractions() {
        let h = harness(
            FakeStore::with(vec![
                infraction(1, InfractionType::Ban),
                infraction(2, InfractionType::Ban),
            ]),
            FakeGateway::default(),
        );
        let message = h
            .scheduler
            .pardon_infraction(
                4567,
                1234,
                InfractionType::Ban,
                &TargetUser::new(456),
                Some("Appealed".into()),
            )
            .await
            .unwrap();

        assert_eq!(message, ":ok_hand: pardoned infraction **ban** for <@456>.");
        assert_eq!(*h.store.inactive_calls.lock().unwrap(), vec![1, 2]);
        let entries = h.mod_log.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Infraction pardoned: ban");
        assert!(entries[0].description.contains("Actor: <@1234>"));
        assert!(entries[0].description.contains("Pardon reason: Appealed"));
    }

    #[tokio::test]
    async fn failed_pardon_is_reported() {
        let h = harness(
            FakeStore::with(vec![infraction(1, InfractionType::Ban)]),
            FakeGateway::failing(Failure::Forbidden),
        );
        let message = h
            .scheduler
            .pardon_infraction(4567, 1234, InfractionType::Ban, &TargetUser::new(456), None)
            .await
            .unwrap();

        assert_eq!(message, ":x: failed to pardon infraction **ban** for <@456>.");
        assert_eq!(h.mod_log.titles(), vec!["Infraction pardon failed: ban"]);
    }
}
