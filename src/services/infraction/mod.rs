pub mod gateway;
pub mod notify;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod time;

#[cfg(test)]
pub(crate) mod fakes;

use crate::db::entities::infractions::{self, InfractionType};
use crate::error::ApiError;
use chrono::{DateTime, NaiveDateTime, Utc};
use notify::Notice;

pub use scheduler::{ApplyOutcome, InfractionScheduler, LogFields};

/// Every type the bot can apply and, where reversible, lift.
pub const SUPPORTED_INFRACTIONS: [InfractionType; 6] = [
    InfractionType::Ban,
    InfractionType::Kick,
    InfractionType::Timeout,
    InfractionType::VoiceMute,
    InfractionType::Warning,
    InfractionType::Note,
];

/// The member an infraction is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUser {
    pub id: u64,
    /// Username, when known.
    pub name: Option<String>,
}

impl TargetUser {
    pub fn new(id: u64) -> Self {
        Self { id, name: None }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// Mention plus username, which stays readable after the user leaves.
    pub fn format(&self) -> String {
        match &self.name {
            Some(name) => format!("{} (`{}`)", self.mention(), name),
            None => self.mention(),
        }
    }
}

/// A moderator (or the filters) asking for an infraction.
#[derive(Debug, Clone)]
pub struct InfractionRequest {
    pub guild_id: u64,
    pub actor_id: u64,
    pub target: TargetUser,
    pub kind: InfractionType,
    pub reason: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Delete a day of the user's messages. Bans only.
    pub purge: bool,
    pub jump_url: Option<String>,
}

/// A record about to be stored.
#[derive(Debug, Clone)]
pub struct NewInfraction {
    pub guild_id: u64,
    pub user_id: u64,
    pub actor_id: u64,
    pub kind: InfractionType,
    pub reason: Option<String>,
    pub expires_at: Option<NaiveDateTime>,
    pub active: bool,
    pub hidden: bool,
    pub jump_url: Option<String>,
}

/// Persistence of infraction records.
#[async_trait::async_trait]
pub trait InfractionStore: Send + Sync {
    async fn insert(&self, new: NewInfraction) -> Result<infractions::Model, crate::Error>;

    async fn find_active(
        &self,
        guild_id: u64,
        user_id: u64,
        kind: InfractionType,
    ) -> Result<Vec<infractions::Model>, crate::Error>;

    async fn set_inactive(&self, id: i32) -> Result<(), crate::Error>;

    async fn set_dm_sent(&self, id: i32, sent: bool) -> Result<(), crate::Error>;

    async fn delete(&self, id: i32) -> Result<(), crate::Error>;

    /// Active infractions whose expiry is at or before `now`.
    async fn expired(&self, now: NaiveDateTime) -> Result<Vec<infractions::Model>, crate::Error>;

    async fn for_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Vec<infractions::Model>, crate::Error>;
}

/// The platform calls that apply and lift infractions.
#[async_trait::async_trait]
pub trait ModerationGateway: Send + Sync {
    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        delete_message_days: u8,
        reason: &str,
    ) -> Result<(), ApiError>;

    async fn unban(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ApiError>;

    async fn kick(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ApiError>;

    async fn timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), ApiError>;

    async fn remove_timeout(&self, guild_id: u64, user_id: u64, reason: &str)
        -> Result<(), ApiError>;

    async fn set_voice_mute(
        &self,
        guild_id: u64,
        user_id: u64,
        muted: bool,
        reason: &str,
    ) -> Result<(), ApiError>;

    async fn is_member(&self, guild_id: u64, user_id: u64) -> Result<bool, ApiError>;

    async fn send_dm(&self, user_id: u64, notice: &Notice) -> Result<(), ApiError>;
}

/// Why a moderator may not act on a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyError {
    ActorTooLow,
    BotTooLow,
    TargetIsOwner,
}

/// Role positions are the highest role of each member; the guild owner outranks everyone.
pub fn check_hierarchy(
    actor_position: u16,
    target_position: u16,
    bot_position: u16,
    actor_is_owner: bool,
    target_is_owner: bool,
) -> Result<(), HierarchyError> {
    if target_is_owner {
        return Err(HierarchyError::TargetIsOwner);
    }
    if !actor_is_owner && actor_position <= target_position {
        return Err(HierarchyError::ActorTooLow);
    }
    if bot_position <= target_position {
        return Err(HierarchyError::BotTooLow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_and_bot_must_outrank_target() {
        assert_eq!(check_hierarchy(10, 1, 5, false, false), Ok(()));
        assert_eq!(
            check_hierarchy(1, 1, 5, false, false),
            Err(HierarchyError::ActorTooLow)
        );
        assert_eq!(
            check_hierarchy(10, 5, 5, false, false),
            Err(HierarchyError::BotTooLow)
        );
    }

    #[test]
    fn owner_bypasses_actor_check_but_not_bot_check() {
        assert_eq!(check_hierarchy(0, 3, 5, true, false), Ok(()));
        assert_eq!(
            check_hierarchy(0, 6, 5, true, false),
            Err(HierarchyError::BotTooLow)
        );
        assert_eq!(
            check_hierarchy(10, 0, 5, false, true),
            Err(HierarchyError::TargetIsOwner)
        );
    }

    #[test]
    fn target_formatting() {
        let target = TargetUser {
            id: 1265,
            name: Some("someone".into()),
        };
        assert_eq!(target.mention(), "<@1265>");
        assert_eq!(target.format(), "<@1265> (`someone`)");
        assert_eq!(TargetUser::new(3).format(), "<@3>");
    }
}
