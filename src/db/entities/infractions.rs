use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    poise::ChoiceParameter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum InfractionType {
    #[sea_orm(string_value = "ban")]
    #[name = "ban"]
    Ban,
    #[sea_orm(string_value = "kick")]
    #[name = "kick"]
    Kick,
    #[sea_orm(string_value = "timeout")]
    #[name = "timeout"]
    Timeout,
    #[sea_orm(string_value = "voice_mute")]
    #[name = "voice mute"]
    VoiceMute,
    #[sea_orm(string_value = "warning")]
    #[name = "warning"]
    Warning,
    #[sea_orm(string_value = "note")]
    #[name = "note"]
    Note,
}

impl InfractionType {
    /// Types that stay active until they expire or are pardoned.
    pub const REVERSIBLE: [InfractionType; 3] = [
        InfractionType::Ban,
        InfractionType::Timeout,
        InfractionType::VoiceMute,
    ];

    pub fn is_reversible(&self) -> bool {
        Self::REVERSIBLE.contains(self)
    }

    /// Higher is harsher.
    pub fn severity(&self) -> u8 {
        match self {
            InfractionType::Note => 0,
            InfractionType::Warning => 1,
            InfractionType::VoiceMute => 2,
            InfractionType::Timeout => 3,
            InfractionType::Kick => 4,
            InfractionType::Ban => 5,
        }
    }

    /// Human readable name, e.g. `voice mute`.
    pub fn display_name(&self) -> &'static str {
        match self {
            InfractionType::Ban => "ban",
            InfractionType::Kick => "kick",
            InfractionType::Timeout => "timeout",
            InfractionType::VoiceMute => "voice mute",
            InfractionType::Warning => "warning",
            InfractionType::Note => "note",
        }
    }
}

impl std::fmt::Display for InfractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Eq)]
#[sea_orm(table_name = "infractions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub guild_id: i64,
    pub user_id: i64,
    pub actor_id: i64,
    pub infraction_type: InfractionType,
    pub reason: Option<String>,
    pub inserted_at: DateTime,
    pub last_applied: DateTime,
    pub expires_at: Option<DateTime>,
    pub active: bool,
    pub hidden: bool,
    pub dm_sent: Option<bool>,
    pub jump_url: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
