use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "guild_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub guild_id: i64,
    /// Infraction lifecycle messages.
    pub log_channel_id: Option<i64>,
    /// Filter alerts. Falls back to the log channel.
    pub alert_channel_id: Option<i64>,
    pub mod_role_id: Option<i64>,
    pub mod_alert_role_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
