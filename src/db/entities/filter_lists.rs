use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    poise::ChoiceParameter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ListType {
    #[sea_orm(string_value = "allow")]
    #[name = "allow"]
    Allow,
    #[sea_orm(string_value = "deny")]
    #[name = "deny"]
    Deny,
}

impl std::fmt::Display for ListType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListType::Allow => write!(f, "allow"),
            ListType::Deny => write!(f, "deny"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Eq)]
#[sea_orm(table_name = "filter_lists")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub guild_id: i64,
    pub name: String,
    pub list_type: ListType,
    pub settings: Json,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::filters::Entity")]
    Filters,
}

impl Related<super::filters::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Filters.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
