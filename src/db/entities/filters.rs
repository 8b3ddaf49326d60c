use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Eq)]
#[sea_orm(table_name = "filters")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub filter_list_id: i32,
    pub content: String,
    pub description: Option<String>,
    pub settings: Json,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::filter_lists::Entity",
        from = "Column::FilterListId",
        to = "super::filter_lists::Column::Id",
        on_delete = "Cascade"
    )]
    FilterList,
}

impl Related<super::filter_lists::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FilterList.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
