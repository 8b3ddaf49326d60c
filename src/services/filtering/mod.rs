pub mod clean;
pub mod context;
pub mod filter_list;
pub mod invite;
pub mod settings;

use crate::db::entities::filter_lists::{self, ListType};
use crate::db::entities::filters;
use chrono::Utc;
use dashmap::DashMap;
use filter_list::AtomicList;
use invite::InviteList;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use settings::ListSettings;
use std::sync::Arc;
use tracing::{debug, info};

/// Loads, caches and edits the per-guild invite lists.
pub struct FilterListService {
    db: DatabaseConnection,
    cache: DashMap<u64, Arc<InviteList>>,
}

impl FilterListService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            cache: DashMap::new(),
        }
    }

    /// The guild's invite list, loaded from the database on first use.
    pub async fn invite_list(&self, guild_id: u64) -> Result<Arc<InviteList>, crate::Error> {
        if let Some(list) = self.cache.get(&guild_id) {
            return Ok(list.clone());
        }

        let lists = filter_lists::Entity::find()
            .filter(filter_lists::Column::GuildId.eq(guild_id as i64))
            .filter(filter_lists::Column::Name.eq(InviteList::NAME))
            .find_with_related(filters::Entity)
            .all(&self.db)
            .await?;

        let mut invite_list = InviteList::default();
        for (list, entries) in lists {
            invite_list.add_list(AtomicList::from_models(list, entries));
        }

        debug!("Loaded invite lists for guild {}", guild_id);
        let invite_list = Arc::new(invite_list);
        self.cache.insert(guild_id, invite_list.clone());
        Ok(invite_list)
    }

    pub fn invalidate(&self, guild_id: u64) {
        self.cache.remove(&guild_id);
    }

    /// Finds the list of the given type, creating it with default settings if needed.
    async fn get_or_create_list(
        &self,
        guild_id: u64,
        list_type: ListType,
    ) -> Result<filter_lists::Model, crate::Error> {
        let existing = filter_lists::Entity::find()
            .filter(filter_lists::Column::GuildId.eq(guild_id as i64))
            .filter(filter_lists::Column::Name.eq(InviteList::NAME))
            .filter(filter_lists::Column::ListType.eq(list_type))
            .one(&self.db)
            .await?;

        if let Some(list) = existing {
            return Ok(list);
        }

        let now = Utc::now().naive_utc();
        let model = filter_lists::ActiveModel {
            guild_id: Set(guild_id as i64),
            name: Set(InviteList::NAME.to_string()),
            list_type: Set(list_type),
            settings: Set(serde_json::to_value(ListSettings::default())?),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        info!("Creating {} invite list for guild {}", list_type, guild_id);
        Ok(model.insert(&self.db).await?)
    }

    /// Adds a guild to a list. Returns `None` if it is already there.
    pub async fn add_filter(
        &self,
        guild_id: u64,
        list_type: ListType,
        target_guild_id: u64,
        description: Option<String>,
    ) -> Result<Option<filters::Model>, crate::Error> {
        let list = self.get_or_create_list(guild_id, list_type).await?;
        let content = target_guild_id.to_string();

        let duplicate = filters::Entity::find()
            .filter(filters::Column::FilterListId.eq(list.id))
            .filter(filters::Column::Content.eq(content.as_str()))
            .one(&self.db)
            .await?;
        if duplicate.is_some() {
            return Ok(None);
        }

        let now = Utc::now().naive_utc();
        let model = filters::ActiveModel {
            filter_list_id: Set(list.id),
            content: Set(content),
            description: Set(description.filter(|d| !d.is_empty())),
            settings: Set(serde_json::json!({})),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let inserted = model.insert(&self.db).await?;

        self.invalidate(guild_id);
        Ok(Some(inserted))
    }

    /// Removes a filter by ID. Returns `false` if it doesn't belong to this guild.
    pub async fn remove_filter(&self, guild_id: u64, filter_id: i32) -> Result<bool, crate::Error> {
        let found = filters::Entity::find_by_id(filter_id)
            .find_also_related(filter_lists::Entity)
            .one(&self.db)
            .await?;

        let Some((filter, Some(list))) = found else {
            return Ok(false);
        };
        if list.guild_id != guild_id as i64 || list.name != InviteList::NAME {
            return Ok(false);
        }

        filter.delete(&self.db).await?;
        self.invalidate(guild_id);
        Ok(true)
    }

    /// Both lists with their filters, ordered by ID.
    pub async fn entries(
        &self,
        guild_id: u64,
    ) -> Result<Vec<(filter_lists::Model, Vec<filters::Model>)>, crate::Error> {
        Ok(filter_lists::Entity::find()
            .filter(filter_lists::Column::GuildId.eq(guild_id as i64))
            .filter(filter_lists::Column::Name.eq(InviteList::NAME))
            .order_by_asc(filter_lists::Column::ListType)
            .find_with_related(filters::Entity)
            .order_by_asc(filters::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Applies `edit` to a list's default settings and stores the result.
    pub async fn update_settings<F>(
        &self,
        guild_id: u64,
        list_type: ListType,
        edit: F,
    ) -> Result<ListSettings, crate::Error>
    where
        F: FnOnce(&mut ListSettings),
    {
        let list = self.get_or_create_list(guild_id, list_type).await?;
        let mut settings: ListSettings =
            serde_json::from_value(list.settings.clone()).unwrap_or_default();
        edit(&mut settings);

        let mut am: filter_lists::ActiveModel = list.into();
        am.settings = Set(serde_json::to_value(&settings)?);
        am.updated_at = Set(Utc::now().naive_utc());
        am.update(&self.db).await?;

        self.invalidate(guild_id);
        Ok(settings)
    }
}
