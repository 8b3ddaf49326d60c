use super::{InfractionStore, NewInfraction};
use crate::db::entities::infractions::{self, InfractionType};
use chrono::{NaiveDateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

#[async_trait::async_trait]
impl InfractionStore for DatabaseConnection {
    async fn insert(&self, new: NewInfraction) -> Result<infractions::Model, crate::Error> {
        let now = Utc::now().naive_utc();
        let model = infractions::ActiveModel {
            guild_id: Set(new.guild_id as i64),
            user_id: Set(new.user_id as i64),
            actor_id: Set(new.actor_id as i64),
            infraction_type: Set(new.kind),
            reason: Set(new.reason),
            inserted_at: Set(now),
            last_applied: Set(now),
            expires_at: Set(new.expires_at),
            active: Set(new.active),
            hidden: Set(new.hidden),
            dm_sent: Set(None),
            jump_url: Set(new.jump_url),
            ..Default::default()
        };

        Ok(model.insert(self).await?)
    }

    async fn find_active(
        &self,
        guild_id: u64,
        user_id: u64,
        kind: InfractionType,
    ) -> Result<Vec<infractions::Model>, crate::Error> {
        Ok(infractions::Entity::find()
            .filter(infractions::Column::GuildId.eq(guild_id as i64))
            .filter(infractions::Column::UserId.eq(user_id as i64))
            .filter(infractions::Column::InfractionType.eq(kind))
            .filter(infractions::Column::Active.eq(true))
            .order_by_desc(infractions::Column::InsertedAt)
            .all(self)
            .await?)
    }

    async fn set_inactive(&self, id: i32) -> Result<(), crate::Error> {
        infractions::ActiveModel {
            id: Set(id),
            active: Set(false),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }

    async fn set_dm_sent(&self, id: i32, sent: bool) -> Result<(), crate::Error> {
        infractions::ActiveModel {
            id: Set(id),
            dm_sent: Set(Some(sent)),
            ..Default::default()
        }
        .update(self)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<(), crate::Error> {
        infractions::Entity::delete_by_id(id).exec(self).await?;
        Ok(())
    }

    async fn expired(&self, now: NaiveDateTime) -> Result<Vec<infractions::Model>, crate::Error> {
        Ok(infractions::Entity::find()
            .filter(infractions::Column::Active.eq(true))
            .filter(infractions::Column::ExpiresAt.lte(now))
            .order_by_asc(infractions::Column::ExpiresAt)
            .all(self)
            .await?)
    }

    async fn for_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Vec<infractions::Model>, crate::Error> {
        Ok(infractions::Entity::find()
            .filter(infractions::Column::GuildId.eq(guild_id as i64))
            .filter(infractions::Column::UserId.eq(user_id as i64))
            .order_by_desc(infractions::Column::InsertedAt)
            .all(self)
            .await?)
    }
}
