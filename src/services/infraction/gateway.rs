use super::notify::Notice;
use super::ModerationGateway;
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

fn timestamp(at: DateTime<Utc>) -> Result<serenity::Timestamp, ApiError> {
    serenity::Timestamp::from_unix_timestamp(at.timestamp())
        .map_err(|e| ApiError::Other(anyhow::anyhow!("invalid timestamp {at}: {e}")))
}

#[async_trait::async_trait]
impl ModerationGateway for serenity::Http {
    async fn ban(
        &self,
        guild_id: u64,
        user_id: u64,
        delete_message_days: u8,
        reason: &str,
    ) -> Result<(), ApiError> {
        self.ban_user(
            serenity::GuildId::new(guild_id),
            serenity::UserId::new(user_id),
            delete_message_days,
            Some(reason),
        )
        .await?;
        Ok(())
    }

    async fn unban(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ApiError> {
        self.remove_ban(
            serenity::GuildId::new(guild_id),
            serenity::UserId::new(user_id),
            Some(reason),
        )
        .await?;
        Ok(())
    }

    async fn kick(&self, guild_id: u64, user_id: u64, reason: &str) -> Result<(), ApiError> {
        self.kick_member(
            serenity::GuildId::new(guild_id),
            serenity::UserId::new(user_id),
            Some(reason),
        )
        .await?;
        Ok(())
    }

    async fn timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), ApiError> {
        let edit = serenity::EditMember::new()
            .disable_communication_until_datetime(timestamp(until)?)
            .audit_log_reason(reason);
        serenity::GuildId::new(guild_id)
            .edit_member(self, serenity::UserId::new(user_id), edit)
            .await?;
        Ok(())
    }

    async fn remove_timeout(
        &self,
        guild_id: u64,
        user_id: u64,
        reason: &str,
    ) -> Result<(), ApiError> {
        let edit = serenity::EditMember::new()
            .enable_communication()
            .audit_log_reason(reason);
        serenity::GuildId::new(guild_id)
            .edit_member(self, serenity::UserId::new(user_id), edit)
            .await?;
        Ok(())
    }

    async fn set_voice_mute(
        &self,
        guild_id: u64,
        user_id: u64,
        muted: bool,
        reason: &str,
    ) -> Result<(), ApiError> {
        let edit = serenity::EditMember::new().mute(muted).audit_log_reason(reason);
        serenity::GuildId::new(guild_id)
            .edit_member(self, serenity::UserId::new(user_id), edit)
            .await?;
        Ok(())
    }

    async fn is_member(&self, guild_id: u64, user_id: u64) -> Result<bool, ApiError> {
        match self
            .get_member(
                serenity::GuildId::new(guild_id),
                serenity::UserId::new(user_id),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = ApiError::from(e);
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn send_dm(&self, user_id: u64, notice: &Notice) -> Result<(), ApiError> {
        let mut embed = serenity::CreateEmbed::new()
            .title(&notice.title)
            .description(&notice.description)
            .color(notice.colour);
        if let Some(footer) = &notice.footer {
            embed = embed.footer(serenity::CreateEmbedFooter::new(footer));
        }

        serenity::UserId::new(user_id)
            .direct_message(self, serenity::CreateMessage::new().embed(embed))
            .await?;
        Ok(())
    }
}
