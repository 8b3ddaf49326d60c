use super::InfractionScheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

impl InfractionScheduler {
    /// Deactivates every active infraction past its expiry. Returns how many were processed.
    pub async fn deactivate_expired(&self) -> Result<usize, crate::Error> {
        let now = chrono::Utc::now().naive_utc();
        let expired = self.store().expired(now).await?;

        for infraction in &expired {
            info!(
                "Infraction #{} ({}) for user {} in guild {} expired",
                infraction.id, infraction.infraction_type, infraction.user_id, infraction.guild_id
            );
            if let Err(e) = self.deactivate_infraction(infraction, true, true).await {
                error!("Failed to expire infraction #{}: {:?}", infraction.id, e);
            }
        }

        Ok(expired.len())
    }

    /// Starts the background task that expires temporary infractions.
    pub fn start_expiry_runner(self: Arc<Self>) {
        tokio::spawn(async move {
            info!("Infraction expiry runner started.");
            loop {
                sleep(Duration::from_secs(60)).await;
                if let Err(e) = self.deactivate_expired().await {
                    error!("Failed to fetch expired infractions: {:?}", e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::db::entities::infractions::InfractionType;
    use crate::services::infraction::fakes::{infraction, FakeGateway, FakeModLog, FakeStore};
    use crate::services::infraction::InfractionScheduler;
    use std::sync::Arc;

    #[tokio::test]
    async fn expires_only_past_due_active_infractions() {
        let mut permanent = infraction(2, InfractionType::Ban);
        permanent.expires_at = None;
        let mut future = infraction(3, InfractionType::Timeout);
        future.expires_at = Some(chrono::Utc::now().naive_utc() + chrono::Duration::days(1));

        let store = Arc::new(FakeStore::with(vec![
            infraction(1, InfractionType::Ban),
            permanent,
            future,
        ]));
        let gateway = Arc::new(FakeGateway::default());
        let mod_log = Arc::new(FakeModLog::default());
        let scheduler = InfractionScheduler::new(
            store.clone(),
            gateway.clone(),
            mod_log.clone(),
            &InfractionType::REVERSIBLE,
        );

        assert_eq!(scheduler.deactivate_expired().await.unwrap(), 1);
        assert_eq!(gateway.calls(), vec!["unban 456"]);
        assert_eq!(*store.inactive_calls.lock().unwrap(), vec![1]);
        assert_eq!(mod_log.titles(), vec!["Infraction expired: ban"]);

        assert_eq!(scheduler.deactivate_expired().await.unwrap(), 0);
    }
}
