use crate::modules::EventHandler;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::{error, info};

/// Non-command events, fanned out to every module handler in registration order.
pub async fn dispatch(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
    handlers: &[EventHandler],
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!(
                "Logged in as {} ({} guilds)",
                data_about_bot.user.name,
                data_about_bot.guilds.len()
            );
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            info!("Left guild: {}", incomplete.id);
            data.filters.invalidate(incomplete.id.get());
        }
        _ => {}
    }

    for handler in handlers {
        // One failing module must not starve the others.
        if let Err(e) = handler(ctx, event, data).await {
            error!("Event handler failed on {}: {:?}", event.snake_case_name(), e);
        }
    }
    Ok(())
}
