use anyhow::Context as _;
use clap::Parser as _;
use dotenvy::dotenv;
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info};

mod db;
mod error;
mod modules;
mod services;

use services::infraction::InfractionScheduler;

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Publish commands. If no guild ID is provided, publish globally.
    #[arg(long, num_args = 0..)]
    publish: Option<Vec<u64>>,

    /// Clear all commands instead of publishing them.
    #[arg(long)]
    clear: bool,

    /// Rollback the specified number of migrations and run all migrations again.
    #[arg(long, num_args = 0..=1, default_missing_value = "1")]
    refresh_migrations: Option<u32>,
}

// Custom user data passed to all command functions
pub struct Data {
    pub db: DatabaseConnection,
    pub l10n: Arc<services::localization::LocalizationManager>,
    pub logger: Arc<services::logger::LoggerService>,
    pub filters: Arc<services::filtering::FilterListService>,
    pub infractions: Arc<InfractionScheduler>,
    pub event_handlers: Vec<modules::EventHandler>,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

fn event_handler<'a>(
    ctx: &'a serenity::Context,
    event: &'a serenity::FullEvent,
    _framework: poise::FrameworkContext<'a, Data, Error>,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<(), Error>> {
    Box::pin(services::event_manager::dispatch(
        ctx,
        event,
        data,
        &data.event_handlers,
    ))
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!(
                "Command /{} failed: {:?}",
                ctx.command().qualified_name,
                error
            );
            if let Err(e) = ctx.say(":x: Something went wrong while running this command.").await {
                error!("Failed to report command error: {:?}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

async fn publish_commands(
    token: &str,
    guilds: Vec<u64>,
    commands: &[poise::Command<Data, Error>],
    clear: bool,
) -> anyhow::Result<()> {
    let http = serenity::Http::new(token);
    let application = http
        .get_current_application_info()
        .await
        .context("Failed to fetch application info")?;
    info!("Fetched Application ID: {}", application.id);
    http.set_application_id(application.id);

    let commands: &[poise::Command<Data, Error>] = if clear { &[] } else { commands };
    let action = if clear { "Clearing" } else { "Registering" };

    if guilds.is_empty() {
        info!("{} commands globally...", action);
        if let Err(e) = poise::builtins::register_globally(&http, commands).await {
            error!("Failed to register commands globally: {}", e);
        } else {
            info!("Global command operation successful");
        }
        return Ok(());
    }

    for guild_id in guilds {
        info!("{} commands in guild {}...", action, guild_id);
        if let Err(e) =
            poise::builtins::register_in_guild(&http, commands, serenity::GuildId::new(guild_id))
                .await
        {
            error!("Failed to register commands in guild {}: {}", guild_id, e);
        } else {
            info!("Guild command operation successful for guild {}", guild_id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::fmt::init();

    info!("Starting moderation bot...");

    let db = db::establish_connection()
        .await
        .context("Failed to connect to database")?;

    use sea_orm_migration::MigratorTrait;
    if let Some(depth) = args.refresh_migrations {
        info!("Refreshing migrations (down {}, then up)...", depth);
        db::migrations::Migrator::down(&db, Some(depth))
            .await
            .context("Failed to rollback migration")?;
    }

    db::migrations::Migrator::up(&db, None)
        .await
        .context("Failed to run migrations")?;

    if args.refresh_migrations.is_some() {
        info!("Migrations refreshed successfully.");
        return Ok(());
    }

    let token = std::env::var("DISCORD_TOKEN").context("missing DISCORD_TOKEN")?;
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_MODERATION;

    let l10n = Arc::new(services::localization::LocalizationManager::new());

    // Load and translate commands
    let mut commands = modules::commands();
    l10n.apply_translations(&mut commands);

    if let Some(guilds) = args.publish {
        return publish_commands(&token, guilds, &commands, args.clear).await;
    }

    let framework_options = poise::FrameworkOptions {
        commands,
        event_handler,
        on_error: |error| Box::pin(on_error(error)),
        ..Default::default()
    };

    let framework = poise::Framework::builder()
        .options(framework_options)
        .setup(move |ctx, ready, _framework| {
            Box::pin(async move {
                info!("Connected as {}", ready.user.name);

                let logger = Arc::new(services::logger::LoggerService::new(
                    db.clone(),
                    ctx.http.clone(),
                ));
                let filters = Arc::new(services::filtering::FilterListService::new(db.clone()));
                let infractions = Arc::new(InfractionScheduler::new(
                    Arc::new(db.clone()),
                    ctx.http.clone(),
                    logger.clone(),
                    &services::infraction::SUPPORTED_INFRACTIONS,
                ));

                infractions.clone().start_expiry_runner();

                Ok(Data {
                    db,
                    l10n,
                    logger,
                    filters,
                    infractions,
                    event_handlers: modules::event_handlers(),
                })
            })
        })
        .build();

    let mut cache_settings = serenity::cache::Settings::default();
    cache_settings.max_messages = 2048;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .cache_settings(cache_settings)
        .await
        .context("Failed to create client")?;

    client.start_autosharded().await.context("Client error")?;

    Ok(())
}
