use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, GatewayIntents, GuildId};
use sqlx::PgPool;
use tracing::{error, info};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::commands;
use crate::config::Settings;
use crate::handlers::event_handler::event_handler;
use crate::services::moderation::discord::DiscordGateway;
use crate::services::moderation::engine::ActionEngine;
use crate::services::moderation::gateway::ModerationGateway;
use crate::services::moderation::scheduler::MuteScheduler;
use crate::services::moderation::store::{ModerationStore, PgStore};

pub async fn run(settings: Settings, pool: PgPool) -> Result<(), Error> {
    let token = settings.discord_token.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::moderation::warn(),
                commands::moderation::kick(),
                commands::moderation::ban(),
                commands::moderation::unban(),
                commands::moderation::mute(),
                commands::moderation::unmute(),
                commands::infractions::infraction(),
                commands::setup::setup(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command error: {:?}", error);
                            let _ = ctx.say(format!("Error: {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
                            let _ = ctx.say(format!("Invalid argument: {}", error)).await;
                        }
                        poise::FrameworkError::UnknownCommand { .. } => {}
                        err => {
                            error!("Framework error: {:?}", err);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as {}", ready.user.name);

                let store: Arc<dyn ModerationStore> = Arc::new(PgStore::new(pool.clone()));
                let gateway: Arc<dyn ModerationGateway> =
                    Arc::new(DiscordGateway::new(ctx.http.clone()));
                let scheduler = Arc::new(MuteScheduler::new(store.clone(), gateway.clone()));

                // Rebuild mute timers from the store; overdue mutes fire
                // immediately instead of never
                match scheduler.restore().await {
                    Ok(0) => {}
                    Ok(n) => info!("Rescheduled {} active mutes from the store", n),
                    Err(e) => error!("Failed to restore mute timers: {}", e),
                }

                let engine = ActionEngine::new(
                    store.clone(),
                    gateway,
                    scheduler.clone(),
                    ready.user.id,
                );

                match settings.guild_id {
                    Some(guild_id) => {
                        let guild_id = GuildId::new(guild_id);
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            guild_id,
                        )
                        .await
                        .map_err(Error::Serenity)?;
                        info!(
                            "Registered {} commands in guild {}",
                            framework.options().commands.len(),
                            guild_id
                        );
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await
                            .map_err(Error::Serenity)?;
                        info!(
                            "Registered {} commands globally",
                            framework.options().commands.len()
                        );
                    }
                }

                Ok(Arc::new(Data::new(pool, settings, store, engine, scheduler)))
            })
        })
        .build();

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .map_err(Error::Serenity)?;

    info!("Starting Discord client...");
    client.start().await.map_err(Error::Serenity)
}
