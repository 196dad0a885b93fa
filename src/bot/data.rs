use std::fmt;
use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Settings;
use crate::services::moderation::engine::ActionEngine;
use crate::services::moderation::scheduler::MuteScheduler;
use crate::services::moderation::store::ModerationStore;

/// Shared data available to all commands and handlers
pub struct Data {
    pub pool: PgPool,
    pub settings: Settings,
    pub store: Arc<dyn ModerationStore>,
    pub engine: ActionEngine,
    pub scheduler: Arc<MuteScheduler>,
}

impl Data {
    pub fn new(
        pool: PgPool,
        settings: Settings,
        store: Arc<dyn ModerationStore>,
        engine: ActionEngine,
        scheduler: Arc<MuteScheduler>,
    ) -> Self {
        Self {
            pool,
            settings,
            store,
            engine,
            scheduler,
        }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

pub type Context<'a> = poise::Context<'a, Arc<Data>, crate::bot::error::Error>;
