use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::db::models::{Infraction, MuteRecord};
use crate::db::queries::{guild_config, infraction, mute};

/// Storage failures the action engine reacts to differently: a duplicate id
/// is retried with a fresh id, while an unavailable backend is surfaced to
/// the caller. Lookup misses are not errors; they are `Option`/`bool`
/// returns, so unavailability can never masquerade as a miss.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate infraction id")]
    Conflict,

    #[error("storage unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Unavailable(e),
        }
    }
}

/// Narrow storage seam for the moderation core. Everything durably commits
/// before returning; no component caches infraction or mute state outside of
/// the scheduler's reconstructible timer set.
#[async_trait]
pub trait ModerationStore: Send + Sync {
    /// Atomic check-then-insert; `StoreError::Conflict` if the id exists.
    /// This, not the generator, is the real collision guard.
    async fn insert_infraction(&self, rec: &Infraction) -> Result<(), StoreError>;

    async fn get_infraction(
        &self,
        guild_id: i64,
        id: &str,
    ) -> Result<Option<Infraction>, StoreError>;

    /// Returns false if the id was absent.
    async fn delete_infraction(&self, guild_id: i64, id: &str) -> Result<bool, StoreError>;

    async fn list_infractions(&self, guild_id: i64) -> Result<Vec<Infraction>, StoreError>;

    /// Replaces any existing mute state for the same infraction id.
    async fn upsert_mute(&self, rec: &MuteRecord) -> Result<(), StoreError>;

    async fn get_active_mute(
        &self,
        guild_id: i64,
        subject_id: &str,
    ) -> Result<Option<MuteRecord>, StoreError>;

    /// Returns whether this call performed the active -> inactive transition.
    async fn deactivate_mute(&self, infraction_id: &str) -> Result<bool, StoreError>;

    /// Deactivates all active mutes for a subject, returning their ids.
    async fn deactivate_mutes_for_subject(
        &self,
        guild_id: i64,
        subject_id: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Active mutes across all guilds, for timer reconstruction at startup.
    async fn list_active_mutes(&self) -> Result<Vec<MuteRecord>, StoreError>;

    async fn get_config(
        &self,
        guild_id: i64,
        property: &str,
    ) -> Result<Option<String>, StoreError>;
}

/// Postgres-backed store delegating to the query layer.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModerationStore for PgStore {
    async fn insert_infraction(&self, rec: &Infraction) -> Result<(), StoreError> {
        infraction::insert(&self.pool, rec).await.map_err(StoreError::from)
    }

    async fn get_infraction(
        &self,
        guild_id: i64,
        id: &str,
    ) -> Result<Option<Infraction>, StoreError> {
        infraction::get(&self.pool, guild_id, id).await.map_err(StoreError::from)
    }

    async fn delete_infraction(&self, guild_id: i64, id: &str) -> Result<bool, StoreError> {
        infraction::delete(&self.pool, guild_id, id).await.map_err(StoreError::from)
    }

    async fn list_infractions(&self, guild_id: i64) -> Result<Vec<Infraction>, StoreError> {
        infraction::list_for_guild(&self.pool, guild_id).await.map_err(StoreError::from)
    }

    async fn upsert_mute(&self, rec: &MuteRecord) -> Result<(), StoreError> {
        mute::upsert(&self.pool, rec).await.map_err(StoreError::from)
    }

    async fn get_active_mute(
        &self,
        guild_id: i64,
        subject_id: &str,
    ) -> Result<Option<MuteRecord>, StoreError> {
        mute::get_active_for_subject(&self.pool, guild_id, subject_id)
            .await
            .map_err(StoreError::from)
    }

    async fn deactivate_mute(&self, infraction_id: &str) -> Result<bool, StoreError> {
        mute::deactivate(&self.pool, infraction_id).await.map_err(StoreError::from)
    }

    async fn deactivate_mutes_for_subject(
        &self,
        guild_id: i64,
        subject_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        mute::deactivate_for_subject(&self.pool, guild_id, subject_id)
            .await
            .map_err(StoreError::from)
    }

    async fn list_active_mutes(&self) -> Result<Vec<MuteRecord>, StoreError> {
        mute::list_active(&self.pool).await.map_err(StoreError::from)
    }

    async fn get_config(
        &self,
        guild_id: i64,
        property: &str,
    ) -> Result<Option<String>, StoreError> {
        guild_config::get(&self.pool, guild_id, property)
            .await
            .map_err(StoreError::from)
    }
}
