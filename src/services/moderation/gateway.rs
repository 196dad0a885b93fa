use async_trait::async_trait;
use serenity::all::{ChannelId, GuildId, RoleId, UserId};
use thiserror::Error;

use crate::db::models::InfractionKind;

/// Typed failure from a platform enforcement effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EnforcementError {
    #[error("the bot lacks permission for this action")]
    Forbidden,

    #[error("the platform does not know this target")]
    NotFound,

    #[error("platform transport error")]
    Transport,
}

/// What identity resolution learned about a target.
#[derive(Debug, Clone, Copy)]
pub struct TargetProfile {
    pub is_member: bool,
    /// Highest role rank held in the guild; 0 for non-members.
    pub rank: i64,
}

/// Payload for the best-effort log-channel post and subject DM.
#[derive(Debug, Clone)]
pub struct InfractionNotice {
    pub infraction_id: String,
    pub kind: InfractionKind,
    pub subject_id: UserId,
    pub actor_id: UserId,
    pub reason: String,
}

/// Boundary to the chat platform: identity resolution, role ranks, and the
/// kick/ban/role enforcement effects. The engine and scheduler only ever talk
/// to Discord through this trait.
#[async_trait]
pub trait ModerationGateway: Send + Sync {
    /// Resolve an account in a guild; `None` means no such account exists.
    async fn resolve(&self, guild_id: GuildId, user_id: UserId) -> Option<TargetProfile>;

    /// Highest role rank an account holds in a guild, 0 when unknown.
    async fn highest_rank(&self, guild_id: GuildId, user_id: UserId) -> i64;

    async fn kick(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> Result<(), EnforcementError>;

    async fn ban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> Result<(), EnforcementError>;

    async fn unban(&self, guild_id: GuildId, user_id: UserId) -> Result<(), EnforcementError>;

    async fn add_mute_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), EnforcementError>;

    async fn remove_mute_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), EnforcementError>;

    /// DM the subject about their infraction. Best-effort; returns delivery.
    async fn notify_subject(&self, user_id: UserId, notice: &InfractionNotice) -> bool;

    /// Post the infraction to a guild log channel. Best-effort.
    async fn post_log(&self, channel_id: ChannelId, notice: &InfractionNotice) -> bool;
}
