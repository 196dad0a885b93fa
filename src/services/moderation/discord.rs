use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    ChannelId, CreateEmbed, CreateMessage, GuildId, Http, RoleId, Timestamp, UserId,
};
use serenity::http::HttpError;
use tracing::debug;

use crate::constants::embeds;
use crate::services::moderation::gateway::{
    EnforcementError, InfractionNotice, ModerationGateway, TargetProfile,
};
use crate::utils::formatting::mention_user;

/// Serenity-backed gateway: the only place the moderation core touches the
/// Discord HTTP API.
pub struct DiscordGateway {
    http: Arc<Http>,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn member_rank(&self, guild_id: GuildId, role_ids: &[RoleId]) -> i64 {
        match guild_id.roles(&self.http).await {
            Ok(roles) => role_ids
                .iter()
                .filter_map(|id| roles.get(id))
                .map(|role| i64::from(role.position))
                .max()
                .unwrap_or(0),
            Err(e) => {
                debug!("Could not fetch roles for guild {}: {:?}", guild_id, e);
                0
            }
        }
    }

    fn log_embed(notice: &InfractionNotice) -> CreateEmbed {
        embeds::standard_embed()
            .title("New Infraction")
            .description(format!("New infraction for {}:", mention_user(notice.subject_id)))
            .field("Infraction ID", notice.infraction_id.clone(), true)
            .field("Moderator", mention_user(notice.actor_id), true)
            .field("User", mention_user(notice.subject_id), true)
            .field("Type", notice.kind.to_string(), true)
            .field("Reason", notice.reason.clone(), false)
            .timestamp(Timestamp::now())
    }

    fn dm_embed(notice: &InfractionNotice) -> CreateEmbed {
        embeds::standard_embed()
            .title("Infraction")
            .description("Your punishment in this server has been updated:")
            .field("Infraction ID", notice.infraction_id.clone(), true)
            .field("Type", notice.kind.to_string(), true)
            .field("Reason", notice.reason.clone(), false)
            .timestamp(Timestamp::now())
    }
}

fn map_enforcement_error(e: serenity::Error) -> EnforcementError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) = &e {
        match resp.status_code.as_u16() {
            403 => EnforcementError::Forbidden,
            404 => EnforcementError::NotFound,
            _ => EnforcementError::Transport,
        }
    } else {
        EnforcementError::Transport
    }
}

#[async_trait]
impl ModerationGateway for DiscordGateway {
    async fn resolve(&self, guild_id: GuildId, user_id: UserId) -> Option<TargetProfile> {
        match guild_id.member(&self.http, user_id).await {
            Ok(member) => {
                let rank = self.member_rank(guild_id, &member.roles).await;
                Some(TargetProfile { is_member: true, rank })
            }
            Err(_) => match self.http.get_user(user_id).await {
                Ok(_) => Some(TargetProfile { is_member: false, rank: 0 }),
                Err(e) => {
                    debug!("Could not resolve user {}: {:?}", user_id, e);
                    None
                }
            },
        }
    }

    async fn highest_rank(&self, guild_id: GuildId, user_id: UserId) -> i64 {
        match guild_id.member(&self.http, user_id).await {
            Ok(member) => self.member_rank(guild_id, &member.roles).await,
            Err(_) => 0,
        }
    }

    async fn kick(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> Result<(), EnforcementError> {
        guild_id
            .kick_with_reason(&self.http, user_id, reason)
            .await
            .map_err(map_enforcement_error)
    }

    async fn ban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> Result<(), EnforcementError> {
        guild_id
            .ban_with_reason(&self.http, user_id, 0, reason)
            .await
            .map_err(map_enforcement_error)
    }

    async fn unban(&self, guild_id: GuildId, user_id: UserId) -> Result<(), EnforcementError> {
        guild_id
            .unban(&self.http, user_id)
            .await
            .map_err(map_enforcement_error)
    }

    async fn add_mute_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), EnforcementError> {
        self.http
            .add_member_role(guild_id, user_id, role_id, Some("mute"))
            .await
            .map_err(map_enforcement_error)
    }

    async fn remove_mute_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), EnforcementError> {
        self.http
            .remove_member_role(guild_id, user_id, role_id, Some("unmute"))
            .await
            .map_err(map_enforcement_error)
    }

    async fn notify_subject(&self, user_id: UserId, notice: &InfractionNotice) -> bool {
        let message = CreateMessage::new().embed(Self::dm_embed(notice));

        match user_id.create_dm_channel(&self.http).await {
            Ok(dm) => match dm.send_message(&self.http, message).await {
                Ok(_) => true,
                Err(e) => {
                    debug!("Could not DM user {}: {:?}", user_id, e);
                    false
                }
            },
            Err(e) => {
                debug!("Could not open DM channel for user {}: {:?}", user_id, e);
                false
            }
        }
    }

    async fn post_log(&self, channel_id: ChannelId, notice: &InfractionNotice) -> bool {
        let message = CreateMessage::new().embed(Self::log_embed(notice));

        match channel_id.send_message(&self.http, message).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Could not post to log channel {}: {:?}", channel_id, e);
                false
            }
        }
    }
}
