use poise::serenity_prelude::User;

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::services::moderation::engine::Actor;
use crate::services::moderation::gateway::EnforcementError;
use crate::utils::duration::{format_duration, parse_mute_duration};
use crate::utils::formatting::mention_user;

/// Warn a user
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "User to warn"] user: User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    let outcome = ctx
        .data()
        .engine
        .warn(
            guild_id,
            Actor::Moderator(ctx.author().id),
            &user.id.to_string(),
            reason.as_deref(),
        )
        .await?;

    let embed = embeds::success_embed().title("User Warned").description(format!(
        "Warned {} for {} (infraction `{}`)",
        mention_user(outcome.subject_id),
        outcome.reason,
        outcome.infraction_id
    ));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Kick a user from the server
#[poise::command(slash_command, guild_only, required_permissions = "KICK_MEMBERS")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "User to kick"] user: User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    let result = ctx
        .data()
        .engine
        .kick(
            guild_id,
            Actor::Moderator(ctx.author().id),
            &user.id.to_string(),
            reason.as_deref(),
        )
        .await;

    let embed = match result {
        Ok(outcome) => embeds::success_embed().title("User Kicked").description(format!(
            "Kicked {} for {} (infraction `{}`)",
            mention_user(outcome.subject_id),
            outcome.reason,
            outcome.infraction_id
        )),
        Err(Error::EnforcementAfterRecord {
            id,
            source: EnforcementError::Forbidden,
        }) => embeds::error_embed().title("Kick Failed").description(format!(
            "The bot does not have permission to kick this user. \
            The infraction was still recorded as `{}`.",
            id
        )),
        Err(e) => return Err(e),
    };

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Ban a user from the server
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "User to ban"] user: User,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    let result = ctx
        .data()
        .engine
        .ban(
            guild_id,
            Actor::Moderator(ctx.author().id),
            &user.id.to_string(),
            reason.as_deref(),
        )
        .await;

    let embed = match result {
        Ok(outcome) => embeds::success_embed().title("User Banned").description(format!(
            "Banned {} for {} (infraction `{}`)",
            mention_user(outcome.subject_id),
            outcome.reason,
            outcome.infraction_id
        )),
        Err(Error::EnforcementAfterRecord {
            id,
            source: EnforcementError::Forbidden,
        }) => embeds::error_embed().title("Ban Failed").description(format!(
            "The bot does not have permission to ban this user. \
            The infraction was still recorded as `{}`.",
            id
        )),
        Err(e) => return Err(e),
    };

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Unban a user
#[poise::command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "User ID or mention to unban"] user: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    let result = ctx.data().engine.unban(guild_id, &user).await;

    let embed = match result {
        Ok(user_id) => embeds::success_embed()
            .title("User Unbanned")
            .description(format!("Unbanned {}", mention_user(user_id))),
        Err(Error::Enforcement(EnforcementError::NotFound)) => embeds::error_embed()
            .title("Not Banned")
            .description("This user is not banned."),
        Err(e) => return Err(e),
    };

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Mute a user, optionally for a limited time
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "User to mute"] user: User,
    #[description = "Duration such as 30s, 5m or 2h; omit for permanent"] duration: Option<String>,
    #[description = "Reason"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    let duration_secs = duration.as_deref().map(parse_mute_duration).unwrap_or(0);

    let outcome = ctx
        .data()
        .engine
        .mute(
            guild_id,
            Actor::Moderator(ctx.author().id),
            &user.id.to_string(),
            duration_secs,
            reason.as_deref(),
        )
        .await?;

    let description = if duration_secs > 0 {
        format!(
            "Muted {} for {} for {} (infraction `{}`)",
            mention_user(outcome.subject_id),
            format_duration(duration_secs),
            outcome.reason,
            outcome.infraction_id
        )
    } else {
        format!(
            "Muted {} for {} (infraction `{}`)",
            mention_user(outcome.subject_id),
            outcome.reason,
            outcome.infraction_id
        )
    };

    let embed = embeds::success_embed().title("User Muted").description(description);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Unmute a user
#[poise::command(slash_command, guild_only, required_permissions = "MODERATE_MEMBERS")]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "User to unmute"] user: User,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    let user_id = ctx
        .data()
        .engine
        .unmute(guild_id, &user.id.to_string())
        .await?;

    let embed = embeds::success_embed()
        .title("User Unmuted")
        .description(format!("Unmuted {}", mention_user(user_id)));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}
