use poise::serenity_prelude::{Channel, Role};

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::moderation::{INFRACTION_LOG_PROPERTY, MUTE_ROLE_PROPERTY};
use crate::db::queries::guild_config;
use crate::services::moderation::store::StoreError;

/// Setup commands for configuring the bot
#[poise::command(
    slash_command,
    subcommands("mute_role", "infraction_log"),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn setup(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Use one of the subcommands: `/setup mute-role`, `/setup infraction-log`")
        .await?;
    Ok(())
}

/// Set the role applied to muted members
#[poise::command(slash_command, rename = "mute-role", guild_only)]
pub async fn mute_role(
    ctx: Context<'_>,
    #[description = "Role applied to muted members"] role: Role,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    guild_config::set(
        &ctx.data().pool,
        guild_id.get() as i64,
        MUTE_ROLE_PROPERTY,
        &role.id.get().to_string(),
    )
    .await
    .map_err(StoreError::from)?;

    let embed = embeds::success_embed()
        .title("Mute Role Set")
        .description(format!("Muted members will now receive <@&{}>", role.id));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}

/// Set the channel infractions are logged to
#[poise::command(slash_command, rename = "infraction-log", guild_only)]
pub async fn infraction_log(
    ctx: Context<'_>,
    #[description = "Channel to log infractions to"]
    #[channel_types("Text")]
    channel: Channel,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    guild_config::set(
        &ctx.data().pool,
        guild_id.get() as i64,
        INFRACTION_LOG_PROPERTY,
        &channel.id().get().to_string(),
    )
    .await
    .map_err(StoreError::from)?;

    let embed = embeds::success_embed()
        .title("Infraction Log Set")
        .description(format!("Infractions will now be logged to <#{}>", channel.id()));

    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
        .await?;

    Ok(())
}
