use poise::serenity_prelude::{Timestamp, User};

use crate::bot::data::Context;
use crate::bot::error::Error;
use crate::constants::embeds;
use crate::constants::moderation::SEARCH_PAGE_BUDGET;
use crate::db::models::{Infraction, InfractionKind};
use crate::services::moderation::search::{self, SearchFilters};
use crate::services::moderation::store::ModerationStore;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum KindChoice {
    Warn,
    Kick,
    Ban,
    Mute,
}

impl From<KindChoice> for InfractionKind {
    fn from(choice: KindChoice) -> Self {
        match choice {
            KindChoice::Warn => InfractionKind::Warn,
            KindChoice::Kick => InfractionKind::Kick,
            KindChoice::Ban => InfractionKind::Ban,
            KindChoice::Mute => InfractionKind::Mute,
        }
    }
}

/// Inspect the infraction history
#[poise::command(
    slash_command,
    subcommands("search", "details", "remove"),
    required_permissions = "MODERATE_MEMBERS",
    guild_only
)]
pub async fn infraction(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Use one of the subcommands: `/infraction search`, `/infraction details`, `/infraction remove`")
        .await?;
    Ok(())
}

/// Search infractions by user or moderator
#[poise::command(slash_command, guild_only)]
pub async fn search(
    ctx: Context<'_>,
    #[description = "Filter by affected user"] user: Option<User>,
    #[description = "Filter by responsible moderator"] moderator: Option<User>,
    #[description = "Filter by infraction type"] kind: Option<KindChoice>,
    #[description = "Page number"] page: Option<u32>,
    #[description = "Hide automated infractions"] exclude_automod: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    if user.is_none() && moderator.is_none() {
        let embed = embeds::error_embed()
            .title("Missing Filter")
            .description("Please specify a user or moderator to search for.");
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true))
            .await?;
        return Ok(());
    }

    let filters = SearchFilters {
        subject_id: user.map(|u| u.id.to_string()),
        actor_id: moderator.map(|m| m.id.to_string()),
        kind: kind.map(InfractionKind::from),
        exclude_actor: exclude_automod
            .unwrap_or(false)
            .then(|| ctx.framework().bot_id.to_string()),
    };

    let infractions = ctx
        .data()
        .store
        .list_infractions(guild_id.get() as i64)
        .await?;

    let result = search::search(
        infractions,
        &filters,
        page.unwrap_or(1) as usize,
        SEARCH_PAGE_BUDGET,
    );

    if result.total_matches == 0 {
        ctx.say("No infractions found").await?;
        return Ok(());
    }

    ctx.say(format!(
        "Page {} of {} ({} infractions)\n```css\nID, Type, Reason\n{}```",
        result.page,
        result.total_pages,
        result.total_matches,
        result.lines.join("\n")
    ))
    .await?;

    Ok(())
}

/// Show the details of one infraction
#[poise::command(slash_command, guild_only)]
pub async fn details(
    ctx: Context<'_>,
    #[description = "Infraction ID"] id: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    let rec = ctx
        .data()
        .store
        .get_infraction(guild_id.get() as i64, &id)
        .await?
        .ok_or_else(|| Error::NotFound(id.clone()))?;

    let embed = detail_embed(&rec, embeds::standard_embed().title("Infraction Details"));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Delete an infraction from the record
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Infraction ID"] id: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(Error::custom("Not in a guild"))?;

    let rec = ctx
        .data()
        .store
        .get_infraction(guild_id.get() as i64, &id)
        .await?
        .ok_or_else(|| Error::NotFound(id.clone()))?;

    ctx.data()
        .store
        .delete_infraction(guild_id.get() as i64, &id)
        .await?;

    let embed = detail_embed(&rec, embeds::removal_embed().title("Infraction Deleted"));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;

    Ok(())
}

fn detail_embed(
    rec: &Infraction,
    base: poise::serenity_prelude::CreateEmbed,
) -> poise::serenity_prelude::CreateEmbed {
    let mut embed = base
        .description(format!("Infraction for <@{}>:", rec.subject_id))
        .field("Infraction ID", rec.id.clone(), true)
        .field("Moderator", format!("<@{}>", rec.actor_id), true)
        .field("Type", rec.kind.to_string(), true)
        .field("Reason", rec.reason.clone(), false);

    if let Ok(ts) = Timestamp::from_unix_timestamp(rec.created_at) {
        embed = embed.timestamp(ts);
    }

    embed
}
