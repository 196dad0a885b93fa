use sqlx::PgPool;

use crate::db::models::MuteRecord;

/// Insert or replace the mute state for an infraction.
pub async fn upsert(pool: &PgPool, rec: &MuteRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO mute_records (infraction_id, guild_id, subject_id, expires_at, active)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (infraction_id)
        DO UPDATE SET subject_id = $3, expires_at = $4, active = $5
        "#,
    )
    .bind(&rec.infraction_id)
    .bind(rec.guild_id)
    .bind(&rec.subject_id)
    .bind(rec.expires_at)
    .bind(rec.active)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_active_for_subject(
    pool: &PgPool,
    guild_id: i64,
    subject_id: &str,
) -> Result<Option<MuteRecord>, sqlx::Error> {
    sqlx::query_as::<_, MuteRecord>(
        r#"
        SELECT * FROM mute_records
        WHERE guild_id = $1 AND subject_id = $2 AND active
        ORDER BY expires_at DESC
        LIMIT 1
        "#,
    )
    .bind(guild_id)
    .bind(subject_id)
    .fetch_optional(pool)
    .await
}

/// Flip `active` to false for one mute. Returns whether this call performed
/// the transition; the flag acts as the single-writer gate between a
/// scheduled fire and an explicit early unmute.
pub async fn deactivate(pool: &PgPool, infraction_id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE mute_records SET active = FALSE WHERE infraction_id = $1 AND active",
    )
    .bind(infraction_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Deactivate every active mute for a subject, returning the affected
/// infraction ids so pending timers can be discarded.
pub async fn deactivate_for_subject(
    pool: &PgPool,
    guild_id: i64,
    subject_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        UPDATE mute_records SET active = FALSE
        WHERE guild_id = $1 AND subject_id = $2 AND active
        RETURNING infraction_id
        "#,
    )
    .bind(guild_id)
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// All active mutes across all guilds, used to rebuild timers at startup.
pub async fn list_active(pool: &PgPool) -> Result<Vec<MuteRecord>, sqlx::Error> {
    sqlx::query_as::<_, MuteRecord>("SELECT * FROM mute_records WHERE active")
        .fetch_all(pool)
        .await
}
