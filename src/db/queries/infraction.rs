use sqlx::PgPool;

use crate::db::models::Infraction;

/// Insert a new infraction. Surfaces the unique-key violation unchanged so
/// the caller can tell an id collision apart from an unavailable store.
pub async fn insert(pool: &PgPool, rec: &Infraction) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO infractions (id, guild_id, subject_id, actor_id, kind, reason, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&rec.id)
    .bind(rec.guild_id)
    .bind(&rec.subject_id)
    .bind(&rec.actor_id)
    .bind(rec.kind.as_str())
    .bind(&rec.reason)
    .bind(rec.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(
    pool: &PgPool,
    guild_id: i64,
    id: &str,
) -> Result<Option<Infraction>, sqlx::Error> {
    sqlx::query_as::<_, Infraction>(
        "SELECT * FROM infractions WHERE guild_id = $1 AND id = $2",
    )
    .bind(guild_id)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, guild_id: i64, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM infractions WHERE guild_id = $1 AND id = $2")
        .bind(guild_id)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_for_guild(
    pool: &PgPool,
    guild_id: i64,
) -> Result<Vec<Infraction>, sqlx::Error> {
    sqlx::query_as::<_, Infraction>("SELECT * FROM infractions WHERE guild_id = $1")
        .bind(guild_id)
        .fetch_all(pool)
        .await
}
