use sqlx::PgPool;

pub async fn get(
    pool: &PgPool,
    guild_id: i64,
    property: &str,
) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT value FROM guild_configs WHERE guild_id = $1 AND property = $2",
    )
    .bind(guild_id)
    .bind(property)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(value,)| value))
}

pub async fn set(
    pool: &PgPool,
    guild_id: i64,
    property: &str,
    value: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO guild_configs (guild_id, property, value)
        VALUES ($1, $2, $3)
        ON CONFLICT (guild_id, property)
        DO UPDATE SET value = $3, updated_at = NOW()
        "#,
    )
    .bind(guild_id)
    .bind(property)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}
