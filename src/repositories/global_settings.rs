use sqlx::PgPool;
use time::PrimitiveDateTime;

pub(crate) async fn get(pool: &PgPool, key: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT value FROM global_settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn upsert(
    pool: &PgPool,
    key: &str,
    value: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO global_settings (key, value, updated_at) VALUES ($1,$2,$3)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}
