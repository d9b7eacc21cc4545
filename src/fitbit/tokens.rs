use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl StoredTokens {
    /// Still usable for at least `margin_secs`.
    pub fn is_fresh(&self, now: OffsetDateTime, margin_secs: i64) -> bool {
        self.expires_at > now + time::Duration::seconds(margin_secs)
    }
}

pub async fn find_tokens(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<StoredTokens>> {
    let row = sqlx::query_as::<_, StoredTokens>(
        r#"
        SELECT access_token, refresh_token, expires_at
          FROM fitbit_tokens
         WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn find_credentials(
    db: &PgPool,
    user_id: Uuid,
) -> anyhow::Result<Option<AppCredentials>> {
    let row = sqlx::query_as::<_, AppCredentials>(
        r#"
        SELECT client_id, client_secret
          FROM fitbit_credentials
         WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn upsert_tokens(db: &PgPool, user_id: Uuid, tokens: &StoredTokens) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO fitbit_tokens (user_id, access_token, refresh_token, expires_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id) DO UPDATE
           SET access_token = EXCLUDED.access_token,
               refresh_token = EXCLUDED.refresh_token,
               expires_at = EXCLUDED.expires_at,
               updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(&tokens.access_token)
    .bind(&tokens.refresh_token)
    .bind(tokens.expires_at)
    .execute(db)
    .await?;
    Ok(())
}
