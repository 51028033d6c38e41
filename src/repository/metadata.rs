//! Key/value metadata, used by the health check to prove the store accepts writes

use sqlx::{Pool, Sqlite};

use crate::error::AppResult;

#[derive(Clone)]
pub struct MetadataRepository {
    pool: Pool<Sqlite>,
}

impl MetadataRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Upsert a key and read it back
    pub async fn touch(&self, key: &str, value: &str) -> AppResult<Option<String>> {
        sqlx::query(
            "INSERT INTO metadata (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        let stored: Option<String> = sqlx::query_scalar("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::Repository;

    #[tokio::test]
    async fn touch_overwrites_previous_value() {
        let repo = Repository::in_memory().await.unwrap();
        assert_eq!(repo.metadata.touch("healthcheck", "a").await.unwrap().as_deref(), Some("a"));
        assert_eq!(repo.metadata.touch("healthcheck", "b").await.unwrap().as_deref(), Some("b"));
    }
}
