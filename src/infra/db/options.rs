use async_trait::async_trait;
use sqlx::Row;
use time::OffsetDateTime;

use crate::application::repos::{OptionStore, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

#[async_trait]
impl OptionStore for PostgresRepositories {
    async fn read_option(&self, name: &str) -> Result<Option<String>, RepoError> {
        let row = sqlx::query("SELECT value FROM site_options WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(map_sqlx_error)
    }

    async fn write_option(&self, name: &str, value: &str) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO site_options (name, value, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (name)
            DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(name)
        .bind(value)
        .bind(OffsetDateTime::now_utc())
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.ping().await.map_err(map_sqlx_error)
    }
}
