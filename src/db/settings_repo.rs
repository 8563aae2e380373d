use sqlx::{Executor, PgPool, Postgres};
use crate::{
    common::error::AppError,
    models::settings::GeneralSettings,
};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Retrato das configurações. Se a linha não existir, usa os padrões.
    pub async fn get_settings<'e, E>(&self, executor: E) -> Result<GeneralSettings, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let settings = sqlx::query_as::<_, GeneralSettings>(
            r#"
            SELECT shortfall_policy, hourly_window_minutes, default_production_origin, updated_at
            FROM general_settings
            WHERE id
            "#,
        )
            .fetch_optional(executor)
            .await?;

        Ok(settings.unwrap_or_default())
    }

    pub async fn save_settings<'e, E>(
        &self,
        executor: E,
        settings: &GeneralSettings,
    ) -> Result<GeneralSettings, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // UPSERT (Insert or Update)
        let saved = sqlx::query_as::<_, GeneralSettings>(
            r#"
            INSERT INTO general_settings (id, shortfall_policy, hourly_window_minutes, default_production_origin)
            VALUES (TRUE, $1, $2, $3)
            ON CONFLICT (id)
            DO UPDATE SET
                shortfall_policy = EXCLUDED.shortfall_policy,
                hourly_window_minutes = EXCLUDED.hourly_window_minutes,
                default_production_origin = EXCLUDED.default_production_origin,
                updated_at = NOW()
            RETURNING shortfall_policy, hourly_window_minutes, default_production_origin, updated_at
            "#,
        )
            .bind(settings.shortfall_policy)
            .bind(settings.hourly_window_minutes)
            .bind(settings.default_production_origin)
            .fetch_one(executor)
            .await?;

        Ok(saved)
    }
}
