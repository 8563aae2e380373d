// src/services/settings_service.rs

use crate::{
    common::error::AppError,
    db::SettingsRepository,
    models::{
        auth::User,
        settings::{GeneralSettings, UpdateSettingsRequest},
    },
};

#[derive(Clone)]
pub struct SettingsService {
    settings_repo: SettingsRepository,
}

impl SettingsService {
    pub fn new(settings_repo: SettingsRepository) -> Self {
        Self { settings_repo }
    }

    pub async fn get_settings(&self) -> Result<GeneralSettings, AppError> {
        self.settings_repo.get_settings(self.settings_repo.pool()).await
    }

    /// Único ponto de alteração das configurações gerais.
    pub async fn update_settings(
        &self,
        actor: &User,
        input: &UpdateSettingsRequest,
    ) -> Result<GeneralSettings, AppError> {
        let mut tx = self.settings_repo.pool().begin().await?;

        let current = self.settings_repo.get_settings(&mut *tx).await?;
        let merged = current.merged_with(input);

        if !merged.default_production_origin.is_production() {
            return Err(AppError::OriginNotAllowed(format!("{:?}", merged.default_production_origin)));
        }

        let saved = self.settings_repo.save_settings(&mut *tx, &merged).await?;
        tx.commit().await?;

        tracing::info!(
            "⚙️ Configurações alteradas por {}: falta {:?}, janela {} min",
            actor.login,
            saved.shortfall_policy,
            saved.hourly_window_minutes
        );
        Ok(saved)
    }
}
