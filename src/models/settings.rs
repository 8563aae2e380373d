// src/models/settings.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::inventory::MovementOrigin;

// O que fazer quando a produção não encontra saldo suficiente
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "shortfall_policy", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShortfallPolicy {
    // Produz mesmo assim e devolve avisos
    Permissive,
    // Aborta sem gravar nada
    Strict,
}

/// Configurações gerais da fábrica.
///
/// Lidas uma vez por operação e tratadas como um retrato imutável; a única
/// forma de alterá-las é pelo `PUT /api/settings`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSettings {
    pub shortfall_policy: ShortfallPolicy,
    #[schema(example = 60)]
    pub hourly_window_minutes: i32,
    pub default_production_origin: MovementOrigin,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            shortfall_policy: ShortfallPolicy::Permissive,
            hourly_window_minutes: 60,
            default_production_origin: MovementOrigin::ProducaoManual,
            updated_at: None,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub shortfall_policy: Option<ShortfallPolicy>,

    #[validate(range(min = 1, max = 1440, message = "A janela deve ficar entre 1 e 1440 minutos."))]
    #[schema(example = 60)]
    pub hourly_window_minutes: Option<i32>,

    pub default_production_origin: Option<MovementOrigin>,
}

impl GeneralSettings {
    /// Aplica uma atualização parcial, devolvendo um novo retrato.
    pub fn merged_with(&self, input: &UpdateSettingsRequest) -> Self {
        Self {
            shortfall_policy: input.shortfall_policy.unwrap_or(self.shortfall_policy),
            hourly_window_minutes: input.hourly_window_minutes.unwrap_or(self.hourly_window_minutes),
            default_production_origin: input
                .default_production_origin
                .unwrap_or(self.default_production_origin),
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_keeps_untouched_fields() {
        let current = GeneralSettings::default();
        let merged = current.merged_with(&UpdateSettingsRequest {
            shortfall_policy: Some(ShortfallPolicy::Strict),
            hourly_window_minutes: None,
            default_production_origin: None,
        });

        assert_eq!(merged.shortfall_policy, ShortfallPolicy::Strict);
        assert_eq!(merged.hourly_window_minutes, 60);
        assert_eq!(merged.default_production_origin, MovementOrigin::ProducaoManual);
    }
}
