// src/handlers/production.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        validation::validate_quantity,
    },
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::inventory::MovementOrigin,
    services::production_service::{ProductionPlan, ProductionResult},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunProductionPayload {
    #[validate(length(min = 1, message = "O código do produto é obrigatório."))]
    #[schema(example = "PROD-A")]
    pub output_code: String,

    #[validate(custom(function = "validate_quantity"))]
    #[schema(value_type = f64, example = 10.0)]
    pub quantity: Decimal,

    // Rótulo exibido no histórico; não identifica a execução
    #[validate(length(min = 1, max = 120, message = "Informe a referência da produção."))]
    #[serde(rename = "ref")]
    #[schema(example = "OP 2026-10-19 turno A")]
    pub reference: String,

    // PRODUCAO_MANUAL ou PRODUCAO_INTERNA; padrão das configurações se ausente
    pub origin: Option<MovementOrigin>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewProductionPayload {
    #[validate(length(min = 1, message = "O código do produto é obrigatório."))]
    pub output_code: String,

    #[validate(custom(function = "validate_quantity"))]
    #[schema(value_type = f64, example = 10.0)]
    pub quantity: Decimal,
}

#[utoipa::path(
    post,
    path = "/api/production/preview",
    tag = "Production",
    request_body = PreviewProductionPayload,
    responses(
        (status = 200, description = "Débitos e avisos que a produção geraria", body = ProductionPlan),
        (status = 404, description = "Ficha técnica não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn preview_production(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<PreviewProductionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let plan = app_state
        .production_service
        .preview_production(&payload.output_code, payload.quantity)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(plan)))
}

#[utoipa::path(
    post,
    path = "/api/production/runs",
    tag = "Production",
    request_body = RunProductionPayload,
    responses(
        (status = 201, description = "Produção gravada numa única transação", body = ProductionResult),
        (status = 404, description = "Ficha técnica ou item não encontrado"),
        (status = 422, description = "Estoque insuficiente (política STRICT)")
    ),
    security(("api_jwt" = []))
)]
pub async fn run_production(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<RunProductionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let result = app_state
        .production_service
        .run_production(
            &user,
            &payload.output_code,
            payload.quantity,
            &payload.reference,
            payload.origin,
        )
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(result)))
}
