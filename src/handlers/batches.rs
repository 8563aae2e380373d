// src/handlers/batches.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        validation::{clamp_limit, validate_quantity},
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, SuperAdminOnly},
    },
    models::batch::{BatchKind, BatchView, PoolBalance, RecordBatchOutcome, WeighingType},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordBatchPayload {
    #[validate(length(min = 1, message = "O código do item é obrigatório."))]
    #[schema(example = "MASSA-01")]
    pub item_code: String,

    #[validate(custom(function = "validate_quantity"))]
    #[schema(value_type = f64, example = 25.0)]
    pub initial_qty: Decimal,

    pub kind: BatchKind,

    #[serde(default = "default_weighing_type")]
    pub weighing_type: WeighingType,

    pub notes: Option<String>,
}

fn default_weighing_type() -> WeighingType {
    WeighingType::Daily
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct BatchListQuery {
    pub item_code: Option<String>,
    // Inclui lotes já consumidos
    pub include_depleted: Option<bool>,
    pub limit: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/api/batches",
    tag = "Batches",
    request_body = RecordBatchPayload,
    responses(
        (status = 201, description = "Pesagem/moagem registrada", body = RecordBatchOutcome),
        (status = 400, description = "Item não pode ser pesado")
    ),
    security(("api_jwt" = []))
)]
pub async fn record_batch(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<RecordBatchPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let outcome = app_state
        .batch_service
        .record_batch(
            &user,
            &payload.item_code,
            payload.initial_qty,
            payload.kind,
            payload.weighing_type,
            payload.notes.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

#[utoipa::path(
    get,
    path = "/api/batches",
    tag = "Batches",
    params(BatchListQuery),
    responses(
        (status = 200, description = "Lotes, mais recentes primeiro", body = Vec<BatchView>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_batches(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<BatchListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let batches = app_state
        .batch_service
        .list_batches(
            query.item_code.as_deref(),
            query.include_depleted.unwrap_or(false),
            clamp_limit(query.limit),
        )
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(batches)))
}

#[utoipa::path(
    get,
    path = "/api/batches/pool/{item_code}",
    tag = "Batches",
    params(("item_code" = String, Path, description = "Código do item")),
    responses(
        (status = 200, description = "Saldo disponível no pool do item", body = PoolBalance),
        (status = 404, description = "Item não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn pool_balance(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(item_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let balance = app_state
        .batch_service
        .pool_balance(&item_code)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(balance)))
}

#[utoipa::path(
    delete,
    path = "/api/batches/{id}",
    tag = "Batches",
    params(("id" = Uuid, Path, description = "ID do lote")),
    responses(
        (status = 200, description = "Lote excluído (o estoque não é revertido)", body = BatchView),
        (status = 404, description = "Lote não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_batch(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<SuperAdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = app_state
        .batch_service
        .delete_batch(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(batch)))
}
