// src/handlers/packs.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        validation::validate_stock_qty,
    },
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{AdminOnly, RequireRole},
    },
    models::pack::PackGroupView,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePackPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,

    #[validate(length(min = 1, message = "O código de barras é obrigatório."))]
    pub barcode: String,

    #[validate(length(min = 1, message = "O pack precisa de ao menos um item."))]
    pub item_codes: Vec<String>,

    #[validate(custom(function = "validate_stock_qty"))]
    #[serde(default)]
    #[schema(value_type = f64, example = 20.0)]
    pub min_pack_qty: Decimal,
}

#[utoipa::path(
    post,
    path = "/api/packs",
    tag = "Packs",
    request_body = CreatePackPayload,
    responses(
        (status = 201, description = "Pack criado", body = PackGroupView),
        (status = 409, description = "Código de barras já em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_pack(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<AdminOnly>,
    Json(payload): Json<CreatePackPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let pack = app_state
        .pack_service
        .create_pack(&user, &payload.name, &payload.barcode, &payload.item_codes, payload.min_pack_qty)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(pack)))
}

#[utoipa::path(
    get,
    path = "/api/packs",
    tag = "Packs",
    responses(
        (status = 200, description = "Packs com estoque somado", body = Vec<PackGroupView>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_packs(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let packs = app_state
        .pack_service
        .list_packs()
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(packs)))
}

#[utoipa::path(
    delete,
    path = "/api/packs/{id}",
    tag = "Packs",
    params(("id" = Uuid, Path, description = "ID do pack")),
    responses(
        (status = 204, description = "Pack excluído"),
        (status = 404, description = "Pack não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_pack(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<AdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .pack_service
        .delete_pack(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(StatusCode::NO_CONTENT)
}
