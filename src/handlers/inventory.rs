// src/handlers/inventory.rs

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
        validation::{clamp_limit, validate_delta, validate_stock_qty},
    },
    config::AppState,
    db::inventory_repo::ItemDescriptor,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{AdminOnly, RequireRole, SuperAdminOnly},
    },
    models::inventory::{
        GroupedTransaction, ItemDetails, ItemKind, LedgerDrift, MovementOrigin, StockItem,
        StockMovement, StockUnit,
    },
};

// ---
// Payloads
// ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemPayload {
    #[validate(length(min = 1, max = 64, message = "O código é obrigatório."))]
    #[schema(example = "RESINA-01")]
    pub code: String,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,

    pub unit: StockUnit,

    pub substitute_product_code: Option<String>,

    // Campos específicos do tipo ("kind": INSUMO | PROCESSADO | PRODUTO)
    #[serde(flatten)]
    pub details: ItemDetails,

    #[validate(custom(function = "validate_stock_qty"))]
    #[serde(default)]
    #[schema(value_type = f64)]
    pub min_qty: Decimal,

    // Saldo de abertura, lançado como AJUSTE_MANUAL
    #[validate(custom(function = "validate_stock_qty"))]
    #[serde(default)]
    #[schema(value_type = f64)]
    pub initial_qty: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,
    pub unit: StockUnit,
    pub substitute_product_code: Option<String>,
    #[serde(flatten)]
    pub details: ItemDetails,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockPayload {
    // Positivo entra, negativo sai
    #[validate(custom(function = "validate_delta"))]
    #[schema(value_type = f64, example = -2.5)]
    pub delta: Decimal,

    pub origin: MovementOrigin,

    #[validate(length(min = 1, message = "Informe o motivo do ajuste."))]
    pub reason: String,

    // Obrigatória para AJUSTE_MANUAL
    pub admin_password: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditLevelsPayload {
    #[validate(custom(function = "validate_delta"))]
    #[schema(value_type = Option<f64>)]
    pub current_qty: Option<Decimal>,

    #[validate(custom(function = "validate_stock_qty"))]
    #[schema(value_type = Option<f64>)]
    pub min_qty: Option<Decimal>,

    #[validate(length(min = 1, message = "A senha de administrador é obrigatória."))]
    pub admin_password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ItemListQuery {
    pub kind: Option<ItemKind>,
    // Só itens abaixo do estoque mínimo
    pub below_minimum: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

// ---
// Cadastro
// ---

#[utoipa::path(
    post,
    path = "/api/inventory/items",
    tag = "Inventory",
    request_body = CreateItemPayload,
    responses(
        (status = 201, description = "Item criado", body = StockItem),
        (status = 409, description = "Código ou código de barras já em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_item(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<AdminOnly>,
    Json(payload): Json<CreateItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let descriptor = ItemDescriptor {
        name: &payload.name,
        unit: payload.unit,
        substitute_product_code: payload.substitute_product_code.as_deref(),
        details: &payload.details,
    };

    let item = app_state
        .inventory_service
        .create_item(&user, &payload.code, &descriptor, payload.min_qty, payload.initial_qty)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/api/inventory/items",
    tag = "Inventory",
    params(ItemListQuery),
    responses(
        (status = 200, description = "Itens de estoque", body = Vec<StockItem>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_items(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<ItemListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let items = app_state
        .inventory_service
        .list_items(query.kind, query.below_minimum.unwrap_or(false))
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(items)))
}

#[utoipa::path(
    get,
    path = "/api/inventory/items/{code}",
    tag = "Inventory",
    params(("code" = String, Path, description = "Código do item")),
    responses(
        (status = 200, description = "Item de estoque", body = StockItem),
        (status = 404, description = "Item não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_item(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let item = app_state
        .inventory_service
        .get_item(&code)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(item)))
}

#[utoipa::path(
    put,
    path = "/api/inventory/items/{code}",
    tag = "Inventory",
    request_body = UpdateItemPayload,
    params(("code" = String, Path, description = "Código do item")),
    responses(
        (status = 200, description = "Item atualizado", body = StockItem),
        (status = 400, description = "Tentativa de trocar o tipo do item")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_item(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path(code): Path<String>,
    Json(payload): Json<UpdateItemPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let descriptor = ItemDescriptor {
        name: &payload.name,
        unit: payload.unit,
        substitute_product_code: payload.substitute_product_code.as_deref(),
        details: &payload.details,
    };

    let item = app_state
        .inventory_service
        .update_item(&code, &descriptor)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(item)))
}

#[utoipa::path(
    delete,
    path = "/api/inventory/items/{code}",
    tag = "Inventory",
    params(("code" = String, Path, description = "Código do item")),
    responses(
        (status = 204, description = "Item excluído"),
        (status = 409, description = "Item em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_item(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<AdminOnly>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .inventory_service
        .delete_item(&user, &code)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(StatusCode::NO_CONTENT)
}

// ---
// Livro-razão
// ---

#[utoipa::path(
    post,
    path = "/api/inventory/items/{code}/adjust",
    tag = "Inventory",
    request_body = AdjustStockPayload,
    params(("code" = String, Path, description = "Código do item")),
    responses(
        (status = 201, description = "Movimentação lançada", body = StockMovement),
        (status = 403, description = "AJUSTE_MANUAL sem permissão ou senha incorreta")
    ),
    security(("api_jwt" = []))
)]
pub async fn adjust_stock(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(code): Path<String>,
    Json(payload): Json<AdjustStockPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let movement = app_state
        .inventory_service
        .adjust_stock(
            &user,
            &code,
            payload.delta,
            payload.origin,
            &payload.reason,
            payload.admin_password.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(movement)))
}

#[utoipa::path(
    put,
    path = "/api/inventory/items/{code}/levels",
    tag = "Inventory",
    request_body = EditLevelsPayload,
    params(("code" = String, Path, description = "Código do item")),
    responses(
        (status = 200, description = "Saldo e mínimo atualizados", body = StockItem),
        (status = 403, description = "Senha de administrador incorreta")
    ),
    security(("api_jwt" = []))
)]
pub async fn edit_levels(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<AdminOnly>,
    Path(code): Path<String>,
    Json(payload): Json<EditLevelsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let item = app_state
        .inventory_service
        .admin_edit_levels(&user, &code, payload.current_qty, payload.min_qty, &payload.admin_password)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(item)))
}

#[utoipa::path(
    get,
    path = "/api/inventory/items/{code}/movements",
    tag = "Inventory",
    params(
        ("code" = String, Path, description = "Código do item"),
        LimitQuery
    ),
    responses(
        (status = 200, description = "Movimentações do item, mais recentes primeiro", body = Vec<StockMovement>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_movements(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(code): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let movements = app_state
        .inventory_service
        .list_movements(&code, clamp_limit(query.limit))
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(movements)))
}

#[utoipa::path(
    get,
    path = "/api/inventory/transactions",
    tag = "Inventory",
    params(LimitQuery),
    responses(
        (status = 200, description = "Produções e expedições agrupadas", body = Vec<GroupedTransaction>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_transactions(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let transactions = app_state
        .inventory_service
        .list_transactions(clamp_limit(query.limit))
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(transactions)))
}

#[utoipa::path(
    delete,
    path = "/api/inventory/movements/{id}",
    tag = "Inventory",
    params(("id" = Uuid, Path, description = "ID da movimentação")),
    responses(
        (status = 200, description = "Movimentação excluída e saldo revertido", body = StockMovement),
        (status = 404, description = "Movimentação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_movement(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<SuperAdminOnly>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let movement = app_state
        .inventory_service
        .delete_movement(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(movement)))
}

#[utoipa::path(
    post,
    path = "/api/inventory/reconcile",
    tag = "Inventory",
    responses(
        (status = 200, description = "Itens que estavam divergentes do livro-razão", body = Vec<LedgerDrift>)
    ),
    security(("api_jwt" = []))
)]
pub async fn reconcile(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let drift = app_state
        .inventory_service
        .reconcile(&user)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(drift)))
}
