// src/handlers/shipments.rs

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
    services::shipment_service::ShipmentResult,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanShipmentPayload {
    #[validate(length(min = 1, message = "O código de barras é obrigatório."))]
    #[schema(example = "7891234567895")]
    pub barcode: String,

    #[validate(custom(function = "validate_quantity"))]
    #[serde(default = "one")]
    #[schema(value_type = f64, example = 1.0)]
    pub quantity: Decimal,

    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

fn one() -> Decimal {
    Decimal::ONE
}

#[utoipa::path(
    post,
    path = "/api/shipments/scan",
    tag = "Shipments",
    request_body = ScanShipmentPayload,
    responses(
        (status = 201, description = "Expedição lançada como um grupo BIP", body = ShipmentResult),
        (status = 404, description = "Código de barras não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn scan_shipment(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ScanShipmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let result = app_state
        .shipment_service
        .scan_shipment(&user, &payload.barcode, payload.quantity, payload.reference.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::CREATED, Json(result)))
}
