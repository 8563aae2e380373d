// src/handlers/boms.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
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
    models::bom::{Bom, BomLine, BomSummary},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BomLinePayload {
    #[validate(length(min = 1, message = "O código do item é obrigatório."))]
    #[schema(example = "RESINA-01")]
    pub stock_item_code: String,

    #[validate(custom(function = "validate_stock_qty"))]
    #[schema(value_type = f64, example = 0.5)]
    pub qty_per_pack: Decimal,

    #[serde(default)]
    pub from_weighing: bool,

    pub substitute_code: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveBomPayload {
    #[validate(length(min = 1, message = "A ficha técnica precisa de ao menos uma linha."), nested)]
    pub lines: Vec<BomLinePayload>,
}

impl SaveBomPayload {
    // A posição segue a ordem enviada
    fn into_lines(self) -> Vec<BomLine> {
        self.lines
            .into_iter()
            .enumerate()
            .map(|(position, line)| BomLine {
                stock_item_code: line.stock_item_code,
                qty_per_pack: line.qty_per_pack,
                from_weighing: line.from_weighing,
                substitute_code: line.substitute_code.filter(|s| !s.is_empty()),
                position: i32::try_from(position).unwrap_or(i32::MAX),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetPrimaryPayload {
    // `null` desmarca todas as linhas
    pub stock_item_code: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/boms",
    tag = "BOM",
    responses(
        (status = 200, description = "Fichas técnicas cadastradas", body = Vec<BomSummary>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_boms(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let boms = app_state
        .bom_service
        .list_boms()
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(boms)))
}

#[utoipa::path(
    get,
    path = "/api/boms/{product_code}",
    tag = "BOM",
    params(("product_code" = String, Path, description = "Código do produto")),
    responses(
        (status = 200, description = "Ficha técnica", body = Bom),
        (status = 404, description = "Ficha técnica não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_bom(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(product_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bom = app_state
        .bom_service
        .get_bom(&product_code)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(bom)))
}

#[utoipa::path(
    put,
    path = "/api/boms/{product_code}",
    tag = "BOM",
    request_body = SaveBomPayload,
    params(("product_code" = String, Path, description = "Código do produto")),
    responses(
        (status = 200, description = "Ficha técnica substituída", body = Bom),
        (status = 400, description = "Ficha técnica inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn save_bom(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<AdminOnly>,
    Path(product_code): Path<String>,
    Json(payload): Json<SaveBomPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale))?;

    let bom = app_state
        .bom_service
        .save_bom(&user, &product_code, payload.into_lines())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(bom)))
}

#[utoipa::path(
    put,
    path = "/api/boms/{product_code}/primary",
    tag = "BOM",
    request_body = SetPrimaryPayload,
    params(("product_code" = String, Path, description = "Código do produto")),
    responses(
        (status = 200, description = "Linha primária atualizada", body = Bom),
        (status = 404, description = "Ficha ou linha não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_primary_line(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<AdminOnly>,
    Path(product_code): Path<String>,
    Json(payload): Json<SetPrimaryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let bom = app_state
        .bom_service
        .set_primary_line(&product_code, payload.stock_item_code.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok((StatusCode::OK, Json(bom)))
}

#[utoipa::path(
    delete,
    path = "/api/boms/{product_code}",
    tag = "BOM",
    params(("product_code" = String, Path, description = "Código do produto")),
    responses(
        (status = 204, description = "Ficha técnica excluída"),
        (status = 404, description = "Ficha técnica não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_bom(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    _guard: RequireRole<AdminOnly>,
    Path(product_code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .bom_service
        .delete_bom(&user, &product_code)
        .await
        .map_err(|e| e.to_api_error(&locale))?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn lines_keep_the_submitted_order() {
        let payload: SaveBomPayload = serde_json::from_value(serde_json::json!({
            "lines": [
                { "stockItemCode": "X", "qtyPerPack": 0.5, "fromWeighing": true, "substituteCode": "" },
                { "stockItemCode": "Y", "qtyPerPack": 2 }
            ]
        }))
        .unwrap();

        let lines = payload.into_lines();
        assert_eq!(lines[0].position, 0);
        assert_eq!(lines[0].qty_per_pack, dec!(0.5));
        assert!(lines[0].from_weighing);
        assert_eq!(lines[0].substitute_code, None);
        assert_eq!(lines[1].position, 1);
        assert!(!lines[1].from_weighing);
    }

    #[test]
    fn negative_quantity_fails_validation() {
        let payload = SaveBomPayload {
            lines: vec![BomLinePayload {
                stock_item_code: "X".into(),
                qty_per_pack: dec!(-1),
                from_weighing: false,
                substitute_code: None,
            }],
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn empty_line_list_fails_validation() {
        let payload = SaveBomPayload { lines: Vec::new() };
        assert!(payload.validate().is_err());
    }
}
