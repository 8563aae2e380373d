// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::create_user,
        handlers::auth::list_users,

        // --- Settings ---
        handlers::settings::get_settings,
        handlers::settings::update_settings,

        // --- INVENTORY ---
        handlers::inventory::create_item,
        handlers::inventory::list_items,
        handlers::inventory::get_item,
        handlers::inventory::update_item,
        handlers::inventory::delete_item,
        handlers::inventory::adjust_stock,
        handlers::inventory::edit_levels,
        handlers::inventory::list_movements,
        handlers::inventory::list_transactions,
        handlers::inventory::delete_movement,
        handlers::inventory::reconcile,

        // --- BOM ---
        handlers::boms::list_boms,
        handlers::boms::get_bom,
        handlers::boms::save_bom,
        handlers::boms::set_primary_line,
        handlers::boms::delete_bom,

        // --- PRODUCTION ---
        handlers::production::preview_production,
        handlers::production::run_production,

        // --- BATCHES ---
        handlers::batches::record_batch,
        handlers::batches::list_batches,
        handlers::batches::pool_balance,
        handlers::batches::delete_batch,

        // --- PACKS / EXPEDIÇÃO ---
        handlers::packs::create_pack,
        handlers::packs::list_packs,
        handlers::packs::delete_pack,
        handlers::shipments::scan_shipment,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::LoginUserPayload,
            models::auth::CreateUserPayload,
            models::auth::AuthResponse,

            // --- Settings ---
            models::settings::ShortfallPolicy,
            models::settings::GeneralSettings,
            models::settings::UpdateSettingsRequest,

            // --- Inventory ---
            models::inventory::ItemKind,
            models::inventory::StockUnit,
            models::inventory::ExpeditionItem,
            models::inventory::ItemDetails,
            models::inventory::StockItem,
            models::inventory::MovementOrigin,
            models::inventory::StockMovement,
            models::inventory::GroupedTransaction,
            models::inventory::LedgerDrift,

            // --- BOM ---
            models::bom::BomLine,
            models::bom::Bom,
            models::bom::BomSummary,

            // --- Batches ---
            models::batch::BatchKind,
            models::batch::WeighingType,
            models::batch::BatchStatus,
            models::batch::Batch,
            models::batch::BatchView,
            models::batch::RecordBatchOutcome,
            models::batch::PoolBalance,

            // --- Packs ---
            models::pack::StockPackGroup,
            models::pack::PackGroupView,

            // --- Resultados ---
            services::batch_service::PoolDraw,
            services::production_service::ConsumptionSource,
            services::production_service::PlannedConsumption,
            services::production_service::ShortfallWarning,
            services::production_service::ProductionPlan,
            services::production_service::ProductionResult,
            services::shipment_service::ShipmentResult,

            // --- Payloads ---
            handlers::inventory::CreateItemPayload,
            handlers::inventory::UpdateItemPayload,
            handlers::inventory::AdjustStockPayload,
            handlers::inventory::EditLevelsPayload,
            handlers::boms::BomLinePayload,
            handlers::boms::SaveBomPayload,
            handlers::boms::SetPrimaryPayload,
            handlers::production::RunProductionPayload,
            handlers::production::PreviewProductionPayload,
            handlers::batches::RecordBatchPayload,
            handlers::packs::CreatePackPayload,
            handlers::shipments::ScanShipmentPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação"),
        (name = "Users", description = "Usuários e Papéis"),
        (name = "Settings", description = "Configurações Gerais da Fábrica"),
        (name = "Inventory", description = "Itens de Estoque e Livro-razão"),
        (name = "BOM", description = "Fichas Técnicas (Produtos Combinados)"),
        (name = "Production", description = "Ordens de Produção"),
        (name = "Batches", description = "Pesagem e Moagem"),
        (name = "Packs", description = "Packs de Expedição"),
        (name = "Shipments", description = "Expedição por Bipagem")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_production_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/production/runs"));
        assert!(doc.paths.paths.contains_key("/api/batches/pool/{item_code}"));
        assert!(doc.components.is_some_and(|c| c.security_schemes.contains_key("api_jwt")));
    }
}
