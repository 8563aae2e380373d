//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Settings};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível; padrão "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let settings = Settings::from_env()?;
    let app_state = AppState::new(&settings).await?;

    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let Some((login, password)) = &settings.bootstrap_admin {
        if app_state.auth_service.bootstrap_super_admin(login, password).await? {
            tracing::info!("👤 SUPER_ADMIN inicial '{}' criado", login);
        }
    }

    let app = router(app_state);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(app_state: AppState) -> Router {
    let guard = || axum_middleware::from_fn_with_state(app_state.clone(), auth_guard);

    // Rotas públicas
    let auth_routes = Router::new().route("/login", post(handlers::auth::login));

    let user_routes = Router::new()
        .route("/", post(handlers::auth::create_user).get(handlers::auth::list_users))
        .route("/me", get(handlers::auth::get_me))
        .layer(guard());

    let inventory_routes = Router::new()
        .route("/items"
               ,post(handlers::inventory::create_item)
               .get(handlers::inventory::list_items)
        )
        .route("/items/{code}"
               ,get(handlers::inventory::get_item)
               .put(handlers::inventory::update_item)
               .delete(handlers::inventory::delete_item)
        )
        .route("/items/{code}/adjust", post(handlers::inventory::adjust_stock))
        .route("/items/{code}/levels", put(handlers::inventory::edit_levels))
        .route("/items/{code}/movements", get(handlers::inventory::list_movements))
        .route("/transactions", get(handlers::inventory::list_transactions))
        .route("/movements/{id}", delete(handlers::inventory::delete_movement))
        .route("/reconcile", post(handlers::inventory::reconcile))
        .layer(guard());

    let bom_routes = Router::new()
        .route("/", get(handlers::boms::list_boms))
        .route("/{product_code}"
               ,get(handlers::boms::get_bom)
               .put(handlers::boms::save_bom)
               .delete(handlers::boms::delete_bom)
        )
        .route("/{product_code}/primary", put(handlers::boms::set_primary_line))
        .layer(guard());

    let production_routes = Router::new()
        .route("/preview", post(handlers::production::preview_production))
        .route("/runs", post(handlers::production::run_production))
        .layer(guard());

    let batch_routes = Router::new()
        .route("/"
               ,post(handlers::batches::record_batch)
               .get(handlers::batches::list_batches)
        )
        .route("/pool/{item_code}", get(handlers::batches::pool_balance))
        .route("/{id}", delete(handlers::batches::delete_batch))
        .layer(guard());

    let pack_routes = Router::new()
        .route("/"
               ,post(handlers::packs::create_pack)
               .get(handlers::packs::list_packs)
        )
        .route("/{id}", delete(handlers::packs::delete_pack))
        .layer(guard());

    let shipment_routes = Router::new()
        .route("/scan", post(handlers::shipments::scan_shipment))
        .layer(guard());

    let settings_routes = Router::new()
        .route("/"
               ,get(handlers::settings::get_settings)
               .put(handlers::settings::update_settings)
        )
        .layer(guard());

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/inventory", inventory_routes)
        .nest("/api/boms", bom_routes)
        .nest("/api/production", production_routes)
        .nest("/api/batches", batch_routes)
        .nest("/api/packs", pack_routes)
        .nest("/api/shipments", shipment_routes)
        .nest("/api/settings", settings_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}
