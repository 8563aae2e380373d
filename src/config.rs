// src/config.rs

use crate::{
    db::{BatchRepository, BomRepository, InventoryRepository, PackRepository, SettingsRepository, UserRepository},
    services::{
        auth::AuthService, batch_service::BatchService, bom_service::BomService,
        inventory_service::InventoryService, pack_service::PackService,
        production_service::ProductionService, settings_service::SettingsService,
        shipment_service::ShipmentService,
    },
};
use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};

// Variáveis de ambiente lidas na partida
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    // Primeiro SUPER_ADMIN, criado só com a tabela de usuários vazia
    pub bootstrap_admin: Option<(String, String)>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS inválido: {raw}"))?,
            Err(_) => 5,
        };
        let bootstrap_admin = match (env::var("BOOTSTRAP_ADMIN_LOGIN"), env::var("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Ok(login), Ok(password)) => Some((login, password)),
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            db_max_connections,
            bootstrap_admin,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub inventory_service: InventoryService,
    pub bom_service: BomService,
    pub batch_service: BatchService,
    pub production_service: ProductionService,
    pub pack_service: PackService,
    pub shipment_service: ShipmentService,
    pub settings_service: SettingsService,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar no banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let inventory_repo = InventoryRepository::new(db_pool.clone());
        let bom_repo = BomRepository::new(db_pool.clone());
        let batch_repo = BatchRepository::new(db_pool.clone());
        let pack_repo = PackRepository::new(db_pool.clone());
        let settings_repo = SettingsRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo, settings.jwt_secret.clone());
        let inventory_service = InventoryService::new(inventory_repo.clone(), pack_repo.clone(), auth_service.clone());
        let bom_service = BomService::new(bom_repo.clone(), inventory_repo.clone());
        let batch_service = BatchService::new(batch_repo.clone(), inventory_repo.clone(), settings_repo.clone());
        let production_service = ProductionService::new(
            bom_repo,
            inventory_repo.clone(),
            batch_repo,
            settings_repo.clone(),
            batch_service.clone(),
        );
        let pack_service = PackService::new(pack_repo.clone(), inventory_repo.clone());
        let shipment_service = ShipmentService::new(inventory_repo, pack_repo);
        let settings_service = SettingsService::new(settings_repo);

        Ok(Self {
            db_pool,
            auth_service,
            inventory_service,
            bom_service,
            batch_service,
            production_service,
            pack_service,
            shipment_service,
            settings_service,
        })
    }
}
