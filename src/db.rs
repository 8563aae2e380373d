pub mod user_repo;
pub use user_repo::UserRepository;
pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
pub mod bom_repo;
pub use bom_repo::BomRepository;
pub mod batch_repo;
pub use batch_repo::BatchRepository;
pub mod pack_repo;
pub use pack_repo::PackRepository;
pub mod settings_repo;
pub use settings_repo::SettingsRepository;
