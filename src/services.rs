pub mod auth;
pub mod batch_service;
pub mod bom_service;
pub mod inventory_service;
pub mod pack_service;
pub mod production_service;
pub mod settings_service;
pub mod shipment_service;
