pub mod auth;
pub mod batches;
pub mod boms;
pub mod inventory;
pub mod packs;
pub mod production;
pub mod settings;
pub mod shipments;
