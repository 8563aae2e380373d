pub mod auth;
pub mod batch;
pub mod bom;
pub mod inventory;
pub mod pack;
pub mod settings;
