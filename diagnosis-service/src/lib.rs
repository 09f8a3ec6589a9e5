pub mod catalog;
pub mod config;
pub mod models;
pub mod service;

pub use catalog::{CatalogEntry, CatalogLookup, DiseaseCatalog};
pub use config::ServiceConfig;
pub use service::{AppState, build_router, create_app_state};
