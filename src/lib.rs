pub mod analytics;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod reports;
pub mod scope;
pub mod server;
pub mod store;
pub mod utils;
