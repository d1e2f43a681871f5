pub mod api;
pub mod auth;
pub mod blob_factory;
pub mod config;
pub mod email_factory;
pub mod error;
pub mod state_factory;
pub mod telemetry;
