pub mod config;
pub mod logging;

pub mod engine;
pub mod notify;
pub mod orchestrator;
pub mod platform;
pub mod store;
pub mod url_model;
