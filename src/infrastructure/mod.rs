//! Concrete adapters implementing `domain::ports` traits, plus the
//! ambient stack (config loading, logging, credentials, persistence).

pub mod config;
pub mod credentials;
pub mod forge;
pub mod llm;
pub mod logging;
pub mod persistence;
