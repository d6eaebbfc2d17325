//! CLI command handlers.

pub mod chat;
pub mod config;
pub mod models;
pub mod sessions;
pub mod upload;
