//! Core library for palaver: session store, backend clients, configuration
//! and prompts for the streaming chat client.

pub mod api;
pub mod config;
pub mod prompts;
pub mod store;
