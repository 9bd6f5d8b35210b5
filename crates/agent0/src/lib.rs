//! Agent0 Chat Client Library
//!
//! Core components for the Agent0 terminal chat client: identity-provider
//! access, chat persistence, the session controller, and the agent
//! endpoint client.

pub mod agent;
pub mod auth;
pub mod chat;
pub mod config;
pub mod render;
pub mod repl;
pub mod store;
