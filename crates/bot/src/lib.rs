//! Deployment chat-ops bot service
//!
//! HTTP chat transport, configuration loading and component wiring around
//! `bot-lib`.

pub mod api;
pub mod app;
pub mod config;
