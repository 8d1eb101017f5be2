//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use reading_companion_core::workflow::SessionWorkflow;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub workflow: SessionWorkflow,
    pub config: Arc<Config>,
}
