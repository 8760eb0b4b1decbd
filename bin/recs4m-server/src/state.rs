//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use recs4m_core::store::SqliteStore;
use recs4m_core::Clock;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Reservations and the activity log; shared with the scheduler.
    pub store: Arc<SqliteStore>,
    /// Wall clock in the configured offset.
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
