//! Activity log listing.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use recs4m_core::{ActivityLog, LogEntry};
use serde::Serialize;

use crate::error::ServerError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/logs", get(list_logs))
}

#[derive(Serialize)]
pub struct LogResponse {
    pub logged_at: String,
    pub message: String,
}

impl From<LogEntry> for LogResponse {
    fn from(e: LogEntry) -> Self {
        Self { logged_at: e.logged_at.to_rfc3339(), message: e.message }
    }
}

/// Every entry, newest first.
pub async fn list_logs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<LogResponse>>, ServerError> {
    let entries = state.store.list_logs().await?;
    Ok(Json(entries.into_iter().map(LogResponse::from).collect()))
}
