//! Axum router construction.
//!
//! [`build`] assembles the management API: the health route plus the
//! `/api` reservation and activity-log routes, wrapped in the CORS and
//! trace-id middleware.

mod health;
mod logs;
mod reservations;

use std::sync::Arc;

use axum::{middleware, Router};
use tower::ServiceBuilder;

use crate::middleware::{cors, trace};
use crate::state::AppState;

pub fn build(state: Arc<AppState>) -> Router {
    let api = Router::new().merge(reservations::router()).merge(logs::router());

    Router::new()
        .merge(health::router())
        .nest("/api", api)
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
