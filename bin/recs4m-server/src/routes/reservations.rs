//! Reservation management endpoints.
//!
//! Reservations are edited here and picked up by the scheduler on its next
//! scan; nothing in this module talks to the scheduler directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use recs4m_core::reservation::{
    duration_from_minutes, format_minute, parse_start_time, weekday_name,
};
use recs4m_core::{next_occurrence, Reservation, ReservationStore};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ServerError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", get(list_reservations).post(create_reservation))
        .route("/reservations/{id}", put(update_reservation).delete(delete_reservation))
}

#[derive(Debug, Deserialize)]
pub struct ReservationRequest {
    pub title: String,
    /// 0–6, Sunday = 0.
    pub day_of_week: u8,
    /// `"HH:MM"`.
    pub start_time: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub recurring: bool,
}

/// Validated request fields: `(day_of_week, start_minute, duration_secs)`.
fn validate(req: &ReservationRequest) -> Result<(u8, u32, u64), ServerError> {
    let start_minute = parse_start_time(&req.start_time)
        .ok_or_else(|| ServerError::BadRequest(format!("invalid start_time '{}'", req.start_time)))?;
    if req.day_of_week > 6 {
        return Err(ServerError::BadRequest(format!(
            "day_of_week must be 0-6, got {}",
            req.day_of_week
        )));
    }
    if req.duration_minutes == 0 {
        return Err(ServerError::BadRequest("duration_minutes must be positive".into()));
    }
    Ok((req.day_of_week, start_minute, duration_from_minutes(req.duration_minutes)))
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    pub id: String,
    pub title: String,
    pub day_of_week: u8,
    pub weekday: &'static str,
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: u64,
    pub recurring: bool,
    pub next_occurrence: String,
}

fn to_response(r: Reservation, state: &AppState) -> ReservationResponse {
    let next = next_occurrence(&r, state.clock.now());
    ReservationResponse {
        weekday: weekday_name(r.day_of_week),
        start_time: format_minute(u64::from(r.start_minute)),
        end_time: format_minute(r.end_minute()),
        duration_minutes: r.duration_secs.div_ceil(60),
        next_occurrence: next.to_rfc3339(),
        id: r.id,
        title: r.title,
        day_of_week: r.day_of_week,
        recurring: r.recurring,
    }
}

pub async fn list_reservations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReservationResponse>>, ServerError> {
    let reservations = state.store.list_reservations().await?;
    Ok(Json(reservations.into_iter().map(|r| to_response(r, &state)).collect()))
}

pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse>), ServerError> {
    let (day_of_week, start_minute, duration_secs) = validate(&req)?;
    let reservation = Reservation::new(
        req.title,
        day_of_week,
        start_minute,
        duration_secs,
        req.recurring,
        state.clock.now(),
    );
    state.store.put_reservation(reservation.clone()).await?;
    info!(reservation_id = %reservation.id, title = %reservation.title, "reservation created");
    Ok((StatusCode::CREATED, Json(to_response(reservation, &state))))
}

pub async fn update_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ReservationRequest>,
) -> Result<Json<ReservationResponse>, ServerError> {
    let (day_of_week, start_minute, duration_secs) = validate(&req)?;
    let existing = state
        .store
        .get_reservation(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("reservation {id} not found")))?;

    let updated = Reservation {
        title: req.title,
        day_of_week,
        start_minute,
        duration_secs,
        recurring: req.recurring,
        ..existing
    };
    state.store.put_reservation(updated.clone()).await?;
    info!(reservation_id = %updated.id, "reservation updated");
    Ok(Json(to_response(updated, &state)))
}

pub async fn delete_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.store.delete_reservation(&id).await?;
    info!(reservation_id = %id, "reservation deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::routes::test_support::{body_json, empty_request, json_request, send, state};
    use serde_json::json;

    fn monday_ten(recurring: bool) -> serde_json::Value {
        json!({
            "title": "Morning Show",
            "day_of_week": 1,
            "start_time": "10:00",
            "duration_minutes": 30,
            "recurring": recurring,
        })
    }

    #[tokio::test]
    async fn create_then_list() {
        let state = state().await;

        let resp = send(&state, json_request("POST", "/api/reservations", monday_ten(true))).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        let id = created["id"].as_str().unwrap().to_owned();
        assert!(id.starts_with("2024-05-06T09:00:00+09:00"), "{id}");

        let stored = state.store.get_reservation(&id).await.unwrap().unwrap();
        assert_eq!(stored.start_minute, 600);
        assert_eq!(stored.duration_secs, 1800);
        assert!(stored.recurring);

        let list = body_json(send(&state, empty_request("GET", "/api/reservations")).await).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["weekday"], "Monday");
        assert_eq!(list[0]["start_time"], "10:00");
        assert_eq!(list[0]["end_time"], "10:30");
        assert_eq!(list[0]["next_occurrence"], "2024-05-06T10:00:00+09:00");
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected() {
        let state = state().await;
        let mut bad_time = monday_ten(false);
        bad_time["start_time"] = json!("25:00");
        let mut bad_day = monday_ten(false);
        bad_day["day_of_week"] = json!(7);
        let mut zero = monday_ten(false);
        zero["duration_minutes"] = json!(0);

        for body in [bad_time, bad_day, zero] {
            let resp = send(&state, json_request("POST", "/api/reservations", body)).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert!(body_json(resp).await["error"].is_string());
        }
        assert!(state.store.list_reservations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_keeps_the_id() {
        let state = state().await;
        let created = body_json(send(&state, json_request("POST", "/api/reservations", monday_ten(true))).await).await;
        let id = created["id"].as_str().unwrap().to_owned();

        let mut body = monday_ten(false);
        body["title"] = json!("Evening Show");
        body["start_time"] = json!("18:30");
        let resp = send(&state, json_request("PUT", &format!("/api/reservations/{id}"), body)).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let all = state.store.list_reservations().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].title, "Evening Show");
        assert_eq!(all[0].start_minute, 18 * 60 + 30);
        assert!(!all[0].recurring);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let state = state().await;
        let resp = send(&state, json_request("PUT", "/api/reservations/missing", monday_ten(true))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let state = state().await;
        let created = body_json(send(&state, json_request("POST", "/api/reservations", monday_ten(true))).await).await;
        let uri = format!("/api/reservations/{}", created["id"].as_str().unwrap());

        for _ in 0..2 {
            let resp = send(&state, empty_request("DELETE", &uri)).await;
            assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        }
        assert!(state.store.list_reservations().await.unwrap().is_empty());
    }
}
