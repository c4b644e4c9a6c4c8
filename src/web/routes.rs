use super::state::SharedState;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;

const INDEX_HTML: &str = include_str!("index.html");
const NO_STORE: [(header::HeaderName, &str); 1] = [(header::CACHE_CONTROL, "no-store")];

/// GET /: the embedded observer page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /api/state: latest snapshot, or 503 while the last tick failed.
pub async fn get_state(State(state): State<SharedState>) -> Response {
    let state = state.read().await;
    match &state.error {
        Some(error) => (
            StatusCode::SERVICE_UNAVAILABLE,
            NO_STORE,
            Json(serde_json::json!({
                "ok": false,
                "error": error,
                "updated_at": state.snapshot.updated_at,
            })),
        )
            .into_response(),
        None => (NO_STORE, Json(&state.snapshot)).into_response(),
    }
}

/// GET /api/health: liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": "kd-observer",
        "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub after: u64,
}

/// GET /api/notifications?after=<seq>: lifecycle feed newer than `after`.
///
/// `boot` changes on restart; a client holding a cursor from another boot
/// should start over from 0.
pub async fn notifications(
    State(state): State<SharedState>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let state = state.read().await;
    (
        NO_STORE,
        Json(serde_json::json!({
            "boot": state.feed.boot(),
            "latest": state.feed.latest(),
            "notifications": state.feed.after(query.after),
        })),
    )
        .into_response()
}
