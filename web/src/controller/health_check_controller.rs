use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::controller::ApiResponse;
use crate::{AppState, Error};

#[derive(Debug, Serialize)]
pub struct Health {
    status: &'static str,
    subscribers: usize,
}

/// GET the service health along with the number of connected SSE subscribers.
/// Answers 503 when the hub has stopped.
pub async fn health_check(State(app_state): State<AppState>) -> Result<impl IntoResponse, Error> {
    let subscribers = app_state.hub().subscriber_count().await?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::new(
            StatusCode::OK.into(),
            Health {
                status: "healthy",
                subscribers,
            },
        )),
    ))
}
