use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use log::*;
use serde_json::Value;

use crate::{AppState, Error};

/// POST broadcast a message to every connected SSE subscriber.
///
/// JSON bodies (`Content-Type: application/json`) are re-serialized in compact form;
/// any other body is broadcast verbatim and must be valid UTF-8.
pub async fn publish(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Error> {
    if is_json(&headers) {
        let value: Value = serde_json::from_slice(&body)?;
        debug!("POST broadcast JSON message ({} bytes)", body.len());
        app_state.hub().send_json(&value).await?;
    } else {
        let Ok(text) = std::str::from_utf8(&body) else {
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE ENTITY").into_response());
        };
        debug!("POST broadcast text message ({} bytes)", body.len());
        app_state.hub().send_string(text).await?;
    }

    Ok(StatusCode::ACCEPTED.into_response())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn detects_json_content_type_with_parameters() {
        assert!(is_json(&content_type("application/json")));
        assert!(is_json(&content_type("Application/JSON; charset=utf-8")));
    }

    #[test]
    fn other_content_types_are_text() {
        assert!(!is_json(&content_type("text/plain")));
        assert!(!is_json(&HeaderMap::new()));
    }
}
