use super::transport::{ChannelTransport, Head};
use ::sse::session;
use async_stream::stream;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{StatusCode, Version};
use axum::response::{IntoResponse, Response};
use log::*;
use service::AppState;
use std::convert::Infallible;
use tokio::sync::{mpsc, oneshot};

/// Frames that may wait in the body channel while hyper writes to a slow socket.
const BODY_BUFFER: usize = 8;

/// SSE handler that subscribes the caller to every broadcast until it disconnects.
pub(crate) async fn sse_handler(State(app_state): State<AppState>, version: Version) -> Response {
    debug!("Establishing SSE connection ({version:?})");

    let (head_tx, head_rx) = oneshot::channel();
    let (body_tx, mut body_rx) = mpsc::channel::<Bytes>(BODY_BUFFER);

    // Resolves once hyper drops the response body, i.e. the client went away.
    let watcher = body_tx.clone();
    let disconnect = async move { watcher.closed().await };

    let transport = ChannelTransport::new(version, head_tx, body_tx);
    let hub = app_state.hub.clone();
    tokio::spawn(async move {
        let status = session::serve(&hub, transport, disconnect).await;
        debug!("SSE connection finished with status {}", status.code());
    });

    match head_rx.await {
        Ok(Head::Stream(headers)) => {
            let stream = stream! {
                while let Some(chunk) = body_rx.recv().await {
                    yield Ok::<_, Infallible>(chunk);
                }
            };
            (StatusCode::OK, headers, Body::from_stream(stream)).into_response()
        }
        Ok(Head::Reject(status)) => StatusCode::from_u16(status.code())
            .unwrap_or(StatusCode::BAD_REQUEST)
            .into_response(),
        Err(_) => {
            error!("SSE subscription ended before sending a response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
