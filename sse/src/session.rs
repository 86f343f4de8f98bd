use crate::connection::ConnectionId;
use crate::error::{Error, Result};
use crate::hub::Hub;
use crate::message::{frame, HEARTBEAT_FRAME, STREAM_HEADERS};
use async_trait::async_trait;
use log::*;
use std::future::Future;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Final status of a subscription request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// The transport cannot stream with explicit flushes.
    BadRequest,
    /// The Hub is not running.
    ServiceUnavailable,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::ServiceUnavailable => 503,
        }
    }
}

/// What a subscription needs from the HTTP layer carrying it.
#[async_trait]
pub trait Transport: Send {
    /// Whether body bytes can be written incrementally and flushed on demand.
    fn supports_streaming(&self) -> bool;

    fn set_header(&mut self, name: &'static str, value: &'static str);

    /// Commits the status line and headers. No header changes take effect afterwards.
    async fn begin(&mut self) -> Result<()>;

    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    async fn flush(&mut self) -> Result<()>;

    /// Completes the response with `status`.
    async fn finish(&mut self, status: Status);
}

/// Bridges one transport connection to the Hub for the connection's lifetime.
///
/// `disconnect` resolves when the client goes away. The subscription ends once the
/// Hub closes this subscriber's channel, which happens after the disconnect (or an
/// implicit one, see below) has been processed.
///
/// A failed write or flush counts as a disconnect: the subscriber is unregistered and
/// no further bytes are written.
pub async fn serve<T, D>(hub: &Hub, mut transport: T, disconnect: D) -> Status
where
    T: Transport,
    D: Future<Output = ()> + Send + 'static,
{
    if !transport.supports_streaming() {
        warn!("Rejecting SSE subscriber: transport does not support streaming");
        transport.finish(Status::BadRequest).await;
        return Status::BadRequest;
    }

    let mut channel = match hub.register_subscriber().await {
        Ok(channel) => channel,
        Err(e) => {
            error!("Failed to register SSE subscriber: {e}");
            transport.finish(Status::ServiceUnavailable).await;
            return Status::ServiceUnavailable;
        }
    };
    let id = channel.id().clone();
    let mut transport_failed = Some(watch_disconnect(hub.clone(), id.clone(), disconnect));

    for (name, value) in STREAM_HEADERS {
        transport.set_header(name, value);
    }
    if let Err(e) = transport.begin().await {
        mark_failed(&mut transport_failed, &id, &e);
    }

    let mut heartbeat = hub.options().heartbeat_interval.map(|period| {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        let healthy = transport_failed.is_some();

        tokio::select! {
            received = channel.recv() => match received {
                Some(message) if healthy => {
                    if let Err(e) = send_frame(&mut transport, frame(&message).as_bytes()).await {
                        mark_failed(&mut transport_failed, &id, &e);
                    }
                }
                // Drain until the Hub closes the channel.
                Some(_) => {}
                None => break,
            },
            _ = tick(&mut heartbeat), if healthy => {
                if let Err(e) = send_frame(&mut transport, HEARTBEAT_FRAME.as_bytes()).await {
                    mark_failed(&mut transport_failed, &id, &e);
                }
            }
        }
    }

    debug!("SSE subscription {id} ended");
    transport.finish(Status::Ok).await;
    Status::Ok
}

/// Spawns the task that unregisters `id` exactly once, either when the client
/// disconnects or when the returned sender fires (or is dropped).
fn watch_disconnect<D>(hub: Hub, id: ConnectionId, disconnect: D) -> oneshot::Sender<()>
where
    D: Future<Output = ()> + Send + 'static,
{
    let (failed, on_failure) = oneshot::channel::<()>();

    tokio::spawn(async move {
        tokio::select! {
            _ = disconnect => debug!("SSE subscriber {id} disconnected"),
            _ = on_failure => debug!("SSE subscriber {id} is no longer writable"),
        }

        if let Err(e) = hub.unregister_subscriber(id).await {
            debug!("Could not unregister SSE subscriber: {e}");
        }
    });

    failed
}

fn mark_failed(
    transport_failed: &mut Option<oneshot::Sender<()>>,
    id: &ConnectionId,
    err: &Error,
) {
    if let Some(failed) = transport_failed.take() {
        warn!("Write to SSE subscriber {id} failed, treating it as disconnected: {err}");
        let _ = failed.send(());
    }
}

async fn send_frame<T: Transport>(transport: &mut T, bytes: &[u8]) -> Result<()> {
    transport.write(bytes).await?;
    transport.flush().await
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
