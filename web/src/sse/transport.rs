use ::sse::session::{Status, Transport};
use ::sse::Error;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Version};
use log::*;
use tokio::sync::{mpsc, oneshot};

/// How the subscription wants the HTTP response to start.
#[derive(Debug)]
pub(crate) enum Head {
    Stream(HeaderMap),
    Reject(Status),
}

/// Transport that hands written frames to a channel backing an axum streaming body.
///
/// Every flush becomes one body chunk, which hyper writes out immediately. When the
/// client goes away hyper drops the body, the receiver with it, and the next write
/// fails.
pub(crate) struct ChannelTransport {
    version: Version,
    headers: HeaderMap,
    head: Option<oneshot::Sender<Head>>,
    body: mpsc::Sender<Bytes>,
    pending: Vec<u8>,
}

impl ChannelTransport {
    pub(crate) fn new(
        version: Version,
        head: oneshot::Sender<Head>,
        body: mpsc::Sender<Bytes>,
    ) -> Self {
        Self {
            version,
            headers: HeaderMap::new(),
            head: Some(head),
            body,
            pending: Vec::new(),
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    /// HTTP/1.0 and older have no chunked encoding to carry incremental flushes.
    fn supports_streaming(&self) -> bool {
        self.version >= Version::HTTP_11
    }

    fn set_header(&mut self, name: &'static str, value: &'static str) {
        match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => {
                self.headers.insert(name, HeaderValue::from_static(value));
            }
            Err(e) => warn!("Ignoring invalid header name {name}: {e}"),
        }
    }

    async fn begin(&mut self) -> Result<(), Error> {
        let head = self
            .head
            .take()
            .ok_or_else(|| Error::transport("response head already sent"))?;

        head.send(Head::Stream(std::mem::take(&mut self.headers)))
            .map_err(|_| Error::transport("request was dropped before the response started"))
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Error> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let chunk = Bytes::from(std::mem::take(&mut self.pending));
        self.body
            .send(chunk)
            .await
            .map_err(|_| Error::transport("client closed the event stream"))
    }

    async fn finish(&mut self, status: Status) {
        // Once streaming has begun the response is already 200 and ends when this
        // transport (and its body sender) is dropped.
        if let Some(head) = self.head.take() {
            let _ = head.send(Head::Reject(status));
        }
    }
}
