use std::fmt;
use std::sync::Arc;

/// Headers a subscriber's response must carry before the first frame.
pub const STREAM_HEADERS: [(&str, &str); 3] = [
    ("Content-Type", "text/event-stream"),
    ("Cache-Control", "no-cache"),
    ("Connection", "keep-alive"),
];

/// Event-stream comment frame. Clients discard it; it only proves the connection is alive.
pub const HEARTBEAT_FRAME: &str = ": heartbeat\n\n";

const FRAME_PREFIX: &str = "data: Message: ";
const FRAME_TERMINATOR: &str = "\n\n";

/// An immutable, wire-ready payload. Cloning shares the underlying string, so fan-out
/// to many subscribers never copies the payload itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message(Arc<str>);

impl Message {
    pub fn new(payload: impl Into<Arc<str>>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Message {
    fn from(payload: String) -> Self {
        Self(payload.into())
    }
}

impl From<&str> for Message {
    fn from(payload: &str) -> Self {
        Self(payload.into())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Formats one message as a single event-stream frame. The payload is written verbatim.
pub fn frame(message: &Message) -> String {
    let mut frame =
        String::with_capacity(FRAME_PREFIX.len() + message.0.len() + FRAME_TERMINATOR.len());
    frame.push_str(FRAME_PREFIX);
    frame.push_str(&message.0);
    frame.push_str(FRAME_TERMINATOR);
    frame
}
