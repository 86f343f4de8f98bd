//! Server-Sent Events (SSE) broadcast hub.
//!
//! This crate fans published messages out to every connected event-stream
//! subscriber in real time.
//!
//! # Architecture
//!
//! - **Single coordination loop**: one task owns the subscriber registry and
//!   processes subscribe, unsubscribe and publish events one at a time, so the
//!   registry is never shared and needs no locks.
//! - **Bounded subscriber channels**: each subscriber gets its own bounded
//!   conduit. Fan-out never waits on a subscriber; a full conduit is handled by
//!   the configured [`OverflowPolicy`] so one stalled client cannot stall the rest.
//! - **Ephemeral messages**: nothing is retained. A subscriber only sees
//!   messages published while it is registered.
//! - **Transport agnostic**: [`session::serve`] drives one subscription over
//!   anything implementing [`session::Transport`]; the `web` crate provides the
//!   HTTP binding.
//!
//! # Message Flow
//!
//! 1. A connection calls `serve`, which registers a channel with the [`Hub`]
//! 2. A publisher calls `hub.send_string(..)` or `hub.send_json(..)`
//! 3. The Hub loop offers the message to every registered channel
//! 4. Each subscription writes `data: Message: <payload>\n\n` and flushes
//! 5. On disconnect (or a failed write) the subscription unregisters and the
//!    Hub closes its channel, ending the subscription
//!
//! # Example: Publishing
//!
//! ```rust,ignore
//! let hub = Hub::start(HubOptions::default());
//! hub.send_string("deploy finished").await?;
//! hub.send_json(&serde_json::json!({ "build": 42 })).await?;
//! ```
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry, SubscriberChannel and the overflow policy
//! - `hub`: the coordination loop and the publisher API
//! - `message`: Message payloads and event-stream framing
//! - `session`: the per-connection subscription handler and its Transport trait

pub mod connection;
pub mod error;
pub mod hub;
pub mod message;
pub mod session;

pub use connection::{ConnectionId, OverflowPolicy, SubscriberChannel};
pub use error::{Error, ErrorKind};
pub use hub::{Hub, HubOptions};
pub use message::Message;
