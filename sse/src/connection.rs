use crate::message::Message;
use log::*;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};

/// Unique identifier for a subscriber connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The receiving half of one subscriber's conduit.
///
/// The Hub keeps the sending half in its registry. Once the Hub removes the
/// subscriber the sender is dropped, and `recv` yields `None` after any
/// buffered messages have been drained.
#[derive(Debug)]
pub struct SubscriberChannel {
    id: ConnectionId,
    receiver: Receiver<Message>,
}

impl SubscriberChannel {
    /// Creates a conduit holding at most `buffer` undelivered messages.
    pub(crate) fn bounded(buffer: usize) -> (Sender<Message>, Self) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let channel = Self {
            id: ConnectionId::new(),
            receiver,
        };
        (sender, channel)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Waits for the next message. `None` means the Hub has closed this channel.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

/// What the fan-out does with a subscriber whose buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Skip the message for that subscriber only.
    Drop,
    /// Remove the subscriber from the registry, closing its channel.
    #[default]
    Disconnect,
}

#[derive(Debug, PartialEq, Eq)]
pub struct OverflowPolicyParseError;

impl FromStr for OverflowPolicy {
    type Err = OverflowPolicyParseError;
    fn from_str(policy: &str) -> Result<OverflowPolicy, Self::Err> {
        match policy.to_lowercase().as_str() {
            "drop" => Ok(OverflowPolicy::Drop),
            "disconnect" => Ok(OverflowPolicy::Disconnect),
            _ => Err(OverflowPolicyParseError),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OverflowPolicy::Drop => write!(f, "drop"),
            OverflowPolicy::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// Outcome of one fan-out pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub evicted: usize,
}

/// The set of live subscriber conduits. Owned and mutated by the Hub loop only,
/// so it needs no interior locking.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Sender<Message>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    pub fn register(&mut self, id: ConnectionId, sender: Sender<Message>) {
        self.connections.insert(id, sender);
    }

    /// Removes a subscriber. Dropping its sender closes the subscriber's channel.
    /// Returns `false` if the id was not registered.
    pub fn unregister(&mut self, id: &ConnectionId) -> bool {
        self.connections.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Offers `message` to every registered subscriber without waiting on any of them.
    ///
    /// Subscribers whose receiver is gone are always removed. Subscribers with a full
    /// buffer are handled according to `policy`. Iteration order is unspecified.
    pub fn broadcast(&mut self, message: &Message, policy: OverflowPolicy) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        self.connections
            .retain(|id, sender| match sender.try_send(message.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => match policy {
                    OverflowPolicy::Drop => {
                        warn!("Subscriber {id} is not keeping up, dropping message for it");
                        report.dropped += 1;
                        true
                    }
                    OverflowPolicy::Disconnect => {
                        warn!("Subscriber {id} is not keeping up, disconnecting it");
                        report.evicted += 1;
                        false
                    }
                },
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscriber {id} went away before unsubscribing, removing it");
                    report.evicted += 1;
                    false
                }
            });

        report
    }
}
