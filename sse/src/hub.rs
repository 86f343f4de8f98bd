use crate::connection::{ConnectionId, ConnectionRegistry, OverflowPolicy, SubscriberChannel};
use crate::error::{Error, Result};
use crate::message::Message;
use log::*;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Each event source holds at most one pending event, so submitting suspends the
/// caller until the coordination loop has taken the previous one.
const EVENT_QUEUE_CAPACITY: usize = 1;

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubOptions {
    /// Undelivered messages each subscriber may have queued before `overflow_policy` applies.
    pub subscriber_buffer: usize,
    pub overflow_policy: OverflowPolicy,
    /// How often an idle subscription writes a heartbeat frame. `None` disables heartbeats.
    pub heartbeat_interval: Option<Duration>,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            overflow_policy: OverflowPolicy::default(),
            heartbeat_interval: Some(DEFAULT_HEARTBEAT_INTERVAL),
        }
    }
}

struct Subscribe {
    id: ConnectionId,
    sender: mpsc::Sender<Message>,
    registered: oneshot::Sender<()>,
}

/// Handle to the process-wide fan-out authority.
///
/// Cloning is cheap; every clone talks to the same coordination loop. The loop runs
/// until the last handle is dropped, at which point every remaining subscriber
/// channel is closed.
#[derive(Clone)]
pub struct Hub {
    subscribe: mpsc::Sender<Subscribe>,
    unsubscribe: mpsc::Sender<ConnectionId>,
    publish: mpsc::Sender<Message>,
    count: mpsc::Sender<oneshot::Sender<usize>>,
    options: HubOptions,
}

impl Hub {
    /// Spawns the coordination loop onto the current tokio runtime.
    pub fn start(options: HubOptions) -> Self {
        let (subscribe, subscribe_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (unsubscribe, unsubscribe_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (publish, publish_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (count, count_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let coordinator = Coordinator {
            registry: ConnectionRegistry::new(),
            overflow_policy: options.overflow_policy,
            subscribe_rx,
            unsubscribe_rx,
            publish_rx,
            count_rx,
        };

        debug!(
            "Starting SSE hub (subscriber_buffer={}, overflow_policy={}, heartbeat={:?})",
            options.subscriber_buffer, options.overflow_policy, options.heartbeat_interval
        );
        tokio::spawn(coordinator.run());

        Self {
            subscribe,
            unsubscribe,
            publish,
            count,
            options,
        }
    }

    pub fn options(&self) -> &HubOptions {
        &self.options
    }

    /// Creates a new subscriber channel and waits until the Hub has registered it.
    ///
    /// Any publish submitted after this returns is delivered to the new subscriber.
    pub async fn register_subscriber(&self) -> Result<SubscriberChannel> {
        let (sender, channel) = SubscriberChannel::bounded(self.options.subscriber_buffer);
        let (registered, ack) = oneshot::channel();

        self.subscribe
            .send(Subscribe {
                id: channel.id().clone(),
                sender,
                registered,
            })
            .await
            .map_err(|_| Error::hub_stopped())?;
        ack.await.map_err(|_| Error::hub_stopped())?;

        Ok(channel)
    }

    /// Asks the Hub to remove and close a subscriber's channel.
    ///
    /// Each channel must be unregistered at most once.
    pub async fn unregister_subscriber(&self, id: ConnectionId) -> Result<()> {
        self.unsubscribe
            .send(id)
            .await
            .map_err(|_| Error::hub_stopped())
    }

    /// Broadcasts `message` to every subscriber registered when the Hub processes it.
    pub async fn publish(&self, message: impl Into<Message>) -> Result<()> {
        self.publish
            .send(message.into())
            .await
            .map_err(|_| Error::hub_stopped())
    }

    /// Serializes `obj` to compact JSON and broadcasts it.
    pub async fn publish_json<T>(&self, obj: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_string(obj).map_err(|e| {
            error!("Failed to serialize SSE payload: {e}");
            Error::from(e)
        })?;
        self.publish(payload).await
    }

    pub async fn send_string(&self, message: impl Into<String>) -> Result<()> {
        self.publish(message.into()).await
    }

    pub async fn send_json<T>(&self, obj: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.publish_json(obj).await
    }

    /// Number of subscribers currently registered.
    pub async fn subscriber_count(&self) -> Result<usize> {
        let (reply, count) = oneshot::channel();
        self.count
            .send(reply)
            .await
            .map_err(|_| Error::hub_stopped())?;
        count.await.map_err(|_| Error::hub_stopped())
    }
}

/// The single task that owns the registry. Every membership change and every
/// fan-out happens here, one event at a time.
struct Coordinator {
    registry: ConnectionRegistry,
    overflow_policy: OverflowPolicy,
    subscribe_rx: mpsc::Receiver<Subscribe>,
    unsubscribe_rx: mpsc::Receiver<ConnectionId>,
    publish_rx: mpsc::Receiver<Message>,
    count_rx: mpsc::Receiver<oneshot::Sender<usize>>,
}

impl Coordinator {
    async fn run(mut self) {
        loop {
            tokio::select! {
                // Membership changes first, then publishes, then count queries.
                biased;

                Some(subscribe) = self.subscribe_rx.recv() => self.on_subscribe(subscribe),
                Some(id) = self.unsubscribe_rx.recv() => self.on_unsubscribe(&id),
                Some(message) = self.publish_rx.recv() => self.on_publish(&message),
                Some(reply) = self.count_rx.recv() => {
                    let _ = reply.send(self.registry.len());
                }
                else => break,
            }
        }

        info!(
            "SSE hub stopped, closing {} remaining subscriber(s)",
            self.registry.len()
        );
    }

    fn on_subscribe(&mut self, subscribe: Subscribe) {
        let Subscribe {
            id,
            sender,
            registered,
        } = subscribe;

        debug!("Registering SSE subscriber {id}");
        self.registry.register(id, sender);
        // The caller may have given up waiting; the subscriber stays registered
        // and is pruned on the next broadcast once its receiver is gone.
        let _ = registered.send(());
    }

    fn on_unsubscribe(&mut self, id: &ConnectionId) {
        if self.registry.unregister(id) {
            debug!("Unregistered SSE subscriber {id}");
        } else {
            debug!("SSE subscriber {id} was already removed");
        }
    }

    fn on_publish(&mut self, message: &Message) {
        let report = self.registry.broadcast(message, self.overflow_policy);
        trace!(
            "Broadcast SSE message: delivered={}, dropped={}, evicted={}",
            report.delivered,
            report.dropped,
            report.evicted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    fn test_hub(subscriber_buffer: usize, overflow_policy: OverflowPolicy) -> Hub {
        Hub::start(HubOptions {
            subscriber_buffer,
            overflow_policy,
            heartbeat_interval: None,
        })
    }

    async fn next(channel: &mut SubscriberChannel) -> Option<Message> {
        timeout(WAIT, channel.recv())
            .await
            .expect("timed out waiting on subscriber channel")
    }

    #[tokio::test]
    async fn subscriber_receives_messages_in_publish_order() {
        let hub = test_hub(8, OverflowPolicy::Drop);
        let mut channel = hub.register_subscriber().await.unwrap();

        for payload in ["one", "two", "three"] {
            hub.send_string(payload).await.unwrap();
        }

        assert_eq!(next(&mut channel).await, Some(Message::from("one")));
        assert_eq!(next(&mut channel).await, Some(Message::from("two")));
        assert_eq!(next(&mut channel).await, Some(Message::from("three")));
    }

    #[tokio::test]
    async fn every_subscriber_gets_exactly_one_copy() {
        let hub = test_hub(4, OverflowPolicy::Drop);
        let mut channels = Vec::new();
        for _ in 0..5 {
            channels.push(hub.register_subscriber().await.unwrap());
        }

        hub.publish("fan-out").await.unwrap();
        // A second publish proves no subscriber got the first one twice.
        hub.publish("done").await.unwrap();

        for channel in channels.iter_mut() {
            assert_eq!(next(channel).await, Some(Message::from("fan-out")));
            assert_eq!(next(channel).await, Some(Message::from("done")));
        }
    }

    #[tokio::test]
    async fn messages_published_before_subscribing_are_not_replayed() {
        let hub = test_hub(4, OverflowPolicy::Drop);
        hub.publish("too early").await.unwrap();
        // Count queries are served after pending publishes, so this waits for the fan-out.
        assert_eq!(hub.subscriber_count().await.unwrap(), 0);

        let mut channel = hub.register_subscriber().await.unwrap();
        hub.publish("on time").await.unwrap();

        assert_eq!(next(&mut channel).await, Some(Message::from("on time")));
    }

    #[tokio::test]
    async fn unregister_closes_channel_and_stops_delivery() {
        let hub = test_hub(4, OverflowPolicy::Drop);
        let mut leaving = hub.register_subscriber().await.unwrap();
        let mut staying = hub.register_subscriber().await.unwrap();

        hub.unregister_subscriber(leaving.id().clone()).await.unwrap();
        assert_eq!(next(&mut leaving).await, None);

        hub.publish("ignored by the leaver").await.unwrap();
        assert_eq!(
            next(&mut staying).await,
            Some(Message::from("ignored by the leaver"))
        );
        assert_eq!(hub.subscriber_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn publish_json_sends_compact_form() {
        let hub = test_hub(4, OverflowPolicy::Drop);
        let mut a = hub.register_subscriber().await.unwrap();
        let mut b = hub.register_subscriber().await.unwrap();

        hub.send_json(&json!({ "x": 1 })).await.unwrap();

        assert_eq!(next(&mut a).await, Some(Message::from(r#"{"x":1}"#)));
        assert_eq!(next(&mut b).await, Some(Message::from(r#"{"x":1}"#)));
    }

    #[tokio::test]
    async fn publish_json_reports_serialization_failure() {
        let hub = test_hub(4, OverflowPolicy::Drop);
        let mut unserializable = HashMap::new();
        unserializable.insert((1, 2), "tuple keys are not valid JSON object keys");

        let err = hub.publish_json(&unserializable).await.unwrap_err();

        assert_eq!(err.error_kind, crate::error::ErrorKind::Serialization);
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_stall_others() {
        let hub = test_hub(1, OverflowPolicy::Disconnect);
        let mut stalled = hub.register_subscriber().await.unwrap();
        let mut active = hub.register_subscriber().await.unwrap();

        hub.publish("first").await.unwrap();
        assert_eq!(next(&mut active).await, Some(Message::from("first")));

        // `stalled` never read "first", so its buffer is full and it gets evicted.
        hub.publish("second").await.unwrap();
        assert_eq!(next(&mut active).await, Some(Message::from("second")));

        assert_eq!(next(&mut stalled).await, Some(Message::from("first")));
        assert_eq!(next(&mut stalled).await, None);
        assert_eq!(hub.subscriber_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn drop_policy_keeps_slow_subscriber_registered() {
        let hub = test_hub(1, OverflowPolicy::Drop);
        let mut slow = hub.register_subscriber().await.unwrap();

        hub.publish("kept").await.unwrap();
        hub.publish("dropped").await.unwrap();
        assert_eq!(hub.subscriber_count().await.unwrap(), 1);

        assert_eq!(next(&mut slow).await, Some(Message::from("kept")));
        hub.publish("after catching up").await.unwrap();
        assert_eq!(
            next(&mut slow).await,
            Some(Message::from("after catching up"))
        );
    }

    #[tokio::test]
    async fn subscriber_count_tracks_membership() {
        let hub = test_hub(1, OverflowPolicy::Drop);
        assert_eq!(hub.subscriber_count().await.unwrap(), 0);

        let a = hub.register_subscriber().await.unwrap();
        let _b = hub.register_subscriber().await.unwrap();
        assert_eq!(hub.subscriber_count().await.unwrap(), 2);

        hub.unregister_subscriber(a.id().clone()).await.unwrap();
        assert_eq!(hub.subscriber_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn operations_on_a_stopped_hub_fail() {
        let (subscribe, _) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (unsubscribe, _) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (publish, _) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (count, _) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let hub = Hub {
            subscribe,
            unsubscribe,
            publish,
            count,
            options: HubOptions::default(),
        };

        let stopped = crate::error::ErrorKind::HubStopped;
        assert_eq!(hub.publish("x").await.unwrap_err().error_kind, stopped);
        assert_eq!(
            hub.register_subscriber().await.unwrap_err().error_kind,
            stopped
        );
        assert_eq!(
            hub.unregister_subscriber(ConnectionId::new())
                .await
                .unwrap_err()
                .error_kind,
            stopped
        );
        assert_eq!(hub.subscriber_count().await.unwrap_err().error_kind, stopped);
    }

    #[tokio::test]
    async fn dropping_every_handle_closes_remaining_channels() {
        let hub = test_hub(1, OverflowPolicy::Drop);
        let mut channel = hub.register_subscriber().await.unwrap();

        drop(hub);

        assert_eq!(next(&mut channel).await, None);
    }
}
