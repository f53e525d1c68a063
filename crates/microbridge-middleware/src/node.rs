//! Context, node identity, and publish/subscribe endpoints.
//!
//! A [`Context`] owns the topic fabric and stands in for the transport /
//! allocator / support aggregate of the underlying middleware.  A [`Node`]
//! is the identity under which endpoints are created; endpoints stay valid
//! after the node is dropped because they each hold the fabric themselves.
//!
//! All endpoints are best-effort: there is exactly one delivery mode.

use crate::bus::TopicBus;
use microbridge_types::{BridgeError, BridgeMessage, Sample};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Middleware execution context.  Clone it cheaply – all clones share the
/// same topic fabric.
#[derive(Clone, Debug, Default)]
pub struct Context {
    bus: Arc<TopicBus>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with an explicit per-lane buffer depth.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bus: Arc::new(TopicBus::new(capacity)),
        }
    }

    pub(crate) fn bus(&self) -> &Arc<TopicBus> {
        &self.bus
    }
}

/// A named identity under which endpoints are created.
pub struct Node {
    name: String,
    ctx: Context,
}

impl Node {
    /// Create a node inside `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Setup`] if `name` is empty.
    pub fn new(ctx: &Context, name: impl Into<String>) -> Result<Self, BridgeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(BridgeError::Setup("node name must not be empty".to_string()));
        }
        info!(node = %name, "node created");
        Ok(Self {
            name,
            ctx: ctx.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a best-effort publishing endpoint on `topic`.
    pub fn create_publisher(&self, topic: &str) -> Result<Publisher, BridgeError> {
        validate_topic(topic)?;
        debug!(node = %self.name, topic, "publisher created");
        Ok(Publisher {
            topic: topic.to_string(),
            bus: Arc::clone(self.ctx.bus()),
        })
    }

    /// Create a best-effort subscribing endpoint on `topic`.
    pub fn create_subscription(&self, topic: &str) -> Result<Subscription, BridgeError> {
        validate_topic(topic)?;
        debug!(node = %self.name, topic, "subscription created");
        Ok(Subscription {
            topic: topic.to_string(),
            receiver: self.ctx.bus().subscribe(topic),
        })
    }
}

fn validate_topic(topic: &str) -> Result<(), BridgeError> {
    if topic.is_empty() {
        return Err(BridgeError::Setup("topic name must not be empty".to_string()));
    }
    Ok(())
}

/// Outbound endpoint bound to one topic.
pub struct Publisher {
    topic: String,
    bus: Arc<TopicBus>,
}

impl Publisher {
    /// Attempt delivery once.  Returns the number of receivers reached, or
    /// [`BridgeError::Channel`] when nothing is listening.
    pub fn publish(&self, message: BridgeMessage) -> Result<usize, BridgeError> {
        self.bus.publish(Sample::new(&self.topic, message))
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Inbound endpoint bound to one topic.
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<Sample>,
}

impl Subscription {
    /// Wait for the next sample on this topic.
    ///
    /// Lag (the receiver fell behind and lost samples) is logged and skipped
    /// – drops are silent and acceptable on a best-effort lane.  Returns
    /// `None` once the lane has shut down.
    pub async fn recv(&mut self) -> Option<Sample> {
        loop {
            match self.receiver.recv().await {
                Ok(sample) => return Some(sample),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "subscription lagged; samples dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`][Self::recv]: returns the next
    /// pending sample or `None` when the lane is empty or closed.
    pub fn try_recv(&mut self) -> Option<Sample> {
        loop {
            match self.receiver.try_recv() {
                Ok(sample) => return Some(sample),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = %self.topic, lagged_by = n, "subscription lagged; samples dropped");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microbridge_types::Twist;

    #[test]
    fn node_rejects_empty_name() {
        let ctx = Context::new();
        assert!(matches!(Node::new(&ctx, ""), Err(BridgeError::Setup(_))));
    }

    #[test]
    fn endpoints_reject_empty_topic() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "test_node").unwrap();
        assert!(node.create_publisher("").is_err());
        assert!(node.create_subscription("").is_err());
    }

    #[tokio::test]
    async fn publisher_reaches_subscription_on_same_topic() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "test_node").unwrap();
        let mut sub = node.create_subscription("cmd_vel").unwrap();
        let publisher = node.create_publisher("cmd_vel").unwrap();

        let delivered = publisher
            .publish(BridgeMessage::Twist(Twist::linear_x(0.5)))
            .unwrap();
        assert_eq!(delivered, 1);

        let sample = sub.recv().await.unwrap();
        assert_eq!(sample.topic, "cmd_vel");
    }

    #[tokio::test]
    async fn endpoints_outlive_their_node() {
        let ctx = Context::new();
        let (publisher, mut sub) = {
            let node = Node::new(&ctx, "short_lived").unwrap();
            (
                node.create_publisher("cmd_vel").unwrap(),
                node.create_subscription("cmd_vel").unwrap(),
            )
        };

        publisher
            .publish(BridgeMessage::Twist(Twist::linear_x(1.0)))
            .unwrap();
        assert!(sub.recv().await.is_some());
    }

    #[test]
    fn try_recv_on_empty_lane_returns_none() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "test_node").unwrap();
        let mut sub = node.create_subscription("cmd_vel").unwrap();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn publish_without_listener_reports_channel_error() {
        let ctx = Context::new();
        let node = Node::new(&ctx, "test_node").unwrap();
        let publisher = node.create_publisher("serial_monitor").unwrap();
        let result = publisher.publish(BridgeMessage::Twist(Twist::default()));
        assert!(matches!(result, Err(BridgeError::Channel(_))));
    }
}
