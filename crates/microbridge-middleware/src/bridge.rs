//! Serial command/telemetry bridge.
//!
//! [`SerialBridge`] is the controller that ties the middleware runtime to a
//! serial-attached micro-controller application:
//!
//! 1. **Inbound** – a best-effort subscription on `cmd_vel` whose callback
//!    copies the commanded linear-x velocity into a shared [`CommandCell`],
//!    latest-value-wins.
//!
//! 2. **Outbound** – a best-effort publisher on `serial_monitor` that emits
//!    a status string on demand.  Delivery failures are logged and absorbed;
//!    telemetry loss is tolerated, never fatal.
//!
//! The bridge holds at most one pending command and one pending status at a
//! time; the two channels are independent and carry no ordering guarantee
//! relative to each other.

use crate::executor::Executor;
use crate::node::{Context, Node, Publisher};
use microbridge_types::{BridgeError, BridgeMessage, CommandCell, StatusText};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Wiring parameters for [`SerialBridge`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Node identity the endpoints are created under.
    pub node_name: String,
    /// Inbound velocity-command topic.
    pub command_topic: String,
    /// Outbound status topic.
    pub status_topic: String,
    /// Upper bound on one dispatch step in [`SerialBridge::start`].
    pub spin_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            node_name: "micro_ros_platformio_node".to_string(),
            command_topic: "cmd_vel".to_string(),
            status_topic: "serial_monitor".to_string(),
            spin_timeout: Duration::from_millis(100),
        }
    }
}

struct Inner {
    node: Node,
    publisher: Publisher,
    executor: Executor,
}

/// Command/telemetry bridge controller.
///
/// Construction only wires dependencies; all allocation happens in
/// [`initialize`][Self::initialize], which must be called exactly once
/// before [`start`][Self::start] or [`publish`][Self::publish].
pub struct SerialBridge {
    ctx: Context,
    cell: Arc<CommandCell>,
    config: BridgeConfig,
    inner: Option<Inner>,
}

impl SerialBridge {
    /// Wire a bridge to `ctx`, writing inbound commands into `cell`.
    ///
    /// The cell is injected rather than owned so the application root can
    /// hand the same cell to whatever consumes the commanded velocity.
    pub fn new(ctx: Context, cell: Arc<CommandCell>, config: BridgeConfig) -> Self {
        Self {
            ctx,
            cell,
            config,
            inner: None,
        }
    }

    /// Create the node, both endpoints, and the capacity-1 dispatcher.
    ///
    /// Call once.  A second call returns [`BridgeError::Setup`], as does any
    /// endpoint creation failure – a partially built bridge is unusable, so
    /// setup failures are fatal to the caller.
    pub fn initialize(&mut self) -> Result<(), BridgeError> {
        if self.inner.is_some() {
            return Err(BridgeError::Setup(
                "initialize called twice; the bridge is call-once".to_string(),
            ));
        }

        let node = Node::new(&self.ctx, &self.config.node_name)?;
        let subscription = node.create_subscription(&self.config.command_topic)?;
        let publisher = node.create_publisher(&self.config.status_topic)?;

        // One registered reactive source: the command subscription.
        let mut executor = Executor::new(1);
        let cell = Arc::clone(&self.cell);
        executor.add_subscription(
            subscription,
            Box::new(move |sample| {
                // The middleware enforces the message-kind contract on the
                // command topic; anything else is ignored.
                if let BridgeMessage::Twist(twist) = &sample.message {
                    cell.store(twist.linear.x);
                    debug!(linear_x = twist.linear.x, "command received");
                }
            }),
        )?;

        info!(
            node = %node.name(),
            command_topic = %self.config.command_topic,
            status_topic = %self.config.status_topic,
            "bridge initialized"
        );
        self.inner = Some(Inner {
            node,
            publisher,
            executor,
        });
        Ok(())
    }

    /// One bounded dispatch step: wait up to the configured spin timeout for
    /// an inbound command, running the callback synchronously if one (or
    /// more) arrived.  Returns whether anything was dispatched.
    ///
    /// Call repeatedly to keep command delivery live; while nothing spins,
    /// inbound commands pile up (and eventually drop) at the transport.
    pub async fn start(&mut self) -> Result<bool, BridgeError> {
        let inner = self
            .inner
            .as_mut()
            .ok_or(BridgeError::NotInitialized("start"))?;
        Ok(inner.executor.spin_some(self.config.spin_timeout).await)
    }

    /// Build a status message from `payload` and attempt delivery once.
    ///
    /// The message owns a copy of the payload and carries
    /// capacity = byte length + 1.  A delivery failure is logged and
    /// reported as `Ok(false)`; it never escalates.  Only calling before
    /// [`initialize`][Self::initialize] is an error.
    pub fn publish(&mut self, payload: &str) -> Result<bool, BridgeError> {
        let inner = self
            .inner
            .as_mut()
            .ok_or(BridgeError::NotInitialized("publish"))?;

        let status = StatusText::new(payload);
        match inner.publisher.publish(BridgeMessage::Status(status)) {
            Ok(receivers) => {
                debug!(
                    node = %inner.node.name(),
                    topic = %self.config.status_topic,
                    receivers,
                    "status published"
                );
                Ok(true)
            }
            Err(e) => {
                warn!(
                    node = %inner.node.name(),
                    topic = %self.config.status_topic,
                    error = %e,
                    "status publish failed; dropping"
                );
                Ok(false)
            }
        }
    }

    /// Latest commanded linear velocity, as written by the inbound callback.
    pub fn commanded_velocity(&self) -> f64 {
        self.cell.load()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microbridge_types::Twist;

    fn make_bridge(ctx: &Context) -> SerialBridge {
        SerialBridge::new(
            ctx.clone(),
            Arc::new(CommandCell::default()),
            BridgeConfig::default(),
        )
    }

    #[tokio::test]
    async fn operations_before_initialize_are_defined_errors() {
        let ctx = Context::new();
        let mut bridge = make_bridge(&ctx);

        assert!(matches!(
            bridge.publish("Hello World!"),
            Err(BridgeError::NotInitialized("publish"))
        ));
        assert!(matches!(
            bridge.start().await,
            Err(BridgeError::NotInitialized("start"))
        ));
    }

    #[test]
    fn initialize_is_call_once() {
        let ctx = Context::new();
        let mut bridge = make_bridge(&ctx);
        bridge.initialize().unwrap();
        assert!(bridge.is_initialized());
        assert!(matches!(bridge.initialize(), Err(BridgeError::Setup(_))));
    }

    #[tokio::test]
    async fn inbound_command_updates_the_cell() {
        let ctx = Context::new();
        let mut bridge = make_bridge(&ctx);
        bridge.initialize().unwrap();

        let node = Node::new(&ctx, "test_commander").unwrap();
        let publisher = node.create_publisher("cmd_vel").unwrap();
        publisher
            .publish(BridgeMessage::Twist(Twist::linear_x(2.5)))
            .unwrap();

        let dispatched = bridge.start().await.unwrap();
        assert!(dispatched);
        assert!((bridge.commanded_velocity() - 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn latest_write_wins_across_a_burst() {
        let ctx = Context::new();
        let mut bridge = make_bridge(&ctx);
        bridge.initialize().unwrap();

        let node = Node::new(&ctx, "test_commander").unwrap();
        let publisher = node.create_publisher("cmd_vel").unwrap();
        for x in [1.0, -3.5, 0.0, 4.25] {
            publisher
                .publish(BridgeMessage::Twist(Twist::linear_x(x)))
                .unwrap();
        }

        bridge.start().await.unwrap();
        assert!((bridge.commanded_velocity() - 4.25).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn publish_delivers_status_with_capacity_contract() {
        let ctx = Context::new();
        let mut bridge = make_bridge(&ctx);
        bridge.initialize().unwrap();

        let node = Node::new(&ctx, "test_listener").unwrap();
        let mut sub = node.create_subscription("serial_monitor").unwrap();

        assert!(bridge.publish("Hello World!").unwrap());

        let sample = sub.recv().await.unwrap();
        match sample.message {
            BridgeMessage::Status(status) => {
                assert_eq!(status.data(), "Hello World!");
                assert_eq!(status.size(), 12);
                assert_eq!(status.capacity(), 13);
            }
            _ => panic!("expected a status message"),
        }
    }

    #[tokio::test]
    async fn publish_failure_is_logged_not_escalated() {
        let ctx = Context::new();
        let mut bridge = make_bridge(&ctx);
        bridge.initialize().unwrap();

        // Nothing listens on serial_monitor: delivery fails, the call does
        // not.
        assert!(!bridge.publish("Hello World!").unwrap());

        // The controller stays usable afterwards.
        let node = Node::new(&ctx, "test_listener").unwrap();
        let mut sub = node.create_subscription("serial_monitor").unwrap();
        assert!(bridge.publish("Hello World!").unwrap());
        assert!(sub.recv().await.is_some());
    }

    #[tokio::test]
    async fn channels_do_not_interfere() {
        let ctx = Context::new();
        let mut bridge = make_bridge(&ctx);
        bridge.initialize().unwrap();

        let node = Node::new(&ctx, "test_peer").unwrap();
        let mut status_sub = node.create_subscription("serial_monitor").unwrap();
        let cmd_publisher = node.create_publisher("cmd_vel").unwrap();

        cmd_publisher
            .publish(BridgeMessage::Twist(Twist::linear_x(1.5)))
            .unwrap();
        bridge.start().await.unwrap();
        let before = bridge.commanded_velocity();

        // Any number of status publishes leaves the command value untouched.
        for _ in 0..5 {
            bridge.publish("status tick").unwrap();
        }
        assert!((bridge.commanded_velocity() - before).abs() < f64::EPSILON);

        // And inbound commands never alter the telemetry content.
        let sample = status_sub.recv().await.unwrap();
        match sample.message {
            BridgeMessage::Status(status) => assert_eq!(status.data(), "status tick"),
            _ => panic!("expected a status message"),
        }
    }

    #[tokio::test]
    async fn start_without_data_respects_the_timeout() {
        let ctx = Context::new();
        let mut bridge = SerialBridge::new(
            ctx.clone(),
            Arc::new(CommandCell::default()),
            BridgeConfig {
                spin_timeout: Duration::from_millis(50),
                ..BridgeConfig::default()
            },
        );
        bridge.initialize().unwrap();

        let started = std::time::Instant::now();
        let dispatched = bridge.start().await.unwrap();
        let elapsed = started.elapsed();

        assert!(!dispatched);
        assert!(
            elapsed < Duration::from_millis(150),
            "start overran its timeout: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn nan_commands_are_propagated_as_is() {
        let ctx = Context::new();
        let mut bridge = make_bridge(&ctx);
        bridge.initialize().unwrap();

        let node = Node::new(&ctx, "test_commander").unwrap();
        let publisher = node.create_publisher("cmd_vel").unwrap();
        publisher
            .publish(BridgeMessage::Twist(Twist::linear_x(f64::NAN)))
            .unwrap();

        bridge.start().await.unwrap();
        assert!(bridge.commanded_velocity().is_nan());
    }

    /// The end-to-end scenario: command in, status out, failure tolerated.
    #[tokio::test]
    async fn command_then_status_then_failure() {
        let ctx = Context::new();
        let cell = Arc::new(CommandCell::default());
        let mut bridge = SerialBridge::new(ctx.clone(), Arc::clone(&cell), BridgeConfig::default());
        bridge.initialize().unwrap();

        let node = Node::new(&ctx, "test_peer").unwrap();
        let cmd_publisher = node.create_publisher("cmd_vel").unwrap();

        cmd_publisher
            .publish(BridgeMessage::Twist(Twist::linear_x(2.5)))
            .unwrap();
        bridge.start().await.unwrap();
        assert!((cell.load() - 2.5).abs() < f64::EPSILON);

        {
            let mut status_sub = node.create_subscription("serial_monitor").unwrap();
            assert!(bridge.publish("Hello World!").unwrap());
            let sample = status_sub.recv().await.unwrap();
            match sample.message {
                BridgeMessage::Status(status) => {
                    assert_eq!(status.size(), 12);
                    assert_eq!(status.capacity(), 13);
                }
                _ => panic!("expected a status message"),
            }
        }

        // Listener gone: the next publish fails quietly and the bridge keeps
        // going.
        assert!(!bridge.publish("Hello World!").unwrap());
        assert!(!bridge.start().await.unwrap());
    }
}
