//! `microbridge-middleware` – The Transport Boundary
//!
//! In-process pub/sub runtime and the serial command/telemetry bridge built
//! on top of it.  Routes messages between topic lanes without caring about
//! their meaning; framing, discovery, and QoS negotiation belong to the
//! transport underneath and are not modelled here.
//!
//! # Modules
//!
//! - [`bus`] – Topic-keyed broadcast fabric built on Tokio broadcast
//!   channels; best-effort, drops are silent.
//! - [`node`] – Context, node identity, and typed publish/subscribe
//!   endpoints.
//! - [`executor`] – Cooperative dispatcher with a fixed registration
//!   capacity and a bounded `spin_some` step.
//! - [`bridge`] – [`SerialBridge`], the command/telemetry controller:
//!   one `cmd_vel` subscriber, one `serial_monitor` publisher.

pub mod bridge;
pub mod bus;
pub mod executor;
pub mod node;

pub use bridge::{BridgeConfig, SerialBridge};
pub use bus::TopicBus;
pub use executor::Executor;
pub use node::{Context, Node, Publisher, Subscription};
