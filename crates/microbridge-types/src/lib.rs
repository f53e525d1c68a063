use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use uuid::Uuid;

/// Three-component vector used by velocity commands.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// 2D velocity command: linear and angular components.
///
/// Only `linear.x` is consumed by the bridge today; the remaining fields are
/// carried so the wire shape matches what velocity publishers emit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl Twist {
    /// Convenience constructor for a pure forward/backward command.
    pub fn linear_x(x: f64) -> Self {
        Self {
            linear: Vector3 { x, ..Vector3::default() },
            angular: Vector3::default(),
        }
    }
}

/// Owned status string carrying the serial-side length/capacity contract.
///
/// `capacity` always equals `size + 1` – one slot is reserved for the
/// terminator the serial transport appends.  The payload is copied into an
/// owned buffer at construction, so no caller-held storage is ever aliased
/// through the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusText {
    data: String,
    size: usize,
    capacity: usize,
}

impl StatusText {
    pub fn new(payload: &str) -> Self {
        let data = payload.to_owned();
        let size = data.len();
        Self {
            data,
            size,
            capacity: size + 1,
        }
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    /// Byte length of the payload.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Allocated capacity: always [`size`][Self::size] + 1.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The two message kinds the bridge routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeMessage {
    /// Inbound 2D velocity command (`cmd_vel`).
    Twist(Twist),
    /// Outbound status string (`serial_monitor`).
    Status(StatusText),
}

/// Envelope for a message travelling over a topic lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Topic the sample was published on, e.g. `"cmd_vel"`.
    pub topic: String,
    pub message: BridgeMessage,
}

impl Sample {
    pub fn new(topic: impl Into<String>, message: BridgeMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            topic: topic.into(),
            message,
        }
    }
}

/// Latest-value cell for the commanded linear velocity.
///
/// Single writer (the inbound command callback), any number of readers, no
/// history – every store overwrites the previous value.  Backed by an
/// `AtomicU64` holding the `f64` bit pattern so readers on other threads
/// never observe a torn value.
#[derive(Debug, Default)]
pub struct CommandCell(AtomicU64);

impl CommandCell {
    pub fn new(initial: f64) -> Self {
        Self(AtomicU64::new(initial.to_bits()))
    }

    /// Overwrite the cell.  Any value is accepted as-is, including NaN.
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Global error type spanning setup failures, lifecycle misuse, and channel
/// delivery errors.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Endpoint/node/dispatcher creation failed.  Fatal: there is no recovery
    /// path from a partially built bridge.
    #[error("Setup failed: {0}")]
    Setup(String),

    /// An operation was invoked before `initialize()`.
    #[error("Bridge not initialized: {0} called before initialize")]
    NotInitialized(&'static str),

    /// A topic lane could not deliver a message.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Configuration could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),
}
