//! Topic-keyed broadcast fabric.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood, one lane per
//! topic string, created on first use.  Delivery is best-effort: a publish
//! with no attached receiver is an error the caller may absorb, and a slow
//! receiver that falls behind simply loses the oldest samples.
//!
//! The fabric never inspects message contents; it only moves [`Sample`]
//! envelopes between endpoints bound to the same topic name.

use microbridge_types::{BridgeError, Sample};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Default per-lane buffer depth.  The bridge never needs more than the
/// latest sample, but a little slack keeps bursty publishers from tripping
/// lag warnings in tests.
const DEFAULT_CAPACITY: usize = 16;

/// Shared topic fabric.  One broadcast lane per topic string.
#[derive(Debug)]
pub struct TopicBus {
    capacity: usize,
    lanes: RwLock<HashMap<String, broadcast::Sender<Sample>>>,
}

impl TopicBus {
    /// Create a new fabric; `capacity` is the buffer depth applied to every
    /// lane independently.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lanes: RwLock::new(HashMap::new()),
        }
    }

    /// Publish `sample` on its topic lane.
    ///
    /// Returns the number of receivers the sample was handed to, or
    /// [`BridgeError::Channel`] when nothing is listening on the topic.
    /// At-most-once: there is no retry and no buffering for absent
    /// receivers.
    pub fn publish(&self, sample: Sample) -> Result<usize, BridgeError> {
        let lane = self.lane(&sample.topic);
        let topic = sample.topic.clone();
        lane.send(sample)
            .map_err(|_| BridgeError::Channel(format!("no subscribers on topic {topic}")))
    }

    /// Attach a receiver to `topic`, creating the lane if needed.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Sample> {
        self.lane(topic).subscribe()
    }

    /// Number of receivers currently attached to `topic`.
    pub fn receiver_count(&self, topic: &str) -> usize {
        self.lanes
            .read()
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    fn lane(&self, topic: &str) -> broadcast::Sender<Sample> {
        if let Some(tx) = self.lanes.read().get(topic) {
            return tx.clone();
        }
        let mut lanes = self.lanes.write();
        lanes
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for TopicBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
