//! Cooperative dispatcher.
//!
//! An [`Executor`] holds a fixed number of subscription/callback pairs and
//! pumps them with [`spin_some`][Executor::spin_some]: one bounded dispatch
//! step that waits up to a timeout for inbound data, invokes callbacks
//! synchronously on the caller's task, and returns.  Callbacks run inside
//! the step's time budget and must not block.

use crate::node::Subscription;
use microbridge_types::{BridgeError, Sample};
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tracing::debug;

/// Callback invoked for every dispatched sample.  Runs synchronously inside
/// [`Executor::spin_some`], on the same task that called it.
pub type Callback = Box<dyn FnMut(&Sample) + Send>;

struct Handle {
    subscription: Subscription,
    callback: Callback,
}

/// Dispatcher with a fixed registration capacity, set at construction.
pub struct Executor {
    capacity: usize,
    handles: Vec<Handle>,
}

impl Executor {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            handles: Vec::with_capacity(capacity),
        }
    }

    /// Register `subscription` with its `callback`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Setup`] once the capacity chosen at
    /// construction is exhausted.
    pub fn add_subscription(
        &mut self,
        subscription: Subscription,
        callback: Callback,
    ) -> Result<(), BridgeError> {
        if self.handles.len() >= self.capacity {
            return Err(BridgeError::Setup(format!(
                "executor capacity {} exhausted",
                self.capacity
            )));
        }
        debug!(topic = %subscription.topic(), "subscription registered with executor");
        self.handles.push(Handle {
            subscription,
            callback,
        });
        Ok(())
    }

    /// Number of registered subscriptions.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// One bounded dispatch step.
    ///
    /// Drains everything already pending on every registered subscription;
    /// if nothing was pending, waits up to `budget` for data to arrive and
    /// then drains again.  Pending samples are dispatched in publication
    /// order, so after a step the callback has seen the newest sample last.
    /// Returns whether any sample was dispatched.  Never blocks past
    /// `budget`.
    pub async fn spin_some(&mut self, budget: Duration) -> bool {
        let deadline = Instant::now() + budget;
        let mut dispatched = false;

        for handle in &mut self.handles {
            while let Some(sample) = handle.subscription.try_recv() {
                debug!(topic = %sample.topic, id = %sample.id, "dispatching sample");
                (handle.callback)(&sample);
                dispatched = true;
            }
        }
        if dispatched {
            return true;
        }

        // Nothing was pending: spend the remaining budget waiting, one
        // subscription at a time.
        for handle in &mut self.handles {
            let remaining = deadline.duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Ok(Some(sample)) = timeout(remaining, handle.subscription.recv()).await {
                debug!(topic = %sample.topic, id = %sample.id, "dispatching sample");
                (handle.callback)(&sample);
                while let Some(sample) = handle.subscription.try_recv() {
                    (handle.callback)(&sample);
                }
                dispatched = true;
            }
        }

        dispatched
    }
}
