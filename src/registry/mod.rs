//! Per-receiver bounded queue, worker dispatch, drain, and close (spec.md
//! §4.4). Each receiver owns a bounded `mpsc` channel plus a worker task
//! that drains it one event at a time — the default (and only, at present)
//! `max_concurrency = 1` per receiver the spec allows.

use crate::event::Event;
use crate::sinks::Sink;
use snafu::Snafu;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

#[derive(Debug, Snafu)]
pub enum RegistryError {
    #[snafu(display("drain timed out waiting for receiver `{receiver}`"))]
    DrainTimeout { receiver: String },
}

#[derive(Default)]
struct DrainState {
    pending: usize,
    waiters: Vec<oneshot::Sender<()>>,
}

impl DrainState {
    fn complete_one(&mut self) {
        self.pending = self.pending.saturating_sub(1);
        if self.pending == 0 {
            for waiter in self.waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn cancel_all(&mut self) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

struct ReceiverActor {
    sender: mpsc::Sender<Event>,
    drain: Arc<Mutex<DrainState>>,
    sink: Arc<dyn Sink>,
    worker: JoinHandle<()>,
}

/// The registry actor: owns every active receiver's sink, queue, and drain
/// waiters. All map mutation happens synchronously under `receivers`'s
/// mutex; sink invocations run in the per-receiver worker task.
pub struct Registry {
    receivers: Mutex<HashMap<String, ReceiverActor>>,
    order: Mutex<Vec<String>>,
    max_queue_size: usize,
}

impl Registry {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            receivers: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
            max_queue_size,
        }
    }

    /// Registers a receiver's sink and starts its worker task. Intended to
    /// be called once at startup per configured receiver.
    pub fn register(&self, name: &str, sink: Arc<dyn Sink>) {
        let (tx, mut rx) = mpsc::channel::<Event>(self.max_queue_size.max(1));
        let drain = Arc::new(Mutex::new(DrainState::default()));

        let worker_sink = Arc::clone(&sink);
        let worker_drain = Arc::clone(&drain);
        let worker_name = name.to_owned();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Err(err) = worker_sink.send(&event).await {
                    error!(message = "sink failed to deliver event", receiver = %worker_name, %err);
                }
                worker_drain.lock().expect("drain mutex poisoned").complete_one();
            }
        });

        let actor = ReceiverActor {
            sender: tx,
            drain,
            sink,
            worker,
        };

        self.receivers.lock().expect("registry mutex poisoned").insert(name.to_owned(), actor);
        self.order.lock().expect("registry mutex poisoned").push(name.to_owned());
    }

    /// Fire-and-forget delivery. Unknown receivers and full queues are
    /// logged and dropped; this call never blocks.
    pub fn send(&self, name: &str, event: Event) {
        let receivers = self.receivers.lock().expect("registry mutex poisoned");
        let Some(actor) = receivers.get(name) else {
            warn!(message = "event routed to an unknown receiver, dropping", receiver = %name);
            return;
        };

        match actor.sender.try_send(event) {
            Ok(()) => {
                actor.drain.lock().expect("drain mutex poisoned").pending += 1;
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(message = "queue full, dropping event", receiver = %name);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(message = "receiver is closing, dropping event", receiver = %name);
            }
        }
    }

    /// Returns the registered sink for `name`, if any — tests use this to
    /// downcast back to a concrete sink (e.g. `InMemorySink`) via `as_any`.
    pub fn sink(&self, name: &str) -> Option<Arc<dyn Sink>> {
        self.receivers
            .lock()
            .expect("registry mutex poisoned")
            .get(name)
            .map(|actor| Arc::clone(&actor.sink))
    }

    /// Waits until `name`'s queue is empty, or `timeout` elapses. An
    /// unknown or already-empty receiver returns immediately.
    pub async fn drain(&self, name: &str, timeout: Duration) -> Result<(), RegistryError> {
        let drain_state = {
            let receivers = self.receivers.lock().expect("registry mutex poisoned");
            match receivers.get(name) {
                Some(actor) => Arc::clone(&actor.drain),
                None => return Ok(()),
            }
        };

        let rx = {
            let mut state = drain_state.lock().expect("drain mutex poisoned");
            if state.pending == 0 {
                return Ok(());
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            rx
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(_) => Ok(()),
            Err(_) => Err(RegistryError::DrainTimeout { receiver: name.to_owned() }),
        }
    }

    /// Drains every receiver in registration order, stopping at the first
    /// timeout.
    pub async fn drain_all(&self, timeout: Duration) -> Result<(), RegistryError> {
        let names = self.order.lock().expect("registry mutex poisoned").clone();
        for name in names {
            self.drain(&name, timeout).await?;
        }
        Ok(())
    }

    /// Stops a receiver's worker, releases its sink, and cancels any
    /// pending drain waiters.
    pub async fn close(&self, name: &str) {
        let actor = {
            let mut receivers = self.receivers.lock().expect("registry mutex poisoned");
            receivers.remove(name)
        };
        let Some(actor) = actor else { return };

        actor.drain.lock().expect("drain mutex poisoned").cancel_all();
        drop(actor.sender);
        let _ = actor.worker.await;
        actor.sink.close().await;
        debug!(message = "receiver closed", receiver = %name);
    }

    /// Closes every receiver, in registration order.
    pub async fn close_all(&self) {
        let names = self.order.lock().expect("registry mutex poisoned").drain(..).collect::<Vec<_>>();
        for name in names {
            self.close(&name).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::sample_event;
    use crate::sinks::InMemorySink;

    #[tokio::test]
    async fn send_to_unknown_receiver_is_a_no_op() {
        let registry = Registry::new(10);
        registry.send("nonexistent", sample_event());
    }

    #[tokio::test]
    async fn registered_receiver_receives_events_in_order() {
        let registry = Registry::new(10);
        let sink = Arc::new(InMemorySink::start());
        registry.register("r1", sink.clone());

        let mut a = sample_event();
        a.name = "a".to_owned();
        let mut b = sample_event();
        b.name = "b".to_owned();
        registry.send("r1", a);
        registry.send("r1", b);

        registry.drain("r1", Duration::from_secs(1)).await.unwrap();
        let names: Vec<_> = sink.events().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[tokio::test]
    async fn drain_on_empty_queue_returns_immediately() {
        let registry = Registry::new(10);
        let sink = Arc::new(InMemorySink::start());
        registry.register("r1", sink);
        registry.drain("r1", Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn close_removes_receiver_and_cancels_waiters() {
        let registry = Registry::new(10);
        let sink = Arc::new(InMemorySink::start());
        registry.register("r1", sink);
        registry.close("r1").await;
        // Further sends to a closed receiver are dropped, not panics.
        registry.send("r1", sample_event());
    }

    #[tokio::test]
    async fn close_all_is_idempotent_with_no_receivers() {
        let registry = Registry::new(10);
        registry.close_all().await;
    }
}
