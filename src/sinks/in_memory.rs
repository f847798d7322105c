//! Stores events in insertion order; doubles as the `inMemory` sink variant
//! and as the fixture end-to-end tests assert against (spec.md §6, §8).

use super::{Sink, SinkError};
use crate::event::Event;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemorySink {
    events: Mutex<Vec<Event>>,
}

impl InMemorySink {
    pub fn start() -> Self {
        Self::default()
    }

    /// Snapshots the events received so far, in delivery order.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("in-memory sink mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("in-memory sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn send(&self, event: &Event) -> Result<(), SinkError> {
        self.events
            .lock()
            .expect("in-memory sink mutex poisoned")
            .push(event.clone());
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::test_util::sample_event;

    #[tokio::test]
    async fn stores_events_in_insertion_order() {
        let sink = InMemorySink::start();
        let mut a = sample_event();
        a.name = "a".to_owned();
        let mut b = sample_event();
        b.name = "b".to_owned();
        sink.send(&a).await.unwrap();
        sink.send(&b).await.unwrap();
        let names: Vec<_> = sink.events().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
    }
}
