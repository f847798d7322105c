//! Binds the watcher, route evaluator, and registry into one supervised
//! process (spec.md §4.6): registry starts first (seeded from config), then
//! the watcher; shutdown runs in reverse, draining then closing every sink.

use crate::config::Config;
use crate::registry::{Registry, RegistryError};
use crate::route::CompiledRoute;
use crate::sinks::{self, Sink, SinkError};
use crate::watcher::source::{EventSource, SourceError};
use crate::watcher::Watcher;
use snafu::{ResultExt, Snafu};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Snafu)]
pub enum EngineError {
    #[snafu(display("failed to start receiver `{receiver}`: {source}"))]
    StartSink { receiver: String, source: SinkError },
    #[snafu(display("failed to start watcher: {source}"))]
    StartWatcher { source: SourceError },
}

pub struct Engine {
    registry: Arc<Registry>,
    watcher: Watcher,
    drain_timeout: Duration,
}

impl Engine {
    /// Starts the registry (one worker per configured receiver) and the
    /// watcher, wiring the watcher's callback to
    /// `route.process(route, stamp_cluster(event), registry.send)`.
    pub async fn start(config: Config, source: Arc<dyn EventSource>) -> Result<Self, EngineError> {
        let registry = Arc::new(Registry::new(config.max_queue_size as usize));

        for receiver in &config.receivers {
            let sink = sinks::build(&receiver.sink_type, &receiver.sink_config)
                .await
                .context(StartSinkSnafu {
                    receiver: receiver.name.clone(),
                })?;
            registry.register(&receiver.name, Arc::from(sink));
            info!(message = "receiver started", receiver = %receiver.name, sink_type = %receiver.sink_type);
        }

        let route = Arc::new(config.route.compile());
        let cluster_name = config.cluster_name.clone();
        let registry_for_callback = Arc::clone(&registry);

        let watcher = Watcher::start(
            source,
            config.namespace.clone(),
            config.max_event_age_seconds,
            config.omit_lookup,
            move |event| dispatch(&route, &cluster_name, &registry_for_callback, event),
        )
        .await
        .context(StartWatcherSnafu)?;

        info!(message = "watcher started", namespace = ?config.namespace);

        Ok(Self {
            registry,
            watcher,
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
        })
    }

    /// Returns a registered receiver's sink, if any — tests use this to
    /// downcast back to a concrete sink (e.g. `InMemorySink`) to assert on
    /// captured events.
    pub fn sink(&self, name: &str) -> Option<Arc<dyn Sink>> {
        self.registry.sink(name)
    }

    /// Waits until `name`'s queue is empty, or `timeout` elapses.
    pub async fn drain(&self, name: &str, timeout: Duration) -> Result<(), RegistryError> {
        self.registry.drain(name, timeout).await
    }

    /// Shutdown protocol (spec.md §4.6): stop the watcher, best-effort
    /// drain every queue, then close every sink.
    pub async fn shutdown(self) {
        info!(message = "shutting down: stopping watcher");
        self.watcher.stop().await;

        info!(message = "shutting down: draining receivers", timeout_ms = self.drain_timeout.as_millis() as u64);
        if let Err(err) = self.registry.drain_all(self.drain_timeout).await {
            tracing::warn!(message = "drain_all did not complete cleanly", %err);
        }

        info!(message = "shutting down: closing receivers");
        self.registry.close_all().await;
    }
}

fn dispatch(route: &CompiledRoute, cluster_name: &str, registry: &Registry, event: crate::event::Event) {
    let event = event.with_cluster_name(cluster_name);
    route.process(&event, &mut |receiver, event| {
        registry.send(receiver, event.clone());
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::watcher::mock::MockEventSource;
    use crate::watcher::source::{WatchKind, WatchMessage};
    use tokio::time::{sleep, Duration as TokioDuration};

    #[tokio::test]
    async fn starts_and_shuts_down_with_no_receivers() {
        let config = Config::parse("clusterName: test\nreceivers: []\n").unwrap();
        let source = Arc::new(MockEventSource::new());
        let engine = Engine::start(config, source).await.unwrap();
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn routes_events_from_watcher_to_registry() {
        let yaml = r#"
clusterName: test
route:
  match:
    - receiver: sink1
receivers:
  - name: sink1
    inMemory: {}
"#;
        let config = Config::parse(yaml).unwrap();
        let source = Arc::new(MockEventSource::new());
        source.push(WatchMessage {
            kind: WatchKind::Added,
            object: serde_json::json!({"metadata": {"name": "e1"}, "reason": "Created"}),
        });

        let engine = Engine::start(config, source).await.unwrap();
        sleep(TokioDuration::from_millis(50)).await;
        engine.registry.drain("sink1", TokioDuration::from_secs(1)).await.unwrap();
        engine.shutdown().await;
    }
}
