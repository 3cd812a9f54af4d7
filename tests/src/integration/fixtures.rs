//! Shared harness: an in-memory broker with a response listener and an
//! events-capable invoker, onto which tests mount responders.

use rw_dispatch::{
    spawn_responder, spawn_response_listener, ConsumerTask, CorrelationRegistry, DispatchConfig,
    HandlerTable, Invoker, Responder, ServiceDirectory,
};
use rw_telemetry::{NoopPropagator, TracePropagator};
use shared_bus::{ConsumerLoop, EnvelopePublisher, EventPublisher, InMemoryBroker, MessageHandler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Directory shipped with the runtime.
pub const SERVICES_TOML: &str = include_str!("../../../configs/services.toml");

pub fn directory() -> Arc<ServiceDirectory> {
    Arc::new(ServiceDirectory::from_toml_str(SERVICES_TOML).unwrap())
}

pub struct Harness {
    pub broker: Arc<InMemoryBroker>,
    pub publisher: Arc<dyn EventPublisher>,
    pub registry: CorrelationRegistry,
    pub invoker: Invoker,
    pub config: DispatchConfig,
    directory: Arc<ServiceDirectory>,
    propagator: Arc<dyn TracePropagator>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<ConsumerTask>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(DispatchConfig::default()).await
    }

    pub async fn with_config(config: DispatchConfig) -> Self {
        Self::build(config, directory(), Arc::new(NoopPropagator)).await
    }

    /// Harness whose callers and responders propagate trace context.
    pub async fn with_propagator(propagator: Arc<dyn TracePropagator>) -> Self {
        Self::build(DispatchConfig::default(), directory(), propagator).await
    }

    /// Harness routing through `directory` instead of the shipped one.
    pub async fn with_directory(directory: ServiceDirectory) -> Self {
        Self::build(
            DispatchConfig::default(),
            Arc::new(directory),
            Arc::new(NoopPropagator),
        )
        .await
    }

    async fn build(
        config: DispatchConfig,
        directory: Arc<ServiceDirectory>,
        propagator: Arc<dyn TracePropagator>,
    ) -> Self {
        let broker = Arc::new(InMemoryBroker::new());
        let publisher: Arc<dyn EventPublisher> =
            Arc::new(EnvelopePublisher::new(broker.clone(), propagator.clone()));
        let registry = CorrelationRegistry::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let listener = spawn_response_listener(
            broker.as_ref(),
            registry.clone(),
            &config,
            shutdown_rx.clone(),
        )
        .await
        .unwrap();

        let invoker = Invoker::builder(directory.clone(), registry.clone(), publisher.clone())
            .propagator(propagator.clone())
            .config(config.clone())
            .build();

        Self {
            broker,
            publisher,
            registry,
            invoker,
            config,
            directory,
            propagator,
            shutdown_tx,
            shutdown_rx,
            tasks: vec![listener],
        }
    }

    /// Serve `table` on its service's request topic, resolving request
    /// keys through the directory's event names.
    pub async fn serve(&mut self, table: HandlerTable) {
        let service = table.service();
        let topic = self.directory.topic_of(service).unwrap().to_string();
        let responder = Responder::new(
            table,
            self.publisher.clone(),
            self.propagator.clone(),
            self.config.results_topic.clone(),
        )
        .with_routes(self.directory.event_routes(service));
        let task = spawn_responder(
            self.broker.as_ref(),
            &topic,
            responder,
            &self.config,
            self.shutdown_rx.clone(),
        )
        .await
        .unwrap();
        self.tasks.push(task);
    }

    /// Mount a hand-written consumer on `topic`.
    pub async fn serve_with(&mut self, topic: &str, handler: Arc<dyn MessageHandler>) {
        let consumer = ConsumerLoop::connect(self.broker.as_ref(), topic)
            .await
            .unwrap();
        self.tasks
            .push(tokio::spawn(consumer.run(handler, self.shutdown_rx.clone())));
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = tokio::time::timeout(Duration::from_secs(1), task).await;
        }
    }
}
