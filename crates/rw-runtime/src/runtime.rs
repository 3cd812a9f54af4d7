//! Service process wiring.
//!
//! ## Startup Sequence
//!
//! 1. Validate dispatch configuration and directory coverage
//! 2. Connect the broker (Redis when `broker_url` is set, else in-process)
//!    and create the envelope publisher
//! 3. Connect the response listener (results topic)
//! 4. Build the invoker
//! 5. Connect one responder per hosted service
//!
//! Every consumer loop is connected before `start` returns, so requests
//! published afterwards cannot be missed.

use crate::config::RuntimeConfig;
use crate::handlers::{auth_table, users_table, AuthService, UserStore};
use anyhow::{bail, Context, Result};
use futures::future::select_all;
use rw_dispatch::{
    spawn_responder, spawn_response_listener, ConsumerTask, CorrelationRegistry, DispatchError,
    HandlerTable, Invoker, ReqwestRestTransport, Responder, ServiceDirectory,
};
use rw_telemetry::{OtelPropagator, TracePropagator};
use shared_bus::{Broker, EnvelopePublisher, EventPublisher, InMemoryBroker, RedisBroker};
use shared_types::dto::{GetUserByUsernameRequest, ValidateRequest};
use shared_types::operations::{GetUserByUsername, ValidateRequestOp};
use shared_types::{OperationId, ServiceName, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How long shutdown waits for consumer loops to stop.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Name used by self-check requests; never a real user or token.
const SELF_CHECK_NAME: &str = "__self_check__";

/// A running service process.
pub struct ServiceRuntime {
    services: Vec<ServiceName>,
    invoker: Invoker,
    users: Option<Arc<UserStore>>,
    tasks: Vec<(String, ConsumerTask)>,
    shutdown_tx: watch::Sender<bool>,
}

impl ServiceRuntime {
    /// Connect the configured broker, then wire and start everything
    /// `config` asks for.
    pub async fn start(config: &RuntimeConfig, directory: ServiceDirectory) -> Result<Self> {
        let broker: Arc<dyn Broker> = match &config.broker_url {
            Some(url) => Arc::new(
                RedisBroker::connect(url)
                    .await
                    .context("Failed to connect to the Redis broker")?,
            ),
            None => {
                if !config.hosts_all() {
                    warn!(
                        services = ?config.services,
                        "Services are split across processes but RW_BROKER_URL is unset; \
                         calls to services hosted elsewhere will time out"
                    );
                }
                Arc::new(InMemoryBroker::new())
            }
        };
        Self::start_with_broker(config, directory, broker).await
    }

    /// Like [`ServiceRuntime::start`] on an existing broker.
    pub async fn start_with_broker(
        config: &RuntimeConfig,
        directory: ServiceDirectory,
        broker: Arc<dyn Broker>,
    ) -> Result<Self> {
        config
            .dispatch
            .validate()
            .context("Invalid dispatch configuration")?;

        let required: Vec<OperationId> = config
            .services
            .iter()
            .flat_map(|service| OperationId::for_service(*service))
            .collect();
        directory
            .ensure_covers(&required)
            .context("Service directory does not cover the hosted services")?;
        let directory = Arc::new(directory);

        let propagator: Arc<dyn TracePropagator> = Arc::new(OtelPropagator);
        let publisher: Arc<dyn EventPublisher> =
            Arc::new(EnvelopePublisher::new(broker.clone(), propagator.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let registry = CorrelationRegistry::new();
        let listener = spawn_response_listener(
            broker.as_ref(),
            registry.clone(),
            &config.dispatch,
            shutdown_rx.clone(),
        )
        .await
        .context("Failed to connect response listener")?;
        tasks.push(("response-listener".to_string(), listener));

        let invoker = Invoker::builder(directory.clone(), registry, publisher.clone())
            .rest(Arc::new(ReqwestRestTransport::new()))
            .propagator(propagator.clone())
            .config(config.dispatch.clone())
            .build();

        let mut users = None;
        for service in &config.services {
            let table = match service {
                ServiceName::Users => {
                    let store = Arc::new(UserStore::new());
                    users = Some(store.clone());
                    users_table(store)?
                }
                ServiceName::Auth => {
                    let auth = AuthService::new(invoker.clone(), config.internal_transport);
                    auth_table(Arc::new(auth))?
                }
                other => bail!("{other} cannot be hosted by this runtime"),
            };
            let task = Self::spawn_service(
                broker.as_ref(),
                &directory,
                table,
                publisher.clone(),
                propagator.clone(),
                config,
                shutdown_rx.clone(),
            )
            .await?;
            tasks.push((service.to_string(), task));
        }

        info!(
            services = ?config.services,
            consumers = tasks.len(),
            "Service runtime started"
        );

        Ok(Self {
            services: config.services.clone(),
            invoker,
            users,
            tasks,
            shutdown_tx,
        })
    }

    async fn spawn_service(
        broker: &dyn Broker,
        directory: &ServiceDirectory,
        table: HandlerTable,
        publisher: Arc<dyn EventPublisher>,
        propagator: Arc<dyn TracePropagator>,
        config: &RuntimeConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<ConsumerTask> {
        let service = table.service();
        let topic = directory
            .topic_of(service)
            .with_context(|| format!("No topic configured for {service}"))?
            .to_string();
        let responder = Responder::new(
            table,
            publisher,
            propagator,
            config.dispatch.results_topic.clone(),
        )
        .with_routes(directory.event_routes(service));
        spawn_responder(broker, &topic, responder, &config.dispatch, shutdown)
            .await
            .with_context(|| format!("Failed to connect {service} responder"))
    }

    /// Round-trip one request to a hosted service through the broker.
    ///
    /// Asks users for a user that does not exist, or auth to validate a
    /// token it never issued. Any typed answer proves the request reached
    /// the responder and its response came back. Skipped when nothing
    /// callable is hosted.
    pub async fn self_check(&self) -> Result<()> {
        let outcome = if self.services.contains(&ServiceName::Users) {
            let request = GetUserByUsernameRequest {
                username: SELF_CHECK_NAME.to_string(),
            };
            self.invoker
                .invoke::<GetUserByUsername>(Transport::Events, &request)
                .await
                .map(|_| ())
        } else if self.services.contains(&ServiceName::Auth) {
            let request = ValidateRequest {
                transport: Transport::Events,
                target: SELF_CHECK_NAME.to_string(),
                access_token: SELF_CHECK_NAME.to_string(),
            };
            self.invoker
                .invoke::<ValidateRequestOp>(Transport::Events, &request)
                .await
                .map(|_| ())
        } else {
            info!("Self-check skipped: no hosted service to call");
            return Ok(());
        };

        match outcome {
            Ok(()) | Err(DispatchError::Remote { .. }) => {
                info!("Self-check passed: broker round trip is healthy");
                Ok(())
            }
            Err(e) => bail!("Self-check failed: {e}"),
        }
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    /// Account store, when this process hosts the users service.
    pub fn users(&self) -> Option<&Arc<UserStore>> {
        self.users.as_ref()
    }

    /// Resolve when the first consumer loop stops, with its name and
    /// outcome. Pending forever if there are no consumers.
    pub async fn wait_for_failure(&mut self) -> (String, Result<()>) {
        if self.tasks.is_empty() {
            return std::future::pending().await;
        }
        let (outcome, index, remaining) =
            select_all(self.tasks.iter_mut().map(|(_, task)| task)).await;
        drop(remaining);
        let (name, _) = self.tasks.remove(index);
        let outcome = match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::Error::new(e)),
            Err(join) => Err(anyhow::anyhow!("consumer task panicked: {join}")),
        };
        (name, outcome)
    }

    /// Signal every consumer loop to stop and wait for them.
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");

        if self.shutdown_tx.send(true).is_err() {
            warn!("All consumer loops already stopped");
        }

        for (name, task) in self.tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!(consumer = %name, error = %e, "Consumer stopped with error"),
                Ok(Err(e)) => error!(consumer = %name, error = %e, "Consumer task panicked"),
                Err(_) => warn!(consumer = %name, "Consumer did not stop in time"),
            }
        }

        info!(pending = self.invoker.registry().pending_count(), "Shutdown complete");
    }
}
