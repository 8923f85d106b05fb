//! Application context: every shared service, built once at start-up.

use std::sync::Arc;

use anyhow::Context;
use freightdesk_core::Resource;
use freightdesk_core::model::{Cargo, Client, Location, Measurement, Payment, Transport, User};

use crate::config::ClientConfig;
use crate::credentials::CredentialHolder;
use crate::dashboard::DashboardStore;
use crate::http::ResourceClient;
use crate::monitor::{ConnectivityMonitor, MonitorHandle};
use crate::notify::Notifier;
use crate::offline::Connectivity;
use crate::queue::{OfflineQueue, Refetch};
use crate::storage::{KeyValueStore, SqliteKeyValueStore, default_state_path};
use crate::store::ResourceStore;

/// Shared services handed to UI code by reference.
///
/// Construction order: storage → credentials → HTTP client → queue → stores.
/// Every resource store is registered as the target of its replay hints.
#[derive(Debug)]
pub struct AppContext {
    pub config: ClientConfig,
    pub storage: Arc<dyn KeyValueStore>,
    pub credentials: Arc<CredentialHolder>,
    pub client: Arc<ResourceClient>,
    pub connectivity: Connectivity,
    pub queue: Arc<OfflineQueue>,
    pub clients: Arc<ResourceStore<Client>>,
    pub cargo: Arc<ResourceStore<Cargo>>,
    pub locations: Arc<ResourceStore<Location>>,
    pub measurements: Arc<ResourceStore<Measurement>>,
    pub transports: Arc<ResourceStore<Transport>>,
    pub users: Arc<ResourceStore<User>>,
    pub payments: Arc<ResourceStore<Payment>>,
    pub dashboard: Arc<DashboardStore>,
}

impl AppContext {
    /// Open the SQLite state store named by `config` (or the default data
    /// directory) and build the context on top of it.
    pub async fn open(config: ClientConfig, notifier: Arc<dyn Notifier>) -> anyhow::Result<Self> {
        let path = match &config.state_path {
            Some(path) => path.clone(),
            None => default_state_path()?,
        };
        tracing::info!(path = %path.display(), "using state store");
        let storage = SqliteKeyValueStore::new(path);

        Self::with_storage(config, Arc::new(storage), notifier).await
    }

    /// Build the context over an existing store (tests use the in-memory one).
    pub async fn with_storage(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let credentials = Arc::new(
            CredentialHolder::load(storage.clone())
                .await
                .context("failed to restore credential")?,
        );
        let client = Arc::new(
            ResourceClient::new(&config.api_url, config.request_timeout, credentials.clone())
                .context("failed to build HTTP client")?,
        );
        let connectivity = Connectivity::default();
        let queue = Arc::new(
            OfflineQueue::load(
                client.clone(),
                storage.clone(),
                connectivity.clone(),
                notifier.clone(),
                config.max_replay_attempts,
            )
            .await
            .context("failed to restore offline queue")?,
        );

        let ctx = Self {
            clients: store(&config, &client, &queue, &notifier),
            cargo: store(&config, &client, &queue, &notifier),
            locations: store(&config, &client, &queue, &notifier),
            measurements: store(&config, &client, &queue, &notifier),
            transports: store(&config, &client, &queue, &notifier),
            users: store(&config, &client, &queue, &notifier),
            payments: store(&config, &client, &queue, &notifier),
            dashboard: Arc::new(DashboardStore::new(client.clone(), notifier.clone())),
            config,
            storage,
            credentials,
            client,
            connectivity,
            queue,
        };

        register(&ctx.queue, &ctx.clients);
        register(&ctx.queue, &ctx.cargo);
        register(&ctx.queue, &ctx.locations);
        register(&ctx.queue, &ctx.measurements);
        register(&ctx.queue, &ctx.transports);
        register(&ctx.queue, &ctx.users);
        register(&ctx.queue, &ctx.payments);

        Ok(ctx)
    }

    /// Start replaying the queue on every Offline→Online edge.
    pub fn start_monitor(&self) -> MonitorHandle {
        ConnectivityMonitor::new(self.queue.clone())
            .with_retry_interval(self.config.replay_retry_interval)
            .start()
    }
}

fn store<T: Resource>(
    config: &ClientConfig,
    client: &Arc<ResourceClient>,
    queue: &Arc<OfflineQueue>,
    notifier: &Arc<dyn Notifier>,
) -> Arc<ResourceStore<T>> {
    Arc::new(ResourceStore::new(
        client.clone(),
        queue.clone(),
        notifier.clone(),
        config.envelope,
        config.page_size,
    ))
}

fn register<T: Resource>(queue: &OfflineQueue, store: &Arc<ResourceStore<T>>) {
    let target: Arc<dyn Refetch> = store.clone();
    queue.register_target(T::PATH, &target);
}
