//! Read-only store for the dashboard aggregates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use freightdesk_core::model::{DashboardSnapshot, LocationScope};
use tokio::sync::RwLock;

use crate::envelope::{EnvelopeError, decode_object};
use crate::http::{RequestError, ResourceClient};
use crate::notify::Notifier;
use crate::store::report_failure;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    /// `None` until the first successful fetch.
    pub snapshot: Option<DashboardSnapshot>,
    pub scope: Option<LocationScope>,
    pub is_loading: bool,
    pub error: Option<String>,
}

enum Failure {
    Decode(EnvelopeError),
    Request(RequestError),
}

/// Precomputed counts, sums and monthly series. Never mutated locally.
pub struct DashboardStore {
    client: Arc<ResourceClient>,
    notifier: Arc<dyn Notifier>,
    state: RwLock<DashboardState>,
    generation: AtomicU64,
}

impl core::fmt::Debug for DashboardStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DashboardStore")
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl DashboardStore {
    pub fn new(client: Arc<ResourceClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            notifier,
            state: RwLock::new(DashboardState::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    pub async fn snapshot(&self) -> Option<DashboardSnapshot> {
        self.state.read().await.snapshot.clone()
    }

    /// Load aggregates for `scope`, replacing the previous ones wholesale.
    ///
    /// On failure the previous aggregates stay in place.
    pub async fn fetch(&self, scope: LocationScope) -> bool {
        let generation = {
            let mut state = self.state.write().await;
            state.is_loading = true;
            state.error = None;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let query = [("location".to_string(), scope.as_query().to_string())];
        let result = match self.client.get("/dashboard", &query).await {
            Ok(body) => decode_object::<DashboardSnapshot>(body).map_err(Failure::Decode),
            Err(err) => Err(Failure::Request(err)),
        };

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(generation, "discarding superseded dashboard response");
            return false;
        }
        state.is_loading = false;

        match result {
            Ok(snapshot) => {
                state.snapshot = Some(snapshot);
                state.scope = Some(scope);
                true
            }
            Err(Failure::Decode(err)) => {
                tracing::warn!("undecodable dashboard response: {err}");
                let message = format!("Unexpected dashboard response: {err}");
                self.notifier.error(message.clone());
                state.error = Some(message);
                false
            }
            Err(Failure::Request(err)) => {
                state.error = Some(report_failure(self.notifier.as_ref(), "load dashboard", &err));
                false
            }
        }
    }

    /// Fetch with the scope the signed-in user is entitled to: every
    /// location for admins, their own otherwise.
    pub async fn fetch_for_current_user(&self) -> bool {
        let scope = match self.client.credentials().user() {
            Some(user) => LocationScope::for_user(&user),
            None => LocationScope::Location(String::new()),
        };
        self.fetch(scope).await
    }
}
