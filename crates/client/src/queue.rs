//! Offline write queue.
//!
//! Writes issued while the client is offline are persisted under
//! `offlineQueue` and replayed in FIFO order once connectivity returns.
//! Replay is sequential: a write is only sent after the previous one has been
//! answered, so a create always lands before an update that targets it.
//!
//! A write that fails during replay is never silently dropped:
//! - transport failure: the pass stops, everything stays queued;
//! - 401: the pass stops until the user signs in again;
//! - 5xx/408/429: the attempt is counted and the write stays queued until
//!   `max_attempts`, after which it is dead-lettered;
//! - 404 on a DELETE: the record is already gone, so the write is done;
//! - any other rejection: dead-lettered immediately.
//!
//! While anything is queued, new writes join the tail instead of being sent
//! live, so they can never overtake an older write.
//!
//! Dead letters are persisted under `offlineQueue.deadLetters` and reported
//! to the user.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use freightdesk_core::WriteId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::http::{Method, RequestBody, RequestError, ResourceClient};
use crate::notify::Notifier;
use crate::offline::Connectivity;
use crate::storage::{KeyValueStore, StorageError, get_json, set_json};

pub const QUEUE_KEY: &str = "offlineQueue";
pub const DEAD_LETTER_KEY: &str = "offlineQueue.deadLetters";

/// What to do once a queued write has been accepted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplayHint {
    /// Re-fetch the store mirroring this resource path.
    Refetch { resource: String },
}

impl ReplayHint {
    pub fn refetch(resource: impl Into<String>) -> Self {
        ReplayHint::Refetch {
            resource: resource.into(),
        }
    }
}

/// A write as requested by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<RequestBody>,
    pub on_success: Option<ReplayHint>,
}

impl WriteRequest {
    pub fn post(path: impl Into<String>, body: RequestBody) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    pub fn put(path: impl Into<String>, body: RequestBody) -> Self {
        Self::new(Method::Put, path, Some(body))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    pub fn new(method: Method, path: impl Into<String>, body: Option<RequestBody>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            on_success: None,
        }
    }

    pub fn with_hint(mut self, hint: ReplayHint) -> Self {
        self.on_success = Some(hint);
        self
    }
}

/// A write parked in the durable queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedWrite {
    pub id: WriteId,
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub body: Option<RequestBody>,
    #[serde(default)]
    pub on_success: Option<ReplayHint>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedWrite {
    fn from_request(request: WriteRequest) -> Self {
        Self {
            id: WriteId::new(),
            method: request.method,
            path: request.path,
            body: request.body,
            on_success: request.on_success,
            attempts: 0,
            last_error: None,
            enqueued_at: Utc::now(),
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// A queued write the queue gave up on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub write: QueuedWrite,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Result of `enqueue_or_send`.
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// Sent immediately; carries the server's response body.
    Sent(Value),
    /// Accepted for later; no server result yet.
    Queued(WriteId),
}

/// Summary of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    pub synced: Vec<WriteId>,
    pub retained: Vec<WriteId>,
    pub dead_lettered: Vec<WriteId>,
    /// The pass stopped early (connectivity lost or session rejected).
    pub halted: bool,
}

impl ReplayReport {
    pub fn is_empty(&self) -> bool {
        self.synced.is_empty() && self.retained.is_empty() && self.dead_lettered.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("{0} is not a write method")]
    NotAWrite(Method),
    #[error("no dead letter with id {0}")]
    UnknownDeadLetter(WriteId),
}

/// Something a replay hint can point at (in practice a resource store).
#[async_trait]
pub trait Refetch: Send + Sync {
    async fn refetch(&self);
}

#[derive(Debug, Default)]
struct QueueState {
    pending: Vec<QueuedWrite>,
    dead: Vec<DeadLetter>,
}

enum Verdict {
    Synced,
    Retain(String),
    Dead(String),
    /// Stop the pass; `lost_connection` distinguishes transport from 401.
    Halt { reason: String, lost_connection: bool },
}

/// Durable FIFO of writes deferred while offline.
pub struct OfflineQueue {
    client: Arc<ResourceClient>,
    store: Arc<dyn KeyValueStore>,
    connectivity: Connectivity,
    notifier: Arc<dyn Notifier>,
    max_attempts: u32,
    state: tokio::sync::Mutex<QueueState>,
    /// Serializes replay passes; never taken while `state` is held.
    replay_lock: tokio::sync::Mutex<()>,
    /// Wakes the connectivity monitor for a pass outside an Online edge.
    wake: tokio::sync::Notify,
    targets: RwLock<HashMap<String, Weak<dyn Refetch>>>,
}

impl core::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("max_attempts", &self.max_attempts)
            .field("connectivity", &self.connectivity.state())
            .finish_non_exhaustive()
    }
}

impl OfflineQueue {
    /// Restore the queue (and its dead letters) from durable storage.
    pub async fn load(
        client: Arc<ResourceClient>,
        store: Arc<dyn KeyValueStore>,
        connectivity: Connectivity,
        notifier: Arc<dyn Notifier>,
        max_attempts: u32,
    ) -> Result<Self, QueueError> {
        let pending: Vec<QueuedWrite> = get_json(store.as_ref(), QUEUE_KEY).await?.unwrap_or_default();
        let mut dead: Vec<DeadLetter> = get_json(store.as_ref(), DEAD_LETTER_KEY)
            .await?
            .unwrap_or_default();
        // A requeue interrupted between its two saves leaves the write in both lists.
        let before = dead.len();
        dead.retain(|d| !pending.iter().any(|w| w.id == d.write.id));
        if dead.len() != before {
            tracing::warn!(duplicates = before - dead.len(), "dropping dead letters that are queued again");
        }

        if !pending.is_empty() || !dead.is_empty() {
            tracing::info!(
                pending = pending.len(),
                dead_letters = dead.len(),
                "restored offline queue"
            );
        }

        Ok(Self {
            client,
            store,
            connectivity,
            notifier,
            max_attempts: max_attempts.max(1),
            state: tokio::sync::Mutex::new(QueueState { pending, dead }),
            replay_lock: tokio::sync::Mutex::new(()),
            wake: tokio::sync::Notify::new(),
            targets: RwLock::new(HashMap::new()),
        })
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Session changes published by the credential holder.
    pub fn sessions(&self) -> tokio::sync::watch::Receiver<u64> {
        self.client.credentials().subscribe_sessions()
    }

    /// Ask the running monitor for a replay pass.
    pub fn request_replay(&self) {
        self.wake.notify_one();
    }

    pub(crate) async fn replay_requested(&self) {
        self.wake.notified().await;
    }

    /// Register the store that `ReplayHint::Refetch { resource }` refers to.
    ///
    /// Held weakly: the queue never keeps a store alive.
    pub fn register_target(&self, resource: impl Into<String>, target: &Arc<dyn Refetch>) {
        let mut targets = self.targets.write().unwrap_or_else(|p| p.into_inner());
        targets.insert(resource.into(), Arc::downgrade(target));
    }

    /// Send now when online; otherwise park the write and report it queued.
    ///
    /// Writes still waiting from earlier keep their place: while the queue is
    /// not empty a new write goes to its tail, and a replay is requested.
    /// A live send that never reaches the server also flips the client
    /// offline and parks the write instead of dropping it.
    pub async fn enqueue_or_send(&self, request: WriteRequest) -> Result<SendOutcome, QueueError> {
        if !request.method.is_write() {
            return Err(QueueError::NotAWrite(request.method));
        }

        if self.connectivity.is_offline() {
            let id = self.enqueue(request).await?;
            return Ok(SendOutcome::Queued(id));
        }

        if !self.is_empty().await {
            let id = self
                .park(
                    request,
                    "Earlier changes are still waiting to sync. This change was queued after them.",
                )
                .await?;
            if self.client.credentials().is_authenticated() {
                self.request_replay();
            }
            return Ok(SendOutcome::Queued(id));
        }

        match self
            .client
            .request(request.method, &request.path, request.body.as_ref(), &[])
            .await
        {
            Ok(body) => Ok(SendOutcome::Sent(body)),
            Err(err) if err.is_transport() => {
                tracing::warn!(
                    method = %request.method,
                    path = %request.path,
                    "send failed without a response ({err}); queueing"
                );
                self.connectivity.set_offline();
                let id = self.enqueue(request).await?;
                Ok(SendOutcome::Queued(id))
            }
            Err(err) => Err(QueueError::Request(err)),
        }
    }

    /// Append a write to the durable queue.
    pub async fn enqueue(&self, request: WriteRequest) -> Result<WriteId, QueueError> {
        self.park(
            request,
            "You are offline. The change was queued and will sync when the connection returns.",
        )
        .await
    }

    async fn park(&self, request: WriteRequest, notice: &str) -> Result<WriteId, QueueError> {
        if !request.method.is_write() {
            return Err(QueueError::NotAWrite(request.method));
        }

        let write = QueuedWrite::from_request(request);
        let id = write.id;
        let description = write.describe();
        {
            let mut state = self.state.lock().await;
            state.pending.push(write);
            if let Err(err) = self.persist_pending(&state).await {
                state.pending.retain(|w| w.id != id);
                return Err(err.into());
            }
        }

        tracing::info!(write_id = %id, "queued offline write: {description}");
        self.notifier.info(notice.to_string());
        Ok(id)
    }

    /// Writes waiting for replay, oldest first.
    pub async fn pending(&self) -> Vec<QueuedWrite> {
        self.state.lock().await.pending.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead.clone()
    }

    /// Move a dead letter back to the tail of the queue with a fresh budget.
    pub async fn retry_dead_letter(&self, id: WriteId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let pos = state
            .dead
            .iter()
            .position(|d| d.write.id == id)
            .ok_or(QueueError::UnknownDeadLetter(id))?;

        let letter = state.dead.remove(pos);
        let mut write = letter.write.clone();
        write.attempts = 0;
        write.last_error = None;
        state.pending.push(write);

        let saved = match self.persist_pending(&state).await {
            Ok(()) => self.persist_dead(&state).await,
            Err(err) => Err(err),
        };
        if let Err(err) = saved {
            state.pending.pop();
            state.dead.insert(pos, letter);
            if let Err(restore) = self.persist_pending(&state).await {
                tracing::error!(write_id = %id, "could not restore queue after failed requeue: {restore}");
            }
            return Err(err.into());
        }

        tracing::info!(write_id = %id, "dead letter requeued");
        Ok(())
    }

    /// Drop a dead letter for good.
    pub async fn discard_dead_letter(&self, id: WriteId) -> Result<DeadLetter, QueueError> {
        let mut state = self.state.lock().await;
        let pos = state
            .dead
            .iter()
            .position(|d| d.write.id == id)
            .ok_or(QueueError::UnknownDeadLetter(id))?;

        let letter = state.dead.remove(pos);
        self.persist_dead(&state).await?;
        tracing::info!(write_id = %id, "dead letter discarded");
        Ok(letter)
    }

    /// Replay every queued write in FIFO order.
    ///
    /// An empty queue is a no-op: no request is issued.
    pub async fn replay(&self) -> Result<ReplayReport, QueueError> {
        let _pass = self.replay_lock.lock().await;

        let snapshot = self.pending().await;
        let mut report = ReplayReport::default();
        if snapshot.is_empty() {
            return Ok(report);
        }

        tracing::info!(count = snapshot.len(), "replaying offline queue");
        let mut hints: Vec<ReplayHint> = Vec::new();
        let mut remaining = snapshot.into_iter();

        while let Some(write) = remaining.next() {
            if self.connectivity.is_offline() {
                report.halted = true;
                report.retained.push(write.id);
                report.retained.extend(remaining.by_ref().map(|w| w.id));
                break;
            }

            let verdict = match self
                .client
                .request(write.method, &write.path, write.body.as_ref(), &[])
                .await
            {
                Ok(_) => Verdict::Synced,
                Err(err) if write.method == Method::Delete && err.status() == Some(404) => {
                    tracing::debug!(write_id = %write.id, "{} already gone on the server", write.path);
                    Verdict::Synced
                }
                Err(err) if err.is_transport() || err.is_unauthorized() => Verdict::Halt {
                    reason: err.to_string(),
                    lost_connection: err.is_transport(),
                },
                Err(err) if err.is_retryable() => Verdict::Retain(err.to_string()),
                Err(err) => Verdict::Dead(describe_rejection(&err)),
            };

            match verdict {
                Verdict::Synced => {
                    self.settle(write.id).await?;
                    tracing::info!(write_id = %write.id, "replayed {}", write.describe());
                    if let Some(hint) = &write.on_success {
                        if !hints.contains(hint) {
                            hints.push(hint.clone());
                        }
                    }
                    report.synced.push(write.id);
                }
                Verdict::Retain(reason) => {
                    let exhausted = self.record_failure(write.id, &reason).await?;
                    if exhausted {
                        tracing::error!(
                            write_id = %write.id,
                            "giving up on {} after {} attempts: {reason}",
                            write.describe(),
                            self.max_attempts
                        );
                        report.dead_lettered.push(write.id);
                    } else {
                        tracing::warn!(write_id = %write.id, "replay of {} failed, will retry: {reason}", write.describe());
                        report.retained.push(write.id);
                    }
                }
                Verdict::Dead(reason) => {
                    tracing::error!(write_id = %write.id, "server rejected {}: {reason}", write.describe());
                    self.bury(write.id, reason).await?;
                    report.dead_lettered.push(write.id);
                }
                Verdict::Halt {
                    reason,
                    lost_connection,
                } => {
                    tracing::warn!(write_id = %write.id, "replay halted at {}: {reason}", write.describe());
                    self.note_error(write.id, &reason).await?;
                    report.halted = true;
                    report.retained.push(write.id);
                    report.retained.extend(remaining.by_ref().map(|w| w.id));
                    if lost_connection {
                        self.connectivity.set_offline();
                    } else {
                        self.notifier
                            .warning("Your session expired. Sign in again to sync queued changes.".to_string());
                    }
                    break;
                }
            }
        }

        self.announce(&report).await;
        self.dispatch(hints).await;

        tracing::info!(
            synced = report.synced.len(),
            retained = report.retained.len(),
            dead_lettered = report.dead_lettered.len(),
            halted = report.halted,
            "replay pass complete"
        );
        Ok(report)
    }

    async fn settle(&self, id: WriteId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.pending.retain(|w| w.id != id);
        self.persist_pending(&state).await?;
        Ok(())
    }

    /// Count a failed attempt. Returns `true` when the write was dead-lettered.
    async fn record_failure(&self, id: WriteId, reason: &str) -> Result<bool, QueueError> {
        let mut state = self.state.lock().await;
        let Some(pos) = state.pending.iter().position(|w| w.id == id) else {
            return Ok(false);
        };

        let write = &mut state.pending[pos];
        write.attempts += 1;
        write.last_error = Some(reason.to_string());

        if write.attempts >= self.max_attempts {
            let write = state.pending.remove(pos);
            state.dead.push(DeadLetter {
                write,
                reason: format!("gave up after {} attempts: {reason}", self.max_attempts),
                failed_at: Utc::now(),
            });
            self.persist_pending(&state).await?;
            self.persist_dead(&state).await?;
            return Ok(true);
        }

        self.persist_pending(&state).await?;
        Ok(false)
    }

    async fn note_error(&self, id: WriteId, reason: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if let Some(write) = state.pending.iter_mut().find(|w| w.id == id) {
            write.last_error = Some(reason.to_string());
        }
        self.persist_pending(&state).await?;
        Ok(())
    }

    async fn bury(&self, id: WriteId, reason: String) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let Some(pos) = state.pending.iter().position(|w| w.id == id) else {
            return Ok(());
        };

        let mut write = state.pending.remove(pos);
        write.attempts += 1;
        write.last_error = Some(reason.clone());
        state.dead.push(DeadLetter {
            write,
            reason,
            failed_at: Utc::now(),
        });
        self.persist_pending(&state).await?;
        self.persist_dead(&state).await?;
        Ok(())
    }

    async fn announce(&self, report: &ReplayReport) {
        if !report.synced.is_empty() {
            self.notifier
                .success(format!("{} queued change(s) synced", report.synced.len()));
        }

        if report.dead_lettered.is_empty() {
            return;
        }
        let state = self.state.lock().await;
        for id in &report.dead_lettered {
            if let Some(letter) = state.dead.iter().find(|d| d.write.id == *id) {
                self.notifier.error(format!(
                    "Could not sync {}: {}",
                    letter.write.describe(),
                    letter.reason
                ));
            }
        }
    }

    async fn dispatch(&self, hints: Vec<ReplayHint>) {
        for hint in hints {
            let ReplayHint::Refetch { resource } = &hint;
            let target = {
                let targets = self.targets.read().unwrap_or_else(|p| p.into_inner());
                targets.get(resource).and_then(Weak::upgrade)
            };
            match target {
                Some(target) => target.refetch().await,
                None => tracing::debug!(%resource, "no live store for replay hint"),
            }
        }
    }

    async fn persist_pending(&self, state: &QueueState) -> Result<(), StorageError> {
        if state.pending.is_empty() {
            self.store.remove(QUEUE_KEY).await
        } else {
            set_json(self.store.as_ref(), QUEUE_KEY, &state.pending).await
        }
    }

    async fn persist_dead(&self, state: &QueueState) -> Result<(), StorageError> {
        if state.dead.is_empty() {
            self.store.remove(DEAD_LETTER_KEY).await
        } else {
            set_json(self.store.as_ref(), DEAD_LETTER_KEY, &state.dead).await
        }
    }
}

fn describe_rejection(err: &RequestError) -> String {
    let messages = err.validation_messages();
    if messages.is_empty() {
        err.to_string()
    } else {
        format!("{err} ({})", messages.join("; "))
    }
}
