//! Cached mirrors of server collections.
//!
//! One generic [`ResourceStore`] serves every entity. Reads go straight to
//! the API; writes go through the [`OfflineQueue`] so they are parked instead
//! of lost when the client is offline.
//!
//! Store operations never hand errors back to UI code. Failures are reported
//! through the [`Notifier`], recorded in `Collection::error`, and the
//! previous cached state is kept.

pub mod payments;
pub mod users;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use freightdesk_core::{EntityId, Pagination, Resource, WriteId, matches_search};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::envelope::{EnvelopeError, EnvelopeShape, decode_list, decode_record};
use crate::http::{RequestBody, RequestError, ResourceClient};
use crate::notify::Notifier;
use crate::queue::{OfflineQueue, QueueError, Refetch, ReplayHint, SendOutcome, WriteRequest};

/// Local copy of one page of a server collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<T> {
    /// Server order; never re-sorted locally.
    pub items: Vec<T>,
    pub pagination: Pagination,
    /// Query filters sent with every fetch.
    pub filters: BTreeMap<String, String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Collection<T> {
    fn new(pagination: Pagination) -> Self {
        Self {
            items: Vec::new(),
            pagination,
            filters: BTreeMap::new(),
            is_loading: false,
            error: None,
        }
    }
}

/// Result of a write issued through a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The server accepted the write and the cache reflects it.
    Applied,
    /// Parked in the offline queue; the cache is untouched until replay.
    Queued(WriteId),
    /// The write failed; the cache is untouched.
    Rejected,
}

impl WriteOutcome {
    /// Whether the UI may treat the action as done (close the form, ...).
    pub fn accepted(&self) -> bool {
        !matches!(self, WriteOutcome::Rejected)
    }
}

/// Overrides for a single fetch. Values given here stick for later fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchQuery {
    pub filters: Option<BTreeMap<String, String>>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl FetchQuery {
    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }
}

/// Why a fetch failed; reported only if its response is still current.
enum FetchFailure {
    Decode(EnvelopeError),
    Request(RequestError),
}

/// Cached mirror of the `T::PATH` collection.
pub struct ResourceStore<T: Resource> {
    client: Arc<ResourceClient>,
    queue: Arc<OfflineQueue>,
    notifier: Arc<dyn Notifier>,
    envelope: EnvelopeShape,
    state: RwLock<Collection<T>>,
    /// Bumped by every fetch; a response for an older generation is dropped.
    generation: AtomicU64,
}

impl<T: Resource> core::fmt::Debug for ResourceStore<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResourceStore")
            .field("resource", &T::PATH)
            .field("envelope", &self.envelope)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<T: Resource> ResourceStore<T> {
    pub fn new(
        client: Arc<ResourceClient>,
        queue: Arc<OfflineQueue>,
        notifier: Arc<dyn Notifier>,
        envelope: EnvelopeShape,
        page_size: u32,
    ) -> Self {
        let pagination = Pagination::new(page_size).unwrap_or_default();
        Self {
            client,
            queue,
            notifier,
            envelope,
            state: RwLock::new(Collection::new(pagination)),
            generation: AtomicU64::new(0),
        }
    }

    fn collection_path() -> String {
        format!("/{}", T::PATH)
    }

    fn record_path(id: EntityId) -> String {
        format!("/{}/{}", T::PATH, id)
    }

    fn refetch_hint() -> ReplayHint {
        ReplayHint::refetch(T::PATH)
    }

    /// Copy of the current cache.
    pub async fn snapshot(&self) -> Collection<T> {
        self.state.read().await.clone()
    }

    pub async fn items(&self) -> Vec<T> {
        self.state.read().await.items.clone()
    }

    pub async fn pagination(&self) -> Pagination {
        self.state.read().await.pagination
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.is_loading
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Cached entry with the given id, if it is on the loaded page.
    pub async fn get(&self, id: EntityId) -> Option<T> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Entries on the loaded page matching `term` (case-insensitive, any
    /// display field). No network call.
    pub async fn search(&self, term: &str) -> Vec<T> {
        self.state
            .read()
            .await
            .items
            .iter()
            .filter(|item| matches_search(*item, term))
            .cloned()
            .collect()
    }

    /// Page requested by the next fetch. Returns `false` for page 0.
    pub async fn set_page(&self, page: u32) -> bool {
        self.state.write().await.pagination.set_page(page).is_ok()
    }

    /// Always rewinds to page 1. Returns `false` for a zero size.
    pub async fn set_page_size(&self, page_size: u32) -> bool {
        self.state
            .write()
            .await
            .pagination
            .set_page_size(page_size)
            .is_ok()
    }

    /// Merge filters into the current set and rewind to page 1. An empty
    /// value removes that filter.
    pub async fn set_filters<I, K, V>(&self, filters: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = self.state.write().await;
        for (name, value) in filters {
            let (name, value) = (name.into(), value.into());
            if value.is_empty() {
                state.filters.remove(&name);
            } else {
                state.filters.insert(name, value);
            }
        }
        state.pagination.rewind();
    }

    /// Re-fetch the current page with the current filters.
    pub async fn fetch(&self) -> bool {
        self.fetch_with(FetchQuery::default()).await
    }

    /// Load one page from the server, replacing the cache wholesale.
    ///
    /// Returns whether the store now holds fresh data. A response overtaken
    /// by a later fetch is discarded and reported as `false`.
    pub async fn fetch_with(&self, query: FetchQuery) -> bool {
        let (generation, params, page_size) = {
            let mut state = self.state.write().await;

            // Size first: changing it rewinds to page 1.
            let mut pagination = state.pagination;
            let mut invalid = None;
            if let Some(size) = query.page_size {
                invalid = pagination.set_page_size(size).err();
            }
            if let (None, Some(page)) = (&invalid, query.page) {
                invalid = pagination.set_page(page).err();
            }
            if let Some(err) = invalid {
                drop(state);
                self.notifier.error(err.to_string());
                return false;
            }

            state.pagination = pagination;
            if let Some(filters) = query.filters {
                state.filters = filters;
            }
            state.is_loading = true;
            state.error = None;

            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let mut params: Vec<(String, String)> = state
                .filters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            params.push(("page".to_string(), state.pagination.page().to_string()));
            params.push((
                "per_page".to_string(),
                state.pagination.page_size().to_string(),
            ));
            (generation, params, state.pagination.page_size())
        };

        let result = match self.client.get(&Self::collection_path(), &params).await {
            Ok(body) => decode_list::<T>(self.envelope, body, page_size).map_err(FetchFailure::Decode),
            Err(err) => Err(FetchFailure::Request(err)),
        };

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(resource = T::PATH, generation, "discarding superseded fetch response");
            return false;
        }
        state.is_loading = false;

        match result {
            Ok(page) => {
                tracing::debug!(
                    resource = T::PATH,
                    count = page.items.len(),
                    page = page.meta.current_page,
                    "fetched page"
                );
                state.items = page.items;
                state.pagination.apply(page.meta);
                true
            }
            Err(FetchFailure::Decode(err)) => {
                tracing::warn!(resource = T::PATH, "undecodable list response: {err}");
                let message = format!("Unexpected response while loading {}: {err}", T::PATH);
                self.notifier.error(message.clone());
                state.error = Some(message);
                false
            }
            Err(FetchFailure::Request(err)) => {
                state.error = Some(self.describe_failure(&format!("load {}", T::PATH), &err));
                false
            }
        }
    }

    /// Create a record from any serializable draft.
    pub async fn add<P: Serialize + ?Sized>(&self, draft: &P) -> WriteOutcome {
        match json_body(draft) {
            Ok(body) => self.add_body(body).await,
            Err(message) => self.reject_local(message).await,
        }
    }

    /// Create a record from a prepared body (JSON or multipart).
    ///
    /// On success the current page is re-fetched to pick up server-derived
    /// fields.
    pub async fn add_body(&self, body: RequestBody) -> WriteOutcome {
        let request =
            WriteRequest::post(Self::collection_path(), body).with_hint(Self::refetch_hint());

        match self.queue.enqueue_or_send(request).await {
            Ok(SendOutcome::Sent(_)) => {
                self.notifier.success(format!("{} created", label::<T>()));
                self.fetch().await;
                WriteOutcome::Applied
            }
            Ok(SendOutcome::Queued(id)) => WriteOutcome::Queued(id),
            Err(err) => self.reject(&format!("create {}", label::<T>()), err).await,
        }
    }

    /// Update a record and splice the server's representation into the
    /// cache. Other entries are left alone.
    pub async fn edit<P: Serialize + ?Sized>(&self, id: EntityId, patch: &P) -> WriteOutcome {
        match json_body(patch) {
            Ok(body) => self.edit_body(id, body).await,
            Err(message) => self.reject_local(message).await,
        }
    }

    pub async fn edit_body(&self, id: EntityId, body: RequestBody) -> WriteOutcome {
        let request = WriteRequest::put(Self::record_path(id), body).with_hint(Self::refetch_hint());

        match self.queue.enqueue_or_send(request).await {
            Ok(SendOutcome::Sent(response)) => {
                match decode_record::<T>(response) {
                    Ok(record) => {
                        let mut state = self.state.write().await;
                        if let Some(slot) = state.items.iter_mut().find(|item| item.id() == id) {
                            *slot = record;
                        }
                        state.error = None;
                    }
                    Err(err) => {
                        tracing::debug!(resource = T::PATH, %id, "edit response carried no record ({err}); refetching");
                        self.fetch().await;
                    }
                }
                self.notifier.success(format!("{} updated", label::<T>()));
                WriteOutcome::Applied
            }
            Ok(SendOutcome::Queued(write_id)) => WriteOutcome::Queued(write_id),
            Err(err) => self.reject(&format!("update {}", label::<T>()), err).await,
        }
    }

    /// Delete a record; the cached entry goes and `total_count` drops by one.
    pub async fn delete(&self, id: EntityId) -> WriteOutcome {
        let request = WriteRequest::delete(Self::record_path(id)).with_hint(Self::refetch_hint());

        match self.queue.enqueue_or_send(request).await {
            Ok(SendOutcome::Sent(_)) => {
                {
                    let mut state = self.state.write().await;
                    state.items.retain(|item| item.id() != id);
                    state.pagination.record_removal();
                    state.error = None;
                }
                self.notifier.success(format!("{} deleted", label::<T>()));
                WriteOutcome::Applied
            }
            Ok(SendOutcome::Queued(write_id)) => WriteOutcome::Queued(write_id),
            Err(err) => self.reject(&format!("delete {}", label::<T>()), err).await,
        }
    }

    /// Delete several records in one call, then re-fetch.
    pub async fn bulk_delete(&self, ids: &[EntityId]) -> WriteOutcome {
        if ids.is_empty() {
            return WriteOutcome::Applied;
        }

        let body = RequestBody::json(serde_json::json!({ "ids": ids }));
        let request = WriteRequest::post(format!("/{}/bulk-delete", T::PATH), body)
            .with_hint(Self::refetch_hint());

        match self.queue.enqueue_or_send(request).await {
            Ok(SendOutcome::Sent(_)) => {
                self.notifier
                    .success(format!("{} {} record(s) deleted", ids.len(), T::PATH));
                self.fetch().await;
                WriteOutcome::Applied
            }
            Ok(SendOutcome::Queued(write_id)) => WriteOutcome::Queued(write_id),
            Err(err) => self.reject(&format!("delete {}", T::PATH), err).await,
        }
    }

    /// Send a write that is not plain CRUD on this collection (payment
    /// processing, reminders). Re-fetches on success when `refetch` is set.
    pub(crate) async fn send_action(
        &self,
        request: WriteRequest,
        action: &str,
        success: String,
        refetch: bool,
    ) -> WriteOutcome {
        let request = if refetch {
            request.with_hint(Self::refetch_hint())
        } else {
            request
        };

        match self.queue.enqueue_or_send(request).await {
            Ok(SendOutcome::Sent(_)) => {
                self.notifier.success(success);
                if refetch {
                    self.fetch().await;
                }
                WriteOutcome::Applied
            }
            Ok(SendOutcome::Queued(write_id)) => WriteOutcome::Queued(write_id),
            Err(err) => self.reject(action, err).await,
        }
    }

    pub(crate) fn client(&self) -> &Arc<ResourceClient> {
        &self.client
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub(crate) async fn reject_local(&self, message: String) -> WriteOutcome {
        self.state.write().await.error = Some(message.clone());
        self.notifier.error(message);
        WriteOutcome::Rejected
    }

    async fn reject(&self, action: &str, err: QueueError) -> WriteOutcome {
        let message = match &err {
            QueueError::Request(request_err) => self.describe_failure(action, request_err),
            other => {
                tracing::error!(resource = T::PATH, "failed to {action}: {other}");
                let message = format!("Failed to {action}: {other}");
                self.notifier.error(message.clone());
                message
            }
        };
        self.state.write().await.error = Some(message.clone());
        WriteOutcome::Rejected
    }

    /// Notify the user about a failed request and return the message to
    /// record in `error`.
    fn describe_failure(&self, action: &str, err: &RequestError) -> String {
        report_failure(self.notifier.as_ref(), action, err)
    }
}

/// Notify per the error class and return a one-line summary.
///
/// Validation errors produce one notice per message.
pub(crate) fn report_failure(notifier: &dyn Notifier, action: &str, err: &RequestError) -> String {
    if err.is_unauthorized() {
        let message = "Your session has expired. Please sign in again.".to_string();
        notifier.warning(message.clone());
        return message;
    }
    if err.is_forbidden() {
        let message = format!("You do not have permission to {action}.");
        notifier.error(message.clone());
        return message;
    }

    let validation = err.validation_messages();
    if !validation.is_empty() {
        for message in &validation {
            notifier.error(message.clone());
        }
        return validation.join("; ");
    }

    tracing::warn!("failed to {action}: {err}");
    let message = format!("Failed to {action}: {err}");
    notifier.error(message.clone());
    message
}

fn json_body<P: Serialize + ?Sized>(value: &P) -> Result<RequestBody, String> {
    serde_json::to_value(value)
        .map(RequestBody::json)
        .map_err(|e| format!("could not encode request: {e}"))
}

fn label<T: Resource>() -> String {
    let mut chars = T::RECORD_KEY.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[async_trait]
impl<T: Resource> Refetch for ResourceStore<T> {
    async fn refetch(&self) {
        self.fetch().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightdesk_core::model::{Cargo, Client};

    #[test]
    fn only_rejections_are_not_accepted() {
        assert!(WriteOutcome::Applied.accepted());
        assert!(WriteOutcome::Queued(WriteId::new()).accepted());
        assert!(!WriteOutcome::Rejected.accepted());
    }

    #[test]
    fn fetch_query_collects_filters() {
        let q = FetchQuery::default()
            .filter("status", "active")
            .filter("location", "Nairobi")
            .page(3)
            .page_size(25);
        let filters = q.filters.unwrap();
        assert_eq!(filters.get("status").map(String::as_str), Some("active"));
        assert_eq!(filters.len(), 2);
        assert_eq!(q.page, Some(3));
        assert_eq!(q.page_size, Some(25));
    }

    #[test]
    fn labels_capitalize_record_key() {
        assert_eq!(label::<Client>(), "Client");
        assert_eq!(label::<Cargo>(), "Cargo");
    }

    #[test]
    fn paths_follow_resource_segment() {
        assert_eq!(ResourceStore::<Client>::collection_path(), "/clients");
        assert_eq!(ResourceStore::<Client>::record_path(EntityId::new(7)), "/clients/7");
    }
}
