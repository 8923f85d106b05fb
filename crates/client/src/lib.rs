//! `freightdesk-client`
//!
//! **Responsibility:** offline-aware synchronization between the logistics
//! dashboard and its REST backend.
//!
//! This crate provides:
//! - Cached resource stores (clients, cargo, payments, ...) with pagination
//! - A durable credential holder
//! - A durable offline write queue, replayed in order when connectivity returns
//! - The read-only dashboard metrics store
//!
//! The backend stays the authority; the client only mirrors pages of it.

pub mod app;
pub mod config;
pub mod credentials;
pub mod dashboard;
pub mod envelope;
pub mod http;
pub mod monitor;
pub mod notify;
pub mod offline;
pub mod queue;
pub mod storage;
pub mod store;

pub use app::AppContext;
pub use config::{ClientConfig, ConfigError};
pub use credentials::CredentialHolder;
pub use dashboard::{DashboardState, DashboardStore};
pub use envelope::EnvelopeShape;
pub use http::{FileField, FormPayload, Method, RequestBody, RequestError, ResourceClient};
pub use monitor::{ConnectivityMonitor, MonitorHandle};
pub use notify::{BufferedNotifier, Level, LogNotifier, Notice, Notifier};
pub use offline::{Connectivity, ConnectivityState, OfflineError};
pub use queue::{
    DeadLetter, OfflineQueue, QueueError, QueuedWrite, ReplayHint, ReplayReport, SendOutcome,
    WriteRequest,
};
pub use storage::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore, StorageError};
pub use store::{Collection, FetchQuery, ResourceStore, WriteOutcome};
