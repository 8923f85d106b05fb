//! `freightdesk-core`: domain vocabulary shared by the sync layer.
//!
//! This crate contains **pure** types (no HTTP, no storage): entity records as
//! the backend serves them, the credential model, pagination state and the
//! `Resource` trait that lets one generic store serve every collection.

pub mod credential;
pub mod error;
pub mod id;
pub mod model;
pub mod page;
pub mod resource;

pub use credential::{Credential, Role, UserProfile};
pub use error::{DomainError, DomainResult};
pub use id::{EntityId, WriteId};
pub use page::{PageMeta, Pagination};
pub use resource::{Resource, matches_search};
