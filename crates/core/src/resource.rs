//! Resource trait: one backend collection the generic store can mirror.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::id::EntityId;

/// A record type served by a REST collection endpoint.
pub trait Resource:
    Clone + core::fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Path segment under the API base, e.g. `clients` → `/clients`, `/clients/{id}`.
    const PATH: &'static str;

    /// Key the paginated collection sits under in the `named` envelope.
    const COLLECTION_KEY: &'static str;

    /// Key a single record sits under in write responses (`client`, `cargo`).
    const RECORD_KEY: &'static str;

    /// Server-assigned identifier.
    fn id(&self) -> EntityId;

    /// Display fields the client-side search looks at.
    fn search_fields(&self) -> Vec<&str>;
}

/// Case-insensitive substring match across a record's display fields.
///
/// An empty (or whitespace-only) term matches everything.
pub fn matches_search<T: Resource>(item: &T, term: &str) -> bool {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    item.search_fields()
        .into_iter()
        .any(|field| field.to_lowercase().contains(&needle))
}
