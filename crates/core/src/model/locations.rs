use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::resource::Resource;

/// A depot/station cargo moves between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: EntityId,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
}

impl Resource for Location {
    const PATH: &'static str = "locations";
    const COLLECTION_KEY: &'static str = "locations";
    const RECORD_KEY: &'static str = "location";

    fn id(&self) -> EntityId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.code.as_deref());
        fields
    }
}
