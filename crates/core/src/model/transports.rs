use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::resource::Resource;

/// A transport mode (air, sea, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transport {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
}

impl Resource for Transport {
    const PATH: &'static str = "transport";
    const COLLECTION_KEY: &'static str = "transports";
    const RECORD_KEY: &'static str = "transport";

    fn id(&self) -> EntityId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.description.as_deref());
        fields
    }
}
