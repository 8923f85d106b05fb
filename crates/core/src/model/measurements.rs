use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::resource::Resource;

/// A billing unit (e.g. CBM, kilogram) cargo is measured in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: EntityId,
    pub name: String,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl Resource for Measurement {
    // The backend uses the singular path for this collection.
    const PATH: &'static str = "measurement";
    const COLLECTION_KEY: &'static str = "measurements";
    const RECORD_KEY: &'static str = "measurement";

    fn id(&self) -> EntityId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.unit.as_deref());
        fields
    }
}
