use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::resource::Resource;

/// A consignment booked for a client.
///
/// `weight_cbm`, `cargo_number` and `payment_status` are derived server-side;
/// the client only ever reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cargo {
    pub id: EntityId,
    #[serde(default)]
    pub cargo_number: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub cargo_name: Option<String>,
    #[serde(default)]
    pub client_id: Option<EntityId>,
    /// Client display name, when the backend embeds it.
    #[serde(default)]
    pub client: Option<String>,
    #[serde(default)]
    pub measurement_id: Option<EntityId>,
    #[serde(default)]
    pub transport_id: Option<EntityId>,
    #[serde(default)]
    pub transport_mode: Option<String>,
    #[serde(default)]
    pub origin_location_id: Option<EntityId>,
    #[serde(default)]
    pub destination_location_id: Option<EntityId>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub weight_cbm: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub packaging: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub eta: Option<String>,
}

impl Resource for Cargo {
    const PATH: &'static str = "cargo";
    const COLLECTION_KEY: &'static str = "cargo";
    const RECORD_KEY: &'static str = "cargo";

    fn id(&self) -> EntityId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        [
            self.cargo_number.as_deref(),
            self.tracking_number.as_deref(),
            self.cargo_name.as_deref(),
            self.client.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
