use serde::{Deserialize, Serialize};

use crate::id::EntityId;
use crate::resource::Resource;

/// Settlement state of a cargo invoice, computed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Pending,
    #[serde(other)]
    Unknown,
}

/// Outstanding or settled balance for one consignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: EntityId,
    pub cargo_id: Option<EntityId>,
    pub cargo_number: Option<String>,
    pub client_name: Option<String>,
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default)]
    pub amount_pending: f64,
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub days_overdue: i64,
    #[serde(default)]
    pub paid_this_month: bool,
}

impl Payment {
    /// Overdue beyond the reminder threshold used on the payments screen.
    pub fn is_overdue(&self) -> bool {
        self.days_overdue > 30 && self.payment_status != Some(PaymentStatus::Paid)
    }
}

impl Resource for Payment {
    const PATH: &'static str = "payments";
    const COLLECTION_KEY: &'static str = "payments";
    const RECORD_KEY: &'static str = "payment";

    fn id(&self) -> EntityId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        [self.cargo_number.as_deref(), self.client_name.as_deref()]
            .into_iter()
            .flatten()
            .collect()
    }
}
