//! Payment actions beyond plain CRUD.

use freightdesk_core::EntityId;
use freightdesk_core::model::Payment;

use super::{ResourceStore, WriteOutcome};
use crate::http::{Method, RequestBody};
use crate::queue::WriteRequest;

impl ResourceStore<Payment> {
    /// Record a payment against a cargo's outstanding balance.
    pub async fn process(&self, cargo_id: EntityId, amount: f64) -> WriteOutcome {
        if !amount.is_finite() || amount <= 0.0 {
            return self
                .reject_local("Select a payment and enter an amount".to_string())
                .await;
        }

        let body = RequestBody::json(serde_json::json!({
            "cargoId": cargo_id,
            "amount": amount,
        }));
        self.send_action(
            WriteRequest::post("/payments/process", body),
            "process payment",
            "Payment processed successfully".to_string(),
            true,
        )
        .await
    }

    /// Ask the backend to send the client a payment reminder.
    pub async fn remind(&self, id: EntityId) -> WriteOutcome {
        self.send_action(
            WriteRequest::new(Method::Post, format!("/payments/{id}/remind"), None),
            "send reminder",
            "Reminder sent".to_string(),
            false,
        )
        .await
    }

    /// Payments on the loaded page that are past the reminder threshold.
    pub async fn overdue(&self) -> Vec<Payment> {
        self.items()
            .await
            .into_iter()
            .filter(Payment::is_overdue)
            .collect()
    }
}
