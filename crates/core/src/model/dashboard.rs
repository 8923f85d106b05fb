//! Read-only aggregates shown on the summary screen.

use serde::{Deserialize, Serialize};

use crate::credential::{Role, UserProfile};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyOverall {
    pub monthly: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CargoShipped {
    pub air: MonthlyOverall,
    pub sea: MonthlyOverall,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTotals {
    pub total_paid: f64,
    pub total_pending: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCounts {
    pub total: u64,
    pub repeating: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientMetrics {
    pub monthly: ClientCounts,
    pub overall: ClientCounts,
}

/// Aggregates computed server-side; never derived or patched locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub cargo_shipped: CargoShipped,
    pub payments: PaymentTotals,
    pub clients: ClientMetrics,
    pub revenue: MonthlyOverall,
}

/// One month of the chart series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBucket {
    pub month: String,
    #[serde(default)]
    pub air: f64,
    #[serde(default)]
    pub sea: f64,
    #[serde(default)]
    pub revenue: f64,
    #[serde(default)]
    pub clients: u64,
    #[serde(default)]
    pub repeating_clients: u64,
}

/// Body of `GET /dashboard`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub metrics: DashboardMetrics,
    #[serde(default)]
    pub monthly_data: Vec<MonthlyBucket>,
}

/// Which locations the aggregates cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationScope {
    All,
    Location(String),
}

impl LocationScope {
    /// Admins see every location; everyone else is pinned to their own.
    pub fn for_user(user: &UserProfile) -> Self {
        match (user.role, user.location.as_deref()) {
            (Role::Admin, _) => LocationScope::All,
            (_, Some(loc)) if !loc.trim().is_empty() => LocationScope::Location(loc.to_string()),
            _ => LocationScope::Location(String::new()),
        }
    }

    /// Value sent as the `location` query parameter.
    pub fn as_query(&self) -> &str {
        match self {
            LocationScope::All => "All",
            LocationScope::Location(loc) => loc,
        }
    }
}
