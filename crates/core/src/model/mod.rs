//! Records served by the logistics backend.
//!
//! Fields mirror the backend's snake_case JSON. Everything the backend may
//! omit is an `Option`, so older or partial payloads still decode.

pub mod cargo;
pub mod clients;
pub mod dashboard;
pub mod locations;
pub mod measurements;
pub mod payments;
pub mod transports;
pub mod users;

pub use cargo::Cargo;
pub use clients::Client;
pub use dashboard::{DashboardMetrics, DashboardSnapshot, LocationScope, MonthlyBucket};
pub use locations::Location;
pub use measurements::Measurement;
pub use payments::{Payment, PaymentStatus};
pub use transports::Transport;
pub use users::{User, UserDraft, UserFormOptions};
