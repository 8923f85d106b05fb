use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::EntityId;
use crate::resource::Resource;

/// A staff account managed from the admin screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub staff_number: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// URL of the uploaded profile photo.
    #[serde(default)]
    pub photo: Option<String>,
}

impl Resource for User {
    const PATH: &'static str = "users";
    const COLLECTION_KEY: &'static str = "users";
    const RECORD_KEY: &'static str = "user";

    fn id(&self) -> EntityId {
        self.id
    }

    fn search_fields(&self) -> Vec<&str> {
        [
            self.first_name.as_deref(),
            self.last_name.as_deref(),
            self.email.as_deref(),
            self.staff_number.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Choices the user form offers (`GET /users/form-options`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFormOptions {
    #[serde(default)]
    pub roles: Vec<serde_json::Value>,
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
    #[serde(default)]
    pub locations: Vec<serde_json::Value>,
}

/// Payload of the "new user" form.
///
/// Sent as multipart (the form may carry a photo) with the backend's
/// camelCase field names; `permissions` goes out as repeated `permissions[]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub last_name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub staff_number: String,
    #[serde(default)]
    pub roles: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub locations: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub personal_code: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserDraft {
    pub fn validate(&self) -> DomainResult<()> {
        if self.password != self.confirm_password {
            return Err(DomainError::validation("Passwords do not match"));
        }
        if self.email.trim().is_empty() {
            return Err(DomainError::validation("Email is required"));
        }
        Ok(())
    }
}
