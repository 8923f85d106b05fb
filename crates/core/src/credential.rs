//! Session credential: bearer token plus the signed-in user's profile.

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// Role of the signed-in user.
///
/// The backend only distinguishes administrators from everyone else; any
/// unknown role string maps to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
    #[serde(other)]
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
            Role::Other => "other",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile of the signed-in user, as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_role")]
    pub role: Role,
    /// Location the user is stationed at; scopes what non-admins see.
    #[serde(default)]
    pub location: Option<String>,
}

fn default_role() -> Role {
    Role::Other
}

/// Bearer token plus cached profile.
///
/// A missing token means the session is unauthenticated, whatever `user`
/// still holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credential {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

impl Credential {
    pub fn new(token: impl Into<String>, user: UserProfile) -> Self {
        Self {
            token: Some(token.into()),
            user: Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Role of the authenticated user, if any.
    pub fn role(&self) -> Option<Role> {
        if !self.is_authenticated() {
            return None;
        }
        self.user.as_ref().map(|u| u.role)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }
}
