//! Durable holder of the session credential.

use std::sync::{Arc, RwLock};

use freightdesk_core::{Credential, Role, UserProfile};
use tokio::sync::watch;

use crate::storage::{KeyValueStore, StorageError, get_json, set_json};

pub const TOKEN_KEY: &str = "authToken";
pub const USER_KEY: &str = "user";

/// Bearer token and user profile, mirrored to durable storage.
///
/// Reads are served from memory; every change is written through to the
/// store before it becomes visible.
#[derive(Debug)]
pub struct CredentialHolder {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<Credential>,
    /// Bumped whenever a token is stored (sign-in).
    sessions: watch::Sender<u64>,
}

impl CredentialHolder {
    /// Restore whatever session the store holds.
    ///
    /// A corrupt profile is dropped (the token alone still authenticates).
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let token = store.get(TOKEN_KEY).await?.filter(|t| !t.is_empty());
        let user = match get_json::<UserProfile>(store.as_ref(), USER_KEY).await {
            Ok(user) => user,
            Err(StorageError::Corrupt { reason, .. }) => {
                tracing::warn!("discarding unreadable stored profile: {reason}");
                None
            }
            Err(err) => return Err(err),
        };

        if token.is_some() {
            tracing::debug!("restored stored session");
        }

        Ok(Self {
            store,
            current: RwLock::new(Credential { token, user }),
            sessions: watch::Sender::new(0),
        })
    }

    pub fn snapshot(&self) -> Credential {
        self.read().clone()
    }

    /// Token to attach to requests, if the session is authenticated.
    pub fn token(&self) -> Option<String> {
        let current = self.read();
        if current.is_authenticated() {
            current.token.clone()
        } else {
            None
        }
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.read().has_role(role)
    }

    /// Persist a new session, then publish it.
    pub async fn store(&self, credential: Credential) -> Result<(), StorageError> {
        match &credential.token {
            Some(token) => self.store.set(TOKEN_KEY, token).await?,
            None => self.store.remove(TOKEN_KEY).await?,
        }
        match &credential.user {
            Some(user) => set_json(self.store.as_ref(), USER_KEY, user).await?,
            None => self.store.remove(USER_KEY).await?,
        }
        let signed_in = credential.is_authenticated();
        *self.write() = credential;
        if signed_in {
            self.sessions.send_modify(|n| *n += 1);
        }
        Ok(())
    }

    /// Notified each time a new session is stored.
    pub fn subscribe_sessions(&self) -> watch::Receiver<u64> {
        self.sessions.subscribe()
    }

    /// Forget the session (logout, or the server rejected the token).
    pub async fn clear(&self) -> Result<(), StorageError> {
        // Drop it from memory first so no further request carries the token
        // even if the store write fails.
        *self.write() = Credential::default();
        self.store.remove(TOKEN_KEY).await?;
        self.store.remove(USER_KEY).await?;
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Credential> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Credential> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
