//! User management extras: form options and photo upload.

use freightdesk_core::model::{User, UserDraft, UserFormOptions};

use super::{ResourceStore, WriteOutcome, report_failure};
use crate::envelope::decode_object;
use crate::http::{FileField, FormPayload, RequestBody};

impl ResourceStore<User> {
    /// Roles, statuses and locations offered by the user form.
    ///
    /// Needs a signed-in session; returns `None` (and notifies) otherwise.
    pub async fn form_options(&self) -> Option<UserFormOptions> {
        if !self.client().credentials().is_authenticated() {
            self.notifier()
                .error("No authentication token found".to_string());
            return None;
        }

        match self.client().get("/users/form-options", &[]).await {
            Ok(body) => match decode_object::<UserFormOptions>(body) {
                Ok(options) => Some(options),
                Err(err) => {
                    tracing::warn!("undecodable form options: {err}");
                    self.notifier()
                        .error("Failed to load form options".to_string());
                    None
                }
            },
            Err(err) => {
                report_failure(self.notifier().as_ref(), "load form options", &err);
                None
            }
        }
    }

    /// Create a user from the form, optionally with a profile photo.
    ///
    /// Always sent as multipart, matching the backend's form endpoint.
    pub async fn add_user(&self, draft: &UserDraft, photo: Option<FileField>) -> WriteOutcome {
        if let Err(err) = draft.validate() {
            return self.reject_local(err.to_string()).await;
        }

        let value = match serde_json::to_value(draft) {
            Ok(value) => value,
            Err(err) => return self.reject_local(format!("could not encode user: {err}")).await,
        };

        let mut form = FormPayload::from_json(&value);
        if let Some(photo) = photo {
            form = form.with_file(photo);
        }
        self.add_body(RequestBody::multipart(form)).await
    }
}
