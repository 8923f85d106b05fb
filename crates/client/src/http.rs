//! Authorized HTTP calls against the REST backend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use freightdesk_core::{Credential, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::credentials::CredentialHolder;
use crate::storage::StorageError;

/// HTTP verbs the backend contract uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Method::Get)
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl core::fmt::Display for Method {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file attached to a multipart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileField {
    /// Form field name (`photo`, `document`, ...).
    pub field: String,
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Multipart form body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPayload {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FileField>,
}

impl FormPayload {
    /// Flatten a JSON object into form fields.
    ///
    /// Arrays become repeated `key[]` parts, nulls are skipped, nested
    /// objects are sent as JSON text.
    pub fn from_json(value: &Value) -> Self {
        let mut form = Self::default();
        if let Value::Object(map) = value {
            for (key, v) in map {
                match v {
                    Value::Null => {}
                    Value::Array(items) => {
                        for item in items {
                            form.fields.push((format!("{key}[]"), scalar_text(item)));
                        }
                    }
                    other => form.fields.push((key.clone(), scalar_text(other))),
                }
            }
        }
        form
    }

    pub fn with_file(mut self, file: FileField) -> Self {
        self.files.push(file);
        self
    }

    fn into_form(self) -> Result<reqwest::multipart::Form, RequestError> {
        let mut form = reqwest::multipart::Form::new();
        for (key, value) in self.fields {
            form = form.text(key, value);
        }
        for file in self.files {
            let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name);
            if let Some(mime) = file.mime {
                part = part
                    .mime_str(&mime)
                    .map_err(|e| RequestError::Build(format!("invalid mime type '{mime}': {e}")))?;
            }
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        other => other.to_string(),
    }
}

/// Body of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestBody {
    Json { value: Value },
    Multipart { form: FormPayload },
}

impl RequestBody {
    pub fn json(value: Value) -> Self {
        RequestBody::Json { value }
    }

    pub fn multipart(form: FormPayload) -> Self {
        RequestBody::Multipart { form }
    }
}

/// Failure of a single request.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    /// No response was received (connection refused, DNS, timeout).
    #[error("network error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    #[error("request rejected ({status}){}", message_suffix(.message))]
    Status {
        status: u16,
        message: Option<String>,
        validation_errors: BTreeMap<String, Vec<String>>,
    },

    /// A 2xx response whose body could not be decoded.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    Build(String),

    /// A credential change could not be persisted.
    #[error("credential storage failed: {0}")]
    Storage(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RequestError::Transport(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    /// Worth attempting again later without changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            RequestError::Transport(_) => true,
            RequestError::Status { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    /// Field-level validation messages, flattened in field order.
    pub fn validation_messages(&self) -> Vec<String> {
        match self {
            RequestError::Status {
                validation_errors, ..
            } => validation_errors.values().flatten().cloned().collect(),
            _ => Vec::new(),
        }
    }
}

impl From<StorageError> for RequestError {
    fn from(err: StorageError) -> Self {
        RequestError::Storage(err.to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: UserProfile,
}

/// Thin wrapper over `reqwest` that speaks the backend's conventions.
///
/// The bearer token is read from the credential holder on every call, so a
/// login or logout takes effect for requests issued afterwards.
#[derive(Debug)]
pub struct ResourceClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialHolder>,
}

impl ResourceClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        credentials: Arc<CredentialHolder>,
    ) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Build(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialHolder> {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue one authorized request and return the parsed JSON body
    /// (`null` for an empty body).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&RequestBody>,
        query: &[(String, String)],
    ) -> Result<Value, RequestError> {
        let url = self.url(path);
        let mut req = self
            .http
            .request(method.to_reqwest(), &url)
            .header(reqwest::header::ACCEPT, "application/json");

        if !query.is_empty() {
            req = req.query(query);
        }

        let token = self.credentials.token();
        if let Some(token) = &token {
            req = req.bearer_auth(token);
        }

        req = match body {
            Some(RequestBody::Json { value }) => req.json(value),
            Some(RequestBody::Multipart { form }) => req.multipart(form.clone().into_form()?),
            None => req,
        };

        tracing::debug!(%method, %url, "sending request");
        let resp = req
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_str(&text).map_err(|e| RequestError::Decode(e.to_string()));
        }

        let parsed: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let err = RequestError::Status {
            status: status.as_u16(),
            message: parsed.message,
            validation_errors: parsed.errors,
        };

        if status == reqwest::StatusCode::UNAUTHORIZED && token.is_some() {
            tracing::warn!(%url, "token rejected; clearing stored credential");
            if let Err(storage_err) = self.credentials.clear().await {
                tracing::error!("failed to clear rejected credential: {storage_err}");
            }
        } else {
            tracing::debug!(%method, %url, status = status.as_u16(), "request rejected");
        }

        Err(err)
    }

    pub async fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value, RequestError> {
        self.request(Method::Get, path, None, query).await
    }

    pub async fn post(&self, path: &str, body: &RequestBody) -> Result<Value, RequestError> {
        self.request(Method::Post, path, Some(body), &[]).await
    }

    pub async fn put(&self, path: &str, body: &RequestBody) -> Result<Value, RequestError> {
        self.request(Method::Put, path, Some(body), &[]).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, RequestError> {
        self.request(Method::Delete, path, None, &[]).await
    }

    /// Exchange email/password for a bearer token and persist the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Credential, RequestError> {
        let body = RequestBody::json(serde_json::json!({
            "email": email,
            "password": password,
        }));
        let resp = self.post("/auth/login", &body).await?;
        let LoginResponse { token, user } =
            serde_json::from_value(resp).map_err(|e| RequestError::Decode(e.to_string()))?;

        let credential = Credential::new(token, user);
        self.credentials.store(credential.clone()).await?;
        tracing::info!(user_id = %credential.user.as_ref().map(|u| u.id.to_string()).unwrap_or_default(), "signed in");
        Ok(credential)
    }

    /// Forget the session locally. The backend keeps no session state we
    /// depend on.
    pub async fn logout(&self) -> Result<(), RequestError> {
        self.credentials.clear().await?;
        tracing::info!("signed out");
        Ok(())
    }
}
