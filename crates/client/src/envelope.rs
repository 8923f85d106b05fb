//! List-response envelopes.
//!
//! The backend has served two shapes over time. A deployment declares which
//! one it speaks (see `ClientConfig::envelope`) and every store decodes with
//! that shape; nothing sniffs the payload to guess.

use std::str::FromStr;

use freightdesk_core::{PageMeta, Resource};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeShape {
    /// `{ "data": [...], "meta": { current_page, last_page, per_page, total } }`
    #[default]
    DataMeta,
    /// Laravel paginator under the collection key:
    /// `{ "<resource>": { "data": [...], current_page, last_page, per_page, total } }`
    Named,
}

impl FromStr for EnvelopeShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data-meta" | "data_meta" => Ok(EnvelopeShape::DataMeta),
            "named" => Ok(EnvelopeShape::Named),
            other => Err(format!("unknown envelope shape '{other}' (expected data-meta or named)")),
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("response is missing '{0}'")]
    Missing(String),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// One page of a collection as reported by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

/// Decode a list response.
///
/// `requested_page_size` only matters when the server omits pagination
/// metadata; the response is then treated as the single, complete page.
pub fn decode_list<T: Resource>(
    shape: EnvelopeShape,
    mut body: Value,
    requested_page_size: u32,
) -> Result<ListPage<T>, EnvelopeError> {
    let (data, meta) = match shape {
        EnvelopeShape::DataMeta => {
            let data = take(&mut body, "data")?;
            let meta = match body.get_mut("meta").map(Value::take) {
                Some(Value::Null) | None => None,
                Some(meta) => Some(serde_json::from_value::<PageMeta>(meta)?),
            };
            (data, meta)
        }
        EnvelopeShape::Named => {
            let mut paginator = take(&mut body, T::COLLECTION_KEY)?;
            let data = take(&mut paginator, "data")?;
            let meta = if paginator.get("current_page").is_some() {
                Some(serde_json::from_value::<PageMeta>(paginator)?)
            } else {
                None
            };
            (data, meta)
        }
    };

    let items: Vec<T> = serde_json::from_value(data)?;
    let meta = meta.unwrap_or_else(|| single_page(items.len(), requested_page_size));
    Ok(ListPage { items, meta })
}

/// Decode the record returned by a write (`{data: {...}}`, `{<record>: {...}}`
/// or the bare object).
pub fn decode_record<T: Resource>(mut body: Value) -> Result<T, EnvelopeError> {
    for key in ["data", T::RECORD_KEY] {
        if let Some(inner) = body.get_mut(key) {
            if inner.is_object() {
                return Ok(serde_json::from_value(inner.take())?);
            }
        }
    }
    if body.is_object() {
        return Ok(serde_json::from_value(body)?);
    }
    Err(EnvelopeError::Missing(T::RECORD_KEY.to_string()))
}

/// Decode a plain JSON object body.
pub fn decode_object<T: DeserializeOwned>(body: Value) -> Result<T, EnvelopeError> {
    Ok(serde_json::from_value(body)?)
}

fn take(body: &mut Value, key: &str) -> Result<Value, EnvelopeError> {
    match body.get_mut(key).map(Value::take) {
        Some(Value::Null) | None => Err(EnvelopeError::Missing(key.to_string())),
        Some(value) => Ok(value),
    }
}

fn single_page(len: usize, requested_page_size: u32) -> PageMeta {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    PageMeta {
        current_page: 1,
        last_page: 1,
        per_page: requested_page_size.max(len).max(1),
        total: u64::from(len),
    }
}
