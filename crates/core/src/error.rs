//! Errors raised by pure domain code (ids, pagination, form drafts).

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input the user can fix; the message is shown to them as is.
    #[error("{0}")]
    Validation(String),

    /// A string that does not parse as the named identifier type.
    #[error("invalid {kind}: {reason}")]
    InvalidId { kind: &'static str, reason: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(kind: &'static str, reason: impl ToString) -> Self {
        Self::InvalidId {
            kind,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_displayed_verbatim() {
        assert_eq!(
            DomainError::validation("Passwords do not match").to_string(),
            "Passwords do not match"
        );
        assert_eq!(
            DomainError::invalid_id("write id", "bad length").to_string(),
            "invalid write id: bad length"
        );
    }
}
