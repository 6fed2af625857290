use alloc::string::String;

use super::model::TokenField;

/// Failures raised by [`TokenStore`](super::TokenStore) mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("a token with the same issuer, label, and secret already exists")]
    Duplicate,
    #[error("invalid {field}: {reason}")]
    Validation { field: TokenField, reason: String },
    #[error("token not found")]
    NotFound,
}

impl TokenError {
    pub fn validation(field: TokenField, reason: impl Into<String>) -> Self {
        TokenError::Validation {
            field,
            reason: reason.into(),
        }
    }
}
