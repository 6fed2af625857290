use std::io;

use shared::error::SharedError;
use shared::tokens::TokenError;
use thiserror::Error;

/// Failures raised by the companion library.
#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("settings value under '{key}' is malformed: {source}")]
    MalformedValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("settings storage failed: {0}")]
    Storage(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("QR tag could not be decoded: {0}")]
    QrDecode(String),
    #[error("invalid otpauth URI: {0}")]
    Otpauth(String),
    #[error(transparent)]
    Shared(#[from] SharedError),
}

impl CompanionError {
    pub fn malformed(key: &str, source: serde_json::Error) -> Self {
        CompanionError::MalformedValue {
            key: key.to_owned(),
            source,
        }
    }
}

impl From<io::Error> for CompanionError {
    fn from(value: io::Error) -> Self {
        CompanionError::Storage(value.to_string())
    }
}
