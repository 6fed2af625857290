use alloc::string::String;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("codec error: {0}")]
    Codec(String),
    #[error("link error: {0}")]
    Link(String),
}

impl From<serde_json::Error> for SharedError {
    fn from(value: serde_json::Error) -> Self {
        SharedError::Codec(value.to_string())
    }
}
