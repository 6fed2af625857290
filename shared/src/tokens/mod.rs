//! Token configurations and the ordered store that owns them.
//!
//! The companion process is the single writer: it mutates a [`TokenStore`] in response to
//! settings events, persists it as a [`TokenSnapshot`], and pushes the snapshot to the device,
//! which replaces its read-only copy wholesale.

mod errors;
pub mod model;
mod store;

pub use errors::TokenError;
pub use model::{
    MAX_DIGITS, MIN_DIGITS, SecretString, TokenField, TokenId, TokenSnapshot, TotpAlgorithm,
    TotpConfig,
};
pub use store::TokenStore;
