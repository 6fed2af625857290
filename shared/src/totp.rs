use alloc::{format, string::String, vec::Vec};

use data_encoding::BASE32_NOPAD;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::tokens::{TotpAlgorithm, TotpConfig};

/// Period used when a token does not specify one.
pub const DEFAULT_PERIOD: u16 = 30;

/// Rendered in place of a code that could not be computed.
pub const PLACEHOLDER_CODE: &str = "--- ---";

/// Resulting TOTP code and metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TotpCode {
    pub code: String,
    pub period: u16,
    pub remaining_ms: u32,
}

/// Errors returned while generating a TOTP value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TotpError {
    #[error("secret is not valid base32")]
    InvalidSecret,
    #[error("unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("digits must be between 6 and 8")]
    UnsupportedDigits,
    #[error("period must be greater than zero")]
    InvalidPeriod,
}

/// Signed offset between the wearable clock and true time.
///
/// Stored in milliseconds; the time bucket arithmetic truncates to whole seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockDrift(i64);

impl ClockDrift {
    pub const ZERO: ClockDrift = ClockDrift(0);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Fractional seconds are kept to millisecond precision.
    pub fn from_secs_f64(seconds: f64) -> Self {
        Self((seconds * 1_000.0) as i64)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    /// Wall-clock milliseconds with the drift applied.
    pub fn apply(self, unix_time_ms: u64) -> i64 {
        (unix_time_ms as i64).saturating_add(self.0)
    }
}

/// Compute the current code for `config` at `unix_time_ms`, corrected by `drift`.
pub fn compute_code(
    config: &TotpConfig,
    unix_time_ms: u64,
    drift: ClockDrift,
) -> Result<String, TotpError> {
    let adjusted = drift.apply(unix_time_ms).max(0) as u64;
    generate(config, adjusted).map(|code| code.code)
}

/// Generate a RFC 6238 compliant TOTP code for the provided configuration.
pub fn generate(config: &TotpConfig, unix_time_ms: u64) -> Result<TotpCode, TotpError> {
    if !(6..=8).contains(&config.digits) {
        return Err(TotpError::UnsupportedDigits);
    }
    if config.period == 0 {
        return Err(TotpError::InvalidPeriod);
    }

    let secret = decode_secret(&config.secret).ok_or(TotpError::InvalidSecret)?;
    let counter = time_step(unix_time_ms, config.period);
    let digest = hmac_digest(config.algorithm, &secret, &counter.to_be_bytes())?;
    let code_value = truncate(&digest, config.digits as u32);
    let code = format!("{:0width$}", code_value, width = config.digits as usize);

    let period_ms = config.period as u64 * 1_000;
    let elapsed = unix_time_ms % period_ms;
    let remaining = (period_ms - elapsed) as u32;

    Ok(TotpCode {
        code,
        period: config.period,
        remaining_ms: remaining,
    })
}

/// RFC 6238 counter: whole periods elapsed since the epoch.
fn time_step(unix_time_ms: u64, period: u16) -> u64 {
    (unix_time_ms / 1_000) / period as u64
}

/// Position inside the current period as a fraction in `[0, 1)`.
///
/// Drives the progress indicator only; code correctness never depends on it.
pub fn period_progress(period: u16, unix_time_ms: u64, drift: ClockDrift) -> f64 {
    if period == 0 {
        return 0.0;
    }
    let period_ms = period as i64 * 1_000;
    let within = drift.apply(unix_time_ms).rem_euclid(period_ms);
    within as f64 / period_ms as f64
}

/// Split a code into two groups for display: `123 456`, `123 4567`, `1234 5678`.
pub fn format_code(code: &str) -> String {
    if code.len() < 2 || !code.is_ascii() {
        return String::from(code);
    }
    let (head, tail) = code.split_at(code.len() / 2);
    format!("{head} {tail}")
}

/// Decode a base32 secret, tolerating whitespace, lowercase, and `=` padding.
pub fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    let normalized: String = secret
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace() && *ch != '=')
        .map(|ch| ch.to_ascii_uppercase())
        .collect();
    if normalized.is_empty() {
        return None;
    }
    BASE32_NOPAD.decode(normalized.as_bytes()).ok()
}

fn hmac_digest(
    algorithm: TotpAlgorithm,
    key: &[u8],
    message: &[u8],
) -> Result<Vec<u8>, TotpError> {
    match algorithm {
        TotpAlgorithm::Sha1 => sign::<Hmac<Sha1>>(key, message),
        TotpAlgorithm::Sha256 => sign::<Hmac<Sha256>>(key, message),
        TotpAlgorithm::Sha512 => sign::<Hmac<Sha512>>(key, message),
    }
}

fn sign<M>(key: &[u8], message: &[u8]) -> Result<Vec<u8>, TotpError>
where
    M: Mac + KeyInit,
{
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| TotpError::InvalidSecret)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// RFC 4226 dynamic truncation.
fn truncate(digest: &[u8], digits: u32) -> u32 {
    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | digest[offset + 3] as u32;
    binary % 10u32.pow(digits)
}
