use alloc::{borrow::ToOwned, collections::BTreeMap, format, string::String, vec::Vec};
use core::fmt;
use core::ops::Deref;

use data_encoding::HEXLOWER;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::errors::TokenError;
use crate::totp::{self, TotpError};

/// Digit counts accepted for generated codes.
pub const MIN_DIGITS: u8 = 6;
pub const MAX_DIGITS: u8 = 8;

/// Hash function used by the HMAC step of the TOTP computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TotpAlgorithm {
    #[default]
    #[serde(rename = "SHA1", alias = "sha1")]
    Sha1,
    #[serde(rename = "SHA256", alias = "sha256")]
    Sha256,
    #[serde(rename = "SHA512", alias = "sha512")]
    Sha512,
}

impl TotpAlgorithm {
    /// Stable tag used in settings values and otpauth URIs.
    pub const fn as_str(self) -> &'static str {
        match self {
            TotpAlgorithm::Sha1 => "SHA1",
            TotpAlgorithm::Sha256 => "SHA256",
            TotpAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Parse an algorithm tag, ignoring ASCII case and an optional dash (`SHA-256`).
    pub fn from_tag(tag: &str) -> Result<Self, TotpError> {
        let normalized: String = tag
            .trim()
            .chars()
            .filter(|ch| *ch != '-')
            .map(|ch| ch.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "SHA1" => Ok(TotpAlgorithm::Sha1),
            "SHA256" => Ok(TotpAlgorithm::Sha256),
            "SHA512" => Ok(TotpAlgorithm::Sha512),
            _ => Err(TotpError::UnsupportedAlgorithm(tag.to_owned())),
        }
    }
}

impl fmt::Display for TotpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrapper around sensitive strings that zeroize their memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(pub Zeroizing<String>);

impl SecretString {
    pub fn new(value: String) -> Self {
        Self(Zeroizing::new(value))
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value.to_owned())
    }
}

impl Deref for SecretString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

/// Fields of a token configuration, used to attribute validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenField {
    Label,
    Issuer,
    Secret,
    Algorithm,
    Digits,
    Period,
}

impl TokenField {
    pub const ALL: [TokenField; 6] = [
        TokenField::Label,
        TokenField::Issuer,
        TokenField::Secret,
        TokenField::Algorithm,
        TokenField::Digits,
        TokenField::Period,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            TokenField::Label => "label",
            TokenField::Issuer => "issuer",
            TokenField::Secret => "secret",
            TokenField::Algorithm => "algorithm",
            TokenField::Digits => "digits",
            TokenField::Period => "period",
        }
    }
}

impl fmt::Display for TokenField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time based OTP configuration for a single account.
///
/// Records are replaced wholesale; the store never patches individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotpConfig {
    pub label: String,
    #[serde(default)]
    pub issuer: String,
    pub secret: SecretString,
    #[serde(default)]
    pub algorithm: TotpAlgorithm,
    #[serde(deserialize_with = "number_or_string")]
    pub digits: u8,
    #[serde(deserialize_with = "number_or_string")]
    pub period: u16,
}

impl TotpConfig {
    /// Build a configuration with the default algorithm, six digits, and a 30 second period.
    pub fn new(
        label: impl Into<String>,
        issuer: impl Into<String>,
        secret: impl Into<SecretString>,
    ) -> Self {
        Self {
            label: label.into(),
            issuer: issuer.into(),
            secret: secret.into(),
            algorithm: TotpAlgorithm::Sha1,
            digits: MIN_DIGITS,
            period: totp::DEFAULT_PERIOD,
        }
    }

    /// Stable identity derived from issuer, label, and secret.
    pub fn id(&self) -> TokenId {
        TokenId::of(self)
    }

    /// Format checks applied before a configuration enters the store.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.label.trim().is_empty() {
            return Err(TokenError::validation(TokenField::Label, "label must not be empty"));
        }
        if !(MIN_DIGITS..=MAX_DIGITS).contains(&self.digits) {
            return Err(TokenError::validation(
                TokenField::Digits,
                format!("digits must be between {MIN_DIGITS} and {MAX_DIGITS}"),
            ));
        }
        if self.period == 0 {
            return Err(TokenError::validation(
                TokenField::Period,
                "period must be a positive number of seconds",
            ));
        }
        if totp::decode_secret(&self.secret).is_none() {
            return Err(TokenError::validation(
                TokenField::Secret,
                "secret is not valid base32",
            ));
        }
        Ok(())
    }

    /// Name shown when no override has been set.
    pub fn default_display_name(&self) -> String {
        if self.issuer.trim().is_empty() {
            self.label.clone()
        } else {
            format!("{}: {}", self.issuer, self.label)
        }
    }
}

/// Identity of a token: hex SHA-256 over issuer, label, and secret.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    pub fn of(config: &TotpConfig) -> Self {
        let mut hasher = Sha256::new();
        for part in [config.issuer.as_str(), config.label.as_str(), &*config.secret] {
            hasher.update((part.len() as u32).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        Self(HEXLOWER.encode(&hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializable view of the whole store, persisted by the companion and pushed to the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub tokens: Vec<TotpConfig>,
    #[serde(default, rename = "displayNames")]
    pub display_names: BTreeMap<TokenId, String>,
}

/// Settings values carry numbers either as JSON numbers or as numeric strings.
fn number_or_string<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + core::str::FromStr,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    let value = match Raw::deserialize(deserializer)? {
        Raw::Number(number) => T::try_from(number).ok(),
        Raw::Text(text) => text.trim().parse::<T>().ok(),
    };
    value.ok_or_else(|| serde::de::Error::custom("expected an unsigned integer"))
}
