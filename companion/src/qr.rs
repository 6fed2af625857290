//! QR tag import: image decoding seam and `otpauth://` URI parsing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::tokens::{TotpAlgorithm, TotpConfig};

use crate::error::CompanionError;

/// Value stored under the QR picker key once the user chooses an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePick {
    pub image_uri: String,
}

/// Turns a picked image into the text encoded in its QR tag.
pub trait QrTagDecoder {
    fn decode(&mut self, image_uri: &str) -> Result<String, CompanionError>;
}

/// Decoder answering from a fixed table and recording every request.
#[derive(Debug, Clone, Default)]
pub struct MemoryQrDecoder {
    tags: BTreeMap<String, String>,
    pub requests: Vec<String>,
}

impl MemoryQrDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, image_uri: &str, text: &str) -> Self {
        self.tags.insert(image_uri.to_owned(), text.to_owned());
        self
    }
}

impl QrTagDecoder for MemoryQrDecoder {
    fn decode(&mut self, image_uri: &str) -> Result<String, CompanionError> {
        self.requests.push(image_uri.to_owned());
        self.tags
            .get(image_uri)
            .cloned()
            .ok_or_else(|| CompanionError::QrDecode(format!("no QR tag found in {image_uri}")))
    }
}

const OTPAUTH_SCHEME: &str = "otpauth://";

/// Parse `otpauth://totp/<issuer>:<label>?secret=..&issuer=..&algorithm=..&digits=..&period=..`.
///
/// The `issuer` parameter wins over the label prefix. Missing optional parameters take the
/// usual defaults; the result is not validated beyond parsing.
pub fn parse_otpauth(uri: &str) -> Result<TotpConfig, CompanionError> {
    let uri = uri.trim();
    let rest = uri
        .get(..OTPAUTH_SCHEME.len())
        .filter(|scheme| scheme.eq_ignore_ascii_case(OTPAUTH_SCHEME))
        .map(|_| &uri[OTPAUTH_SCHEME.len()..])
        .ok_or_else(|| otpauth_error("missing otpauth:// scheme"))?;

    let (kind, rest) = rest
        .split_once('/')
        .ok_or_else(|| otpauth_error("missing token type"))?;
    if !kind.eq_ignore_ascii_case("totp") {
        return Err(otpauth_error(format!("unsupported token type '{kind}'")));
    }

    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let path = decode_component(path)?;
    let (mut issuer, label) = match path.split_once(':') {
        Some((issuer, label)) => (issuer.trim().to_owned(), label.trim().to_owned()),
        None => (String::new(), path.trim().to_owned()),
    };

    let mut config = TotpConfig::new(label, String::new(), String::new());
    let mut secret = None;
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_component(value)?;
        match key.to_ascii_lowercase().as_str() {
            "secret" => secret = Some(value),
            "issuer" => issuer = value.trim().to_owned(),
            "algorithm" => {
                config.algorithm = TotpAlgorithm::from_tag(&value)
                    .map_err(|err| otpauth_error(err.to_string()))?;
            }
            "digits" => config.digits = parse_number(key, &value)?,
            "period" => config.period = parse_number(key, &value)?,
            other => log::debug!("ignoring otpauth parameter '{other}'"),
        }
    }

    config.issuer = issuer;
    config.secret = secret
        .ok_or_else(|| otpauth_error("missing secret parameter"))?
        .into();
    Ok(config)
}

fn decode_component(raw: &str) -> Result<String, CompanionError> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|err| otpauth_error(err.to_string()))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CompanionError> {
    value
        .trim()
        .parse()
        .map_err(|_| otpauth_error(format!("{key} is not a number: '{value}'")))
}

fn otpauth_error(message: impl Into<String>) -> CompanionError {
    CompanionError::Otpauth(message.into())
}
