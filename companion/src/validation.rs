//! Per-field checks and validation messages for the manual entry form.
//!
//! Messages live in the settings channel next to the inputs so the settings UI can render them;
//! a missing key means the field is valid.

use shared::tokens::{MAX_DIGITS, MIN_DIGITS, TokenField, TotpAlgorithm, TotpConfig};
use shared::totp::{self, DEFAULT_PERIOD};

use crate::error::CompanionError;
use crate::fields::read_field;
use crate::keys::{NEW_TOKEN_VALIDATION_KEY, QR_TAG_VALIDATION_KEY, validation_key};
use crate::settings::{SettingsStorage, write_json};

/// Snapshot of the manual entry inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTokenForm {
    pub label: Option<String>,
    pub issuer: Option<String>,
    pub secret: Option<String>,
    pub algorithm: Option<String>,
    pub digits: Option<String>,
    pub period: Option<String>,
}

impl NewTokenForm {
    pub fn read<S>(settings: &S) -> Result<Self, CompanionError>
    where
        S: SettingsStorage + ?Sized,
    {
        Ok(Self {
            label: read_field(settings, TokenField::Label)?,
            issuer: read_field(settings, TokenField::Issuer)?,
            secret: read_field(settings, TokenField::Secret)?,
            algorithm: read_field(settings, TokenField::Algorithm)?,
            digits: read_field(settings, TokenField::Digits)?,
            period: read_field(settings, TokenField::Period)?,
        })
    }

    pub fn input(&self, field: TokenField) -> Option<&str> {
        match field {
            TokenField::Label => self.label.as_deref(),
            TokenField::Issuer => self.issuer.as_deref(),
            TokenField::Secret => self.secret.as_deref(),
            TokenField::Algorithm => self.algorithm.as_deref(),
            TokenField::Digits => self.digits.as_deref(),
            TokenField::Period => self.period.as_deref(),
        }
    }

    /// Every failing field with its message, in form order.
    pub fn failures(&self) -> Vec<(TokenField, String)> {
        TokenField::ALL
            .into_iter()
            .filter_map(|field| check_field(field, self.input(field)).err().map(|msg| (field, msg)))
            .collect()
    }

    /// Build the configuration, filling defaults for the optional fields.
    pub fn to_config(&self) -> Result<TotpConfig, Vec<(TokenField, String)>> {
        let failures = self.failures();
        if !failures.is_empty() {
            return Err(failures);
        }

        let mut config = TotpConfig::new(
            self.label.clone().unwrap_or_default(),
            self.issuer.clone().unwrap_or_default(),
            self.secret.clone().unwrap_or_default(),
        );
        config.algorithm = parse_algorithm(self.algorithm.as_deref()).unwrap_or_default();
        config.digits = parse_digits(self.digits.as_deref()).unwrap_or(MIN_DIGITS);
        config.period = parse_period(self.period.as_deref()).unwrap_or(DEFAULT_PERIOD);
        Ok(config)
    }
}

/// Check one trimmed input; `None` stands for an empty field.
pub fn check_field(field: TokenField, input: Option<&str>) -> Result<(), String> {
    match field {
        TokenField::Label => input.map(|_| ()).ok_or_else(|| "Label is required".to_owned()),
        TokenField::Issuer => Ok(()),
        TokenField::Secret => match input {
            None => Err("Secret is required".to_owned()),
            Some(secret) if totp::decode_secret(secret).is_none() => {
                Err("Secret must be a base32 string".to_owned())
            }
            Some(_) => Ok(()),
        },
        TokenField::Algorithm => parse_algorithm(input)
            .map(|_| ())
            .map_err(|_| "Algorithm must be one of SHA1, SHA256, SHA512".to_owned()),
        TokenField::Digits => parse_digits(input)
            .map(|_| ())
            .map_err(|_| format!("Digits must be between {MIN_DIGITS} and {MAX_DIGITS}")),
        TokenField::Period => parse_period(input)
            .map(|_| ())
            .map_err(|_| "Period must be a positive number of seconds".to_owned()),
    }
}

fn parse_algorithm(input: Option<&str>) -> Result<TotpAlgorithm, ()> {
    input.map_or(Ok(TotpAlgorithm::Sha1), |tag| {
        TotpAlgorithm::from_tag(tag).map_err(|_| ())
    })
}

fn parse_digits(input: Option<&str>) -> Result<u8, ()> {
    match input {
        None => Ok(MIN_DIGITS),
        Some(raw) => raw
            .parse::<u8>()
            .ok()
            .filter(|digits| (MIN_DIGITS..=MAX_DIGITS).contains(digits))
            .ok_or(()),
    }
}

fn parse_period(input: Option<&str>) -> Result<u16, ()> {
    match input {
        None => Ok(DEFAULT_PERIOD),
        Some(raw) if raw.bytes().all(|byte| byte.is_ascii_digit()) => {
            raw.parse::<u16>().ok().filter(|period| *period > 0).ok_or(())
        }
        Some(_) => Err(()),
    }
}

/// Write or clear the message under one field.
pub fn report<S>(
    settings: &mut S,
    field: TokenField,
    outcome: &Result<(), String>,
) -> Result<(), CompanionError>
where
    S: SettingsStorage + ?Sized,
{
    set_message(settings, validation_key(field), outcome.as_ref().err())
}

/// Write `message` under `key`, or remove the key when there is none.
pub fn set_message<S>(
    settings: &mut S,
    key: &str,
    message: Option<&String>,
) -> Result<(), CompanionError>
where
    S: SettingsStorage + ?Sized,
{
    match message {
        Some(message) => write_json(settings, key, message),
        None => settings.remove_item(key),
    }
}

/// Clear the per-field and form-level messages of the manual entry form.
pub fn clear_manual_messages<S>(settings: &mut S) -> Result<(), CompanionError>
where
    S: SettingsStorage + ?Sized,
{
    for field in TokenField::ALL {
        settings.remove_item(validation_key(field))?;
    }
    settings.remove_item(NEW_TOKEN_VALIDATION_KEY)
}

/// Clear every validation message, including the QR import one.
pub fn clear_all_messages<S>(settings: &mut S) -> Result<(), CompanionError>
where
    S: SettingsStorage + ?Sized,
{
    clear_manual_messages(settings)?;
    settings.remove_item(QR_TAG_VALIDATION_KEY)
}
