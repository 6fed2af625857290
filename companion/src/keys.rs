//! Settings key namespace interpreted by the companion.

use shared::tokens::TokenField;

pub const UPDATE_DISPLAY_NAME_KEY: &str = "updateDisplayName";
pub const ADD_TOKEN_MANUALLY_KEY: &str = "addTokenManually";
pub const ADD_TOKEN_VIA_QR_TAG_KEY: &str = "addTokenViaQrTag";
pub const RESET_KEY: &str = "reset";
pub const COMPENSATE_CLOCK_DRIFT_KEY: &str = "compensateClockDrift";

/// Persisted token list.
pub const TOKENS_KEY: &str = "tokens";
/// Persisted display-name overrides.
pub const DISPLAY_NAMES_KEY: &str = "displayNames";
/// Form-level message for the manual entry form.
pub const NEW_TOKEN_VALIDATION_KEY: &str = "newTokenValidation";
/// Message shown under the QR image picker.
pub const QR_TAG_VALIDATION_KEY: &str = "addTokenViaQrTagValidation";

/// Settings key holding the user input for one new-token field.
pub const fn field_key(field: TokenField) -> &'static str {
    match field {
        TokenField::Label => "newTokenLabel",
        TokenField::Issuer => "newTokenIssuer",
        TokenField::Secret => "newTokenSecret",
        TokenField::Algorithm => "newTokenAlgorithm",
        TokenField::Digits => "newTokenDigits",
        TokenField::Period => "newTokenPeriod",
    }
}

/// Settings key holding the validation message shown under one field.
pub const fn validation_key(field: TokenField) -> &'static str {
    match field {
        TokenField::Label => "newTokenLabelValidation",
        TokenField::Issuer => "newTokenIssuerValidation",
        TokenField::Secret => "newTokenSecretValidation",
        TokenField::Algorithm => "newTokenAlgorithmValidation",
        TokenField::Digits => "newTokenDigitsValidation",
        TokenField::Period => "newTokenPeriodValidation",
    }
}

/// Keys whose changes drive [`SyncProtocol`](crate::SyncProtocol).
///
/// Anything that does not parse into a variant is ignored by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKey {
    UpdateDisplayName,
    NewTokenField(TokenField),
    AddTokenManually,
    AddTokenViaQrTag,
    Reset,
    CompensateClockDrift,
}

impl ControlKey {
    pub fn parse(key: &str) -> Option<Self> {
        let parsed = match key {
            UPDATE_DISPLAY_NAME_KEY => ControlKey::UpdateDisplayName,
            ADD_TOKEN_MANUALLY_KEY => ControlKey::AddTokenManually,
            ADD_TOKEN_VIA_QR_TAG_KEY => ControlKey::AddTokenViaQrTag,
            RESET_KEY => ControlKey::Reset,
            COMPENSATE_CLOCK_DRIFT_KEY => ControlKey::CompensateClockDrift,
            other => {
                let field = TokenField::ALL
                    .into_iter()
                    .find(|field| field_key(*field) == other)?;
                ControlKey::NewTokenField(field)
            }
        };
        Some(parsed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlKey::UpdateDisplayName => UPDATE_DISPLAY_NAME_KEY,
            ControlKey::NewTokenField(field) => field_key(field),
            ControlKey::AddTokenManually => ADD_TOKEN_MANUALLY_KEY,
            ControlKey::AddTokenViaQrTag => ADD_TOKEN_VIA_QR_TAG_KEY,
            ControlKey::Reset => RESET_KEY,
            ControlKey::CompensateClockDrift => COMPENSATE_CLOCK_DRIFT_KEY,
        }
    }
}
