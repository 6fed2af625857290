//! New-token form inputs as stored by the settings UI.

use serde::Deserialize;
use shared::tokens::TokenField;

use crate::error::CompanionError;
use crate::keys::field_key;
use crate::settings::SettingsStorage;

/// Text inputs store `{"name": "..."}`; scripted writers may store a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TextValue {
    Named { name: String },
    Plain(String),
}

impl TextValue {
    pub fn into_string(self) -> String {
        match self {
            TextValue::Named { name } | TextValue::Plain(name) => name,
        }
    }
}

/// Parse a stored text input, treating `null` as empty.
pub fn parse_text(raw: &str) -> Result<String, serde_json::Error> {
    let value: Option<TextValue> = serde_json::from_str(raw)?;
    Ok(value.map(TextValue::into_string).unwrap_or_default())
}

/// Current trimmed input for `field`; `Ok(None)` when the field is unset or blank.
pub fn read_field<S>(settings: &S, field: TokenField) -> Result<Option<String>, CompanionError>
where
    S: SettingsStorage + ?Sized,
{
    let key = field_key(field);
    let Some(raw) = settings.get_item(key) else {
        return Ok(None);
    };
    let text = parse_text(&raw).map_err(|err| CompanionError::malformed(key, err))?;
    let trimmed = text.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_owned()))
}

/// Empty every input of the manual entry form.
pub fn clear_fields<S>(settings: &mut S) -> Result<(), CompanionError>
where
    S: SettingsStorage + ?Sized,
{
    for field in TokenField::ALL {
        settings.remove_item(field_key(field))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    #[test]
    fn both_value_shapes_are_accepted() {
        assert_eq!(parse_text(r#"{"name":"alice"}"#).expect("named"), "alice");
        assert_eq!(parse_text(r#""bob""#).expect("plain"), "bob");
        assert_eq!(parse_text("null").expect("null"), "");
        assert!(parse_text("{").is_err());
        assert!(parse_text("42").is_err());
    }

    #[test]
    fn blank_fields_read_as_missing() {
        let settings = MemorySettings::new()
            .with_item("newTokenLabel", r#"{"name":"  alice "}"#)
            .with_item("newTokenIssuer", r#"{"name":"   "}"#);

        assert_eq!(
            read_field(&settings, TokenField::Label).expect("label"),
            Some("alice".to_owned())
        );
        assert_eq!(read_field(&settings, TokenField::Issuer).expect("issuer"), None);
        assert_eq!(read_field(&settings, TokenField::Secret).expect("secret"), None);
    }

    #[test]
    fn clearing_removes_every_field() {
        let mut settings = MemorySettings::new().with_item("newTokenSecret", r#""ABC""#);
        clear_fields(&mut settings).expect("clear");

        assert_eq!(settings.get_item("newTokenSecret"), None);
        assert_eq!(settings.writes.len(), TokenField::ALL.len());
        assert!(settings.writes.iter().all(|(_, value)| value.is_none()));
    }
}
