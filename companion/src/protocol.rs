//! Settings change dispatch: turns settings UI edits into token store mutations and device
//! updates.

use serde::Deserialize;
use shared::schema::{CompanionMessage, DeviceMessage, decode_companion_message};
use shared::tokens::{TokenError, TokenField, TokenId, TokenSnapshot, TokenStore, TotpConfig};
use shared::totp::ClockDrift;

use crate::clock::{ClockCalibration, parse_toggle};
use crate::device::DeviceLink;
use crate::error::CompanionError;
use crate::fields::{TextValue, clear_fields, parse_text};
use crate::keys::{
    ADD_TOKEN_VIA_QR_TAG_KEY, COMPENSATE_CLOCK_DRIFT_KEY, ControlKey, DISPLAY_NAMES_KEY,
    NEW_TOKEN_VALIDATION_KEY, QR_TAG_VALIDATION_KEY, TOKENS_KEY,
};
use crate::qr::{ImagePick, QrTagDecoder, parse_otpauth};
use crate::settings::{ChangeEvent, SettingsStorage, read_json, write_json};
use crate::validation::{
    NewTokenForm, check_field, clear_all_messages, clear_manual_messages, report, set_message,
};

const DUPLICATE_TOKEN_MESSAGE: &str = "This token has already been added";

/// Payload written under the display-name control key by the settings UI.
#[derive(Debug, Deserialize)]
struct DisplayNameUpdate {
    token: TotpConfig,
    value: TextValue,
}

/// What a single change event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The key is not part of the control namespace.
    Ignored,
    /// The value could not be parsed; nothing was mutated.
    Dropped,
    DisplayNameUpdated(TokenId),
    DisplayNameCleared(TokenId),
    /// The display-name update referenced a token that is not stored.
    UnknownToken,
    FieldValidated { field: TokenField, valid: bool },
    TokenAdded(TokenId),
    TokenRejected,
    QrImported(TokenId),
    QrRejected,
    FormReset,
    ClockDriftToggled(bool),
}

/// Companion-side state machine behind the settings change listener.
///
/// Owns the settings channel, the device link, the QR decoder, and the authoritative
/// [`TokenStore`]. Every handler runs to completion before the next event is taken.
pub struct SyncProtocol<S, L, Q> {
    settings: S,
    link: L,
    decoder: Q,
    store: TokenStore,
    calibration: ClockCalibration,
    initialized: bool,
}

impl<S, L, Q> SyncProtocol<S, L, Q>
where
    S: SettingsStorage,
    L: DeviceLink,
    Q: QrTagDecoder,
{
    /// Load persisted tokens and the drift toggle from `settings`.
    pub fn new(settings: S, link: L, decoder: Q) -> Result<Self, CompanionError> {
        let tokens: Vec<TotpConfig> = read_json(&settings, TOKENS_KEY)?.unwrap_or_default();
        let display_names = read_json(&settings, DISPLAY_NAMES_KEY)?.unwrap_or_default();
        let store = TokenStore::from_snapshot(TokenSnapshot {
            tokens,
            display_names,
        });

        let mut calibration = ClockCalibration::new();
        if let Some(raw) = settings.get_item(COMPENSATE_CLOCK_DRIFT_KEY) {
            match parse_toggle(&raw) {
                Ok(compensate) => calibration.set_compensate(compensate),
                Err(err) => log::warn!("ignoring malformed {COMPENSATE_CLOCK_DRIFT_KEY}: {err}"),
            }
        }

        log::info!("loaded {} tokens from settings", store.len());
        Ok(Self {
            settings,
            link,
            decoder,
            store,
            calibration,
            initialized: false,
        })
    }

    pub fn settings(&self) -> &S {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut S {
        &mut self.settings
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn decoder(&self) -> &Q {
        &self.decoder
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn calibration(&self) -> &ClockCalibration {
        &self.calibration
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// One-time startup: clear stale validation messages, attach the change listener, import
    /// an image picked before the companion started, and push the token list to the device.
    ///
    /// Once the listener is attached later calls are no-ops, so it is never attached twice.
    /// A failure before that point leaves the protocol uninitialized and the call can be retried.
    pub fn initialize(&mut self) -> Result<(), CompanionError> {
        if self.initialized {
            log::debug!("sync protocol already initialized");
            return Ok(());
        }

        clear_all_messages(&mut self.settings)?;
        self.settings.add_change_listener();
        self.initialized = true;

        let mut pushed = false;
        if let Some(raw) = self.settings.get_item(ADD_TOKEN_VIA_QR_TAG_KEY) {
            match serde_json::from_str::<ImagePick>(&raw) {
                Ok(pick) => {
                    log::info!("importing QR tag picked before startup");
                    // A successful import already pushed the new list.
                    pushed = matches!(
                        self.add_token_from_qr(&pick.image_uri)?,
                        SyncOutcome::QrImported(_)
                    );
                }
                Err(err) => log::warn!("ignoring malformed {ADD_TOKEN_VIA_QR_TAG_KEY}: {err}"),
            }
        }

        if !pushed {
            self.push_tokens();
        }
        Ok(())
    }

    /// Dispatch one settings change.
    ///
    /// `Err` is reserved for settings storage failures; malformed values are logged and dropped.
    pub fn handle_change(&mut self, event: &ChangeEvent) -> Result<SyncOutcome, CompanionError> {
        let Some(key) = ControlKey::parse(&event.key) else {
            log::trace!("ignoring change of '{}'", event.key);
            return Ok(SyncOutcome::Ignored);
        };
        let raw = event.new_value.as_deref();

        match key {
            ControlKey::UpdateDisplayName => {
                let Some(update) = parse_value::<DisplayNameUpdate>(key, raw) else {
                    return Ok(SyncOutcome::Dropped);
                };
                self.update_display_name(&update.token, &update.value.into_string())
            }
            ControlKey::NewTokenField(field) => {
                let input = match raw.map(parse_text).transpose() {
                    Ok(text) => text.unwrap_or_default(),
                    Err(err) => {
                        log::warn!("dropping change of {}: {err}", key.as_str());
                        return Ok(SyncOutcome::Dropped);
                    }
                };
                self.validate_field(field, &input)
            }
            ControlKey::AddTokenManually => self.add_token_manually(),
            ControlKey::AddTokenViaQrTag => {
                let Some(pick) = parse_value::<ImagePick>(key, raw) else {
                    return Ok(SyncOutcome::Dropped);
                };
                self.add_token_from_qr(&pick.image_uri)
            }
            ControlKey::Reset => self.reset_form(),
            ControlKey::CompensateClockDrift => {
                let Some(compensate) = raw.and_then(|raw| match parse_toggle(raw) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        log::warn!("dropping change of {}: {err}", key.as_str());
                        None
                    }
                }) else {
                    return Ok(SyncOutcome::Dropped);
                };
                self.set_compensate_clock_drift(compensate);
                Ok(SyncOutcome::ClockDriftToggled(compensate))
            }
        }
    }

    /// Store `value` under `key` and dispatch it as if the settings UI had changed it.
    pub fn apply_setting(&mut self, key: &str, value: &str) -> Result<SyncOutcome, CompanionError> {
        let old_value = self.settings.get_item(key);
        self.settings.set_item(key, value)?;
        self.handle_change(&ChangeEvent {
            key: key.to_owned(),
            new_value: Some(value.to_owned()),
            old_value,
        })
    }

    /// Set or, for a blank name, clear the display-name override of `token`.
    pub fn update_display_name(
        &mut self,
        token: &TotpConfig,
        name: &str,
    ) -> Result<SyncOutcome, CompanionError> {
        let id = token.id();
        let name = name.trim();
        let outcome = if name.is_empty() {
            if !self.store.contains(&id) {
                log::warn!("display name cleared for unknown token {id}");
                return Ok(SyncOutcome::UnknownToken);
            }
            self.store.clear_display_name(&id);
            SyncOutcome::DisplayNameCleared(id)
        } else {
            match self.store.set_display_name(&id, name) {
                Ok(()) => SyncOutcome::DisplayNameUpdated(id),
                Err(err) => {
                    log::warn!("display name update for {id} rejected: {err}");
                    return Ok(SyncOutcome::UnknownToken);
                }
            }
        };

        self.persist()?;
        self.push_tokens();
        Ok(outcome)
    }

    /// Validate a single field of the manual entry form and publish its message.
    pub fn validate_field(
        &mut self,
        field: TokenField,
        input: &str,
    ) -> Result<SyncOutcome, CompanionError> {
        let input = input.trim();
        let outcome = check_field(field, (!input.is_empty()).then_some(input));
        report(&mut self.settings, field, &outcome)?;
        Ok(SyncOutcome::FieldValidated {
            field,
            valid: outcome.is_ok(),
        })
    }

    /// Validate the whole form and add the assembled token when every field passes.
    pub fn add_token_manually(&mut self) -> Result<SyncOutcome, CompanionError> {
        let form = match NewTokenForm::read(&self.settings) {
            Ok(form) => form,
            Err(CompanionError::MalformedValue { key, source }) => {
                log::warn!("manual add dropped, {key} is malformed: {source}");
                return Ok(SyncOutcome::Dropped);
            }
            Err(err) => return Err(err),
        };

        let config = match form.to_config() {
            Ok(config) => config,
            Err(failures) => {
                for field in TokenField::ALL {
                    let message = failures
                        .iter()
                        .find(|(failed, _)| *failed == field)
                        .map(|(_, message)| message.clone());
                    report(&mut self.settings, field, &message.map_or(Ok(()), Err))?;
                }
                log::info!("manual token rejected with {} invalid fields", failures.len());
                return Ok(SyncOutcome::TokenRejected);
            }
        };

        match self.store.add(config) {
            Ok(id) => {
                log::info!("token {id} added manually");
                clear_fields(&mut self.settings)?;
                clear_manual_messages(&mut self.settings)?;
                self.persist()?;
                self.push_tokens();
                Ok(SyncOutcome::TokenAdded(id))
            }
            Err(err) => {
                log::info!("manual token rejected: {err}");
                match err {
                    TokenError::Validation { field, reason } => {
                        report(&mut self.settings, field, &Err(reason))?;
                    }
                    TokenError::Duplicate | TokenError::NotFound => {
                        let message = DUPLICATE_TOKEN_MESSAGE.to_owned();
                        set_message(&mut self.settings, NEW_TOKEN_VALIDATION_KEY, Some(&message))?;
                    }
                }
                Ok(SyncOutcome::TokenRejected)
            }
        }
    }

    /// Decode the QR tag in `image_uri` and add the token it describes.
    ///
    /// The picked image is consumed either way, so it is not imported again on the next start.
    pub fn add_token_from_qr(&mut self, image_uri: &str) -> Result<SyncOutcome, CompanionError> {
        let imported = self
            .decoder
            .decode(image_uri)
            .and_then(|text| parse_otpauth(&text))
            .and_then(|config| self.store.add(config).map_err(CompanionError::from));
        self.settings.remove_item(ADD_TOKEN_VIA_QR_TAG_KEY)?;

        match imported {
            Ok(id) => {
                log::info!("token {id} imported from QR tag");
                set_message(&mut self.settings, QR_TAG_VALIDATION_KEY, None)?;
                self.persist()?;
                self.push_tokens();
                Ok(SyncOutcome::QrImported(id))
            }
            Err(err) => {
                log::warn!("QR import from {image_uri} failed: {err}");
                let message = match err {
                    CompanionError::Token(TokenError::Duplicate) => {
                        DUPLICATE_TOKEN_MESSAGE.to_owned()
                    }
                    other => other.to_string(),
                };
                set_message(&mut self.settings, QR_TAG_VALIDATION_KEY, Some(&message))?;
                Ok(SyncOutcome::QrRejected)
            }
        }
    }

    /// Clear every input and message of the manual entry form.
    pub fn reset_form(&mut self) -> Result<SyncOutcome, CompanionError> {
        clear_fields(&mut self.settings)?;
        clear_manual_messages(&mut self.settings)?;
        Ok(SyncOutcome::FormReset)
    }

    /// Remove the token at `index` together with its display-name override.
    pub fn remove_token(&mut self, index: usize) -> Result<TotpConfig, CompanionError> {
        let id = self.store.id_at(index).cloned().ok_or(TokenError::NotFound)?;
        let removed = self.store.remove(&id)?;
        log::info!("token {id} removed");
        self.persist()?;
        self.push_tokens();
        Ok(removed)
    }

    pub fn reorder_token(&mut self, from: usize, to: usize) -> Result<(), CompanionError> {
        self.store.reorder(from, to)?;
        self.persist()?;
        self.push_tokens();
        Ok(())
    }

    /// Apply a message received from the device; `now_ms` is the companion's wall clock.
    pub fn handle_device_payload(
        &mut self,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<ClockDrift, CompanionError> {
        let message = decode_companion_message(payload).map_err(shared::error::SharedError::from)?;
        match message {
            CompanionMessage::DeviceTime { now_ms: device_now_ms } => {
                let drift = self.calibration.measure(device_now_ms, now_ms);
                log::info!("measured clock drift of {} ms", drift.as_millis());
                self.push_drift();
                Ok(self.calibration.effective())
            }
        }
    }

    pub fn set_compensate_clock_drift(&mut self, compensate: bool) {
        self.calibration.set_compensate(compensate);
        if self.calibration.measured().is_some() {
            self.push_drift();
        }
    }

    fn persist(&mut self) -> Result<(), CompanionError> {
        let snapshot = self.store.snapshot();
        write_json(&mut self.settings, TOKENS_KEY, &snapshot.tokens)?;
        write_json(&mut self.settings, DISPLAY_NAMES_KEY, &snapshot.display_names)
    }

    fn push_tokens(&mut self) {
        let message = DeviceMessage::Tokens(self.store.snapshot());
        if let Err(err) = self.link.send(&message) {
            log::warn!("failed to push tokens to device: {err}");
        }
    }

    fn push_drift(&mut self) {
        let message = DeviceMessage::ClockDrift {
            drift_ms: self.calibration.effective().as_millis(),
        };
        if let Err(err) = self.link.send(&message) {
            log::warn!("failed to push clock drift to device: {err}");
        }
    }
}

fn parse_value<T>(key: ControlKey, raw: Option<&str>) -> Option<T>
where
    T: for<'de> Deserialize<'de>,
{
    let Some(raw) = raw else {
        log::warn!("dropping change of {}: value removed", key.as_str());
        return None;
    };
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("dropping change of {}: {err}", key.as_str());
            None
        }
    }
}
