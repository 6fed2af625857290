use serde_json::json;
use shared::schema::{CompanionMessage, DeviceMessage, encode_companion_message};
use shared::tokens::{TokenField, TotpConfig};
use shared::totp::ClockDrift;

use crate::keys::{
    ADD_TOKEN_MANUALLY_KEY, ADD_TOKEN_VIA_QR_TAG_KEY, COMPENSATE_CLOCK_DRIFT_KEY,
    DISPLAY_NAMES_KEY, NEW_TOKEN_VALIDATION_KEY, QR_TAG_VALIDATION_KEY, RESET_KEY, TOKENS_KEY,
    UPDATE_DISPLAY_NAME_KEY, field_key, validation_key,
};
use crate::{
    CompanionError, MemoryDeviceLink, MemoryQrDecoder, MemorySettings, SettingsStorage,
    SyncOutcome, SyncProtocol,
};

type TestProtocol = SyncProtocol<MemorySettings, MemoryDeviceLink, MemoryQrDecoder>;

const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";
const SOME_IMAGE_URI: &str = "some URI";
const SOME_OTPAUTH: &str =
    "otpauth://totp/Example:alice@example.com?secret=MFRGGZDFMZTWQ2LK&issuer=Example";

fn picked_image(uri: &str) -> String {
    json!({ "imageUri": uri }).to_string()
}

fn named(value: &str) -> String {
    json!({ "name": value }).to_string()
}

fn protocol_with(settings: MemorySettings) -> TestProtocol {
    let decoder = MemoryQrDecoder::new().with_tag(SOME_IMAGE_URI, SOME_OTPAUTH);
    SyncProtocol::new(settings, MemoryDeviceLink::new(), decoder).expect("protocol")
}

fn started(settings: MemorySettings) -> TestProtocol {
    let mut protocol = protocol_with(settings);
    protocol.initialize().expect("initialize");
    protocol
}

/// Simulate a settings UI edit and run every listener invocation it produces.
fn fire(protocol: &mut TestProtocol, key: &str, value: &str) -> Vec<SyncOutcome> {
    let events = protocol.settings_mut().user_change(key, value);
    events
        .iter()
        .map(|event| protocol.handle_change(event).expect("handle change"))
        .collect()
}

fn fill_form(protocol: &mut TestProtocol, label: &str, secret: &str) {
    fire(protocol, field_key(TokenField::Label), &named(label));
    fire(protocol, field_key(TokenField::Secret), &named(secret));
}

fn validation_messages(settings: &MemorySettings) -> Vec<String> {
    TokenField::ALL
        .into_iter()
        .map(validation_key)
        .chain([NEW_TOKEN_VALIDATION_KEY, QR_TAG_VALIDATION_KEY])
        .filter_map(|key| settings.get_item(key))
        .collect()
}

fn token_pushes(link: &MemoryDeviceLink) -> usize {
    link.sent_messages()
        .expect("decode sent")
        .iter()
        .filter(|message| matches!(message, DeviceMessage::Tokens(_)))
        .count()
}

fn stored(config: &TotpConfig) -> MemorySettings {
    MemorySettings::new().with_item(
        TOKENS_KEY,
        &serde_json::to_string(&vec![config]).expect("encode tokens"),
    )
}

#[test]
fn initialize_clears_all_validation_messages() {
    let mut settings = MemorySettings::new()
        .with_item(NEW_TOKEN_VALIDATION_KEY, r#""stale""#)
        .with_item(QR_TAG_VALIDATION_KEY, r#""stale""#);
    for field in TokenField::ALL {
        settings = settings.with_item(validation_key(field), r#""stale""#);
    }

    let protocol = started(settings);

    assert!(validation_messages(protocol.settings()).is_empty());
}

#[test]
fn initialize_imports_an_image_picked_before_startup() {
    let settings =
        MemorySettings::new().with_item(ADD_TOKEN_VIA_QR_TAG_KEY, &picked_image(SOME_IMAGE_URI));

    let mut protocol = started(settings);
    protocol.initialize().expect("second initialize");

    assert_eq!(protocol.decoder().requests, vec![SOME_IMAGE_URI]);
    assert_eq!(protocol.store().len(), 1);
    assert_eq!(protocol.settings().get_item(ADD_TOKEN_VIA_QR_TAG_KEY), None);
    assert_eq!(token_pushes(protocol.link()), 1);
}

#[test]
fn initialize_without_picked_image_does_not_decode() {
    let protocol = started(MemorySettings::new());

    assert!(protocol.decoder().requests.is_empty());
    assert!(protocol.is_initialized());
}

#[test]
fn initialize_pushes_the_persisted_tokens() {
    let config = TotpConfig::new("alice", "Example", SECRET);
    let protocol = started(stored(&config));

    match protocol.link().last_message() {
        Some(DeviceMessage::Tokens(snapshot)) => assert_eq!(snapshot.tokens, vec![config]),
        other => panic!("unexpected message {other:?}"),
    }
}

/// Settings channel whose first `remove_item` calls fail.
struct FlakySettings {
    inner: MemorySettings,
    failing_removals: usize,
}

impl SettingsStorage for FlakySettings {
    fn get_item(&self, key: &str) -> Option<String> {
        self.inner.get_item(key)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CompanionError> {
        self.inner.set_item(key, value)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), CompanionError> {
        if self.failing_removals > 0 {
            self.failing_removals -= 1;
            return Err(CompanionError::Storage(format!("cannot remove {key}")));
        }
        self.inner.remove_item(key)
    }

    fn add_change_listener(&mut self) {
        self.inner.add_change_listener();
    }
}

#[test]
fn failed_initialize_can_be_retried() {
    let settings = FlakySettings {
        inner: MemorySettings::new(),
        failing_removals: 1,
    };
    let mut protocol =
        SyncProtocol::new(settings, MemoryDeviceLink::new(), MemoryQrDecoder::new())
            .expect("protocol");

    assert!(protocol.initialize().is_err());
    assert!(!protocol.is_initialized());
    assert_eq!(protocol.settings().inner.listener_count(), 0);

    protocol.initialize().expect("retry");
    protocol.initialize().expect("third initialize");
    assert!(protocol.is_initialized());
    assert_eq!(protocol.settings().inner.listener_count(), 1);
    assert_eq!(token_pushes(protocol.link()), 1);
}

#[test]
fn listener_attached_twice_fires_effects_once() {
    let mut protocol = started(MemorySettings::new());
    protocol.initialize().expect("second initialize");
    assert_eq!(protocol.settings().listener_count(), 1);

    fill_form(&mut protocol, "alice", SECRET);
    let outcomes = fire(&mut protocol, ADD_TOKEN_MANUALLY_KEY, "true");

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], SyncOutcome::TokenAdded(_)));
    assert_eq!(protocol.store().len(), 1);
    assert_eq!(token_pushes(protocol.link()), 2);
}

#[test]
fn display_name_update_reaches_store_settings_and_device() {
    let config = TotpConfig::new("alice", "Example", SECRET);
    let mut protocol = started(stored(&config));
    let update = json!({ "token": config, "value": { "name": "Work mail" } }).to_string();

    let outcomes = fire(&mut protocol, UPDATE_DISPLAY_NAME_KEY, &update);

    assert_eq!(outcomes, vec![SyncOutcome::DisplayNameUpdated(config.id())]);
    assert_eq!(protocol.store().display_name(&config), "Work mail");
    let persisted = protocol
        .settings()
        .get_item(DISPLAY_NAMES_KEY)
        .expect("display names persisted");
    assert!(persisted.contains("Work mail"));
    match protocol.link().last_message() {
        Some(DeviceMessage::Tokens(snapshot)) => {
            assert_eq!(
                snapshot.display_names.get(&config.id()).map(String::as_str),
                Some("Work mail")
            );
        }
        other => panic!("unexpected message {other:?}"),
    }
}

#[test]
fn blank_display_name_clears_the_override() {
    let config = TotpConfig::new("alice", "Example", SECRET);
    let mut protocol = started(stored(&config));
    let set = json!({ "token": config, "value": { "name": "Work" } }).to_string();
    let clear = json!({ "token": config, "value": { "name": "" } }).to_string();

    fire(&mut protocol, UPDATE_DISPLAY_NAME_KEY, &set);
    let outcomes = fire(&mut protocol, UPDATE_DISPLAY_NAME_KEY, &clear);

    assert_eq!(outcomes, vec![SyncOutcome::DisplayNameCleared(config.id())]);
    assert_eq!(protocol.store().display_name(&config), "Example: alice");
}

#[test]
fn display_name_for_unknown_token_mutates_nothing() {
    let mut protocol = started(MemorySettings::new());
    let stranger = TotpConfig::new("bob", "", SECRET);
    let update = json!({ "token": stranger, "value": { "name": "Bob" } }).to_string();
    let writes = protocol.settings().writes.len();

    let outcomes = fire(&mut protocol, UPDATE_DISPLAY_NAME_KEY, &update);

    assert_eq!(outcomes, vec![SyncOutcome::UnknownToken]);
    assert_eq!(protocol.settings().writes.len(), writes);
}

#[test]
fn each_field_change_validates_only_that_field() {
    for field in TokenField::ALL {
        let mut protocol = started(MemorySettings::new());
        let writes = protocol.settings().writes.len();

        let outcomes = fire(
            &mut protocol,
            field_key(field),
            r#""some stringified JSON""#,
        );

        assert!(matches!(
            outcomes.as_slice(),
            [SyncOutcome::FieldValidated { field: validated, .. }] if *validated == field
        ));
        let touched: Vec<&str> = protocol.settings().writes[writes..]
            .iter()
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(touched, vec![validation_key(field)]);
    }
}

#[test]
fn invalid_secret_change_flags_only_the_secret() {
    let mut protocol = started(MemorySettings::new());

    let outcomes = fire(&mut protocol, field_key(TokenField::Secret), &named("ABC123"));

    assert_eq!(
        outcomes,
        vec![SyncOutcome::FieldValidated {
            field: TokenField::Secret,
            valid: false
        }]
    );
    assert!(
        protocol
            .settings()
            .get_item(validation_key(TokenField::Secret))
            .is_some()
    );
    let settings = protocol.settings();
    let flagged_after_start = |field| {
        settings
            .writes
            .iter()
            .filter(|(key, value)| key == validation_key(field) && value.is_some())
            .count()
    };
    assert_eq!(flagged_after_start(TokenField::Label), 0);
    assert_eq!(flagged_after_start(TokenField::Issuer), 0);
}

#[test]
fn manual_add_with_valid_fields_adds_exactly_one_token() {
    let mut protocol = started(MemorySettings::new());
    fill_form(&mut protocol, "alice", SECRET);
    fire(&mut protocol, field_key(TokenField::Digits), &named("8"));
    let pushes = token_pushes(protocol.link());

    let outcomes = fire(&mut protocol, ADD_TOKEN_MANUALLY_KEY, "true");

    let expected = TotpConfig {
        digits: 8,
        ..TotpConfig::new("alice", "", SECRET)
    };
    assert_eq!(outcomes, vec![SyncOutcome::TokenAdded(expected.id())]);
    assert_eq!(protocol.store().list(), &[expected][..]);
    assert_eq!(token_pushes(protocol.link()), pushes + 1);
    assert!(
        TokenField::ALL
            .into_iter()
            .all(|field| protocol.settings().get_item(field_key(field)).is_none())
    );
    assert!(protocol.settings().get_item(TOKENS_KEY).is_some());
}

#[test]
fn manual_add_with_an_invalid_field_adds_nothing() {
    let mut protocol = started(MemorySettings::new());
    fire(&mut protocol, field_key(TokenField::Label), &named("alice"));
    protocol
        .settings_mut()
        .user_change(field_key(TokenField::Secret), &named("ABC123"));
    let pushes = token_pushes(protocol.link());

    let outcomes = fire(&mut protocol, ADD_TOKEN_MANUALLY_KEY, "true");

    assert_eq!(outcomes, vec![SyncOutcome::TokenRejected]);
    assert!(protocol.store().is_empty());
    assert_eq!(token_pushes(protocol.link()), pushes);
    assert_eq!(validation_messages(protocol.settings()).len(), 1);
    assert!(
        protocol
            .settings()
            .get_item(validation_key(TokenField::Secret))
            .is_some()
    );
}

#[test]
fn duplicate_manual_add_sets_the_form_message() {
    let mut protocol = started(MemorySettings::new());
    fill_form(&mut protocol, "alice", SECRET);
    fire(&mut protocol, ADD_TOKEN_MANUALLY_KEY, "true");
    fill_form(&mut protocol, "alice", SECRET);

    let outcomes = fire(&mut protocol, ADD_TOKEN_MANUALLY_KEY, "true");

    assert_eq!(outcomes, vec![SyncOutcome::TokenRejected]);
    assert_eq!(protocol.store().len(), 1);
    assert!(
        protocol
            .settings()
            .get_item(NEW_TOKEN_VALIDATION_KEY)
            .is_some()
    );
}

#[test]
fn picked_image_triggers_qr_import() {
    let mut protocol = started(MemorySettings::new());

    let outcomes = fire(
        &mut protocol,
        ADD_TOKEN_VIA_QR_TAG_KEY,
        &picked_image(SOME_IMAGE_URI),
    );

    assert!(matches!(outcomes.as_slice(), [SyncOutcome::QrImported(_)]));
    assert_eq!(protocol.decoder().requests, vec![SOME_IMAGE_URI]);
    let token = protocol.store().get(0).expect("imported token");
    assert_eq!(token.issuer, "Example");
    assert_eq!(token.label, "alice@example.com");
}

#[test]
fn failed_qr_import_reports_under_the_picker() {
    let mut protocol = started(MemorySettings::new());

    let outcomes = fire(
        &mut protocol,
        ADD_TOKEN_VIA_QR_TAG_KEY,
        &picked_image("content://blurry"),
    );

    assert_eq!(outcomes, vec![SyncOutcome::QrRejected]);
    assert!(protocol.store().is_empty());
    assert!(protocol.settings().get_item(QR_TAG_VALIDATION_KEY).is_some());
}

#[test]
fn reset_clears_fields_and_messages_without_adding() {
    let mut protocol = started(MemorySettings::new());
    fill_form(&mut protocol, "alice", "ABC123");
    fire(&mut protocol, field_key(TokenField::Period), &named("0"));
    assert!(!validation_messages(protocol.settings()).is_empty());

    let outcomes = fire(&mut protocol, RESET_KEY, "true");

    assert_eq!(outcomes, vec![SyncOutcome::FormReset]);
    assert!(validation_messages(protocol.settings()).is_empty());
    assert!(
        TokenField::ALL
            .into_iter()
            .all(|field| protocol.settings().get_item(field_key(field)).is_none())
    );
    assert!(protocol.store().is_empty());
}

#[test]
fn unrelated_key_changes_nothing() {
    let mut protocol = started(MemorySettings::new());
    let writes = protocol.settings().writes.len();
    let sent = protocol.link().sent_payloads.len();

    let outcomes = fire(&mut protocol, "someOtherKey", r#"{"name": "someValue"}"#);

    assert_eq!(outcomes, vec![SyncOutcome::Ignored]);
    assert_eq!(protocol.settings().writes.len(), writes);
    assert_eq!(protocol.link().sent_payloads.len(), sent);
    assert!(protocol.decoder().requests.is_empty());
    assert!(protocol.store().is_empty());
}

#[test]
fn malformed_values_are_dropped_without_mutation() {
    let mut protocol = started(MemorySettings::new());
    let writes = protocol.settings().writes.len();

    for key in [
        UPDATE_DISPLAY_NAME_KEY,
        ADD_TOKEN_VIA_QR_TAG_KEY,
        field_key(TokenField::Label),
        COMPENSATE_CLOCK_DRIFT_KEY,
    ] {
        assert_eq!(
            fire(&mut protocol, key, "{not json"),
            vec![SyncOutcome::Dropped]
        );
    }

    assert_eq!(protocol.settings().writes.len(), writes);
    assert!(protocol.decoder().requests.is_empty());
}

#[test]
fn clock_calibration_follows_the_compensation_toggle() {
    let mut protocol = started(MemorySettings::new());
    let payload = encode_companion_message(&CompanionMessage::DeviceTime { now_ms: 1_000_000 })
        .expect("encode");

    let drift = protocol
        .handle_device_payload(&payload, 1_002_000)
        .expect("device payload");
    assert_eq!(drift, ClockDrift::from_millis(2_000));
    assert_eq!(
        protocol.link().last_message(),
        Some(DeviceMessage::ClockDrift { drift_ms: 2_000 })
    );

    let outcomes = fire(&mut protocol, COMPENSATE_CLOCK_DRIFT_KEY, "false");
    assert_eq!(outcomes, vec![SyncOutcome::ClockDriftToggled(false)]);
    assert_eq!(
        protocol.link().last_message(),
        Some(DeviceMessage::ClockDrift { drift_ms: 0 })
    );
}

#[test]
fn persisted_toggle_is_honoured_on_startup() {
    let settings = MemorySettings::new().with_item(COMPENSATE_CLOCK_DRIFT_KEY, r#""false""#);
    let mut protocol = started(settings);
    let payload =
        encode_companion_message(&CompanionMessage::DeviceTime { now_ms: 0 }).expect("encode");

    let drift = protocol.handle_device_payload(&payload, 5_000).expect("payload");

    assert_eq!(drift, ClockDrift::ZERO);
    assert_eq!(
        protocol.calibration().measured(),
        Some(ClockDrift::from_millis(5_000))
    );
}

#[test]
fn tokens_survive_a_companion_restart() {
    let mut protocol = started(MemorySettings::new());
    fill_form(&mut protocol, "alice", SECRET);
    fire(&mut protocol, ADD_TOKEN_MANUALLY_KEY, "true");
    fill_form(&mut protocol, "bob", SECRET);
    fire(&mut protocol, ADD_TOKEN_MANUALLY_KEY, "true");
    protocol.reorder_token(1, 0).expect("reorder");

    let restarted = protocol_with(protocol.settings().clone());

    let labels: Vec<&str> = restarted
        .store()
        .list()
        .iter()
        .map(|token| token.label.as_str())
        .collect();
    assert_eq!(labels, vec!["bob", "alice"]);
}

#[test]
fn removing_a_token_drops_its_override_and_pushes() {
    let config = TotpConfig::new("alice", "Example", SECRET);
    let mut protocol = started(stored(&config));
    let update = json!({ "token": config, "value": { "name": "Work" } }).to_string();
    fire(&mut protocol, UPDATE_DISPLAY_NAME_KEY, &update);
    let pushes = token_pushes(protocol.link());

    let removed = protocol.remove_token(0).expect("remove");

    assert_eq!(removed, config);
    assert!(protocol.store().is_empty());
    assert_eq!(token_pushes(protocol.link()), pushes + 1);
    assert_eq!(
        protocol.settings().get_item(DISPLAY_NAMES_KEY).as_deref(),
        Some("{}")
    );
    assert!(protocol.remove_token(0).is_err());
}
