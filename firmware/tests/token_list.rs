use firmware::DeviceApp;
use firmware::ui::{MemoryListHost, VirtualListHost};
use shared::schema::{DeviceMessage, encode_device_message};
use shared::tokens::{TokenStore, TotpConfig};

const SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

fn tokens_payload(count: usize) -> Vec<u8> {
    let mut store = TokenStore::new();
    for index in 0..count {
        store
            .add(TotpConfig::new(format!("account {index}"), "Issuer", SECRET))
            .expect("add token");
    }
    encode_device_message(&DeviceMessage::Tokens(store.snapshot())).expect("encode")
}

#[test]
fn scrolling_rebinds_pool_slots_to_new_indices() {
    let mut app = DeviceApp::new(MemoryListHost::new(), 12);
    app.handle_payload(&tokens_payload(40), 0).expect("tokens");
    assert!(app.on_animation_frame());

    app.host_mut().scroll_to(0, 4);
    let report = app.update_token_list(60_000).expect("refresh");
    assert_eq!(report.range, Some(0..=7));
    assert_eq!(report.rebound, 8);

    app.host_mut().scroll_to(20, 24);
    app.host_mut().configured.clear();
    let report = app.update_token_list(61_000).expect("refresh");
    assert_eq!(report.range, Some(17..=27));
    assert_eq!(report.rebound, 11);

    let view = app.host().tile_for_index(22).expect("index 22 bound");
    assert_eq!(view.display_name, "Issuer: account 22");
    assert!(app.host().configured.iter().all(|(slot, index)| *slot == index % 12));
    assert!(app.engine().bound_indices().all(|index| index < 40));
}

#[test]
fn periodic_tick_refreshes_progress_without_list_changes() {
    let mut app = DeviceApp::new(MemoryListHost::new(), 8);
    app.handle_payload(&tokens_payload(2), 0).expect("tokens");
    app.host_mut().scroll_to(0, 1);

    app.tick(1_000, 60_000).expect("tick");
    let before = app.host().tile(0).expect("tile").progress;
    let report = app.tick(1_000, 67_500).expect("tick");
    let after = app.host().tile(0).expect("tile").progress;

    assert_eq!(report.rebound, 0);
    assert_eq!(report.refreshed, 2);
    assert_eq!(before.start_angle, 0.0);
    assert_eq!(after.start_angle, 90.0);
    assert_eq!(after.sweep_angle, 270.0);
}

#[test]
fn shrinking_list_reinitializes_before_refresh() {
    let mut app = DeviceApp::new(MemoryListHost::new(), 8);
    app.handle_payload(&tokens_payload(6), 0).expect("tokens");
    app.host_mut().scroll_to(0, 5);
    app.update_token_list(0).expect("refresh");

    app.handle_payload(&tokens_payload(2), 0).expect("tokens");
    let report = app.update_token_list(0).expect("refresh");

    assert_eq!(app.host().length(), 2);
    assert_eq!(report.range, Some(0..=1));
    assert_eq!(app.engine().bound_indices().count(), 2);
}

#[test]
fn emptied_list_hides_tiles() {
    let mut app = DeviceApp::new(MemoryListHost::new(), 8);
    app.handle_payload(&tokens_payload(3), 0).expect("tokens");
    app.host_mut().scroll_to(0, 2);
    app.update_token_list(0).expect("refresh");
    assert!(app.host().list_visible);

    app.handle_payload(&tokens_payload(0), 0).expect("tokens");
    let report = app.update_token_list(0).expect("refresh");

    assert!(report.range.is_none());
    assert!(!app.host().list_visible);
    assert_eq!(app.engine().bound_indices().count(), 0);
}
