use serde_json::json;
use wattson::auth::TokenSet;
use wattson::devices::DeviceIdentifiers;
use wattson::persistence::{PersistentState, StateStore, TokenPersistence, persist_if_changed};

fn sample_state() -> PersistentState {
    let tokens = TokenSet::from_response(
        json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_on": "1700000000",
            "id_token": "id",
            "not_before": 1699996400
        }),
        0,
    )
    .unwrap();
    PersistentState {
        tokens: Some(tokens),
        devices: DeviceIdentifiers::new(Some("w-1".to_string()), Some(String::new())),
    }
}

#[tokio::test]
async fn missing_file_loads_default_state() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    let state = store.load().await.unwrap();
    assert_eq!(state, PersistentState::default());
    assert!(state.tokens.is_none());
}

#[tokio::test]
async fn persist_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("nested").join("state.json"));

    let state = sample_state();
    store.persist(&state).await.unwrap();
    let loaded = store.load().await.unwrap();

    assert_eq!(loaded, state);
    let tokens = loaded.tokens.unwrap();
    assert_eq!(tokens.expires_on, 1_700_000_000);
    assert_eq!(tokens.extra.get("not_before"), Some(&json!(1699996400)));
    // Resolved-absent survives the round trip distinct from unset
    assert_eq!(loaded.devices.heating_device_id.as_deref(), Some(""));

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(raw["water_device_id"], json!("w-1"));
    assert_eq!(raw["tokens"]["access_token"], json!("at"));
}

#[cfg(unix)]
#[tokio::test]
async fn state_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    store.persist(&sample_state()).await.unwrap();

    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(StateStore::new(&path).load().await.is_err());
}

#[tokio::test]
async fn persist_if_changed_compares_by_value() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    let mut last = None;

    let state = sample_state();
    assert!(persist_if_changed(&store, &mut last, &state).await.unwrap());
    // An equal but distinct value does not trigger a write
    let copy = state.clone();
    assert!(!persist_if_changed(&store, &mut last, &copy).await.unwrap());

    let mut rotated = state.clone();
    if let Some(tokens) = rotated.tokens.as_mut() {
        tokens.access_token = "at-2".to_string();
    }
    assert!(persist_if_changed(&store, &mut last, &rotated).await.unwrap());
    assert_eq!(store.load().await.unwrap(), rotated);
}
