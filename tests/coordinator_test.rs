mod common;

use common::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use wattson::WattsonClient;
use wattson::coordinator::PollCoordinator;
use wattson::devices::DeviceIdentifiers;
use wattson::error::Result;
use wattson::persistence::{PersistentState, TokenPersistence};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct MemoryStore {
    writes: Arc<Mutex<Vec<PersistentState>>>,
}

#[async_trait::async_trait]
impl TokenPersistence for MemoryStore {
    async fn load(&self) -> Result<PersistentState> {
        Ok(self.writes.lock().unwrap().last().cloned().unwrap_or_default())
    }

    async fn persist(&self, state: &PersistentState) -> Result<()> {
        self.writes.lock().unwrap().push(state.clone());
        Ok(())
    }
}

async fn mount_data(server: &MockServer, status: u16) {
    Mock::given(method("GET"))
        .and(path("/water/api/data/w-1"))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_json(json!([{"sd": "2021-06-01T12:00:00Z", "vol": 2.0}])),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/heating/api/v1/devices/h-1/data"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"data": []})))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> WattsonClient {
    WattsonClient::from_config(&config_for(server))
        .unwrap()
        .with_tokens(Some(valid_tokens("at-1")))
        .with_devices(DeviceIdentifiers::new(
            Some("w-1".to_string()),
            Some("h-1".to_string()),
        ))
}

#[tokio::test]
async fn failed_cycle_keeps_stale_data() {
    let server = MockServer::start().await;
    mount_data(&server, 200).await;

    let store = MemoryStore::default();
    let mut coordinator =
        PollCoordinator::new(client(&server), store.clone(), Duration::from_secs(60), None);
    let mut rx = coordinator.subscribe();

    assert!(coordinator.refresh().await);
    assert!(rx.has_changed().unwrap());
    let state = rx.borrow_and_update().clone();
    assert!(state.last_update_success);
    let first = state.data.clone().unwrap();
    assert_eq!(first.water.latest(), 2.0);

    server.reset().await;
    mount_data(&server, 500).await;

    assert!(!coordinator.refresh().await);
    let state = coordinator.state();
    assert!(!state.last_update_success);
    assert_eq!(state.data.as_ref(), Some(&first));
    assert!(state.last_error.as_deref().unwrap().contains("500"));
    assert_eq!(state.total_polls, 2);
    assert_eq!(state.failed_polls, 1);
}

#[tokio::test]
async fn state_is_persisted_only_when_it_changes() {
    let server = MockServer::start().await;
    mount_data(&server, 200).await;

    let store = MemoryStore::default();
    let mut coordinator =
        PollCoordinator::new(client(&server), store.clone(), Duration::from_secs(60), None);

    coordinator.refresh().await;
    coordinator.refresh().await;

    let writes = store.writes.lock().unwrap().clone();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].tokens.as_ref().unwrap().access_token, "at-1");
    assert_eq!(writes[0].devices.water_device_id.as_deref(), Some("w-1"));
}

#[tokio::test]
async fn warm_started_state_is_not_rewritten() {
    let server = MockServer::start().await;
    mount_data(&server, 200).await;

    let client = client(&server);
    let warm = PersistentState::capture(&client);
    let store = MemoryStore::default();
    let mut coordinator =
        PollCoordinator::new(client, store.clone(), Duration::from_secs(60), Some(warm));

    coordinator.refresh().await;
    assert!(store.writes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let server = MockServer::start().await;
    mount_data(&server, 200).await;

    let mut coordinator = PollCoordinator::new(
        client(&server),
        MemoryStore::default(),
        Duration::from_secs(3600),
        None,
    );
    let shutdown = coordinator.shutdown_handle();
    let mut rx = coordinator.subscribe();

    let handle = tokio::spawn(async move {
        coordinator.run().await.unwrap();
        coordinator
    });

    // The first tick fires immediately
    rx.changed().await.unwrap();
    shutdown.send(()).unwrap();

    let coordinator = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coordinator.state().total_polls, 1);
}

#[tokio::test]
async fn zero_period_is_clamped() {
    let server = MockServer::start().await;
    mount_data(&server, 200).await;

    let mut coordinator =
        PollCoordinator::new(client(&server), MemoryStore::default(), Duration::ZERO, None);
    assert_eq!(coordinator.poll_interval(), Duration::from_secs(1));

    let shutdown = coordinator.shutdown_handle();
    let mut rx = coordinator.subscribe();
    let handle = tokio::spawn(async move {
        coordinator.run().await.unwrap();
        coordinator
    });

    rx.changed().await.unwrap();
    shutdown.send(()).unwrap();
    let coordinator = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(coordinator.state().last_update_success);
}
