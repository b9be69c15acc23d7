// Integration tests for `DeviceSyncController` using wiremock.

use ecocontrol_core::{Device, DeviceMac, DeviceState};
use ecocontrol_mesh::{MeshClient, MeshError};
use ecocontrol_sync::{ControllerPhase, DeviceSyncController, SyncEvent, SyncOutcome};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

fn controller_for(
    host: &str,
    interval: Duration,
) -> (Arc<DeviceSyncController>, broadcast::Receiver<SyncEvent>) {
    let (tx, rx) = broadcast::channel(32);
    let client = MeshClient::new(Duration::from_secs(2)).unwrap();
    let device = Device::new(host, "7", DeviceMac::new("AA:BB"));
    (
        Arc::new(DeviceSyncController::new(device, client, interval, tx)),
        rx,
    )
}

async fn mount_metadata(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/device_request"))
        .and(body_json(json!({"start": 1, "request": "getDeviceData"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "panel"})))
        .mount(server)
        .await;
}

async fn mount_report(server: &MockServer, report: Value) {
    Mock::given(method("POST"))
        .and(path("/device_request"))
        .and(body_partial_json(json!({"request": "get_device_info"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(report))
        .mount(server)
        .await;
}

async fn next_synced(rx: &mut broadcast::Receiver<SyncEvent>) -> DeviceState {
    loop {
        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for sync")
            .expect("event channel closed");
        if let SyncEvent::StateSynced { state, .. } = event {
            return state;
        }
    }
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sync_maps_known_characteristics() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    mount_report(
        &server,
        json!({"characteristics": [
            {"name": "RoomTemperature", "value": 21.5},
            {"name": "Unknown", "value": 99}
        ]}),
    )
    .await;

    let (controller, _rx) = controller_for(&server.address().to_string(), Duration::from_secs(300));

    let outcome = controller.sync_once().await.unwrap();
    let expected = DeviceState {
        room_temperature: Some(21.5),
        setpoint_temperature: None,
    };
    assert_eq!(outcome, SyncOutcome::Synced(expected));
    assert_eq!(controller.state(), expected);
    assert!(controller.last_synced().await.is_some());

    // Replaying the same report changes nothing
    controller.sync_once().await.unwrap();
    assert_eq!(controller.state(), expected);
}

#[tokio::test]
async fn test_sync_sends_identity_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/device_request"))
        .and(header("mesh-node-mac", "AA:BB"))
        .and(header("mesh-node-num", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"characteristics": []})))
        .expect(2)
        .mount(&server)
        .await;

    let (controller, _rx) = controller_for(&server.address().to_string(), Duration::from_secs(300));
    controller.sync_once().await.unwrap();
}

#[tokio::test]
async fn test_failed_sync_keeps_previous_state() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    mount_report(
        &server,
        json!({"characteristics": [
            {"name": "RoomTemperature", "value": 20},
            {"name": "SetpointTemperature", "value": 23}
        ]}),
    )
    .await;

    let (controller, mut rx) = controller_for(&server.address().to_string(), Duration::from_secs(300));
    controller.sync_once().await.unwrap();
    let before = controller.state();
    assert_eq!(before.setpoint_temperature, Some(23.0));

    // Unreachable host
    controller.relocate("127.0.0.1:1").await;
    let result = controller.sync_once().await;
    assert!(matches!(result, Err(MeshError::Transport { .. })));
    assert_eq!(controller.state(), before);

    let mut saw_failure = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, SyncEvent::SyncFailed { .. }) {
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn test_malformed_report_keeps_previous_state() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    mount_report(&server, json!({"characteristics": [{"name": "RoomTemperature", "value": 19}]})).await;

    let (controller, _rx) = controller_for(&server.address().to_string(), Duration::from_secs(300));
    controller.sync_once().await.unwrap();
    let before = controller.state();

    server.reset().await;
    mount_metadata(&server).await;
    mount_report(&server, json!({"status_code": 0})).await;

    let result = controller.sync_once().await;
    assert!(matches!(result, Err(MeshError::Protocol { .. })));
    assert_eq!(controller.state(), before);
}

#[tokio::test]
async fn test_overlapping_syncs_issue_one_poll() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    Mock::given(method("POST"))
        .and(path("/device_request"))
        .and(body_partial_json(json!({"request": "get_device_info"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"characteristics": []}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (controller, _rx) = controller_for(&server.address().to_string(), Duration::from_secs(300));

    let (a, b) = tokio::join!(controller.sync_once(), controller.sync_once());
    let outcomes = [a.unwrap(), b.unwrap()];
    assert_eq!(
        outcomes.iter().filter(|o| **o == SyncOutcome::Skipped).count(),
        1
    );
}

// ── Timer ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_syncs_immediately_and_repeats() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    mount_report(&server, json!({"characteristics": [{"name": "RoomTemperature", "value": 18}]})).await;

    let (controller, mut rx) = controller_for(&server.address().to_string(), Duration::from_millis(100));
    assert_eq!(controller.phase(), ControllerPhase::Idle);

    controller.start();
    assert_eq!(controller.phase(), ControllerPhase::Polling);

    assert_eq!(next_synced(&mut rx).await.room_temperature, Some(18.0));
    assert_eq!(next_synced(&mut rx).await.room_temperature, Some(18.0));

    controller.shutdown();
    assert_eq!(controller.phase(), ControllerPhase::Stopped);

    // Stopped is final
    controller.start();
    assert_eq!(controller.phase(), ControllerPhase::Stopped);
}

#[tokio::test]
async fn test_loop_survives_failures() {
    let (controller, mut rx) = controller_for("127.0.0.1:1", Duration::from_millis(50));
    controller.start();

    let mut failures = 0;
    while failures < 2 {
        let event = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        if matches!(event, SyncEvent::SyncFailed { .. }) {
            failures += 1;
        }
    }
    assert_eq!(controller.phase(), ControllerPhase::Polling);
    assert_eq!(controller.state(), DeviceState::default());
    controller.shutdown();
}

// ── Setpoint writes ─────────────────────────────────────────────────

#[tokio::test]
async fn test_setpoint_is_optimistic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/device_request"))
        .and(body_json(json!({
            "request": "set_status",
            "characteristics": [{"value": 22, "cid": 19}]
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status_code": 0}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (controller, _rx) = controller_for(&server.address().to_string(), Duration::from_secs(300));

    let write = controller.set_setpoint(22.0);
    assert_eq!(controller.state().setpoint_temperature, Some(22.0));
    assert!(!write.is_finished());

    let reply = write.await.unwrap().unwrap();
    assert_eq!(reply, json!({"status_code": 0}));
    assert_eq!(controller.state().setpoint_temperature, Some(22.0));
}

#[tokio::test]
async fn test_failed_write_is_not_rolled_back() {
    let (controller, mut rx) = controller_for("127.0.0.1:1", Duration::from_secs(300));

    let result = controller.set_setpoint(25.0).await.unwrap();
    assert!(result.is_err());
    assert_eq!(controller.state().setpoint_temperature, Some(25.0));

    let events: Vec<SyncEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    assert!(matches!(events.first(), Some(SyncEvent::SetpointRequested { value, .. }) if *value == 25.0));
    assert!(matches!(events.last(), Some(SyncEvent::SyncFailed { .. })));
}

#[tokio::test]
async fn test_next_poll_overrides_optimistic_setpoint() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    mount_report(&server, json!({"characteristics": [{"name": "SetpointTemperature", "value": 20}]})).await;
    Mock::given(method("POST"))
        .and(path("/device_request"))
        .and(body_partial_json(json!({"request": "set_status"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status_code": 1})))
        .mount(&server)
        .await;

    let (controller, _rx) = controller_for(&server.address().to_string(), Duration::from_secs(300));

    controller.set_setpoint(28.0).await.unwrap().unwrap();
    assert_eq!(controller.state().setpoint_temperature, Some(28.0));

    controller.sync_once().await.unwrap();
    assert_eq!(controller.state().setpoint_temperature, Some(20.0));
}

#[tokio::test]
async fn test_setpoint_during_poll_survives_report() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    Mock::given(method("POST"))
        .and(path("/device_request"))
        .and(body_partial_json(json!({"request": "get_device_info"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"characteristics": [{"name": "RoomTemperature", "value": 19}]}))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/device_request"))
        .and(body_partial_json(json!({"request": "set_status"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status_code": 0})))
        .expect(1)
        .mount(&server)
        .await;

    let (controller, _rx) = controller_for(&server.address().to_string(), Duration::from_secs(300));

    let poll = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.sync_once().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!poll.is_finished());

    controller.set_setpoint(28.0).await.unwrap().unwrap();

    let outcome = poll.await.unwrap().unwrap();
    let expected = DeviceState {
        room_temperature: Some(19.0),
        setpoint_temperature: Some(28.0),
    };
    assert_eq!(outcome, SyncOutcome::Synced(expected));
    assert_eq!(controller.state(), expected);
}
