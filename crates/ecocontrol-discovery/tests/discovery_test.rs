// Integration tests for discovery and validation using wiremock.

use async_trait::async_trait;
use ecocontrol_core::DeviceMac;
use ecocontrol_discovery::{
    Announcement, AnnouncementSource, DeviceDiscoverer, DeviceValidator, DiscoveryError,
    ValidationMismatch, MESH_SERVICE_FQDN,
};
use ecocontrol_mesh::MeshClient;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

struct FixedSource(Vec<Announcement>);

#[async_trait]
impl AnnouncementSource for FixedSource {
    async fn browse(&self) -> Result<Vec<Announcement>, DiscoveryError> {
        Ok(self.0.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl AnnouncementSource for BrokenSource {
    async fn browse(&self) -> Result<Vec<Announcement>, DiscoveryError> {
        Err(DiscoveryError::Source("no multicast route".into()))
    }
}

fn validator() -> DeviceValidator {
    DeviceValidator::new(MeshClient::new(Duration::from_secs(2)).unwrap())
}

async fn panel_server(mac: &str, num: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mesh_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status_code": 0}))
                .insert_header("mesh-node-mac", mac)
                .insert_header("mesh-node-num", num),
        )
        .expect(1)
        .mount(&server)
        .await;
    server
}

// ── Validation ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_validate_confirms_panel() {
    let server = panel_server("AA:BB", "7").await;
    let host = server.address().to_string();

    let device = validator().validate(&host).await.expect("panel confirmed");
    assert_eq!(device.host, host);
    assert_eq!(device.id, "7");
    assert_eq!(device.mac, DeviceMac::new("AA:BB"));
}

#[tokio::test]
async fn test_validate_rejects_failing_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mesh_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status_code": 1}))
                .insert_header("mesh-node-mac", "AA:BB")
                .insert_header("mesh-node-num", "7"),
        )
        .mount(&server)
        .await;

    let host = server.address().to_string();
    assert!(validator().validate(&host).await.is_none());
    assert!(matches!(
        validator().check(&host).await,
        Err(ValidationMismatch::Status(_))
    ));
}

#[tokio::test]
async fn test_validate_rejects_malformed_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mesh_info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\"status_code\": 0")
                .insert_header("mesh-node-mac", "AA:BB")
                .insert_header("mesh-node-num", "7"),
        )
        .mount(&server)
        .await;

    let host = server.address().to_string();
    assert!(matches!(
        validator().check(&host).await,
        Err(ValidationMismatch::Probe(_))
    ));
}

#[tokio::test]
async fn test_validate_unreachable_is_not_a_match() {
    assert!(validator().validate("127.0.0.1:1").await.is_none());
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_discover_filters_and_dedupes() {
    let source = FixedSource(vec![
        Announcement::new("_mesh-http._tcp.local.", "10.0.0.5"),
        Announcement::new("_http._tcp.local", "10.0.0.6"),
        Announcement::new(MESH_SERVICE_FQDN, "10.0.0.7"),
        Announcement::new(MESH_SERVICE_FQDN, "10.0.0.5"),
    ]);
    let discoverer = DeviceDiscoverer::new(Arc::new(source), validator());

    let candidates = discoverer.discover().await.unwrap();
    assert_eq!(candidates, vec!["10.0.0.5".to_string(), "10.0.0.7".to_string()]);
}

#[tokio::test]
async fn test_discover_devices_validates_each_address_once() {
    let server = panel_server("AA:BB", "7").await;
    let host = server.address().to_string();

    let source = FixedSource(vec![
        Announcement::new(MESH_SERVICE_FQDN, host.clone()),
        Announcement::new("_printer._tcp.local", "127.0.0.1:1"),
        Announcement::new(MESH_SERVICE_FQDN, host.clone()),
    ]);
    let discoverer = DeviceDiscoverer::new(Arc::new(source), validator());

    let devices = discoverer.discover_devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].host, host);
    assert_eq!(devices[0].id, "7");
    assert_eq!(devices[0].mac.as_str(), "AA:BB");
}

#[tokio::test]
async fn test_unrelated_announcers_are_skipped() {
    let panel = panel_server("AA:BB", "7").await;

    let stranger = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mesh_info"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&stranger)
        .await;

    let source = FixedSource(vec![
        Announcement::new(MESH_SERVICE_FQDN, stranger.address().to_string()),
        Announcement::new(MESH_SERVICE_FQDN, panel.address().to_string()),
    ]);
    let discoverer = DeviceDiscoverer::new(Arc::new(source), validator());

    let devices = discoverer.discover_devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].host, panel.address().to_string());
}

#[tokio::test]
async fn test_browse_failure_falls_back_to_static_hosts() {
    let server = panel_server("CC:DD", "3").await;
    let host = server.address().to_string();

    let discoverer = DeviceDiscoverer::new(Arc::new(BrokenSource), validator())
        .with_static_hosts(vec![host.clone()]);

    assert!(discoverer.discover().await.is_err());

    let devices = discoverer.discover_devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].mac.as_str(), "CC:DD");
}

#[tokio::test]
async fn test_duplicate_mac_keeps_first_address() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        Mock::given(method("GET"))
            .and(path("/mesh_info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status_code": 0}))
                    .insert_header("mesh-node-mac", "AA:BB")
                    .insert_header("mesh-node-num", "7"),
            )
            .mount(server)
            .await;
    }

    let source = FixedSource(vec![
        Announcement::new(MESH_SERVICE_FQDN, first.address().to_string()),
        Announcement::new(MESH_SERVICE_FQDN, second.address().to_string()),
    ]);
    let discoverer = DeviceDiscoverer::new(Arc::new(source), validator());

    let devices = discoverer.discover_devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].host, first.address().to_string());
}
