//! HTTP transport for mesh nodes

use ecocontrol_core::Device;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

use crate::protocol::{DeviceRequest, DEVICE_REQUEST_PATH, HEADER_NODE_MAC, HEADER_NODE_NUM, MESH_INFO_PATH};

/// Deadline applied to every request unless configured otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Transport error talking to {host}: {source}")]
    Transport {
        host: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Invalid response from {host}: {reason}")]
    Protocol { host: String, reason: String },
}

impl MeshError {
    pub fn protocol(host: &str, reason: impl Into<String>) -> Self {
        Self::Protocol {
            host: host.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Reply to the discovery probe: parsed body plus the identity headers
#[derive(Debug, Clone)]
pub struct MeshInfoReply {
    pub body: Value,
    pub node_num: Option<String>,
    pub node_mac: Option<String>,
}

impl MeshInfoReply {
    /// Numeric `status_code` of the body, if the body is an object carrying one
    pub fn status_code(&self) -> Option<f64> {
        self.body.get("status_code").and_then(Value::as_f64)
    }
}

/// Stateless mesh-HTTP client
#[derive(Debug, Clone)]
pub struct MeshClient {
    http: reqwest::Client,
}

impl MeshClient {
    /// Create a client whose requests fail after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, MeshError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MeshError::Client)?;
        Ok(Self { http })
    }

    /// Build the URL for a path on a host. Hosts without a scheme use plain HTTP.
    pub fn url(host: &str, path: &str) -> String {
        let host = host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{}{}", host, path)
        } else {
            format!("http://{}{}", host, path)
        }
    }

    /// POST a JSON payload to a confirmed device and parse the JSON reply
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        device: &Device,
        path: &str,
        payload: &T,
    ) -> Result<Value, MeshError> {
        let url = Self::url(&device.host, path);
        trace!(url = %url, mac = %device.mac, "Sending mesh request");

        let response = self
            .http
            .post(&url)
            .header(HEADER_NODE_MAC, device.mac.as_str())
            .header(HEADER_NODE_NUM, device.id.as_str())
            .header(CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|source| MeshError::Transport {
                host: device.host.clone(),
                source,
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|source| MeshError::Transport {
            host: device.host.clone(),
            source,
        })?;

        debug!(host = %device.host, status = %status, bytes = body.len(), "Received mesh reply");

        serde_json::from_slice(&body).map_err(|e| MeshError::protocol(&device.host, e.to_string()))
    }

    /// Send a `/device_request` to a confirmed device
    pub async fn request(&self, device: &Device, request: &DeviceRequest) -> Result<Value, MeshError> {
        trace!(mac = %device.mac, request = request.name(), "Device request");
        self.post(device, DEVICE_REQUEST_PATH, request).await
    }

    /// Send the discovery probe to an unconfirmed address
    pub async fn probe(&self, host: &str) -> Result<MeshInfoReply, MeshError> {
        let url = Self::url(host, MESH_INFO_PATH);
        trace!(url = %url, "Sending discovery probe");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| MeshError::Transport {
                host: host.to_string(),
                source,
            })?;

        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|source| MeshError::Transport {
            host: host.to_string(),
            source,
        })?;

        let body: Value =
            serde_json::from_slice(&body).map_err(|e| MeshError::protocol(host, e.to_string()))?;

        Ok(MeshInfoReply {
            body,
            node_num: header_value(&headers, HEADER_NODE_NUM),
            node_mac: header_value(&headers, HEADER_NODE_MAC),
        })
    }
}

/// Header lookup is case-insensitive; empty values count as absent
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
