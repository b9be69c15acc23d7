//! DNS-SD announcement sources

use async_trait::async_trait;
use mdns_sd::{Receiver, ServiceDaemon, ServiceEvent};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, trace};

use crate::discoverer::DiscoveryError;

/// DNS-SD meta query listing every advertised service type
pub const META_QUERY: &str = "_services._dns-sd._udp.local.";

/// Default browse window for one discovery run
pub const DEFAULT_BROWSE_WINDOW: Duration = Duration::from_secs(3);

/// A service announcement seen on the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Fully-qualified service type, e.g. `_mesh-http._tcp.local`
    pub fqdn: String,
    /// Address of the announcing host, usable as a device host
    pub address: String,
}

impl Announcement {
    pub fn new(fqdn: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            address: address.into(),
        }
    }
}

/// Anything that can list service announcements for one discovery run
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    async fn browse(&self) -> Result<Vec<Announcement>, DiscoveryError>;
}

/// Compare service names ignoring the trailing root dot
pub fn same_service(a: &str, b: &str) -> bool {
    a.trim_end_matches('.') == b.trim_end_matches('.')
}

/// mDNS browser built on `mdns-sd`
///
/// Sends the meta query first. Service types matching `service_fqdn` are then
/// browsed for the rest of the window and every resolved address becomes an
/// announcement.
pub struct MdnsSource {
    service_fqdn: String,
    window: Duration,
}

impl MdnsSource {
    pub fn new(service_fqdn: &str, window: Duration) -> Self {
        Self {
            service_fqdn: service_fqdn.to_string(),
            window,
        }
    }

    async fn collect(&self, daemon: &ServiceDaemon) -> Result<Vec<Announcement>, DiscoveryError> {
        let phase = self.window / 2;

        let types = advertised_types(daemon, phase).await?;
        let wanted: Vec<String> = types
            .into_iter()
            .filter(|ty| same_service(ty, &self.service_fqdn))
            .collect();

        if wanted.is_empty() {
            debug!(service = %self.service_fqdn, "No mesh service type advertised");
            return Ok(Vec::new());
        }

        let mut announcements = Vec::new();
        for ty in wanted {
            announcements.extend(resolve_type(daemon, &ty, phase).await?);
        }
        Ok(announcements)
    }
}

#[async_trait]
impl AnnouncementSource for MdnsSource {
    async fn browse(&self) -> Result<Vec<Announcement>, DiscoveryError> {
        let daemon = ServiceDaemon::new().map_err(|e| DiscoveryError::Mdns(e.to_string()))?;

        let result = self.collect(&daemon).await;

        if let Err(e) = daemon.shutdown() {
            debug!(error = %e, "Failed to shut down mDNS daemon");
        }

        if let Ok(found) = &result {
            info!(count = found.len(), "mDNS browse finished");
        }
        result
    }
}

/// Service types answered to the meta query within `window`
async fn advertised_types(
    daemon: &ServiceDaemon,
    window: Duration,
) -> Result<Vec<String>, DiscoveryError> {
    let receiver = daemon
        .browse(META_QUERY)
        .map_err(|e| DiscoveryError::Mdns(e.to_string()))?;

    let mut types: Vec<String> = Vec::new();
    for event in drain_until(&receiver, Instant::now() + window).await {
        if let ServiceEvent::ServiceFound(_, fullname) = event {
            trace!(service = %fullname, "Service type advertised");
            if !types.contains(&fullname) {
                types.push(fullname);
            }
        }
    }

    if let Err(e) = daemon.stop_browse(META_QUERY) {
        trace!(error = %e, "stop_browse failed for meta query");
    }
    Ok(types)
}

/// Addresses of every instance of `ty` resolved within `window`
async fn resolve_type(
    daemon: &ServiceDaemon,
    ty: &str,
    window: Duration,
) -> Result<Vec<Announcement>, DiscoveryError> {
    let ty_domain = if ty.ends_with('.') {
        ty.to_string()
    } else {
        format!("{}.", ty)
    };

    let receiver = daemon
        .browse(&ty_domain)
        .map_err(|e| DiscoveryError::Mdns(e.to_string()))?;

    let mut announcements = Vec::new();
    for event in drain_until(&receiver, Instant::now() + window).await {
        if let ServiceEvent::ServiceResolved(info) = event {
            let mut addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
            addresses.sort();
            debug!(
                instance = %info.get_fullname(),
                addresses = addresses.len(),
                "Resolved mesh service instance"
            );
            for ip in addresses {
                announcements.push(Announcement::new(
                    info.get_type(),
                    host_for(ip, info.get_port()),
                ));
            }
        }
    }

    if let Err(e) = daemon.stop_browse(&ty_domain) {
        trace!(error = %e, service = %ty_domain, "stop_browse failed");
    }
    Ok(announcements)
}

/// Collect events until the deadline passes or the channel closes
async fn drain_until(receiver: &Receiver<ServiceEvent>, deadline: Instant) -> Vec<ServiceEvent> {
    let mut events = Vec::new();
    while let Ok(Ok(event)) = timeout_at(deadline, receiver.recv_async()).await {
        events.push(event);
    }
    events
}

/// Device host string for an announced address. Port 80 is implied.
pub fn host_for(ip: IpAddr, port: u16) -> String {
    match (ip, port) {
        (IpAddr::V4(v4), 80 | 0) => v4.to_string(),
        (IpAddr::V4(v4), port) => format!("{}:{}", v4, port),
        (IpAddr::V6(v6), 80 | 0) => format!("[{}]", v6),
        (IpAddr::V6(v6), port) => format!("[{}]:{}", v6, port),
    }
}
