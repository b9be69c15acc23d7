//! Ecocontrol Discovery - Finding panels on the local network
//!
//! Discovery runs in two steps:
//! - DNS-SD browsing for announcements of the mesh-HTTP service
//! - Probing each announced address to confirm it is a panel and read its identity

pub mod announce;
pub mod discoverer;
pub mod validator;

pub use announce::{Announcement, AnnouncementSource, MdnsSource, DEFAULT_BROWSE_WINDOW, META_QUERY};
pub use discoverer::{DeviceDiscoverer, DiscoveryError, MESH_SERVICE_FQDN};
pub use validator::{DeviceValidator, ValidationMismatch};
