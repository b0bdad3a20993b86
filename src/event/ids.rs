//! Type-safe identifiers for cached events and tickets

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a monitored object: host plus service
///
/// An empty service denotes the host check itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub host: String,
    pub service: String,
}

impl EventKey {
    pub fn new(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            service: service.into(),
        }
    }

    /// Key for a host check
    pub fn host(host: impl Into<String>) -> Self {
        Self::new(host, "")
    }

    /// Whether this key refers to a host check rather than a service
    pub fn is_host_check(&self) -> bool {
        self.service.is_empty()
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.service)
    }
}

/// Type-safe wrapper for ticket numbers in the ticket system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(u64);

impl TicketId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for TicketId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}
