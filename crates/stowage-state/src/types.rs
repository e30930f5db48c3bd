//! Domain types for the Stowage state store.

use serde::{Deserialize, Serialize};

/// Registration entry for the process managing a storage host.
///
/// Owned by the registry; the scheduler only holds shared references
/// captured at refresh time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRecord {
    /// Opaque identifier assigned at registration.
    pub id: u64,
    /// Host name the service runs on.
    pub host: String,
    /// Service category, e.g. `volume`.
    pub topic: String,
    /// Administratively disabled services are never scheduled to.
    pub disabled: bool,
    pub availability_zone: String,
    /// Unix timestamp (seconds) of registration.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last heartbeat, if any.
    pub updated_at: Option<u64>,
}

impl ServiceRecord {
    /// Build the composite key for the services table.
    pub fn table_key(&self) -> String {
        service_key(&self.topic, &self.host)
    }

    /// Time of the most recent sign of life.
    pub fn last_heartbeat(&self) -> u64 {
        self.updated_at.unwrap_or(self.created_at)
    }
}

/// Composite services-table key for a topic/host pair.
pub fn service_key(topic: &str, host: &str) -> String {
    format!("{topic}/{host}")
}
