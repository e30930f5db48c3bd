//! Capability reports and the per-host latest-report snapshot.
//!
//! Backend drivers periodically publish what they can offer. The tracker
//! keeps only the newest report per host, stamped with the instant the
//! scheduler captured it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::clock::Clock;

/// A capability report as published by a backend driver.
///
/// Capacity fields are kept as raw JSON because drivers mix numbers with
/// sentinel tokens; [`crate::HostState::apply_capability`] normalizes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_capacity_gb: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_capacity_gb: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved_percentage: Option<Value>,
    /// Unix timestamp (seconds) of the report.
    ///
    /// Drivers stamp this in assorted formats and the tracker overwrites it
    /// with the capture time, so anything but an unsigned integer reads as
    /// `None` rather than failing the whole report.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<u64>,
    /// Any other backend-declared capability, e.g. `volume_backend_name`.
    #[serde(flatten)]
    pub capabilities: BTreeMap<String, Value>,
}

impl CapabilityReport {
    /// A copy of this report stamped with the given capture time.
    pub fn captured_at(&self, now: u64) -> Self {
        Self {
            timestamp: Some(now),
            ..self.clone()
        }
    }
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(Value::as_u64))
}

/// Shared handle to the host → latest report mapping.
///
/// The handle is created once per tracker and never replaced, so holders
/// observe new reports without re-fetching it.
pub type ServiceStates = Arc<RwLock<HashMap<String, CapabilityReport>>>;

/// Records the latest capability report per host for one service topic.
pub struct CapabilityTracker {
    topic: String,
    states: ServiceStates,
    clock: Arc<dyn Clock>,
}

impl CapabilityTracker {
    /// Create a tracker accepting reports for `topic`.
    pub fn new(topic: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            topic: topic.into(),
            states: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Store a capture-stamped copy of `report` as the latest for `host`.
    ///
    /// Reports for other topics are ignored. The caller's report is never
    /// modified.
    pub async fn record(&self, topic: &str, host: &str, report: &CapabilityReport) {
        if topic != self.topic {
            debug!(%topic, %host, "ignoring capability update for foreign topic");
            return;
        }

        let captured = report.captured_at(self.clock.now());
        let mut states = self.states.write().await;
        states.insert(host.to_string(), captured);
        debug!(%host, "capability report recorded");
    }

    /// The shared snapshot handle.
    pub fn states(&self) -> ServiceStates {
        Arc::clone(&self.states)
    }
}
