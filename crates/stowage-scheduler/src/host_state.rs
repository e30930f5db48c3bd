//! Per-host scheduling state.
//!
//! A `HostState` combines the host's last-reported capacity with the
//! service record that vouched for its liveness at the last refresh.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use stowage_state::ServiceRecord;

use crate::capability::CapabilityReport;
use crate::capacity::CapacityValue;

/// Cached view of a storage host.
#[derive(Debug, Clone, PartialEq)]
pub struct HostState {
    pub host: String,
    /// `None` until the host reports a total capacity.
    pub total_capacity: Option<CapacityValue>,
    /// `None` until the host reports a free capacity.
    pub free_capacity: Option<CapacityValue>,
    /// Share of total capacity held back from scheduling (0–100).
    pub reserved_percentage: u8,
    /// Timestamp of the capability report last applied.
    pub updated_at: Option<u64>,
    /// Other backend-declared capabilities from the reports applied so far.
    pub capabilities: BTreeMap<String, Value>,
    /// Latest service record seen for this host.
    pub service: Option<Arc<ServiceRecord>>,
}

impl HostState {
    /// A host with no reported capacity and no service record.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            total_capacity: None,
            free_capacity: None,
            reserved_percentage: 0,
            updated_at: None,
            capabilities: BTreeMap::new(),
            service: None,
        }
    }

    /// Fold a capability report into this host's stored fields.
    ///
    /// Fields missing from the report, or carrying values that are neither
    /// numbers nor sentinel tokens, leave the stored value unchanged.
    pub fn apply_capability(&mut self, report: &CapabilityReport) {
        if let Some(total) = report.total_capacity_gb.as_ref().and_then(CapacityValue::from_reported) {
            self.total_capacity = Some(total);
        }
        if let Some(free) = report.free_capacity_gb.as_ref().and_then(CapacityValue::from_reported) {
            self.free_capacity = Some(free);
        }
        match report.reserved_percentage.as_ref().map(parse_percentage) {
            Some(Some(pct)) => self.reserved_percentage = pct,
            Some(None) => debug!(host = %self.host, "ignoring malformed reserved_percentage"),
            None => {}
        }
        if let Some(ts) = report.timestamp {
            self.updated_at = Some(ts);
        }
        self.capabilities.extend(
            report
                .capabilities
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    /// Attach the service record that confirmed this host at refresh time.
    pub fn set_service(&mut self, service: Arc<ServiceRecord>) {
        self.service = Some(service);
    }

    /// Availability zone of the attached service, if any.
    pub fn availability_zone(&self) -> Option<&str> {
        self.service.as_deref().map(|s| s.availability_zone.as_str())
    }
}

fn parse_percentage(raw: &Value) -> Option<u8> {
    raw.as_u64()
        .filter(|pct| *pct <= 100)
        .and_then(|pct| u8::try_from(pct).ok())
}
