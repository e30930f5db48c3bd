//! Filters that ship with the scheduler.

use serde_json::Value;
use tracing::debug;

use super::{FilterProperties, HostFilter};
use crate::host_state::HostState;

/// Passes hosts whose service lives in the requested availability zone.
#[derive(Debug, Default)]
pub struct AvailabilityZoneFilter;

impl AvailabilityZoneFilter {
    pub const NAME: &'static str = "AvailabilityZoneFilter";
}

impl HostFilter for AvailabilityZoneFilter {
    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        match props.availability_zone.as_deref() {
            None => true,
            Some(zone) => host.availability_zone() == Some(zone),
        }
    }
}

/// Passes hosts with enough free capacity for the requested size.
///
/// Unbounded and unknown free capacity always pass; the reserved share is
/// subtracted from measured free capacity before comparing.
#[derive(Debug, Default)]
pub struct CapacityFilter;

impl CapacityFilter {
    pub const NAME: &'static str = "CapacityFilter";
}

impl HostFilter for CapacityFilter {
    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        let Some(size_gb) = props.size_gb else {
            return true;
        };

        let Some(free) = host.free_capacity else {
            debug!(host = %host.host, "no free capacity reported");
            return false;
        };
        // Unbounded and unknown capacity carry no measurement.
        let Some(free_gb) = free.measured() else {
            return true;
        };

        let reserved = f64::from(host.reserved_percentage) / 100.0;
        let usable_gb = (free_gb * (1.0 - reserved)).floor();
        if usable_gb < size_gb {
            debug!(host = %host.host, usable_gb, size_gb, "insufficient free capacity");
            return false;
        }
        true
    }
}

/// Passes hosts advertising every requested extra spec.
#[derive(Debug, Default)]
pub struct CapabilitiesFilter;

impl CapabilitiesFilter {
    pub const NAME: &'static str = "CapabilitiesFilter";
}

impl HostFilter for CapabilitiesFilter {
    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        props.extra_specs.iter().all(|(key, wanted)| {
            host.capabilities
                .get(key)
                .is_some_and(|have| capability_matches(have, wanted))
        })
    }
}

fn capability_matches(have: &Value, wanted: &str) -> bool {
    match have {
        Value::String(s) => s == wanted,
        other => other.to_string() == wanted,
    }
}
