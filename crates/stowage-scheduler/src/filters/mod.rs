//! Host filters — per-host eligibility predicates.
//!
//! A filter answers one question for one host: may this request land
//! here? Filters are registered by name in a [`FilterRegistry`], resolved
//! into an ordered [`FilterChain`] per request, and evaluated with AND
//! semantics.

pub mod builtin;
pub mod pipeline;
pub mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::host_state::HostState;

pub use builtin::{AvailabilityZoneFilter, CapabilitiesFilter, CapacityFilter};
pub use pipeline::FilterChain;
pub use registry::{FilterFactory, FilterRegistry};

/// A side-effect-free eligibility predicate.
pub trait HostFilter: Send + Sync {
    /// Whether `host` is eligible for the request described by `props`.
    fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool;
}

/// Request-scoped properties handed unchanged to every filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterProperties {
    /// Requested volume size in GiB.
    #[serde(default)]
    pub size_gb: Option<f64>,
    #[serde(default)]
    pub availability_zone: Option<String>,
    /// Capabilities the host must advertise, compared as strings.
    #[serde(default)]
    pub extra_specs: BTreeMap<String, String>,
    /// Keys understood only by out-of-tree filters.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
