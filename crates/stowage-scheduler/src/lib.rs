//! stowage-scheduler — host selection for volume placement.
//!
//! Tracks which storage hosts are alive and what capacity they last
//! reported, and narrows a candidate set down to the hosts that pass a
//! configurable chain of filters. The scheduler:
//!
//! - Ingests capability reports from backend drivers (last-write-wins per host)
//! - Rebuilds the live host-state map from the service registry on refresh
//! - Resolves named filter chains against a static filter registry
//! - Runs the chain over candidates with per-host short-circuit
//!
//! # Architecture
//!
//! ```text
//! HostManager
//!   ├── ServiceRegistry (list services by topic, liveness check)
//!   ├── CapabilityTracker (host → latest CapabilityReport)
//!   ├── host_state_map (Arc<HashMap<host, HostState>>, swapped per refresh)
//!   └── FilterRegistry (name → factory) ──resolve──► FilterChain
//! ```

pub mod capability;
pub mod capacity;
pub mod clock;
pub mod config;
pub mod error;
pub mod filters;
pub mod host_manager;
pub mod host_state;
pub mod registry;

pub use capability::{CapabilityReport, CapabilityTracker, ServiceStates};
pub use capacity::CapacityValue;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SchedulerConfig, StowageConfig};
pub use error::{SchedulerError, SchedulerResult};
pub use filters::{FilterChain, FilterProperties, FilterRegistry, HostFilter};
pub use host_manager::{HostManager, HostStateMap};
pub use host_state::HostState;
pub use registry::{RegistryError, RequestContext, ServiceRegistry, StoreServiceRegistry};
