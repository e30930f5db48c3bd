//! Service registry seam.
//!
//! The registry owns service records and decides liveness; the host
//! manager only reads from it during refresh.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use stowage_state::{ServiceRecord, StateError, StateStore};

use crate::clock::Clock;

/// Errors surfaced by a service registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service registry unavailable: {0}")]
    Unavailable(String),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

/// Opaque per-request context threaded into registry calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
        }
    }
}

/// Source of service records and their liveness.
pub trait ServiceRegistry: Send + Sync {
    /// All services registered under `topic`.
    fn list_services(
        &self,
        ctx: &RequestContext,
        topic: &str,
    ) -> impl Future<Output = Result<Vec<Arc<ServiceRecord>>, RegistryError>> + Send;

    /// Whether the service has heartbeated recently enough to be trusted.
    fn is_up(&self, service: &ServiceRecord) -> bool;
}

/// Registry over the redb-backed [`StateStore`].
///
/// A service is up while its last heartbeat lies within
/// `service_down_time` of the clock.
pub struct StoreServiceRegistry {
    state: StateStore,
    service_down_time: Duration,
    clock: Arc<dyn Clock>,
}

impl StoreServiceRegistry {
    pub fn new(state: StateStore, service_down_time: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state,
            service_down_time,
            clock,
        }
    }
}

impl ServiceRegistry for StoreServiceRegistry {
    async fn list_services(
        &self,
        ctx: &RequestContext,
        topic: &str,
    ) -> Result<Vec<Arc<ServiceRecord>>, RegistryError> {
        let services = self.state.list_services_by_topic(topic)?;
        debug!(request_id = %ctx.request_id, %topic, count = services.len(), "services listed");
        Ok(services.into_iter().map(Arc::new).collect())
    }

    fn is_up(&self, service: &ServiceRecord) -> bool {
        let elapsed = self.clock.now().abs_diff(service.last_heartbeat());
        elapsed <= self.service_down_time.as_secs()
    }
}
