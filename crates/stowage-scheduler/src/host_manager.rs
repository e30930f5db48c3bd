//! Host manager — owns the live host-state map and runs filter chains.
//!
//! The `HostManager` is the piece a placement request talks to:
//! - Records capability reports from backend drivers
//! - Rebuilds the host-state map from the service registry on refresh
//! - Resolves filter chains and applies them to candidate hosts
//!
//! Refresh builds a complete new map before swapping it in. Readers take
//! an `Arc` of one complete map and keep it for their whole filtering
//! pass, so they never observe a half-built snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::capability::{CapabilityReport, CapabilityTracker, ServiceStates};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::filters::{FilterChain, FilterProperties, FilterRegistry};
use crate::host_state::HostState;
use crate::registry::{RequestContext, ServiceRegistry};

/// Host name → state of every host considered live at the last refresh.
pub type HostStateMap = Arc<HashMap<String, Arc<HostState>>>;

/// Tracks host liveness and capacity, and filters hosts for placement.
pub struct HostManager<R> {
    registry: Arc<R>,
    filters: FilterRegistry,
    config: SchedulerConfig,
    capabilities: CapabilityTracker,
    host_state_map: RwLock<HostStateMap>,
}

impl<R: ServiceRegistry> HostManager<R> {
    /// Create a host manager with an empty host-state map.
    ///
    /// The configured default filter list becomes the registry's default
    /// chain.
    pub fn new(
        registry: Arc<R>,
        filters: FilterRegistry,
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let filters = filters.with_default_filters(config.default_filters.clone());
        let capabilities = CapabilityTracker::new(config.volume_topic.clone(), clock);
        Self {
            registry,
            filters,
            config,
            capabilities,
            host_state_map: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // ── Capabilities ───────────────────────────────────────────────

    /// Record the latest capability report from `host`.
    ///
    /// The stored copy is stamped with the capture time; `report` itself
    /// is left untouched.
    pub async fn record_capabilities(&self, topic: &str, host: &str, report: &CapabilityReport) {
        self.capabilities.record(topic, host, report).await;
    }

    /// Shared handle to the host → latest capability report mapping.
    pub fn service_states(&self) -> ServiceStates {
        self.capabilities.states()
    }

    // ── Host states ────────────────────────────────────────────────

    /// The current host-state map.
    pub async fn host_state_map(&self) -> HostStateMap {
        let map = self.host_state_map.read().await;
        Arc::clone(&map)
    }

    /// Rebuild the host-state map from the service registry.
    ///
    /// Disabled services and services that are not up are left out. Hosts
    /// that stay live keep their previous state, are updated with their
    /// latest capability report, and get the fresh service record attached.
    /// The new map replaces the old one entirely.
    ///
    /// A registry failure or timeout returns an error and leaves the current
    /// map in place.
    pub async fn refresh(&self, ctx: &RequestContext) -> SchedulerResult<HostStateMap> {
        let topic = self.config.volume_topic.as_str();
        let timeout = self.config.refresh_timeout;

        let services = match tokio::time::timeout(timeout, self.registry.list_services(ctx, topic)).await {
            Ok(Ok(services)) => services,
            Ok(Err(e)) => {
                warn!(request_id = %ctx.request_id, %topic, error = %e, "service registry query failed, keeping current host states");
                return Err(e.into());
            }
            Err(_) => {
                warn!(request_id = %ctx.request_id, %topic, ?timeout, "service registry query timed out, keeping current host states");
                return Err(SchedulerError::RegistryTimeout(timeout));
            }
        };

        let previous = self.host_state_map().await;
        let states = self.capabilities.states();
        let reports = states.read().await;

        let mut next = HashMap::with_capacity(services.len());
        for service in services {
            if service.disabled {
                warn!(host = %service.host, %topic, "service is disabled, skipping host");
                continue;
            }
            if !self.registry.is_up(&service) {
                warn!(host = %service.host, %topic, "service is down, skipping host");
                continue;
            }

            let mut state = match previous.get(&service.host) {
                Some(existing) => HostState::clone(existing),
                None => HostState::new(service.host.clone()),
            };
            if let Some(report) = reports.get(&service.host) {
                state.apply_capability(report);
            }
            let host = service.host.clone();
            state.set_service(service);
            next.insert(host, Arc::new(state));
        }
        drop(reports);

        let next = Arc::new(next);
        {
            let mut map = self.host_state_map.write().await;
            *map = Arc::clone(&next);
        }

        let dropped = previous.keys().filter(|host| !next.contains_key(*host)).count();
        info!(request_id = %ctx.request_id, live_hosts = next.len(), dropped, "host states refreshed");
        Ok(next)
    }

    /// Refresh immediately, then every `refresh_interval` until `shutdown`
    /// flips.
    ///
    /// Failed refreshes are logged; the previous map stays in place.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let interval = self.config.refresh_interval;
        info!(interval_ms = interval.as_millis() as u64, "host state refresh loop started");

        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            let ctx = RequestContext::new(format!("refresh-{cycle}"));
            if let Err(e) = self.refresh(&ctx).await {
                warn!(error = %e, retryable = e.is_retryable(), "periodic refresh failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("host state refresh loop shutting down");
                    break;
                }
            }
        }
    }

    // ── Filtering ──────────────────────────────────────────────────

    /// Resolve requested filter names, or the default chain when `None`.
    pub fn resolve_filters(&self, requested: Option<&[String]>) -> SchedulerResult<FilterChain> {
        self.filters.resolve(requested)
    }

    /// The candidates passing every filter of the requested chain.
    ///
    /// Fails with [`SchedulerError::FilterNotFound`] before evaluating
    /// anything if a requested filter is unknown.
    pub fn get_filtered_hosts(
        &self,
        candidates: &[Arc<HostState>],
        props: &FilterProperties,
        requested: Option<&[String]>,
    ) -> SchedulerResult<Vec<Arc<HostState>>> {
        let chain = self.resolve_filters(requested)?;
        let passed = chain.filter_hosts(candidates, props);
        debug!(candidates = candidates.len(), passed = passed.len(), "hosts filtered");
        Ok(passed)
    }

    /// Like [`get_filtered_hosts`](Self::get_filtered_hosts), stopping
    /// with [`SchedulerError::Cancelled`] once `cancel` reads `true`.
    pub fn get_filtered_hosts_until(
        &self,
        candidates: &[Arc<HostState>],
        props: &FilterProperties,
        requested: Option<&[String]>,
        cancel: &watch::Receiver<bool>,
    ) -> SchedulerResult<Vec<Arc<HostState>>> {
        let chain = self.resolve_filters(requested)?;
        chain.filter_hosts_until(candidates, props, cancel)
    }

    /// Refresh, then filter every live host.
    ///
    /// The filter chain is resolved first so a bad filter name fails the
    /// request without touching the registry.
    pub async fn select_hosts(
        &self,
        ctx: &RequestContext,
        props: &FilterProperties,
        requested: Option<&[String]>,
    ) -> SchedulerResult<Vec<Arc<HostState>>> {
        let chain = self.resolve_filters(requested)?;
        let snapshot = self.refresh(ctx).await?;
        let candidates: Vec<Arc<HostState>> = snapshot.values().cloned().collect();
        let passed = chain.filter_hosts(&candidates, props);
        info!(request_id = %ctx.request_id, candidates = candidates.len(), passed = passed.len(), "hosts selected");
        Ok(passed)
    }
}
