//! Filter registry — name → filter factory.
//!
//! Filters are registered explicitly at startup. Resolution is an exact
//! name lookup; a request naming any unregistered filter fails as a whole.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::builtin::{AvailabilityZoneFilter, CapabilitiesFilter, CapacityFilter};
use super::pipeline::{FilterChain, NamedFilter};
use super::HostFilter;
use crate::error::{SchedulerError, SchedulerResult};

/// Builds a fresh filter instance for a resolved chain.
pub type FilterFactory = Arc<dyn Fn() -> Box<dyn HostFilter> + Send + Sync>;

/// Registered filters plus the chain used when a request names none.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    factories: HashMap<String, FilterFactory>,
    default_filters: Vec<String>,
}

impl FilterRegistry {
    /// An empty registry with no default chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the filters that ship with the scheduler.
    pub fn with_builtin_filters() -> Self {
        let mut registry = Self::new();
        registry.register_default::<AvailabilityZoneFilter>(AvailabilityZoneFilter::NAME);
        registry.register_default::<CapacityFilter>(CapacityFilter::NAME);
        registry.register_default::<CapabilitiesFilter>(CapabilitiesFilter::NAME);
        registry
    }

    /// Set the filter names used when a request does not name any.
    pub fn with_default_filters(mut self, names: Vec<String>) -> Self {
        self.default_filters = names;
        self
    }

    /// Register a filter factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn HostFilter> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.insert(name.clone(), Arc::new(factory)).is_some() {
            warn!(filter = %name, "filter re-registered, previous factory replaced");
        }
    }

    /// Register a filter type built through `Default`.
    pub fn register_default<T>(&mut self, name: impl Into<String>)
    where
        T: HostFilter + Default + 'static,
    {
        self.register(name, || Box::new(T::default()));
    }

    /// Whether a filter is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered filter names, sorted.
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve requested names (or the default chain) into a filter chain.
    ///
    /// The chain keeps the requested order. Any unknown name fails the whole
    /// resolution with [`SchedulerError::FilterNotFound`].
    pub fn resolve(&self, requested: Option<&[String]>) -> SchedulerResult<FilterChain> {
        let names = requested.unwrap_or(&self.default_filters);

        if let Some(missing) = names.iter().find(|name| !self.contains(name)) {
            return Err(SchedulerError::FilterNotFound(missing.clone()));
        }

        let filters = names
            .iter()
            .filter_map(|name| {
                self.factories
                    .get(name)
                    .map(|factory| NamedFilter::new(name.clone(), factory()))
            })
            .collect();

        debug!(filters = ?names, "filter chain resolved");
        Ok(FilterChain::new(filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterProperties;
    use crate::host_state::HostState;

    #[derive(Default)]
    struct FakeFilterClass1;

    impl HostFilter for FakeFilterClass1 {
        fn host_passes(&self, _host: &HostState, _props: &FilterProperties) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct FakeFilterClass2;

    impl HostFilter for FakeFilterClass2 {
        fn host_passes(&self, _host: &HostState, _props: &FilterProperties) -> bool {
            false
        }
    }

    fn fake_registry(defaults: &[&str]) -> FilterRegistry {
        let mut registry = FilterRegistry::new()
            .with_default_filters(defaults.iter().map(|s| s.to_string()).collect());
        registry.register_default::<FakeFilterClass1>("FakeFilterClass1");
        registry.register_default::<FakeFilterClass2>("FakeFilterClass2");
        registry
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unknown_default_filter_is_rejected() {
        let registry = fake_registry(&["FakeFilterClass3"]);
        let result = registry.resolve(None);
        assert!(matches!(result, Err(SchedulerError::FilterNotFound(name)) if name == "FakeFilterClass3"));
    }

    #[test]
    fn unknown_filter_is_rejected_in_any_position() {
        let registry = fake_registry(&[]);
        for requested in [
            names(&["Missing", "FakeFilterClass1"]),
            names(&["FakeFilterClass1", "Missing", "FakeFilterClass2"]),
            names(&["FakeFilterClass1", "FakeFilterClass2", "Missing"]),
        ] {
            let result = registry.resolve(Some(requested.as_slice()));
            assert!(matches!(result, Err(SchedulerError::FilterNotFound(_))));
        }
    }

    #[test]
    fn default_chain_resolves_single_filter() {
        let registry = fake_registry(&["FakeFilterClass2"]);
        let chain = registry.resolve(None).unwrap();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain.names(), vec!["FakeFilterClass2"]);
    }

    #[test]
    fn requested_names_override_defaults_and_keep_order() {
        let registry = fake_registry(&["FakeFilterClass1"]);
        let requested = names(&["FakeFilterClass2", "FakeFilterClass1"]);
        let chain = registry.resolve(Some(requested.as_slice())).unwrap();

        assert_eq!(chain.names(), vec!["FakeFilterClass2", "FakeFilterClass1"]);
    }

    #[test]
    fn empty_request_yields_empty_chain() {
        let registry = fake_registry(&["FakeFilterClass1"]);
        let chain = registry.resolve(Some(Vec::new().as_slice())).unwrap();
        assert!(chain.is_empty());
    }

    #[test]
    fn builtin_registry_knows_shipped_filters() {
        let registry = FilterRegistry::with_builtin_filters();
        assert_eq!(
            registry.registered(),
            vec!["AvailabilityZoneFilter", "CapabilitiesFilter", "CapacityFilter"]
        );
        assert!(registry.contains("CapacityFilter"));
        assert!(!registry.contains("JsonFilter"));
    }
}
