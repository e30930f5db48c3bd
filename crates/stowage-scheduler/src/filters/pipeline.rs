//! Filter chain execution.
//!
//! Each candidate host is evaluated on its own: filters run in chain
//! order and the first rejection drops the host without consulting the
//! remaining filters.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::{FilterProperties, HostFilter};
use crate::error::{SchedulerError, SchedulerResult};
use crate::host_state::HostState;

/// A filter instance paired with the name it was resolved under.
pub struct NamedFilter {
    name: String,
    filter: Box<dyn HostFilter>,
}

impl NamedFilter {
    pub fn new(name: String, filter: Box<dyn HostFilter>) -> Self {
        Self { name, filter }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An ordered AND-composition of filters.
pub struct FilterChain {
    filters: Vec<NamedFilter>,
}

impl FilterChain {
    pub fn new(filters: Vec<NamedFilter>) -> Self {
        Self { filters }
    }

    /// Filter names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(NamedFilter::name).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Whether `host` passes every filter, stopping at the first rejection.
    pub fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
        match self.rejected_by(host, props) {
            Some(filter) => {
                debug!(host = %host.host, %filter, "host rejected");
                false
            }
            None => true,
        }
    }

    /// The hosts among `candidates` that pass the whole chain.
    ///
    /// Output order follows input order but callers should not rely on it.
    pub fn filter_hosts(
        &self,
        candidates: &[Arc<HostState>],
        props: &FilterProperties,
    ) -> Vec<Arc<HostState>> {
        candidates
            .iter()
            .filter(|host| self.host_passes(host, props))
            .cloned()
            .collect()
    }

    /// Like [`filter_hosts`](Self::filter_hosts), but gives up with
    /// [`SchedulerError::Cancelled`] once `cancel` reads `true`.
    ///
    /// The flag is checked before every host and every filter.
    pub fn filter_hosts_until(
        &self,
        candidates: &[Arc<HostState>],
        props: &FilterProperties,
        cancel: &watch::Receiver<bool>,
    ) -> SchedulerResult<Vec<Arc<HostState>>> {
        let mut passed = Vec::new();
        'hosts: for host in candidates {
            for named in &self.filters {
                if *cancel.borrow() {
                    debug!(host = %host.host, "host filtering cancelled");
                    return Err(SchedulerError::Cancelled);
                }
                if !named.filter.host_passes(host, props) {
                    debug!(host = %host.host, filter = %named.name, "host rejected");
                    continue 'hosts;
                }
            }
            passed.push(Arc::clone(host));
        }
        if *cancel.borrow() {
            return Err(SchedulerError::Cancelled);
        }
        Ok(passed)
    }

    fn rejected_by(&self, host: &HostState, props: &FilterProperties) -> Option<&str> {
        self.filters
            .iter()
            .find(|named| !named.filter.host_passes(host, props))
            .map(NamedFilter::name)
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Calls seen by recording filters: (filter, host, props address).
    type CallLog = Arc<Mutex<Vec<(String, String, usize)>>>;

    struct RecordingFilter {
        name: &'static str,
        verdict: fn(&HostState) -> bool,
        calls: CallLog,
    }

    impl HostFilter for RecordingFilter {
        fn host_passes(&self, host: &HostState, props: &FilterProperties) -> bool {
            self.calls.lock().unwrap().push((
                self.name.to_string(),
                host.host.clone(),
                props as *const FilterProperties as usize,
            ));
            (self.verdict)(host)
        }
    }

    fn recording(name: &'static str, verdict: fn(&HostState) -> bool, calls: &CallLog) -> NamedFilter {
        NamedFilter::new(
            name.to_string(),
            Box::new(RecordingFilter {
                name,
                verdict,
                calls: Arc::clone(calls),
            }),
        )
    }

    fn fake_hosts() -> Vec<Arc<HostState>> {
        (1..5)
            .map(|x| Arc::new(HostState::new(format!("fake_host{x}"))))
            .collect()
    }

    fn host_names(hosts: &[Arc<HostState>]) -> HashSet<String> {
        hosts.iter().map(|h| h.host.clone()).collect()
    }

    #[test]
    fn every_host_sees_identical_properties() {
        let calls = CallLog::default();
        let chain = FilterChain::new(vec![recording("FakeFilterClass1", |_| true, &calls)]);
        let props: FilterProperties = serde_json::from_value(serde_json::json!({
            "moo": 1,
            "cow": 2,
        }))
        .unwrap();
        let hosts = fake_hosts();

        let result = chain.filter_hosts(&hosts, &props);

        let expected_addr = &props as *const FilterProperties as usize;
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|(_, _, addr)| *addr == expected_addr));
        let seen: HashSet<String> = calls.iter().map(|(_, host, _)| host.clone()).collect();
        assert_eq!(seen, host_names(&hosts));
        assert_eq!(host_names(&result), host_names(&hosts));
    }

    #[test]
    fn rejected_host_short_circuits_remaining_filters() {
        let calls = CallLog::default();
        let chain = FilterChain::new(vec![
            recording("first", |h| h.host != "fake_host2", &calls),
            recording("second", |_| true, &calls),
        ]);

        let result = chain.filter_hosts(&fake_hosts(), &FilterProperties::default());

        assert_eq!(result.len(), 3);
        let calls = calls.lock().unwrap();
        let second_hosts: HashSet<&str> = calls
            .iter()
            .filter(|(filter, _, _)| filter == "second")
            .map(|(_, host, _)| host.as_str())
            .collect();
        assert!(!second_hosts.contains("fake_host2"));
        assert_eq!(second_hosts.len(), 3);
    }

    #[test]
    fn survivors_pass_every_filter() {
        let calls = CallLog::default();
        let chain = FilterChain::new(vec![
            recording("odd", |h| h.host.ends_with('1') || h.host.ends_with('3'), &calls),
            recording("not_three", |h| h.host != "fake_host3", &calls),
        ]);

        let result = chain.filter_hosts(&fake_hosts(), &FilterProperties::default());
        assert_eq!(host_names(&result), HashSet::from(["fake_host1".to_string()]));
    }

    #[test]
    fn empty_chain_passes_everything() {
        let chain = FilterChain::new(Vec::new());
        let hosts = fake_hosts();
        assert_eq!(chain.filter_hosts(&hosts, &FilterProperties::default()).len(), 4);
    }

    #[test]
    fn no_survivors_is_an_empty_result() {
        let calls = CallLog::default();
        let chain = FilterChain::new(vec![recording("never", |_| false, &calls)]);
        assert!(chain.filter_hosts(&fake_hosts(), &FilterProperties::default()).is_empty());
    }

    #[test]
    fn cancelled_filtering_stops_early() {
        let calls = CallLog::default();
        let chain = FilterChain::new(vec![recording("any", |_| true, &calls)]);
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let result = chain.filter_hosts_until(&fake_hosts(), &FilterProperties::default(), &rx);

        assert!(matches!(result, Err(SchedulerError::Cancelled)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn uncancelled_filtering_matches_plain_filtering() {
        let calls = CallLog::default();
        let chain = FilterChain::new(vec![recording("some", |h| h.host != "fake_host4", &calls)]);
        let (_tx, rx) = watch::channel(false);

        let result = chain
            .filter_hosts_until(&fake_hosts(), &FilterProperties::default(), &rx)
            .unwrap();
        assert_eq!(result.len(), 3);
    }
}
