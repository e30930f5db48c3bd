//! StateStore — redb-backed persistence for service records.
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SERVICES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Services ───────────────────────────────────────────────────

    /// Insert or update a service record.
    pub fn put_service(&self, svc: &ServiceRecord) -> StateResult<()> {
        let key = svc.table_key();
        let value = serde_json::to_vec(svc).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "service stored");
        Ok(())
    }

    /// Get the service record for a topic/host pair.
    pub fn get_service(&self, topic: &str, host: &str) -> StateResult<Option<ServiceRecord>> {
        let key = service_key(topic, host);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let svc: ServiceRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(svc))
            }
            None => Ok(None),
        }
    }

    /// List every service registered under a topic, in host-name order.
    pub fn list_services_by_topic(&self, topic: &str) -> StateResult<Vec<ServiceRecord>> {
        let prefix = format!("{topic}/");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let svc: ServiceRecord =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(svc);
            }
        }
        Ok(results)
    }

    /// Delete a service record. Returns true if it existed.
    pub fn delete_service(&self, topic: &str, host: &str) -> StateResult<bool> {
        let key = service_key(topic, host);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "service deleted");
        Ok(existed)
    }

    /// Register a service, or refresh the zone of an existing registration.
    ///
    /// New registrations get the next free identifier. Existing records keep
    /// their identifier and disabled flag.
    pub fn register_service(
        &self,
        topic: &str,
        host: &str,
        availability_zone: &str,
        now: u64,
    ) -> StateResult<ServiceRecord> {
        let record = match self.get_service(topic, host)? {
            Some(mut existing) => {
                existing.availability_zone = availability_zone.to_string();
                existing.updated_at = Some(now);
                existing
            }
            None => ServiceRecord {
                id: self.next_service_id()?,
                host: host.to_string(),
                topic: topic.to_string(),
                disabled: false,
                availability_zone: availability_zone.to_string(),
                created_at: now,
                updated_at: None,
            },
        };
        self.put_service(&record)?;
        Ok(record)
    }

    /// Record a heartbeat. Returns false if the service is not registered.
    pub fn heartbeat_service(&self, topic: &str, host: &str, now: u64) -> StateResult<bool> {
        match self.get_service(topic, host)? {
            Some(mut svc) => {
                svc.updated_at = Some(now);
                self.put_service(&svc)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Set the disabled flag. Returns false if the service is not registered.
    pub fn set_service_disabled(&self, topic: &str, host: &str, disabled: bool) -> StateResult<bool> {
        match self.get_service(topic, host)? {
            Some(mut svc) => {
                svc.disabled = disabled;
                self.put_service(&svc)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn next_service_id(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SERVICES).map_err(map_err!(Table))?;
        let mut max_id = 0;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let svc: ServiceRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            max_id = max_id.max(svc.id);
        }
        Ok(max_id + 1)
    }
}
