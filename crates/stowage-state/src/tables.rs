//! redb table definitions for the Stowage state store.

use redb::TableDefinition;

/// Service records keyed by `{topic}/{host}`.
pub const SERVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("services");
