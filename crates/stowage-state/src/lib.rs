//! stowage-state — embedded service registry storage for Stowage.
//!
//! Backed by [redb](https://docs.rs/redb), holds the registration and
//! heartbeat records of the volume services whose hosts the scheduler
//! places volumes on.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value columns under
//! composite `{topic}/{host}` keys, so all services of one topic can be
//! listed with a prefix scan.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
