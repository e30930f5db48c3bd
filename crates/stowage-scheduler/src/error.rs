//! Scheduler error types.

use std::time::Duration;

use thiserror::Error;

use crate::registry::RegistryError;

/// Errors that can occur during host selection.
///
/// An empty set of eligible hosts is not an error.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler host filter not found: {0}")]
    FilterNotFound(String),

    #[error("service registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("service registry did not answer within {0:?}")]
    RegistryTimeout(Duration),

    #[error("host filtering cancelled")]
    Cancelled,

    #[error("invalid scheduler configuration: {0}")]
    Config(String),
}

impl SchedulerError {
    /// Whether the failure is an infrastructure hiccup worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Registry(_) | Self::RegistryTimeout(_))
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
