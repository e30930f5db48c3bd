//! Capacity values as reported by backend drivers.
//!
//! Drivers report a capacity either as a number of GiB or as one of two
//! sentinel tokens: `"infinite"` for thin/unbounded backends and
//! `"unknown"` for backends that cannot measure it.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Token a driver reports for capacity that has no upper bound.
pub const UNBOUNDED_TOKEN: &str = "infinite";

/// Token a driver reports for capacity it cannot measure.
pub const UNKNOWN_TOKEN: &str = "unknown";

/// A single capacity field: measured, unbounded, or unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapacityValue {
    /// Measured capacity in GiB, stored exactly as reported.
    Measured(f64),
    Unbounded,
    Unknown,
}

impl CapacityValue {
    /// Normalize a raw reported value.
    ///
    /// Returns `None` for anything that is neither a number nor one of the
    /// sentinel tokens, so callers can leave the stored field untouched.
    /// Numbers are kept as `f64`, which is exact for integers up to 2^53
    /// and rounds anything larger.
    pub fn from_reported(raw: &Value) -> Option<Self> {
        match raw {
            Value::Number(n) => n.as_f64().map(CapacityValue::Measured),
            Value::String(s) if s == UNBOUNDED_TOKEN => Some(CapacityValue::Unbounded),
            Value::String(s) if s == UNKNOWN_TOKEN => Some(CapacityValue::Unknown),
            _ => None,
        }
    }

    /// The measured amount, if this is a measurement.
    ///
    /// Integers above 2^53 lose precision in the conversion to `f64`.
    pub fn measured(&self) -> Option<f64> {
        match self {
            CapacityValue::Measured(gb) => Some(*gb),
            _ => None,
        }
    }
}

impl fmt::Display for CapacityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityValue::Measured(gb) => write!(f, "{gb}"),
            CapacityValue::Unbounded => f.write_str(UNBOUNDED_TOKEN),
            CapacityValue::Unknown => f.write_str(UNKNOWN_TOKEN),
        }
    }
}

impl Serialize for CapacityValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CapacityValue::Measured(gb) => serializer.serialize_f64(*gb),
            CapacityValue::Unbounded => serializer.serialize_str(UNBOUNDED_TOKEN),
            CapacityValue::Unknown => serializer.serialize_str(UNKNOWN_TOKEN),
        }
    }
}
