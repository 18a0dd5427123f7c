//! Core types shared across the codec and client layers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kafka API keys used by this crate.
pub mod api_key {
    pub const FETCH: i16 = 1;
    pub const METADATA: i16 = 3;
    pub const API_VERSIONS: i16 = 18;
}

/// Broker error codes the client interprets itself.
pub mod error_code {
    pub const NONE: i16 = 0;
    pub const UNSUPPORTED_VERSION: i16 = 35;
}

/// Inclusive {min, max} protocol version range for one API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionRange {
    pub min: i16,
    pub max: i16,
}

impl VersionRange {
    pub const fn new(min: i16, max: i16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, version: i16) -> bool {
        self.min <= version && version <= self.max
    }

    /// Overlap of two ranges, `None` when they are disjoint.
    pub fn intersect(&self, other: &VersionRange) -> Option<VersionRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(VersionRange { min, max })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Per-API version ranges accepted by the broker, keyed by api key.
pub type SupportedApiVersions = HashMap<i16, VersionRange>;
