//! Strongly-typed identifiers.

use std::fmt;

/// Identifies one region handed out by a collaborator runtime.
///
/// Ids are assigned sequentially by the runtime and never reused within
/// its lifetime, so a stale id can never alias a newer region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RegionId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}
