//! Bus object paths.
//!
//! Every addressable object exposed by the test service lives at a
//! slash-separated path such as `/plainbox/job/lan0__network`. Paths
//! are opaque identifiers: equality and ordering are by value, and the
//! only structure the engine relies on is the final path segment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque bus object path.
///
/// The discovery root is `/`; all other paths are absolute and never
/// end with a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectPath(String);

impl ObjectPath {
    /// Wrap a path string.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The discovery root, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// The raw path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the discovery root.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The final path segment, or `""` for the root.
    ///
    /// Used to derive the short id of a job from its address, e.g.
    /// `/plainbox/job/disk_smart` has the id `disk_smart`.
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Append a child segment, e.g. `/plainbox` + `job` = `/plainbox/job`.
    pub fn child(&self, segment: &str) -> ObjectPath {
        if self.is_root() {
            ObjectPath(format!("/{segment}"))
        } else {
            ObjectPath(format!("{}/{segment}", self.0))
        }
    }

    /// Whether this path sits directly or transitively under `ancestor`.
    pub fn is_under(&self, ancestor: &ObjectPath) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ObjectPath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}
