//! Well-known names exposed by the certification test service.
//!
//! These mirror the service's published bus contract. The engine only
//! ever matches on them; it never defines objects of its own.

use crate::path::ObjectPath;

/// Bus name the test service registers under.
pub const SERVICE_BUS_NAME: &str = "com.canonical.certification.PlainBox";

/// Path of the service's top-level control object.
pub const SERVICE_OBJECT_PATH: &str = "/plainbox/service1";

/// Interface carrying `CreateSession`, `RunJob`, and `Exit`.
pub const SERVICE_INTERFACE: &str = "com.canonical.certification.PlainBox.Service1";

/// Interface exposed by session objects (`UpdateDesiredJobList`,
/// `UpdateJobResult`, plus the `job_list` / `run_list` properties).
pub const SESSION_INTERFACE: &str = "com.canonical.certification.PlainBox.Session1";

/// Interface exposed by whitelist objects (`Designates`, `name`).
pub const WHITELIST_INTERFACE: &str = "com.canonical.certification.PlainBox.WhiteList1";

/// Interface carrying a job definition (`name`, `plugin`, `via`, ...).
pub const JOB_DEFINITION_INTERFACE: &str = "com.canonical.certification.CheckBox.JobDefinition1";

/// Subtree holding one object per job definition.
pub const JOBS_ROOT: &str = "/plainbox/job";

/// Subtree holding one object per whitelist.
pub const WHITELISTS_ROOT: &str = "/plainbox/whitelist";

/// The `plugin` value marking a local "generator" job, run before the
/// main batch to produce further jobs and via hierarchy information.
pub const LOCAL_PLUGIN: &str = "local";

/// Bus reflection interfaces attached to every object. These carry no
/// service data and are skipped during discovery.
const REFLECTION_INTERFACES: &[&str] = &[
    "org.freedesktop.DBus.Introspectable",
    "org.freedesktop.DBus.Properties",
    "org.freedesktop.DBus.ObjectManager",
    "org.freedesktop.DBus.Peer",
];

/// Whether `interface` is part of the bus's own reflection machinery
/// rather than the test service's contract.
pub fn is_reflection_interface(interface: &str) -> bool {
    REFLECTION_INTERFACES.contains(&interface)
}

/// Convenience constructor for the jobs subtree root.
pub fn jobs_root() -> ObjectPath {
    ObjectPath::new(JOBS_ROOT)
}

/// Convenience constructor for the whitelists subtree root.
pub fn whitelists_root() -> ObjectPath {
    ObjectPath::new(WHITELISTS_ROOT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_interfaces_are_recognised() {
        assert!(is_reflection_interface("org.freedesktop.DBus.Properties"));
        assert!(is_reflection_interface("org.freedesktop.DBus.ObjectManager"));
        assert!(!is_reflection_interface(WHITELIST_INTERFACE));
        assert!(!is_reflection_interface(JOB_DEFINITION_INTERFACE));
    }
}
