//! The bus-facing seam the engine programs against.
//!
//! [`ServiceBus`] covers every call the front-end makes against the
//! test service: object discovery, property fetches, whitelist
//! designation queries, session lifecycle, and job dispatch. Signals
//! arrive out-of-band on a broadcast channel obtained via
//! [`ServiceBus::subscribe`].
//!
//! The production implementation is
//! [`RemoteServiceBus`](crate::remote::RemoteServiceBus); tests use
//! scripted in-memory fakes.

use async_trait::async_trait;
use certbox_core::path::ObjectPath;
use certbox_core::properties::PropertyBag;
use tokio::sync::broadcast;

/// One object's introspection description: the names of its direct
/// children and of the interfaces attached to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Introspection {
    /// Child node names in the service's publication order.
    #[serde(default)]
    pub children: Vec<String>,
    /// Interface names attached to the object, reflection included.
    #[serde(default)]
    pub interfaces: Vec<String>,
}

/// A signal pushed by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceSignal {
    /// A dispatched job has finished and its result object exists.
    /// Drives the sequential run loop.
    JobResultAvailable { job: ObjectPath, result: ObjectPath },

    /// The service grew interfaces on an object. Observed and logged
    /// only; the engine rebuilds its tree wholesale instead.
    InterfacesAdded { object: ObjectPath },

    /// The service dropped interfaces from an object.
    InterfacesRemoved { object: ObjectPath },
}

/// Errors surfaced by a [`ServiceBus`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// Could not reach the service at all.
    #[error("bus connection error: {0}")]
    Connection(String),

    /// A call reached the service but failed.
    #[error("bus call failed: {0}")]
    Call(String),
}

/// Blocking call-and-wait access to the certification test service.
///
/// Every method maps to one service call. Implementations do not
/// retry; degradation policy (which failures are fatal, which are
/// logged and absorbed) belongs to the caller.
#[async_trait]
pub trait ServiceBus: Send + Sync {
    /// Fetch the introspection description of one object.
    async fn introspect(&self, path: &ObjectPath) -> Result<Introspection, BusError>;

    /// Fetch all properties of `interface` on the object at `path`.
    async fn get_all_properties(
        &self,
        path: &ObjectPath,
        interface: &str,
    ) -> Result<PropertyBag, BusError>;

    /// Ask a whitelist whether it designates a job.
    async fn designates(&self, whitelist: &ObjectPath, job: &ObjectPath)
        -> Result<bool, BusError>;

    /// Create a session seeded with the given job list.
    async fn create_session(&self, jobs: &[ObjectPath]) -> Result<ObjectPath, BusError>;

    /// Replace the session's desired job list. Returns the service's
    /// per-job error strings (empty on full success).
    async fn update_desired_job_list(
        &self,
        session: &ObjectPath,
        jobs: &[ObjectPath],
    ) -> Result<Vec<String>, BusError>;

    /// Dispatch one job. The call returns once the service accepts the
    /// job; completion arrives later as
    /// [`ServiceSignal::JobResultAvailable`].
    async fn run_job(&self, session: &ObjectPath, job: &ObjectPath) -> Result<(), BusError>;

    /// Record a job's result object in the session state.
    async fn update_job_result(
        &self,
        session: &ObjectPath,
        job: &ObjectPath,
        result: &ObjectPath,
    ) -> Result<(), BusError>;

    /// Ask the service process to exit.
    async fn exit(&self) -> Result<(), BusError>;

    /// Subscribe to the service's signal stream.
    fn subscribe(&self) -> broadcast::Receiver<ServiceSignal>;
}
