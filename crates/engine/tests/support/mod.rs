//! Scripted in-memory [`ServiceBus`] fake.
//!
//! Backs the engine integration tests with a small object store, a
//! designation table, and a session whose `run_list` mirrors the last
//! desired-job-list update -- the shape the real service exposes,
//! without the bus.

// Each test binary uses a different slice of the fake's surface.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use certbox_bus::connector::{BusError, Introspection, ServiceBus, ServiceSignal};
use certbox_core::path::ObjectPath;
use certbox_core::properties::{PropertyBag, PropertyValue};
use certbox_core::well_known;
use tokio::sync::broadcast;

/// One scripted service object.
#[derive(Debug, Default, Clone)]
pub struct FakeObject {
    pub children: Vec<String>,
    pub interfaces: BTreeMap<String, PropertyBag>,
}

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<String, FakeObject>,
    designations: BTreeMap<(String, String), bool>,
    failing_designates: BTreeSet<(String, String)>,
    failing_introspect: BTreeSet<String>,
    /// Last payload handed to `update_desired_job_list`.
    desired: Vec<ObjectPath>,
    /// Scripted response for `update_desired_job_list`.
    desired_errors: Vec<String>,
    dispatched: Vec<ObjectPath>,
    recorded_results: Vec<(ObjectPath, ObjectPath)>,
    session_created: bool,
    exited: bool,
}

/// Scripted bus for driving the engine without a service process.
pub struct FakeBus {
    state: Mutex<FakeState>,
    signal_tx: broadcast::Sender<ServiceSignal>,
}

impl FakeBus {
    /// A bus with the `/plainbox/job` and `/plainbox/whitelist`
    /// scaffolding in place and nothing else.
    pub fn new() -> Self {
        let mut state = FakeState::default();
        state.objects.insert(
            "/".into(),
            FakeObject {
                children: vec!["plainbox".into()],
                ..Default::default()
            },
        );
        state.objects.insert(
            "/plainbox".into(),
            FakeObject {
                children: vec!["job".into(), "whitelist".into()],
                ..Default::default()
            },
        );
        state
            .objects
            .insert("/plainbox/job".into(), FakeObject::default());
        state
            .objects
            .insert("/plainbox/whitelist".into(), FakeObject::default());

        let (signal_tx, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(state),
            signal_tx,
        }
    }

    /// Register a job object under `/plainbox/job`.
    ///
    /// `via` is the display name of the generating job, or `""` for a
    /// top-level job.
    pub fn add_job(&self, id: &str, name: &str, plugin: &str, via: &str) -> ObjectPath {
        let path = format!("{}/{id}", well_known::JOBS_ROOT);
        let mut bag = PropertyBag::new();
        bag.insert("name", PropertyValue::Str(name.into()));
        bag.insert("plugin", PropertyValue::Str(plugin.into()));
        if !via.is_empty() {
            bag.insert("via", PropertyValue::Str(via.into()));
        }

        let mut interfaces = BTreeMap::new();
        interfaces.insert(well_known::JOB_DEFINITION_INTERFACE.to_string(), bag);

        let mut state = self.state.lock().unwrap();
        state.objects.insert(
            path.clone(),
            FakeObject {
                children: Vec::new(),
                interfaces,
            },
        );
        state
            .objects
            .get_mut(well_known::JOBS_ROOT)
            .unwrap()
            .children
            .push(id.to_string());
        ObjectPath::new(path)
    }

    /// Register a whitelist object under `/plainbox/whitelist`.
    pub fn add_whitelist(&self, id: &str, name: &str) -> ObjectPath {
        let path = format!("{}/{id}", well_known::WHITELISTS_ROOT);
        let mut bag = PropertyBag::new();
        bag.insert("name", PropertyValue::Str(name.into()));

        let mut interfaces = BTreeMap::new();
        interfaces.insert(well_known::WHITELIST_INTERFACE.to_string(), bag);

        let mut state = self.state.lock().unwrap();
        state.objects.insert(
            path.clone(),
            FakeObject {
                children: Vec::new(),
                interfaces,
            },
        );
        state
            .objects
            .get_mut(well_known::WHITELISTS_ROOT)
            .unwrap()
            .children
            .push(id.to_string());
        ObjectPath::new(path)
    }

    /// Register an arbitrary object (for discovery edge cases).
    pub fn add_object(&self, path: &str, object: FakeObject) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(path.to_string(), object);
    }

    /// Script the answer to one `Designates` query.
    pub fn set_designation(&self, whitelist: &ObjectPath, job: &ObjectPath, designates: bool) {
        self.state.lock().unwrap().designations.insert(
            (whitelist.as_str().to_string(), job.as_str().to_string()),
            designates,
        );
    }

    /// Make one `Designates` query fail with a bus error.
    pub fn fail_designates(&self, whitelist: &ObjectPath, job: &ObjectPath) {
        self.state
            .lock()
            .unwrap()
            .failing_designates
            .insert((whitelist.as_str().to_string(), job.as_str().to_string()));
    }

    /// Make introspection of one object fail.
    pub fn fail_introspect(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_introspect
            .insert(path.to_string());
    }

    /// Script the error strings `update_desired_job_list` returns.
    pub fn set_desired_errors(&self, errors: Vec<String>) {
        self.state.lock().unwrap().desired_errors = errors;
    }

    /// Jobs dispatched via `run_job`, in order.
    pub fn dispatched(&self) -> Vec<ObjectPath> {
        self.state.lock().unwrap().dispatched.clone()
    }

    /// `(job, result)` pairs recorded via `update_job_result`.
    pub fn recorded_results(&self) -> Vec<(ObjectPath, ObjectPath)> {
        self.state.lock().unwrap().recorded_results.clone()
    }

    /// Whether a session has been created.
    pub fn session_created(&self) -> bool {
        self.state.lock().unwrap().session_created
    }

    /// Whether `exit` was called.
    pub fn exited(&self) -> bool {
        self.state.lock().unwrap().exited
    }

    fn job_list(state: &FakeState) -> Vec<PropertyValue> {
        state
            .objects
            .get(well_known::JOBS_ROOT)
            .map(|jobs| {
                jobs.children
                    .iter()
                    .map(|id| {
                        PropertyValue::Path(ObjectPath::new(format!(
                            "{}/{id}",
                            well_known::JOBS_ROOT
                        )))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for FakeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceBus for FakeBus {
    async fn introspect(&self, path: &ObjectPath) -> Result<Introspection, BusError> {
        let state = self.state.lock().unwrap();
        if state.failing_introspect.contains(path.as_str()) {
            return Err(BusError::Call(format!("scripted introspect failure at {path}")));
        }
        let object = state
            .objects
            .get(path.as_str())
            .ok_or_else(|| BusError::Call(format!("no object at {path}")))?;

        // The real bus always advertises its reflection interfaces;
        // discovery is expected to skip them.
        let mut interfaces: Vec<String> = vec![
            "org.freedesktop.DBus.Introspectable".into(),
            "org.freedesktop.DBus.Properties".into(),
        ];
        interfaces.extend(object.interfaces.keys().cloned());

        Ok(Introspection {
            children: object.children.clone(),
            interfaces,
        })
    }

    async fn get_all_properties(
        &self,
        path: &ObjectPath,
        interface: &str,
    ) -> Result<PropertyBag, BusError> {
        let state = self.state.lock().unwrap();

        // Session objects expose their state as properties.
        if path.as_str().starts_with("/plainbox/session/") {
            if interface != well_known::SESSION_INTERFACE {
                return Ok(PropertyBag::new());
            }
            let mut bag = PropertyBag::new();
            bag.insert(
                "run_list",
                PropertyValue::List(
                    state
                        .desired
                        .iter()
                        .map(|p| PropertyValue::Path(p.clone()))
                        .collect(),
                ),
            );
            bag.insert("job_list", PropertyValue::List(Self::job_list(&state)));
            return Ok(bag);
        }

        Ok(state
            .objects
            .get(path.as_str())
            .and_then(|o| o.interfaces.get(interface))
            .cloned()
            .unwrap_or_default())
    }

    async fn designates(
        &self,
        whitelist: &ObjectPath,
        job: &ObjectPath,
    ) -> Result<bool, BusError> {
        let state = self.state.lock().unwrap();
        let key = (whitelist.as_str().to_string(), job.as_str().to_string());
        if state.failing_designates.contains(&key) {
            return Err(BusError::Call("scripted designates failure".into()));
        }
        Ok(state.designations.get(&key).copied().unwrap_or(false))
    }

    async fn create_session(&self, _jobs: &[ObjectPath]) -> Result<ObjectPath, BusError> {
        self.state.lock().unwrap().session_created = true;
        Ok(ObjectPath::new("/plainbox/session/1"))
    }

    async fn update_desired_job_list(
        &self,
        _session: &ObjectPath,
        jobs: &[ObjectPath],
    ) -> Result<Vec<String>, BusError> {
        let mut state = self.state.lock().unwrap();
        state.desired = jobs.to_vec();
        Ok(state.desired_errors.clone())
    }

    async fn run_job(&self, _session: &ObjectPath, job: &ObjectPath) -> Result<(), BusError> {
        self.state.lock().unwrap().dispatched.push(job.clone());
        Ok(())
    }

    async fn update_job_result(
        &self,
        _session: &ObjectPath,
        job: &ObjectPath,
        result: &ObjectPath,
    ) -> Result<(), BusError> {
        self.state
            .lock()
            .unwrap()
            .recorded_results
            .push((job.clone(), result.clone()));
        Ok(())
    }

    async fn exit(&self) -> Result<(), BusError> {
        self.state.lock().unwrap().exited = true;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ServiceSignal> {
        self.signal_tx.subscribe()
    }
}
