//! The front-end engine facade and its sequential run loop.
//!
//! [`TestEngine`] owns every piece of client-side state: the
//! discovered object tree, the whitelist selection, the desired-job
//! and run lists, and the run-loop phase. All mutation happens from a
//! single task; job completion arrives as [`ServiceSignal`]s fed into
//! [`TestEngine::on_signal`] by whoever owns the bus subscription.
//!
//! The run loop is strictly sequential: one job is dispatched, the
//! engine waits for its `JobResultAvailable` signal, records the
//! result, and only then dispatches the next. There is no look-ahead
//! and no parallel execution; the remote service stays the sole
//! source of truth for execution state.

use std::collections::BTreeMap;
use std::sync::Arc;

use certbox_bus::connector::{BusError, ServiceBus, ServiceSignal};
use certbox_core::path::ObjectPath;
use certbox_core::properties::PropertyError;
use certbox_core::well_known;

use crate::events::{EngineEvent, EngineEventBus, EngineEventKind};
use crate::hierarchy::{self, JobHierarchy};
use crate::object_tree::ObjectTree;
use crate::selection::{self, WhitelistSelection};
use crate::tristate::SelectionTree;

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialised,
    Ready,
}

/// Phase of the local-job run loop.
///
/// Advanced only by [`TestEngine::run_local_jobs`] and incoming
/// `JobResultAvailable` signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    /// No session exists yet.
    Idle,
    /// A session was created but nothing has been dispatched.
    SessionCreated { session: ObjectPath },
    /// The job at `index` in the run list is in flight.
    Running { session: ObjectPath, index: usize },
    /// Every local job has run and the final run list is stored.
    Completed { session: ObjectPath },
}

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An operation requires [`TestEngine::initialise`] first.
    #[error("engine is not initialised")]
    NotInitialised,

    /// A bus call the run loop cannot absorb failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A session property was missing or ill-shaped.
    #[error("session property \"{property}\": {source}")]
    SessionProperty {
        property: &'static str,
        #[source]
        source: PropertyError,
    },
}

/// Client-side engine for one certification front-end.
pub struct TestEngine {
    bus: Arc<dyn ServiceBus>,
    events: EngineEventBus,
    state: EngineState,
    phase: RunPhase,
    /// Address discovery starts from; `/` in production.
    root: ObjectPath,
    tree: Option<ObjectTree>,
    whitelists: WhitelistSelection,
    job_list: Vec<ObjectPath>,
    desired_jobs: Vec<ObjectPath>,
    run_list: Vec<ObjectPath>,
    /// The final run list captured when the local batch completed;
    /// what the test picker offers for the real run.
    valid_run_list: Vec<ObjectPath>,
    local_jobs_done: bool,
}

impl TestEngine {
    /// Create an engine discovering from the service root `/`.
    pub fn new(bus: Arc<dyn ServiceBus>) -> Self {
        Self::with_root(bus, ObjectPath::root())
    }

    /// Create an engine discovering from a specific root address.
    pub fn with_root(bus: Arc<dyn ServiceBus>, root: ObjectPath) -> Self {
        Self {
            bus,
            events: EngineEventBus::default(),
            state: EngineState::Uninitialised,
            phase: RunPhase::Idle,
            root,
            tree: None,
            whitelists: WhitelistSelection::new(),
            job_list: Vec::new(),
            desired_jobs: Vec::new(),
            run_list: Vec::new(),
            valid_run_list: Vec::new(),
            local_jobs_done: false,
        }
    }

    /// Discover the initial object tree and become ready.
    ///
    /// Idempotent: later calls on a ready engine do nothing.
    /// Discovery itself is best-effort and cannot fail; the fatal
    /// startup failure point is connecting the bus, which happens
    /// before the engine exists.
    pub async fn initialise(&mut self) {
        if self.state == EngineState::Ready {
            return;
        }
        let tree = ObjectTree::discover(self.bus.as_ref(), self.root.clone()).await;
        tracing::info!(objects = tree.len(), "Initial object tree discovered");
        self.tree = Some(tree);
        self.state = EngineState::Ready;
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // ---- presentation-layer accessors ----

    /// The current object tree, once initialised.
    pub fn object_tree(&self) -> Option<&ObjectTree> {
        self.tree.as_ref()
    }

    /// Engine lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Current run-loop phase.
    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    /// The whitelist selection map for display.
    pub fn whitelists(&self) -> &WhitelistSelection {
        &self.whitelists
    }

    /// Whitelist display names keyed by address. The first call seeds
    /// the selection map with every discovered whitelist enabled.
    pub fn whitelist_names(&mut self) -> BTreeMap<ObjectPath, String> {
        match &self.tree {
            Some(tree) => selection::whitelist_names(tree, &mut self.whitelists),
            None => BTreeMap::new(),
        }
    }

    /// Toggle one whitelist on or off.
    pub fn set_whitelist(&mut self, whitelist: ObjectPath, enabled: bool) {
        self.whitelists.set(whitelist, enabled);
    }

    /// The most recently resolved desired-job set.
    pub fn desired_jobs(&self) -> &[ObjectPath] {
        &self.desired_jobs
    }

    /// The run list captured when the local batch completed.
    pub fn valid_run_list(&self) -> &[ObjectPath] {
        &self.valid_run_list
    }

    /// Build the display hierarchy from the current flat job list.
    /// Always built fresh -- the object tree may have changed.
    pub fn job_hierarchy(&self) -> JobHierarchy {
        match &self.tree {
            Some(tree) => hierarchy::build_hierarchy(&selection::job_views(tree)),
            None => hierarchy::build_hierarchy(&[]),
        }
    }

    /// Build a tri-state selection tree mirroring the display
    /// hierarchy, everything checked.
    pub fn selection_tree(&self) -> SelectionTree {
        SelectionTree::from_hierarchy(&self.job_hierarchy())
    }

    /// Whether the presentation layer has acknowledged the end of the
    /// local batch.
    pub fn local_jobs_done(&self) -> bool {
        self.local_jobs_done
    }

    /// Record that the presentation layer has seen the local batch
    /// finish.
    pub fn acknowledge_jobs_done(&mut self) {
        self.local_jobs_done = true;
    }

    // ---- run loop ----

    /// Run every local "generator" job designated by the enabled
    /// whitelists.
    ///
    /// Creates a session seeded with all jobs, resolves the desired
    /// set, narrows it to local jobs, hands that list to the service,
    /// and dispatches the first entry of the resulting run list. The
    /// rest of the batch is driven by `JobResultAvailable` signals
    /// fed into [`on_signal`](Self::on_signal).
    pub async fn run_local_jobs(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Ready {
            return Err(EngineError::NotInitialised);
        }
        let (job_list, local) = {
            let tree = self.tree.as_ref().ok_or(EngineError::NotInitialised)?;
            (selection::all_jobs(tree), selection::local_jobs(tree))
        };
        self.job_list = job_list;

        let session = self.bus.create_session(&self.job_list).await?;
        self.phase = RunPhase::SessionCreated {
            session: session.clone(),
        };

        let desired =
            selection::resolve_desired_jobs(self.bus.as_ref(), &self.whitelists, &self.job_list)
                .await;
        self.desired_jobs = desired;

        let desired_local = selection::filter_jobs(&local, &self.desired_jobs);
        tracing::info!(
            local = local.len(),
            desired_local = desired_local.len(),
            "Seeding session with desired local jobs",
        );

        let errors = self
            .bus
            .update_desired_job_list(&session, &desired_local)
            .await?;
        log_desired_errors(&errors);

        let run_list = self.session_path_list(&session, "run_list").await?;
        self.run_list = run_list;

        if self.run_list.is_empty() {
            tracing::info!("No local generator jobs to run");
            self.finish(session).await
        } else {
            self.dispatch(session, 0).await;
            Ok(())
        }
    }

    /// Feed one service signal into the engine.
    ///
    /// `JobResultAvailable` advances the run loop; interface-change
    /// signals are only logged, since the tree is rebuilt wholesale
    /// after the batch.
    pub async fn on_signal(&mut self, signal: ServiceSignal) -> Result<(), EngineError> {
        match signal {
            ServiceSignal::JobResultAvailable { job, result } => {
                self.on_job_result(job, result).await
            }
            ServiceSignal::InterfacesAdded { object } => {
                tracing::debug!(object = %object, "Interfaces added on service object");
                Ok(())
            }
            ServiceSignal::InterfacesRemoved { object } => {
                tracing::debug!(object = %object, "Interfaces removed from service object");
                Ok(())
            }
        }
    }

    /// Dispatch the job at `index` in the run list.
    ///
    /// A failed dispatch is logged and not retried; the loop keeps
    /// waiting for a result signal that may never arrive.
    async fn dispatch(&mut self, session: ObjectPath, index: usize) {
        let job = self.run_list[index].clone();
        let name = self
            .tree
            .as_ref()
            .and_then(|tree| selection::job_name(tree, &job));
        tracing::info!(
            job = %job,
            name = name.as_deref().unwrap_or(""),
            index,
            total = self.run_list.len(),
            "Running local job",
        );
        self.events.publish(EngineEventKind::LocalJobStarted {
            job: job.clone(),
            name,
        });

        if let Err(e) = self.bus.run_job(&session, &job).await {
            tracing::error!(job = %job, error = %e, "Job dispatch failed");
        }
        self.phase = RunPhase::Running { session, index };
    }

    /// Handle one job's completion: record the result, then dispatch
    /// the next job or close out the batch.
    async fn on_job_result(
        &mut self,
        job: ObjectPath,
        result: ObjectPath,
    ) -> Result<(), EngineError> {
        let (session, index) = match &self.phase {
            RunPhase::Running { session, index } => (session.clone(), *index),
            other => {
                tracing::warn!(
                    job = %job,
                    phase = ?other,
                    "Ignoring job result outside a run",
                );
                return Ok(());
            }
        };

        if let Err(e) = self.bus.update_job_result(&session, &job, &result).await {
            tracing::warn!(job = %job, error = %e, "Failed to record job result");
        }
        self.events.publish(EngineEventKind::LocalJobCompleted {
            job,
            result,
        });

        let next = index + 1;
        if next < self.run_list.len() {
            self.dispatch(session, next).await;
            Ok(())
        } else {
            tracing::info!("All local jobs completed");
            self.finish(session).await
        }
    }

    /// Close out the local batch: settle the desired job list against
    /// the jobs the generators produced, capture the final run list,
    /// and rebuild the object tree.
    async fn finish(&mut self, session: ObjectPath) -> Result<(), EngineError> {
        let errors = self
            .bus
            .update_desired_job_list(&session, &self.desired_jobs)
            .await?;
        log_desired_errors(&errors);

        // The generator batch may have produced new jobs; the session
        // now knows the full list.
        let job_list = self.session_path_list(&session, "job_list").await?;
        self.job_list = job_list;

        let desired =
            selection::resolve_desired_jobs(self.bus.as_ref(), &self.whitelists, &self.job_list)
                .await;
        self.desired_jobs = desired;

        let errors = self
            .bus
            .update_desired_job_list(&session, &self.desired_jobs)
            .await?;
        log_desired_errors(&errors);

        let run_list = self.session_path_list(&session, "run_list").await?;
        self.run_list = run_list;
        self.valid_run_list = self.run_list.clone();

        let tree = ObjectTree::discover(self.bus.as_ref(), self.root.clone()).await;
        self.events.publish(EngineEventKind::ObjectTreeRebuilt {
            objects: tree.len(),
        });
        self.tree = Some(tree);

        self.phase = RunPhase::Completed { session };
        self.events.publish(EngineEventKind::LocalJobsCompleted);
        Ok(())
    }

    /// Ask the service to exit and drop back to uninitialised.
    pub async fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Ready {
            return Err(EngineError::NotInitialised);
        }
        self.bus.exit().await?;
        self.state = EngineState::Uninitialised;
        Ok(())
    }

    /// Fetch a list-of-paths property from the session object.
    async fn session_path_list(
        &self,
        session: &ObjectPath,
        property: &'static str,
    ) -> Result<Vec<ObjectPath>, EngineError> {
        let bag = self
            .bus
            .get_all_properties(session, well_known::SESSION_INTERFACE)
            .await?;
        bag.get_path_list(property)
            .map_err(|source| EngineError::SessionProperty { property, source })
    }
}

/// Log the per-job error strings returned by `UpdateDesiredJobList`.
fn log_desired_errors(errors: &[String]) {
    for error in errors {
        tracing::warn!(error = %error, "UpdateDesiredJobList reported an error");
    }
}
