//! The production [`ServiceBus`] implementation.
//!
//! [`RemoteServiceBus`] pairs the HTTP call layer with a long-lived
//! signal-stream task (connect -> process -> reconnect loop). It is
//! created once at front-end startup via [`RemoteServiceBus::connect`];
//! the initial connection attempt is the one fatal failure point -- a
//! front-end that cannot reach the bus refuses to start.

use std::sync::Arc;

use async_trait::async_trait;
use certbox_core::path::ObjectPath;
use certbox_core::properties::PropertyBag;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use crate::api::{ServiceApi, ServiceApiError};
use crate::client::{SignalClient, SignalConnection};
use crate::connector::{BusError, Introspection, ServiceBus, ServiceSignal};
use crate::processor::process_signals;
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Broadcast channel capacity for service signals.
const SIGNAL_CHANNEL_CAPACITY: usize = 256;

/// Connection endpoints for one test service.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// WebSocket base URL for the signal stream.
    pub ws_url: String,
    /// HTTP base URL for call-and-wait operations.
    pub api_url: String,
}

/// Live connection to the test service.
///
/// Cheaply shareable: clone the returned `Arc` into whatever owns the
/// engine. All call-and-wait operations go through the HTTP layer;
/// signals are fanned out on a broadcast channel.
pub struct RemoteServiceBus {
    api: ServiceApi,
    signal_tx: broadcast::Sender<ServiceSignal>,
    /// Cancelled during shutdown to stop the signal task.
    cancel: CancellationToken,
    signal_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RemoteServiceBus {
    /// Connect to the test service.
    ///
    /// Establishes the signal stream immediately and spawns the
    /// processing task. Returns an error if the service is not
    /// reachable -- callers are expected to treat that as fatal.
    pub async fn connect(config: BusConfig) -> Result<Arc<Self>, BusError> {
        let client = SignalClient::new(config.ws_url);
        let conn = client.connect().await?;

        let (signal_tx, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_signal_loop(
            client,
            conn,
            signal_tx.clone(),
            cancel.clone(),
        ));

        Ok(Arc::new(Self {
            api: ServiceApi::new(config.api_url),
            signal_tx,
            cancel,
            signal_task: Mutex::new(Some(task)),
        }))
    }

    /// Gracefully stop the signal-processing task.
    ///
    /// Cancels the token, then waits up to 5 seconds for a clean exit.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down service bus connection");
        self.cancel.cancel();

        if let Some(task) = self.signal_task.lock().await.take() {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), task).await;
        }

        tracing::info!("Service bus connection shut down");
    }
}

/// Core signal loop: process messages, reconnect when the stream
/// drops, stop when cancelled.
async fn run_signal_loop(
    client: SignalClient,
    first_conn: SignalConnection,
    signal_tx: broadcast::Sender<ServiceSignal>,
    cancel: CancellationToken,
) {
    let reconnect_config = ReconnectConfig::default();
    let mut conn = first_conn;

    loop {
        let mut ws_stream = conn.ws_stream;

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = process_signals(&mut ws_stream, &signal_tx) => {}
        }

        if cancel.is_cancelled() {
            return;
        }

        tracing::info!("Signal stream lost, entering reconnect loop");
        match reconnect_loop(&client, &reconnect_config, &cancel).await {
            Some(new_conn) => conn = new_conn,
            None => return, // cancelled
        }
    }
}

impl From<ServiceApiError> for BusError {
    fn from(e: ServiceApiError) -> Self {
        match e {
            ServiceApiError::Request(inner) => BusError::Connection(inner.to_string()),
            ServiceApiError::ApiError { .. } => BusError::Call(e.to_string()),
        }
    }
}

#[async_trait]
impl ServiceBus for RemoteServiceBus {
    async fn introspect(&self, path: &ObjectPath) -> Result<Introspection, BusError> {
        Ok(self.api.introspect(path).await?)
    }

    async fn get_all_properties(
        &self,
        path: &ObjectPath,
        interface: &str,
    ) -> Result<PropertyBag, BusError> {
        Ok(self.api.get_all_properties(path, interface).await?)
    }

    async fn designates(
        &self,
        whitelist: &ObjectPath,
        job: &ObjectPath,
    ) -> Result<bool, BusError> {
        Ok(self.api.designates(whitelist, job).await?)
    }

    async fn create_session(&self, jobs: &[ObjectPath]) -> Result<ObjectPath, BusError> {
        let session = self.api.create_session(jobs).await?;
        tracing::info!(session = %session, seeded_jobs = jobs.len(), "Session created");
        Ok(session)
    }

    async fn update_desired_job_list(
        &self,
        session: &ObjectPath,
        jobs: &[ObjectPath],
    ) -> Result<Vec<String>, BusError> {
        Ok(self.api.update_desired_job_list(session, jobs).await?)
    }

    async fn run_job(&self, session: &ObjectPath, job: &ObjectPath) -> Result<(), BusError> {
        self.api.run_job(session, job).await?;
        tracing::info!(session = %session, job = %job, "Job dispatched");
        Ok(())
    }

    async fn update_job_result(
        &self,
        session: &ObjectPath,
        job: &ObjectPath,
        result: &ObjectPath,
    ) -> Result<(), BusError> {
        Ok(self.api.update_job_result(session, job, result).await?)
    }

    async fn exit(&self) -> Result<(), BusError> {
        Ok(self.api.exit().await?)
    }

    fn subscribe(&self) -> broadcast::Receiver<ServiceSignal> {
        self.signal_tx.subscribe()
    }
}
