//! HTTP call layer for the test service's call-and-wait operations.
//!
//! Every synchronous service operation (introspection, property
//! fetches, designation queries, session lifecycle) is a single JSON
//! request issued with [`reqwest`]. Signals travel separately over the
//! WebSocket stream managed by [`processor`](crate::processor).

use certbox_core::path::ObjectPath;
use certbox_core::properties::PropertyBag;
use serde::Deserialize;

use crate::connector::Introspection;

/// HTTP client for a single test-service endpoint.
pub struct ServiceApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the `/session` endpoint after creating a
/// session.
#[derive(Debug, Deserialize)]
pub struct CreateSessionResponse {
    /// Address of the new session object.
    pub session: ObjectPath,
}

/// Response returned by the `/session/desired` endpoint.
#[derive(Debug, Deserialize)]
pub struct UpdateDesiredResponse {
    /// Per-job error strings; empty when every job was accepted.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Response returned by the `/whitelist/designates` endpoint.
#[derive(Debug, Deserialize)]
pub struct DesignatesResponse {
    pub designates: bool,
}

/// Response wrapper for the `/object/properties` endpoint.
#[derive(Debug, Deserialize)]
pub struct PropertiesResponse {
    #[serde(default)]
    pub properties: PropertyBag,
}

/// Errors from the service API layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("service API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ServiceApi {
    /// Create a new API client for a service endpoint.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:8440`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Fetch one object's introspection description.
    ///
    /// Sends `POST /object/introspect` with the object path.
    pub async fn introspect(&self, path: &ObjectPath) -> Result<Introspection, ServiceApiError> {
        let body = serde_json::json!({ "path": path });
        let response = self
            .client
            .post(format!("{}/object/introspect", self.api_url))
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Fetch all properties of one interface on one object.
    ///
    /// Sends `POST /object/properties`.
    pub async fn get_all_properties(
        &self,
        path: &ObjectPath,
        interface: &str,
    ) -> Result<PropertyBag, ServiceApiError> {
        let body = serde_json::json!({ "path": path, "interface": interface });
        let response = self
            .client
            .post(format!("{}/object/properties", self.api_url))
            .json(&body)
            .send()
            .await?;
        let parsed: PropertiesResponse = Self::parse_response(response).await?;
        Ok(parsed.properties)
    }

    /// Ask a whitelist whether it designates a job.
    ///
    /// Sends `POST /whitelist/designates`.
    pub async fn designates(
        &self,
        whitelist: &ObjectPath,
        job: &ObjectPath,
    ) -> Result<bool, ServiceApiError> {
        let body = serde_json::json!({ "whitelist": whitelist, "job": job });
        let response = self
            .client
            .post(format!("{}/whitelist/designates", self.api_url))
            .json(&body)
            .send()
            .await?;
        let parsed: DesignatesResponse = Self::parse_response(response).await?;
        Ok(parsed.designates)
    }

    /// Create a session seeded with a job list.
    ///
    /// Sends `POST /session`.
    pub async fn create_session(
        &self,
        jobs: &[ObjectPath],
    ) -> Result<ObjectPath, ServiceApiError> {
        let body = serde_json::json!({ "jobs": jobs });
        let response = self
            .client
            .post(format!("{}/session", self.api_url))
            .json(&body)
            .send()
            .await?;
        let parsed: CreateSessionResponse = Self::parse_response(response).await?;
        Ok(parsed.session)
    }

    /// Replace a session's desired job list.
    ///
    /// Sends `POST /session/desired`. Returns the service's per-job
    /// error strings.
    pub async fn update_desired_job_list(
        &self,
        session: &ObjectPath,
        jobs: &[ObjectPath],
    ) -> Result<Vec<String>, ServiceApiError> {
        let body = serde_json::json!({ "session": session, "jobs": jobs });
        let response = self
            .client
            .post(format!("{}/session/desired", self.api_url))
            .json(&body)
            .send()
            .await?;
        let parsed: UpdateDesiredResponse = Self::parse_response(response).await?;
        Ok(parsed.errors)
    }

    /// Dispatch one job within a session.
    ///
    /// Sends `POST /session/run`. The service acknowledges the
    /// dispatch; the result arrives later on the signal stream.
    pub async fn run_job(
        &self,
        session: &ObjectPath,
        job: &ObjectPath,
    ) -> Result<(), ServiceApiError> {
        let body = serde_json::json!({ "session": session, "job": job });
        let response = self
            .client
            .post(format!("{}/session/run", self.api_url))
            .json(&body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Record a job result object in the session state.
    ///
    /// Sends `POST /session/result`.
    pub async fn update_job_result(
        &self,
        session: &ObjectPath,
        job: &ObjectPath,
        result: &ObjectPath,
    ) -> Result<(), ServiceApiError> {
        let body = serde_json::json!({ "session": session, "job": job, "result": result });
        let response = self
            .client
            .post(format!("{}/session/result", self.api_url))
            .json(&body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Ask the service process to exit.
    ///
    /// Sends `POST /service/exit`.
    pub async fn exit(&self) -> Result<(), ServiceApiError> {
        let response = self
            .client
            .post(format!("{}/service/exit", self.api_url))
            .send()
            .await?;
        Self::check_status(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a
    /// [`ServiceApiError::ApiError`] containing the status and body
    /// text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ServiceApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServiceApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ServiceApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ServiceApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
