//! Signal-stream message types and parser.
//!
//! The service pushes JSON messages over its signal socket with the
//! shape `{"type": "<kind>", "data": {...}}`. This module deserializes
//! them into a strongly-typed [`ServiceMessage`] enum.

use certbox_core::path::ObjectPath;
use serde::Deserialize;

/// All known signal-stream message types.
///
/// Deserialized via the internally-tagged `"type"` field with
/// associated `"data"` content.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServiceMessage {
    /// A job finished and its result object is addressable.
    #[serde(rename = "job_result_available")]
    JobResultAvailable(JobResultData),

    /// Interfaces appeared on an object.
    #[serde(rename = "interfaces_added")]
    InterfacesAdded(InterfacesChangedData),

    /// Interfaces disappeared from an object.
    #[serde(rename = "interfaces_removed")]
    InterfacesRemoved(InterfacesChangedData),
}

/// Payload for `job_result_available` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResultData {
    /// The job that finished.
    pub job: ObjectPath,
    /// The result object describing the outcome.
    pub result: ObjectPath,
}

/// Payload for `interfaces_added` / `interfaces_removed` messages.
#[derive(Debug, Clone, Deserialize)]
pub struct InterfacesChangedData {
    /// The object whose interface set changed.
    pub object: ObjectPath,
    /// The affected interface names, if the service included them.
    #[serde(default)]
    pub interfaces: Vec<String>,
}

/// Parse a signal-stream text message into a typed enum.
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers should log unknown types and continue.
pub fn parse_message(text: &str) -> Result<ServiceMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_job_result_available() {
        let json = r#"{"type":"job_result_available","data":{"job":"/plainbox/job/disk_smart","result":"/plainbox/result/7"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ServiceMessage::JobResultAvailable(data) => {
                assert_eq!(data.job.as_str(), "/plainbox/job/disk_smart");
                assert_eq!(data.result.as_str(), "/plainbox/result/7");
            }
            other => panic!("Expected JobResultAvailable, got {other:?}"),
        }
    }

    #[test]
    fn parse_interfaces_added_with_names() {
        let json = r#"{"type":"interfaces_added","data":{"object":"/plainbox/job/new_job","interfaces":["com.canonical.certification.CheckBox.JobDefinition1"]}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ServiceMessage::InterfacesAdded(data) => {
                assert_eq!(data.object.as_str(), "/plainbox/job/new_job");
                assert_eq!(data.interfaces.len(), 1);
            }
            other => panic!("Expected InterfacesAdded, got {other:?}"),
        }
    }

    #[test]
    fn parse_interfaces_removed_without_names() {
        let json = r#"{"type":"interfaces_removed","data":{"object":"/plainbox/job/old_job"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ServiceMessage::InterfacesRemoved(data) => {
                assert_eq!(data.object.as_str(), "/plainbox/job/old_job");
                assert!(data.interfaces.is_empty());
            }
            other => panic!("Expected InterfacesRemoved, got {other:?}"),
        }
    }

    #[test]
    fn parse_unknown_type_returns_error() {
        let json = r#"{"type":"job_started","data":{}}"#;
        assert!(parse_message(json).is_err());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(parse_message("not json at all").is_err());
    }
}
