use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Categories of failure surfaced to the tool caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// A required argument was absent or empty; no request was sent.
    MissingArgument,
    /// The orchestration API answered with a non-success status.
    RemoteStatusError,
    /// No response was obtained (refused, timed out, DNS, TLS).
    TransportError,
    /// Anything else, including a success response that is not JSON.
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingArgument => "missing-argument",
            Self::RemoteStatusError => "remote-status-error",
            Self::TransportError => "transport-error",
            Self::InternalError => "internal-error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform error record returned in place of a payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn missing_argument(argument: &str) -> Self {
        Self::new(ErrorKind::MissingArgument, format!("Missing required argument: {argument}"))
    }

    /// Wire form: `{"error": {"kind": ..., "message": ..., "details": ...}}`.
    pub fn to_value(&self) -> Value {
        json!({ "error": self })
    }
}

/// Result envelope of one facade call: the decoded payload or an error record.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failure(ErrorRecord),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match self {
            Self::Success(_) => None,
            Self::Failure(record) => Some(record),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(|record| record.kind)
    }

    /// Collapse the envelope into the JSON value the caller receives.
    pub fn into_value(self) -> Value {
        match self {
            Self::Success(payload) => payload,
            Self::Failure(record) => record.to_value(),
        }
    }
}

impl From<ErrorRecord> for ToolOutcome {
    fn from(record: ErrorRecord) -> Self {
        Self::Failure(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_serializes_kebab_case() {
        let encoded = serde_json::to_value(ErrorKind::RemoteStatusError).unwrap();
        assert_eq!(encoded, json!("remote-status-error"));
        assert_eq!(ErrorKind::MissingArgument.to_string(), "missing-argument");
    }

    #[test]
    fn error_record_wire_shape_omits_absent_details() {
        let record = ErrorRecord::missing_argument("deployment_id");
        assert_eq!(
            record.to_value(),
            json!({"error": {"kind": "missing-argument", "message": "Missing required argument: deployment_id"}})
        );
    }

    #[test]
    fn error_record_wire_shape_includes_details() {
        let record = ErrorRecord::new(ErrorKind::RemoteStatusError, "Prefect API error: HTTP 404").with_details("{\"detail\":\"Not Found\"}");
        let value = record.to_value();
        assert_eq!(value["error"]["kind"], "remote-status-error");
        assert_eq!(value["error"]["details"], "{\"detail\":\"Not Found\"}");
    }

    #[test]
    fn success_outcome_returns_payload_unchanged() {
        let payload = json!([{"id": "f1"}, {"id": "f2"}]);
        let outcome = ToolOutcome::Success(payload.clone());
        assert!(outcome.is_success());
        assert_eq!(outcome.error_kind(), None);
        assert_eq!(outcome.into_value(), payload);
    }

    #[test]
    fn failure_outcome_exposes_kind() {
        let outcome = ToolOutcome::from(ErrorRecord::new(ErrorKind::TransportError, "connection refused"));
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_kind(), Some(ErrorKind::TransportError));
    }
}
