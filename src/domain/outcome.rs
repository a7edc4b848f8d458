//! Per-host operation outcomes.
//!
//! One [`OperationOutcome`] is produced for every (host, operation) pair in a
//! batch, success or failure, and is immutable after construction. Failures
//! carry a stable machine-branchable classification alongside the human
//! detail so callers can branch without parsing messages.

use crate::domain::filetime::FileTime;
use crate::domain::types::AccessMethod;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The logical gateway operation an outcome reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Get,
    Set,
    Delete,
}

impl Operation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Delete => "delete",
        }
    }
}

/// Terminal status of one per-host call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Complete,
    Failed,
}

/// Result of one gateway call against one host.
#[derive(Debug, Clone, Serialize)]
pub struct OperationOutcome {
    /// Target host the operation ran against.
    pub host: String,
    /// Transport used.
    pub method: AccessMethod,
    /// Operation performed.
    pub operation: Operation,
    /// Terminal status.
    pub status: OperationStatus,
    /// Resulting or affected tick count. `None` on a completed `get` means
    /// the value is not set on the host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filetime_ticks: Option<u64>,
    /// Calendar rendering of `filetime_ticks`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Stable error classification (e.g. `transport/unreachable`) on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Human-readable error detail on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationOutcome {
    /// A successful outcome, optionally carrying the resulting timestamp.
    #[must_use]
    pub fn complete(
        host: impl Into<String>,
        method: AccessMethod,
        operation: Operation,
        filetime: Option<FileTime>,
    ) -> Self {
        OperationOutcome {
            host: host.into(),
            method,
            operation,
            status: OperationStatus::Complete,
            filetime_ticks: filetime.map(|ft| ft.ticks()),
            timestamp: filetime.map(|ft| ft.to_datetime()),
            error_kind: None,
            error: None,
        }
    }

    /// A failed outcome with a stable classification and human detail.
    #[must_use]
    pub fn failed(
        host: impl Into<String>,
        method: AccessMethod,
        operation: Operation,
        error_kind: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        OperationOutcome {
            host: host.into(),
            method,
            operation,
            status: OperationStatus::Failed,
            filetime_ticks: None,
            timestamp: None,
            error_kind: Some(error_kind.into()),
            error: Some(error.into()),
        }
    }

    /// Whether the per-host call completed successfully.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == OperationStatus::Complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_get_without_value_means_not_set() {
        let outcome = OperationOutcome::complete(
            "ca01",
            AccessMethod::ManagementQuery,
            Operation::Get,
            None,
        );
        assert!(outcome.is_complete());
        assert_eq!(outcome.filetime_ticks, None);
        assert_eq!(outcome.error_kind, None);
    }

    #[test]
    fn failed_outcome_carries_classification() {
        let outcome = OperationOutcome::failed(
            "ca01",
            AccessMethod::Direct,
            Operation::Set,
            "transport/unreachable",
            "host unreachable: ca01",
        );
        assert!(!outcome.is_complete());
        assert_eq!(outcome.error_kind.as_deref(), Some("transport/unreachable"));
    }

    #[test]
    fn serializes_without_null_noise() {
        let outcome = OperationOutcome::complete(
            "ca01",
            AccessMethod::RemoteExec,
            Operation::Delete,
            None,
        );
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains("\"status\":\"complete\""));
        assert!(json.contains("\"method\":\"remote-exec\""));
    }
}
