// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("Conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },

    #[error("Object store error: {0}")]
    Transient(String),

    #[error("Failed to (de)serialize object: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid label selector '{selector}': {reason}")]
    SelectorParse { selector: String, reason: String },

    #[error("Secrets [{}] not found in namespace {namespace}", .names.join(", "))]
    SourceSecretsMissing { namespace: String, names: Vec<String> },

    #[error("ConfigMap {source_name} failed to sync to namespaces [{}]", .failed.join(", "))]
    PartialSync {
        source_name: String,
        failed: Vec<String>,
    },

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("Reconciliation exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

impl SyncError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, SyncError::AlreadyExists { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict { .. })
    }

    /// Cancellation and deadline errors stop a reconciliation outright instead
    /// of being isolated to a single target.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SyncError::Cancelled | SyncError::DeadlineExceeded(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_secrets_missing_lists_all_names() {
        let err = SyncError::SourceSecretsMissing {
            namespace: "operators".to_string(),
            names: vec!["secret-a".to_string(), "secret-b".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "Secrets [secret-a, secret-b] not found in namespace operators"
        );
    }

    #[test]
    fn test_classification_helpers() {
        let not_found = SyncError::NotFound {
            kind: "ConfigMap".to_string(),
            namespace: "ns-a".to_string(),
            name: "cfg1".to_string(),
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let conflict = SyncError::Conflict {
            kind: "ConfigMap".to_string(),
            namespace: "ns-a".to_string(),
            name: "cfg1".to_string(),
            message: "resourceVersion mismatch".to_string(),
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_cancellation());

        assert!(SyncError::Cancelled.is_cancellation());
        assert!(SyncError::DeadlineExceeded(Duration::from_secs(1)).is_cancellation());
    }
}
