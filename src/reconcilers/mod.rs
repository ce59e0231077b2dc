// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.
//!
//! Every reconciliation re-reads the triggering object and derives the required
//! writes from current cluster state alone; nothing is carried over between runs.

pub mod configmap;
pub mod namespace;

pub use configmap::{reconcile_configmap, sync_selector, ConfigMapReconciler};
pub use namespace::{reconcile_namespace, secrets_to_provision, NamespaceReconciler};

use crate::constants::requeue;
use crate::error::{Result, SyncError};
use kube::runtime::controller::Action;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Where a reconciliation ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R> {
    /// The triggering object no longer exists
    NotFound,
    /// The object exists but does not ask for any work this cycle
    Skipped,
    /// The matching engine ran
    Applied(R),
}

/// Requeue delay handed to the controller runtime after a failed reconcile
pub fn requeue_for(error: &SyncError) -> Action {
    if error.is_conflict() {
        Action::requeue(Duration::from_secs(requeue::CONFLICT_SECS))
    } else {
        Action::requeue(Duration::from_secs(requeue::ERROR_SECS))
    }
}

/// Bound a reconciliation by `timeout`, cancelling `token` when it runs out
pub(crate) async fn with_deadline<T, F>(
    timeout: Duration,
    token: &CancellationToken,
    reconciliation: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, reconciliation).await {
        Ok(result) => result,
        Err(_) => {
            token.cancel();
            Err(SyncError::DeadlineExceeded(timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_requeue_quickly() {
        let conflict = SyncError::Conflict {
            kind: "ConfigMap".to_string(),
            namespace: "ns-a".to_string(),
            name: "cfg1".to_string(),
            message: "modified".to_string(),
        };

        assert_eq!(requeue_for(&conflict), Action::requeue(Duration::from_secs(5)));
        assert_eq!(
            requeue_for(&SyncError::Transient("boom".to_string())),
            Action::requeue(Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn test_deadline_cancels_token() {
        let token = CancellationToken::new();

        let result: Result<()> =
            with_deadline(Duration::from_millis(10), &token, std::future::pending()).await;

        assert!(matches!(result, Err(SyncError::DeadlineExceeded(_))));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_passes_result_through() {
        let token = CancellationToken::new();

        let result = with_deadline(Duration::from_secs(1), &token, async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert!(!token.is_cancelled());
    }
}
