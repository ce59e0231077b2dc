// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Copies a source ConfigMap's data into every namespace matched by its selector.

use crate::error::Result;
use crate::selector::resolve_namespaces;
use crate::store::{cancellable, ObjectStore};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{api::ObjectMeta, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub namespace: String,
    pub error: String,
    /// The target write lost an optimistic-concurrency race
    pub is_conflict: bool,
}

/// Per-namespace result of one sync run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub failed: Vec<TargetFailure>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_namespaces(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.namespace.clone()).collect()
    }

    /// First target that failed on a write conflict
    pub fn first_conflict(&self) -> Option<&TargetFailure> {
        self.failed.iter().find(|f| f.is_conflict)
    }
}

/// Ensure every namespace matching `selector` holds a ConfigMap named like
/// `source` whose data equals the source's data.
///
/// Targets are processed one after the other. A failure on one namespace is
/// logged and recorded in the report while the remaining namespaces are still
/// processed; the returned `Ok` therefore does not mean every target converged.
/// An invalid selector or a failed namespace listing aborts before any write.
/// Cancellation stops the loop immediately and leaves applied writes in place.
#[instrument(
    skip(store, source, token),
    fields(configmap = %format!("{}/{}", source.namespace().unwrap_or_default(), source.name_any()))
)]
pub async fn sync_configmap<S: ObjectStore>(
    store: &S,
    source: &ConfigMap,
    selector: &str,
    token: &CancellationToken,
) -> Result<SyncReport> {
    let source_namespace = source.namespace().unwrap_or_default();
    let namespaces = resolve_namespaces(store, selector, token).await?;
    let mut report = SyncReport::default();

    for target in namespaces {
        let target_namespace = target.name_any();

        // The source is never its own target
        if target_namespace == source_namespace {
            debug!("Skipping source namespace {}", target_namespace);
            continue;
        }

        match upsert_configmap(store, source, &target_namespace, token).await {
            Ok(TargetOutcome::Created) => report.created.push(target_namespace),
            Ok(TargetOutcome::Updated) => report.updated.push(target_namespace),
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                error!(
                    "Failed to sync ConfigMap {} to namespace {}: {}",
                    source.name_any(),
                    target_namespace,
                    e
                );
                report.failed.push(TargetFailure {
                    namespace: target_namespace,
                    error: e.to_string(),
                    is_conflict: e.is_conflict(),
                });
            }
        }
    }

    if report.is_complete() {
        info!(
            "ConfigMap synced: {} created, {} updated",
            report.created.len(),
            report.updated.len()
        );
    } else {
        warn!(
            "ConfigMap partially synced: {} created, {} updated, failed in [{}]",
            report.created.len(),
            report.updated.len(),
            report.failed_namespaces().join(", ")
        );
    }

    Ok(report)
}

/// Create the target ConfigMap, or overwrite the data of the existing one.
///
/// The overwrite is unconditional and leaves every other field of the
/// existing object untouched.
pub async fn upsert_configmap<S: ObjectStore>(
    store: &S,
    source: &ConfigMap,
    target_namespace: &str,
    token: &CancellationToken,
) -> Result<TargetOutcome> {
    let name = source.name_any();

    match cancellable(token, store.get::<ConfigMap>(Some(target_namespace), &name)).await {
        Ok(mut existing) => {
            info!("Updating ConfigMap {} in namespace {}", name, target_namespace);
            existing.data = source.data.clone();
            cancellable(token, store.update(&existing)).await?;
            Ok(TargetOutcome::Updated)
        }
        Err(e) if e.is_not_found() => {
            info!("Creating ConfigMap {} in namespace {}", name, target_namespace);
            let target = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(name),
                    namespace: Some(target_namespace.to_string()),
                    ..Default::default()
                },
                data: source.data.clone(),
                ..Default::default()
            };
            cancellable(token, store.create(&target)).await?;
            Ok(TargetOutcome::Created)
        }
        Err(e) => Err(e),
    }
}
