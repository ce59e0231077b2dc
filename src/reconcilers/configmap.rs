// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ConfigMap reconciler - propagates annotated ConfigMaps into selected namespaces.

use crate::config::Config;
use crate::constants::annotations;
use crate::error::{Result, SyncError};
use crate::reconcilers::{requeue_for, with_deadline, Outcome};
use crate::store::{cancellable, KubeStore, ObjectStore};
use crate::sync::{sync_configmap, SyncReport};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{
    runtime::{controller::Action, watcher::Config as WatcherConfig, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Selector from the sync annotation, if present and not blank
pub fn sync_selector(configmap: &ConfigMap) -> Option<&str> {
    configmap
        .annotations()
        .get(annotations::SYNC)
        .map(|s| s.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Fetch the ConfigMap `namespace/name` and, when it carries a sync selector,
/// propagate it to the selected namespaces.
pub async fn reconcile_configmap<S: ObjectStore>(
    store: &S,
    namespace: &str,
    name: &str,
    token: &CancellationToken,
) -> Result<Outcome<SyncReport>> {
    let source = match cancellable(token, store.get::<ConfigMap>(Some(namespace), name)).await {
        Ok(cm) => cm,
        Err(e) if e.is_not_found() => {
            debug!("ConfigMap {}/{} is gone, nothing to do", namespace, name);
            return Ok(Outcome::NotFound);
        }
        Err(e) => {
            error!("Unable to fetch ConfigMap {}/{}: {}", namespace, name, e);
            return Err(e);
        }
    };

    let Some(selector) = sync_selector(&source) else {
        debug!(
            "ConfigMap {}/{} does not have the sync annotation, skipping",
            namespace, name
        );
        return Ok(Outcome::Skipped);
    };

    info!("Processing ConfigMap {}/{}", namespace, name);
    let report = sync_configmap(store, &source, selector, token).await?;
    Ok(Outcome::Applied(report))
}

pub struct ConfigMapReconciler {
    client: Client,
    store: KubeStore,
    config: Config,
    shutdown: CancellationToken,
}

impl ConfigMapReconciler {
    pub fn new(client: Client, config: Config, shutdown: CancellationToken) -> Self {
        Self {
            store: KubeStore::new(client.clone()),
            client,
            config,
            shutdown,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let configmaps: Api<ConfigMap> = Api::all(self.client.clone());
        let shutdown = self.shutdown.clone();
        let context = Arc::new(self);

        Controller::new(configmaps, WatcherConfig::default())
            .graceful_shutdown_on(async move { shutdown.cancelled().await })
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled configmap: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(configmap: Arc<ConfigMap>, ctx: Arc<ConfigMapReconciler>) -> Result<Action> {
    let name = configmap.name_any();
    let namespace = configmap.namespace().unwrap_or_default();
    let token = ctx.shutdown.child_token();

    let outcome = with_deadline(
        ctx.config.reconcile_timeout,
        &token,
        reconcile_configmap(&ctx.store, &namespace, &name, &token),
    )
    .await?;

    if let Outcome::Applied(report) = outcome {
        check_report(&report, &namespace, &name, &ctx.config)?;
    }

    Ok(Action::await_change())
}

/// Turn target failures that need another pass into a reconcile error.
///
/// A conflict on any target always fails the reconcile so it is requeued.
/// Other target failures only do so when partial failures are surfaced.
fn check_report(
    report: &SyncReport,
    namespace: &str,
    name: &str,
    config: &Config,
) -> Result<()> {
    if let Some(conflict) = report.first_conflict() {
        warn!(
            "ConfigMap {}/{} hit a write conflict in namespace {}, requeueing",
            namespace, name, conflict.namespace
        );
        return Err(SyncError::Conflict {
            kind: "ConfigMap".to_string(),
            namespace: conflict.namespace.clone(),
            name: name.to_string(),
            message: conflict.error.clone(),
        });
    }

    if config.surface_partial_failures && !report.is_complete() {
        return Err(SyncError::PartialSync {
            source_name: format!("{}/{}", namespace, name),
            failed: report.failed_namespaces(),
        });
    }

    Ok(())
}

fn error_policy(
    _configmap: Arc<ConfigMap>,
    error: &SyncError,
    _ctx: Arc<ConfigMapReconciler>,
) -> Action {
    error!("Reconciliation error: {}", error);
    requeue_for(error)
}
