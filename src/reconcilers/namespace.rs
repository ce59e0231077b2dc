// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace reconciler - provisions secrets into active, annotated namespaces.

use crate::config::Config;
use crate::constants::NAMESPACE_ACTIVE;
use crate::error::{Result, SyncError};
use crate::reconcilers::{requeue_for, with_deadline, Outcome};
use crate::store::{cancellable, KubeStore, ObjectStore};
use crate::sync::{provision_secrets, ProvisionReport};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    runtime::{controller::Action, watcher::Config as WatcherConfig, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Secret list to provision, only while the namespace is active
pub fn secrets_to_provision<'a>(namespace: &'a Namespace, annotation: &str) -> Option<&'a str> {
    let phase = namespace.status.as_ref().and_then(|s| s.phase.as_deref());
    if phase != Some(NAMESPACE_ACTIVE) {
        return None;
    }

    namespace.annotations().get(annotation).map(|s| s.as_str())
}

/// Fetch the namespace `name` and, when it is active and annotated, clone the
/// listed secrets from `home_namespace` into it.
///
/// This runs on every event for an active namespace, not only on the
/// transition to active; provisioning being create-only makes that harmless.
pub async fn reconcile_namespace<S: ObjectStore>(
    store: &S,
    name: &str,
    config: &Config,
    token: &CancellationToken,
) -> Result<Outcome<ProvisionReport>> {
    let namespace = match cancellable(token, store.get::<Namespace>(None, name)).await {
        Ok(ns) => ns,
        Err(e) if e.is_not_found() => {
            debug!("Namespace {} is gone, nothing to do", name);
            return Ok(Outcome::NotFound);
        }
        Err(e) => {
            error!("Unable to fetch namespace {}: {}", name, e);
            return Err(e);
        }
    };

    let Some(secret_names) = secrets_to_provision(&namespace, &config.secrets_annotation) else {
        debug!("Namespace {} is not active or not annotated, skipping", name);
        return Ok(Outcome::Skipped);
    };

    info!("Provisioning secrets [{}] into namespace {}", secret_names, name);
    let report =
        provision_secrets(store, name, secret_names, &config.home_namespace, token).await?;
    Ok(Outcome::Applied(report))
}

pub struct NamespaceReconciler {
    client: Client,
    store: KubeStore,
    config: Config,
    shutdown: CancellationToken,
}

impl NamespaceReconciler {
    pub fn new(client: Client, config: Config, shutdown: CancellationToken) -> Self {
        Self {
            store: KubeStore::new(client.clone()),
            client,
            config,
            shutdown,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let shutdown = self.shutdown.clone();
        let context = Arc::new(self);

        Controller::new(namespaces, WatcherConfig::default())
            .graceful_shutdown_on(async move { shutdown.cancelled().await })
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled namespace: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(namespace: Arc<Namespace>, ctx: Arc<NamespaceReconciler>) -> Result<Action> {
    let name = namespace.name_any();
    let token = ctx.shutdown.child_token();

    with_deadline(
        ctx.config.reconcile_timeout,
        &token,
        reconcile_namespace(&ctx.store, &name, &ctx.config, &token),
    )
    .await?;

    Ok(Action::await_change())
}

fn error_policy(
    _namespace: Arc<Namespace>,
    error: &SyncError,
    _ctx: Arc<NamespaceReconciler>,
) -> Action {
    error!("Reconciliation error: {}", error);
    requeue_for(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::{annotated, namespace, secret};
    use k8s_openapi::api::core::v1::Secret;
    use std::time::Duration;

    const HOME: &str = "operators";
    const ANNOTATION: &str = "namespace-provisioner.jeckscolari.github.com/secrets";

    fn config() -> Config {
        Config {
            home_namespace: HOME.to_string(),
            secrets_annotation: ANNOTATION.to_string(),
            reconcile_timeout: Duration::from_secs(30),
            surface_partial_failures: false,
        }
    }

    fn cluster() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(namespace(HOME, &[], "Active"));
        store.insert(secret("secretA", HOME, &[("password", "a")]));
        store.insert(secret("secretB", HOME, &[("token", "b")]));
        store
    }

    #[test]
    fn test_secrets_to_provision_requires_active_phase() {
        for phase in ["Pending", "Terminating"] {
            let ns = annotated(namespace("ns1", &[], phase), ANNOTATION, "secretA");
            assert_eq!(secrets_to_provision(&ns, ANNOTATION), None);
        }

        let ns = annotated(namespace("ns1", &[], "Active"), ANNOTATION, "secretA");
        assert_eq!(secrets_to_provision(&ns, ANNOTATION), Some("secretA"));
    }

    #[test]
    fn test_secrets_to_provision_requires_annotation() {
        let ns = namespace("ns1", &[], "Active");
        assert_eq!(secrets_to_provision(&ns, ANNOTATION), None);

        let mut no_status = annotated(namespace("ns1", &[], "Active"), ANNOTATION, "secretA");
        no_status.status = None;
        assert_eq!(secrets_to_provision(&no_status, ANNOTATION), None);
    }

    #[tokio::test]
    async fn test_active_namespace_gets_secrets() {
        let store = cluster();
        store.insert(annotated(
            namespace("ns1", &[], "Active"),
            ANNOTATION,
            "secretA,secretB",
        ));
        let token = CancellationToken::new();

        let outcome = reconcile_namespace(&store, "ns1", &config(), &token)
            .await
            .unwrap();

        match outcome {
            Outcome::Applied(report) => assert_eq!(report.created, vec!["secretA", "secretB"]),
            other => panic!("expected provisioning to run, got {:?}", other),
        }
        assert!(store.object::<Secret>(Some("ns1"), "secretA").is_some());
        assert!(store.object::<Secret>(Some("ns1"), "secretB").is_some());
    }

    #[tokio::test]
    async fn test_pending_namespace_is_skipped() {
        let store = cluster();
        store.insert(annotated(namespace("ns1", &[], "Pending"), ANNOTATION, "secretA"));
        let token = CancellationToken::new();

        let outcome = reconcile_namespace(&store, "ns1", &config(), &token)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert!(store.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_namespace_is_a_no_op() {
        let store = cluster();
        let token = CancellationToken::new();

        let outcome = reconcile_namespace(&store, "ns1", &config(), &token)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::NotFound);
    }

    #[tokio::test]
    async fn test_missing_source_secret_fails_the_reconcile() {
        let store = cluster();
        store.insert(annotated(
            namespace("ns1", &[], "Active"),
            ANNOTATION,
            "secretA,ghost",
        ));
        let token = CancellationToken::new();

        let err = reconcile_namespace(&store, "ns1", &config(), &token)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::SourceSecretsMissing { .. }));
        assert!(store.object::<Secret>(Some("ns1"), "secretA").is_some());
    }

    #[tokio::test]
    async fn test_reprovisioning_an_active_namespace_is_harmless() {
        let store = cluster();
        store.insert(annotated(
            namespace("ns1", &[], "Active"),
            ANNOTATION,
            "secretA",
        ));
        let token = CancellationToken::new();

        reconcile_namespace(&store, "ns1", &config(), &token)
            .await
            .unwrap();
        let outcome = reconcile_namespace(&store, "ns1", &config(), &token)
            .await
            .unwrap();

        match outcome {
            Outcome::Applied(report) => assert_eq!(report.already_present, vec!["secretA"]),
            other => panic!("expected provisioning to run, got {:?}", other),
        }
        assert_eq!(store.mutations().len(), 1);
    }
}
