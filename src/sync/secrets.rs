// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Clones named secrets from the home namespace into a namespace

use crate::error::{Result, SyncError};
use crate::store::{cancellable, ObjectStore};
use k8s_openapi::api::core::v1::Secret;
use kube::api::ObjectMeta;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Per-secret result of one provisioning run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<String>,
    pub already_present: Vec<String>,
    pub missing: Vec<String>,
}

/// Split the annotation value into secret names, ignoring blanks around and between commas
pub fn parse_secret_names(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Copy of `source` placed in `target_namespace`, carrying only its payload
pub fn clone_secret(source: &Secret, target_namespace: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: source.metadata.name.clone(),
            namespace: Some(target_namespace.to_string()),
            ..Default::default()
        },
        data: source.data.clone(),
        string_data: source.string_data.clone(),
        type_: source.type_.clone(),
        ..Default::default()
    }
}

/// Create a copy of every secret named in `secret_names` inside `namespace`.
///
/// Provisioning is create-only: a secret that already exists in the target is
/// left as it is and the next name is processed. Names missing from
/// `home_namespace` are skipped, and once the whole list has been handled they
/// are reported as [`SyncError::SourceSecretsMissing`]. Any other store error
/// aborts the run.
#[instrument(skip(store, token))]
pub async fn provision_secrets<S: ObjectStore>(
    store: &S,
    namespace: &str,
    secret_names: &str,
    home_namespace: &str,
    token: &CancellationToken,
) -> Result<ProvisionReport> {
    let mut report = ProvisionReport::default();

    for name in parse_secret_names(secret_names) {
        let source = match cancellable(token, store.get::<Secret>(Some(home_namespace), name)).await {
            Ok(secret) => secret,
            Err(e) if e.is_not_found() => {
                error!("Secret {}/{} not found, skipping", home_namespace, name);
                report.missing.push(name.to_string());
                continue;
            }
            Err(e) => {
                error!("Unable to fetch secret {}/{}: {}", home_namespace, name, e);
                return Err(e);
            }
        };

        info!("Creating secret {} in namespace {}", name, namespace);

        match cancellable(token, store.create(&clone_secret(&source, namespace))).await {
            Ok(_) => {
                info!("Secret {} created in namespace {}", name, namespace);
                report.created.push(name.to_string());
            }
            Err(e) if e.is_already_exists() => {
                info!("Secret {} already exists in namespace {}", name, namespace);
                report.already_present.push(name.to_string());
            }
            Err(e) => {
                error!("Failed to create secret {} in namespace {}: {}", name, namespace, e);
                return Err(e);
            }
        }
    }

    if !report.missing.is_empty() {
        warn!(
            "{} of the requested secrets are missing from {}",
            report.missing.len(),
            home_namespace
        );
        return Err(SyncError::SourceSecretsMissing {
            namespace: home_namespace.to_string(),
            names: report.missing,
        });
    }

    Ok(report)
}
