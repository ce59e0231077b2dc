// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ConfigMap propagation and namespace secret provisioning.

pub mod configmaps;
pub mod secrets;

pub use configmaps::{sync_configmap, upsert_configmap, SyncReport, TargetFailure, TargetOutcome};
pub use secrets::{clone_secret, parse_secret_names, provision_secrets, ProvisionReport};
