// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys that drive the operator
pub mod annotations {
    /// Label selector picking the namespaces a ConfigMap is copied into
    pub const SYNC: &str = "config-sync-operator/sync";

    /// Domain used for the secrets annotation when none is configured
    pub const DEFAULT_SECRETS_DOMAIN: &str = "jeckscolari.github.com";

    /// Comma-separated list of secrets to clone into a namespace,
    /// i.e. `namespace-provisioner.<domain>/secrets`
    pub fn secrets(domain: &str) -> String {
        format!("namespace-provisioner.{}/secrets", domain)
    }
}

/// Namespace lifecycle phase in which secrets get provisioned
pub const NAMESPACE_ACTIVE: &str = "Active";

/// Requeue intervals handed back to the controller runtime
pub mod requeue {
    /// After an optimistic-concurrency conflict
    pub const CONFLICT_SECS: u64 = 5;
    /// After any other reconciliation error
    pub const ERROR_SECS: u64 = 60;
}

/// Default deadline for a single reconciliation
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;
