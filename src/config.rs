// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{annotations, DEFAULT_RECONCILE_TIMEOUT_SECS};
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace the operator runs in; source secrets are read from here
    pub home_namespace: String,
    /// Full key of the namespace secrets annotation
    pub secrets_annotation: String,
    /// Deadline for a single reconciliation
    pub reconcile_timeout: Duration,
    /// Turn per-namespace ConfigMap failures into a failed (and retried) reconcile
    pub surface_partial_failures: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home_namespace = lookup("HOME_NAMESPACE")
            .or_else(|| lookup("POD_NAMESPACE"))
            .filter(|ns| !ns.is_empty())
            .context("HOME_NAMESPACE (or POD_NAMESPACE) environment variable not set")?;

        let domain = lookup("SECRETS_ANNOTATION_DOMAIN")
            .unwrap_or_else(|| annotations::DEFAULT_SECRETS_DOMAIN.to_string());

        let timeout_secs = match lookup("RECONCILE_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("RECONCILE_TIMEOUT_SECS is not a number: {}", raw))?,
            None => DEFAULT_RECONCILE_TIMEOUT_SECS,
        };

        let surface_partial_failures: bool = lookup("SURFACE_PARTIAL_FAILURES")
            .unwrap_or("false".to_string())
            .parse()
            .unwrap_or(false);

        Ok(Config {
            home_namespace,
            secrets_annotation: annotations::secrets(&domain),
            reconcile_timeout: Duration::from_secs(timeout_secs),
            surface_partial_failures,
        })
    }
}
