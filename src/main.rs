// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use config_sync_operator::config::Config;
use config_sync_operator::reconcilers::{ConfigMapReconciler, NamespaceReconciler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting config-sync operator");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: home_namespace={}, secrets_annotation={}",
        config.home_namespace, config.secrets_annotation
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Cancelled on ctrl-c; in-flight reconciliations stop at their next store call
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
        signal.cancel();
    });

    let configmap_reconciler =
        ConfigMapReconciler::new(client.clone(), config.clone(), shutdown.clone());
    let namespace_reconciler = NamespaceReconciler::new(client, config, shutdown);

    info!("Starting reconcilers...");

    tokio::try_join!(configmap_reconciler.run(), namespace_reconciler.run())?;

    info!("Reconcilers stopped");
    Ok(())
}
