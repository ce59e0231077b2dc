// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed object access used by the sync engines.
//!
//! The engines only talk to an [`ObjectStore`], so they run the same against the
//! Kubernetes API ([`KubeStore`]) and the in-memory fake ([`MemoryStore`]).

pub mod kubernetes;
pub mod memory;

pub use kubernetes::KubeStore;
pub use memory::{Fault, MemoryStore, Mutation, Operation};

use crate::error::{Result, SyncError};
use crate::selector::LabelSelector;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use kube::{Api, Client, Resource};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// A resource kind the operator reads or writes.
pub trait StoreObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// API handle for this kind, scoped to `namespace` when the kind is namespaced
    fn api(client: Client, namespace: Option<&str>) -> Api<Self>;
}

macro_rules! namespaced_object {
    ($kind:ty) => {
        impl StoreObject for $kind {
            fn api(client: Client, namespace: Option<&str>) -> Api<Self> {
                match namespace {
                    Some(ns) => Api::namespaced(client, ns),
                    None => Api::all(client),
                }
            }
        }
    };
}

namespaced_object!(ConfigMap);
namespaced_object!(Secret);

impl StoreObject for Namespace {
    fn api(client: Client, _namespace: Option<&str>) -> Api<Self> {
        Api::all(client)
    }
}

/// Get/list/create/update keyed by (kind, namespace, name).
///
/// Writes follow optimistic concurrency: an `update` carrying a stale
/// `resourceVersion` fails with [`SyncError::Conflict`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<K>;

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<K>>;

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K>;

    async fn update<K: StoreObject>(&self, object: &K) -> Result<K>;
}

/// Run a store call unless `token` is cancelled first.
pub async fn cancellable<T, F>(token: &CancellationToken, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SyncError::Cancelled),
        result = operation => result,
    }
}
