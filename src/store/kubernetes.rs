// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! [`ObjectStore`] backed by the Kubernetes API server.

use crate::error::{Result, SyncError};
use crate::selector::LabelSelector;
use crate::store::{ObjectStore, StoreObject};
use async_trait::async_trait;
use kube::{
    api::{ListParams, PostParams},
    Client, ResourceExt,
};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Translate API status codes into the operator's error taxonomy
fn map_error<K: StoreObject>(err: kube::Error, namespace: Option<&str>, name: &str) -> SyncError {
    let kind = K::kind(&()).to_string();
    let namespace = namespace.unwrap_or_default().to_string();
    let name = name.to_string();

    match err {
        kube::Error::Api(response) if response.code == 404 => SyncError::NotFound {
            kind,
            namespace,
            name,
        },
        kube::Error::Api(response) if response.code == 409 && response.reason == "AlreadyExists" => {
            SyncError::AlreadyExists {
                kind,
                namespace,
                name,
            }
        }
        kube::Error::Api(response) if response.code == 409 => SyncError::Conflict {
            kind,
            namespace,
            name,
            message: response.message,
        },
        other => SyncError::Kube(other),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    #[instrument(skip(self))]
    async fn get<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<K> {
        K::api(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| map_error::<K>(e, namespace, name))
    }

    #[instrument(skip(self))]
    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<K>> {
        let mut lp = ListParams::default();
        if !selector.is_empty() {
            lp = lp.labels(&selector.to_string());
        }

        let list = K::api(self.client.clone(), namespace)
            .list(&lp)
            .await
            .map_err(|e| map_error::<K>(e, namespace, ""))?;

        debug!("Listed {} objects", list.items.len());
        Ok(list.items)
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K> {
        let namespace = object.namespace();
        let name = object.name_any();

        K::api(self.client.clone(), namespace.as_deref())
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| map_error::<K>(e, namespace.as_deref(), &name))
    }

    async fn update<K: StoreObject>(&self, object: &K) -> Result<K> {
        let namespace = object.namespace();
        let name = object.name_any();

        K::api(self.client.clone(), namespace.as_deref())
            .replace(&name, &PostParams::default(), object)
            .await
            .map_err(|e| map_error::<K>(e, namespace.as_deref(), &name))
    }
}
