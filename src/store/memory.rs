// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`ObjectStore`] with resourceVersion-based optimistic concurrency.
//!
//! Objects are kept as JSON keyed by (kind, namespace, name) and listed in key
//! order, which makes engine runs against it deterministic. Faults can be
//! injected per operation and object, and every successful create/update is
//! recorded so tests can assert exactly which mutations happened.

use crate::error::{Result, SyncError};
use crate::selector::LabelSelector;
use crate::store::{ObjectStore, StoreObject};
use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
}

/// Failure injected into a store operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Fail with [`SyncError::Transient`]
    Transient,
    /// Fail with [`SyncError::Conflict`]
    Conflict,
    /// Never complete
    Hang,
}

/// A create or update that was applied to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub operation: Operation,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct ObjectKey {
    kind: String,
    namespace: Option<String>,
    name: String,
}

impl ObjectKey {
    fn new<K: StoreObject>(namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind: K::kind(&()).to_string(),
            namespace: namespace.map(String::from),
            name: name.to_string(),
        }
    }

    fn of<K: StoreObject>(object: &K) -> Self {
        Self::new::<K>(object.namespace().as_deref(), &object.name_any())
    }

    fn not_found(&self) -> SyncError {
        SyncError::NotFound {
            kind: self.kind.clone(),
            namespace: self.namespace.clone().unwrap_or_default(),
            name: self.name.clone(),
        }
    }
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    resource_version: u64,
    faults: HashMap<(Operation, ObjectKey), Fault>,
    mutations: Vec<Mutation>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn record(&mut self, operation: Operation, key: &ObjectKey) {
        self.mutations.push(Mutation {
            operation,
            kind: key.kind.clone(),
            namespace: key.namespace.clone(),
            name: key.name.clone(),
        });
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed an object without recording a mutation. Existing objects are replaced.
    pub fn insert<K: StoreObject>(&self, mut object: K) {
        let key = ObjectKey::of(&object);
        let mut state = self.state();
        object.meta_mut().resource_version = Some(state.next_version());
        match serde_json::to_value(&object) {
            Ok(value) => {
                state.objects.insert(key, value);
            }
            Err(e) => debug!("Dropping unserializable object {:?}: {}", key, e),
        }
    }

    /// Current copy of an object, if present
    pub fn object<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let key = ObjectKey::new::<K>(namespace, name);
        self.state()
            .objects
            .get(&key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Make `operation` on the named object fail until cleared.
    /// List faults are keyed by kind and namespace with an empty name.
    pub fn fail<K: StoreObject>(
        &self,
        operation: Operation,
        namespace: Option<&str>,
        name: &str,
        fault: Fault,
    ) {
        let key = ObjectKey::new::<K>(namespace, name);
        self.state().faults.insert((operation, key), fault);
    }

    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.state().mutations.clone()
    }

    pub fn clear_mutations(&self) {
        self.state().mutations.clear();
    }

    async fn check_fault(&self, operation: Operation, key: &ObjectKey) -> Result<()> {
        let fault = self.state().faults.get(&(operation, key.clone())).copied();
        match fault {
            None => Ok(()),
            Some(Fault::Transient) => Err(SyncError::Transient(format!(
                "injected failure on {:?} {:?}",
                operation, key
            ))),
            Some(Fault::Conflict) => Err(SyncError::Conflict {
                kind: key.kind.clone(),
                namespace: key.namespace.clone().unwrap_or_default(),
                name: key.name.clone(),
                message: "injected conflict".to_string(),
            }),
            Some(Fault::Hang) => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: StoreObject>(&self, namespace: Option<&str>, name: &str) -> Result<K> {
        let key = ObjectKey::new::<K>(namespace, name);
        self.check_fault(Operation::Get, &key).await?;

        let value = self
            .state()
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| key.not_found())?;
        Ok(serde_json::from_value(value)?)
    }

    async fn list<K: StoreObject>(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<K>> {
        let key = ObjectKey::new::<K>(namespace, "");
        self.check_fault(Operation::List, &key).await?;

        let values: Vec<Value> = self
            .state()
            .objects
            .iter()
            .filter(|(k, _)| k.kind == key.kind)
            .filter(|(k, _)| namespace.is_none() || k.namespace.as_deref() == namespace)
            .map(|(_, v)| v.clone())
            .collect();

        let mut items = Vec::with_capacity(values.len());
        for value in values {
            let object: K = serde_json::from_value(value)?;
            if selector.matches(object.labels()) {
                items.push(object);
            }
        }
        Ok(items)
    }

    async fn create<K: StoreObject>(&self, object: &K) -> Result<K> {
        let key = ObjectKey::of(object);
        self.check_fault(Operation::Create, &key).await?;

        let mut state = self.state();
        if state.objects.contains_key(&key) {
            return Err(SyncError::AlreadyExists {
                kind: key.kind,
                namespace: key.namespace.unwrap_or_default(),
                name: key.name,
            });
        }

        let mut stored = object.clone();
        stored.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key.clone(), serde_json::to_value(&stored)?);
        state.record(Operation::Create, &key);
        Ok(stored)
    }

    async fn update<K: StoreObject>(&self, object: &K) -> Result<K> {
        let key = ObjectKey::of(object);
        self.check_fault(Operation::Update, &key).await?;

        let mut state = self.state();
        let current = state.objects.get(&key).ok_or_else(|| key.not_found())?;
        let current_version = current
            .pointer("/metadata/resourceVersion")
            .and_then(Value::as_str)
            .map(String::from);

        if let Some(version) = object.resource_version() {
            if Some(&version) != current_version.as_ref() {
                return Err(SyncError::Conflict {
                    kind: key.kind,
                    namespace: key.namespace.unwrap_or_default(),
                    name: key.name,
                    message: format!(
                        "resourceVersion {} does not match stored {}",
                        version,
                        current_version.unwrap_or_default()
                    ),
                });
            }
        }

        let mut stored = object.clone();
        stored.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key.clone(), serde_json::to_value(&stored)?);
        state.record(Operation::Update, &key);
        Ok(stored)
    }
}
