// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: object fixtures and a mock of the Kubernetes API.

use http::{Request, Response};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, NamespaceStatus, Secret};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::{Client, Resource};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    hanging: Arc<Mutex<HashSet<(String, String)>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            hanging: Arc::new(Mutex::new(HashSet::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the exact path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for PUT requests matching the exact path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    /// Never answer GET requests matching the exact path
    pub fn hang_on_get(self, path: &str) -> Self {
        self.hanging
            .lock()
            .unwrap()
            .insert(("GET".to_string(), path.to_string()));
        self
    }

    /// Every request seen so far as `METHOD path?query`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| path.clone());

        self.requests
            .lock()
            .unwrap()
            .push(format!("{} {}", method, target));

        let key = (method, path.clone());
        if self.hanging.lock().unwrap().contains(&key) {
            return Box::pin(std::future::pending());
        }

        let response = self.responses.lock().unwrap().get(&key).cloned();

        Box::pin(async move {
            let (status, body) = response
                .unwrap_or_else(|| (404, status_json(404, "NotFound", &format!("{} not found", path))));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// A `Status` failure body as returned by the API server
pub fn status_json(code: u16, reason: &str, message: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
    .to_string()
}

pub fn configmap_json(name: &str, namespace: &str, data: &[(&str, &str)]) -> String {
    serde_json::to_string(&configmap(name, namespace, data)).unwrap()
}

pub fn namespace_list_json(names: &[&str]) -> String {
    let items: Vec<Namespace> = names
        .iter()
        .map(|name| namespace(name, &[("env", "prod")], "Active"))
        .collect();
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "NamespaceList",
        "metadata": { "resourceVersion": "1" },
        "items": items
    })
    .to_string()
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn namespace(name: &str, labels: &[(&str, &str)], phase: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: (!labels.is_empty()).then(|| string_map(labels)),
            ..Default::default()
        },
        status: Some(NamespaceStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn configmap(name: &str, namespace: &str, data: &[(&str, &str)]) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(string_map(data)),
        ..Default::default()
    }
}

pub fn secret(name: &str, namespace: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

/// Attach an annotation to any fixture
pub fn annotated<K: Resource>(mut object: K, key: &str, value: &str) -> K {
    object
        .meta_mut()
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(key.to_string(), value.to_string());
    object
}
