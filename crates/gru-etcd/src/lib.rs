//! # gru-etcd
//!
//! etcd v2 keys-API backend for the gru KV gateway.
//!
//! Implements the [`Kv`] trait over the HTTP keys API:
//!
//! - `get` maps to `GET /v2/keys/<key>?recursive=&sorted=true`
//! - `set` maps to `PUT /v2/keys/<key>` with an optional `ttl` form field
//! - `delete` maps to `DELETE /v2/keys/<key>`
//! - `watch` long-polls `GET /v2/keys/<key>?wait=true`, tracking the next
//!   `waitIndex` across events and resyncing when the index is compacted
//!
//! Endpoints are tried in order; only transport failures rotate to the next
//! endpoint, authoritative answers (including not-found) return immediately.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use gru_core::error::{Error, Result};
use gru_core::kv::{EventAction, Kv, KvEvent, Node, SetOptions, Watcher};

/// etcd error code for a missing key.
const ECODE_KEY_NOT_FOUND: u64 = 100;

/// etcd error code for a compacted watch index.
const ECODE_EVENT_INDEX_CLEARED: u64 = 401;

/// Connection settings for an etcd cluster.
#[derive(Debug, Clone)]
pub struct EtcdConfig {
    /// Cluster endpoints, tried in order.
    pub endpoints: Vec<String>,
    /// Username for basic authentication.
    pub username: Option<String>,
    /// Password for basic authentication.
    pub password: Option<String>,
    /// Per-request timeout for non-watch operations.
    pub timeout: Duration,
}

impl EtcdConfig {
    /// Creates a config for the given endpoints with a one-second timeout.
    #[must_use]
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            username: None,
            password: None,
            timeout: Duration::from_secs(1),
        }
    }

    /// Sets basic-auth credentials.
    #[must_use]
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// KV gateway over the etcd v2 keys API.
#[derive(Debug, Clone)]
pub struct EtcdKv {
    http: Client,
    // Watches long-poll and must not be bounded by the request timeout.
    watch_http: Client,
    config: EtcdConfig,
}

impl EtcdKv {
    /// Creates a gateway from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when no endpoint is configured, or a
    /// transport error if the HTTP client cannot be constructed.
    pub fn connect(config: EtcdConfig) -> Result<Self> {
        if config.endpoints.is_empty() {
            return Err(Error::InvalidInput("no etcd endpoints configured".into()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::transport_with_source("failed to create HTTP client", e))?;
        let watch_http = Client::builder()
            .build()
            .map_err(|e| Error::transport_with_source("failed to create HTTP client", e))?;

        Ok(Self {
            http,
            watch_http,
            config,
        })
    }

    fn keys_url(endpoint: &str, key: &str) -> String {
        format!("{}/v2/keys{key}", endpoint.trim_end_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(user), password) if !user.is_empty() => {
                request.basic_auth(user, password.as_deref())
            }
            _ => request,
        }
    }

    /// Decodes an etcd error body into the matching gateway error.
    fn decode_error(key: &str, status: StatusCode, body: &str) -> Error {
        if let Ok(err) = serde_json::from_str::<WireError>(body) {
            if err.error_code == ECODE_KEY_NOT_FOUND {
                return Error::NotFound(key.to_string());
            }
            return Error::transport(format!(
                "etcd error {} ({}): {}",
                err.error_code, status, err.message
            ));
        }
        Error::transport(format!("etcd returned {status}"))
    }
}

#[async_trait]
impl Kv for EtcdKv {
    async fn get(&self, key: &str, recursive: bool) -> Result<Node> {
        let mut last_err = Error::transport("no etcd endpoint reachable");
        for endpoint in &self.config.endpoints {
            let request = self
                .http
                .get(Self::keys_url(endpoint, key))
                .query(&[("recursive", recursive), ("sorted", true)]);
            let response = match self.authorize(request).send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "etcd endpoint failed");
                    last_err = Error::transport_with_source("etcd request failed", e);
                    continue;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| Error::transport_with_source("failed to read etcd response", e))?;
            if !status.is_success() {
                return Err(Self::decode_error(key, status, &body));
            }

            let decoded: WireResponse = serde_json::from_str(&body)
                .map_err(|e| Error::transport(format!("undecodable etcd response: {e}")))?;
            return Ok(decoded.node.into_node());
        }
        Err(last_err)
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<()> {
        let mut form: Vec<(&str, String)> = vec![("value", value.to_string())];
        if let Some(ttl) = options.ttl {
            form.push(("ttl", ttl.as_secs().to_string()));
        }

        let mut last_err = Error::transport("no etcd endpoint reachable");
        for endpoint in &self.config.endpoints {
            let request = self.http.put(Self::keys_url(endpoint, key)).form(&form);
            let response = match self.authorize(request).send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "etcd endpoint failed");
                    last_err = Error::transport_with_source("etcd request failed", e);
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            return Err(Self::decode_error(key, status, &body));
        }
        Err(last_err)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut last_err = Error::transport("no etcd endpoint reachable");
        for endpoint in &self.config.endpoints {
            let request = self.http.delete(Self::keys_url(endpoint, key));
            let response = match self.authorize(request).send().await {
                Ok(response) => response,
                Err(e) => {
                    debug!(endpoint = %endpoint, error = %e, "etcd endpoint failed");
                    last_err = Error::transport_with_source("etcd request failed", e);
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }
            let body = response.text().await.unwrap_or_default();
            return match Self::decode_error(key, status, &body) {
                // Deleting a missing key is a no-op.
                Error::NotFound(_) => Ok(()),
                err => Err(err),
            };
        }
        Err(last_err)
    }

    async fn watch(&self, prefix: &str, recursive: bool) -> Result<Box<dyn Watcher>> {
        Ok(Box::new(EtcdWatcher {
            kv: self.clone(),
            prefix: prefix.to_string(),
            recursive,
            wait_index: None,
        }))
    }
}

/// Long-polling watcher over the etcd v2 wait API.
struct EtcdWatcher {
    kv: EtcdKv,
    prefix: String,
    recursive: bool,
    wait_index: Option<u64>,
}

#[async_trait]
impl Watcher for EtcdWatcher {
    async fn next(&mut self) -> Result<KvEvent> {
        loop {
            let mut last_err = Error::transport("no etcd endpoint reachable");
            let mut response = None;
            for endpoint in &self.kv.config.endpoints {
                let mut query: Vec<(&str, String)> = vec![
                    ("wait", "true".to_string()),
                    ("recursive", self.recursive.to_string()),
                ];
                if let Some(index) = self.wait_index {
                    query.push(("waitIndex", index.to_string()));
                }
                let request = self
                    .kv
                    .watch_http
                    .get(EtcdKv::keys_url(endpoint, &self.prefix))
                    .query(&query);
                match self.kv.authorize(request).send().await {
                    Ok(r) => {
                        response = Some(r);
                        break;
                    }
                    Err(e) => {
                        debug!(endpoint = %endpoint, error = %e, "etcd endpoint failed");
                        last_err = Error::transport_with_source("etcd watch failed", e);
                    }
                }
            }
            let Some(response) = response else {
                return Err(last_err);
            };

            let status = response.status();
            let etcd_index = response
                .headers()
                .get("x-etcd-index")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response
                .text()
                .await
                .map_err(|e| Error::transport_with_source("failed to read etcd response", e))?;

            if !status.is_success() {
                if let Ok(err) = serde_json::from_str::<WireError>(&body) {
                    if err.error_code == ECODE_EVENT_INDEX_CLEARED {
                        // The store compacted past our index; resync from the
                        // current index rather than erroring the watch.
                        self.wait_index = etcd_index.map(|i| i + 1);
                        continue;
                    }
                }
                return Err(EtcdKv::decode_error(&self.prefix, status, &body));
            }

            let decoded: WireResponse = serde_json::from_str(&body)
                .map_err(|e| Error::transport(format!("undecodable etcd event: {e}")))?;
            if let Some(index) = decoded.node.modified_index {
                self.wait_index = Some(index + 1);
            }

            let action = decoded
                .action
                .parse::<EventAction>()
                .unwrap_or(EventAction::Update);
            return Ok(KvEvent {
                action,
                node: decoded.node.into_node(),
            });
        }
    }
}

/// Wire form of a keys-API response.
#[derive(Debug, Deserialize)]
struct WireResponse {
    action: String,
    node: WireNode,
}

/// Wire form of an etcd node.
#[derive(Debug, Deserialize)]
struct WireNode {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    nodes: Vec<WireNode>,
    #[serde(rename = "modifiedIndex")]
    modified_index: Option<u64>,
}

impl WireNode {
    fn into_node(self) -> Node {
        Node {
            key: self.key,
            value: self.value.unwrap_or_default(),
            nodes: self.nodes.into_iter().map(WireNode::into_node).collect(),
        }
    }
}

/// Wire form of an etcd error body.
#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(rename = "errorCode")]
    error_code: u64,
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_requires_endpoints() {
        let err = EtcdKv::connect(EtcdConfig::new(vec![])).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn keys_url_joins_cleanly() {
        assert_eq!(
            EtcdKv::keys_url("http://127.0.0.1:2379/", "/gru/minion"),
            "http://127.0.0.1:2379/v2/keys/gru/minion"
        );
    }

    #[test]
    fn wire_node_decodes_a_directory_listing() {
        let body = r#"{
            "action": "get",
            "node": {
                "key": "/gru/minion/x/queue",
                "dir": true,
                "nodes": [
                    {"key": "/gru/minion/x/queue/aaa", "value": "{}", "modifiedIndex": 7},
                    {"key": "/gru/minion/x/queue/bbb", "value": "{}", "modifiedIndex": 9}
                ]
            }
        }"#;
        let decoded: WireResponse = serde_json::from_str(body).unwrap();
        let node = decoded.node.into_node();
        assert_eq!(node.key, "/gru/minion/x/queue");
        assert!(node.value.is_empty());
        assert_eq!(node.nodes.len(), 2);
        assert_eq!(node.nodes[0].key, "/gru/minion/x/queue/aaa");
    }

    #[test]
    fn wire_error_decodes_not_found() {
        let body = r#"{"errorCode": 100, "message": "Key not found", "cause": "/x", "index": 4}"#;
        let decoded: WireError = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.error_code, ECODE_KEY_NOT_FOUND);
        assert_eq!(decoded.message, "Key not found");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let config = EtcdConfig::new(vec!["http://127.0.0.1:1".to_string()])
            .with_timeout(Duration::from_millis(100));
        let kv = EtcdKv::connect(config).unwrap();
        let err = kv.get("/gru/minion", false).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
