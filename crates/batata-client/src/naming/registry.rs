//! Instance Registry Mirror: cached per-service instance snapshots with
//! refresh-on-demand and a TTL hint from the server's `cacheMillis`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Method;
use tracing::warn;

use crate::constants;
use crate::dispatcher::{HttpDispatcher, RetryBudget};
use crate::error::{ClientError, Result};
use crate::model::{ServiceInfoWire, ServiceSnapshot};

/// `groupName@@serviceName`, the mirror's internal cache key.
pub fn service_key(service_name: &str, group_name: &str) -> String {
    format!("{}@@{}", group_name, service_name)
}

/// Cached instance lists, one [`ServiceSnapshot`] per (group, service)
/// pair. Guarded by `dashmap`'s per-shard locking so refreshes on one
/// service never block reads of another.
pub struct RegistryMirror {
    dispatcher: Arc<HttpDispatcher>,
    namespace_id: String,
    timeout: Duration,
    protect_threshold: f32,
    snapshots: DashMap<String, ServiceSnapshot>,
}

impl RegistryMirror {
    pub fn new(
        dispatcher: Arc<HttpDispatcher>,
        namespace_id: String,
        timeout: Duration,
        protect_threshold: f32,
    ) -> Self {
        Self {
            dispatcher,
            namespace_id,
            timeout,
            protect_threshold,
            snapshots: DashMap::new(),
        }
    }

    /// Return a clone of the cached snapshot, fetching synchronously if
    /// missing or past its `cacheMillis` TTL.
    pub async fn get_service(
        &self,
        service_name: &str,
        group_name: &str,
        clusters: &str,
    ) -> Result<ServiceSnapshot> {
        let key = service_key(service_name, group_name);
        if let Some(existing) = self.snapshots.get(&key) {
            if !existing.is_stale() {
                return Ok(existing.clone());
            }
        }
        self.refresh(service_name, group_name, clusters).await
    }

    /// Unconditionally re-fetch a service's instance list from the server
    /// and swap it into the cache.
    pub async fn refresh(
        &self,
        service_name: &str,
        group_name: &str,
        clusters: &str,
    ) -> Result<ServiceSnapshot> {
        let grouped = service_key(service_name, group_name);
        let mut params = vec![
            ("serviceName", grouped.clone()),
            ("namespaceId", self.namespace_id.clone()),
        ];
        if !clusters.is_empty() {
            params.push(("clusters", clusters.to_string()));
        }

        let resp = self
            .dispatcher
            .request(
                Method::GET,
                constants::NAMING_INSTANCE_LIST_PATH,
                &[],
                self.timeout,
                &params,
                RetryBudget::PerServer(constants::NAMING_MAX_RETRY_PER_SERVER),
            )
            .await?;

        if !resp.is_success() {
            return Err(ClientError::ServerRejected {
                status: resp.status,
                body: resp.body,
            });
        }

        let wire: ServiceInfoWire = serde_json::from_str(&resp.body)?;
        let mut snapshot = ServiceSnapshot::from_wire(wire);

        if self.protect_threshold > 0.0 {
            if let Some(previous) = self.snapshots.get(&grouped) {
                let fresh_ratio = snapshot.healthy_ratio();
                if fresh_ratio < self.protect_threshold
                    && previous.healthy_ratio() >= self.protect_threshold
                {
                    warn!(
                        service = grouped,
                        fresh_ratio, "healthy ratio below protect threshold, keeping prior snapshot instances"
                    );
                    snapshot.instances = previous.instances.clone();
                }
            }
        }

        self.snapshots.insert(grouped, snapshot.clone());
        Ok(snapshot)
    }

    /// Keys of every cached snapshot whose TTL has expired — the refresh
    /// worker's work list for one tick.
    pub fn stale_keys(&self) -> Vec<String> {
        self.snapshots
            .iter()
            .filter(|entry| entry.value().is_stale())
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn snapshot_by_key(&self, key: &str) -> Option<ServiceSnapshot> {
        self.snapshots.get(key).map(|e| e.clone())
    }

    /// Split a `groupName@@serviceName` cache key back into its parts.
    pub fn split_key(key: &str) -> Option<(&str, &str)> {
        key.split_once("@@")
    }
}
