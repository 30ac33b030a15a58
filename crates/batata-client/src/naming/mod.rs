//! Naming Engine: register/deregister/list/select operations, composing
//! the Instance Registry Mirror (E), Heartbeat Scheduler (F) and the
//! weighted-random Load Balancer (G).

pub mod balancer;
pub mod heartbeat;
pub mod listener;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Method;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::constants;
use crate::dispatcher::{HttpDispatcher, RetryBudget};
use crate::error::{ClientError, Result};
use crate::metrics::MetricsMonitor;
use crate::model::{
    ClientProfile, DeregisterInstanceParams, Instance, InstanceKey, LocallyRegistered,
    RegisterInstanceParams, ServiceSnapshot,
};

use self::heartbeat::HeartbeatScheduler;
use self::listener::{EventListener, NamingEvent};
use self::registry::RegistryMirror;

/// Service discovery engine: owns the registry mirror and the
/// locally-registered set exclusively; the Dispatcher and its rotation
/// index are shared with the Config Engine.
pub struct NamingEngine {
    dispatcher: Arc<HttpDispatcher>,
    registry: Arc<RegistryMirror>,
    heartbeat: Arc<HeartbeatScheduler>,
    profile: ClientProfile,
    metrics: Arc<MetricsMonitor>,
    locally_registered: DashMap<InstanceKey, LocallyRegistered>,
    subscriptions: DashMap<String, Vec<Arc<dyn EventListener>>>,
    shutdown: Arc<Notify>,
    refresh_worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl NamingEngine {
    pub fn new(
        dispatcher: Arc<HttpDispatcher>,
        profile: ClientProfile,
        metrics: Arc<MetricsMonitor>,
    ) -> Arc<Self> {
        let timeout = Duration::from_millis(profile.timeout_ms);
        let registry = Arc::new(RegistryMirror::new(
            Arc::clone(&dispatcher),
            profile.namespace_id.clone(),
            timeout,
            profile.protect_threshold,
        ));
        let heartbeat = HeartbeatScheduler::new(
            Arc::clone(&dispatcher),
            timeout,
            Duration::from_millis(profile.beat_interval_ms),
        );

        let engine = Arc::new(Self {
            dispatcher,
            registry,
            heartbeat,
            profile,
            metrics,
            locally_registered: DashMap::new(),
            subscriptions: DashMap::new(),
            shutdown: Arc::new(Notify::new()),
            refresh_worker: std::sync::Mutex::new(None),
        });
        engine.ensure_refresh_worker_running();
        engine
    }

    /// Register an instance: POST to the naming wire, then on success
    /// store it as locally-registered and arm its heartbeat timer.
    pub async fn register_instance(&self, params: RegisterInstanceParams) -> Result<()> {
        if params.service_name.trim().is_empty() {
            return Err(ClientError::InvalidArgument(
                "serviceName must not be empty".to_string(),
            ));
        }
        if params.ip.trim().is_empty() {
            return Err(ClientError::InvalidArgument("ip must not be empty".to_string()));
        }

        let key = params.to_instance_key();
        let instance = params.to_instance();

        let metadata_json = if params.metadata.is_empty() {
            "null".to_string()
        } else {
            serde_json::to_string(&params.metadata).unwrap_or_else(|_| "null".to_string())
        };

        let wire_params = vec![
            ("namespaceId", key.namespace_id.clone()),
            ("serviceName", key.grouped_service_name()),
            ("groupName", key.group_name.clone()),
            ("clusterName", key.cluster_name.clone()),
            ("ip", key.ip.clone()),
            ("port", key.port.to_string()),
            ("weight", params.weight.to_string()),
            ("enable", params.enabled.to_string()),
            ("healthy", params.healthy.to_string()),
            ("metadata", metadata_json),
            ("ephemeral", params.ephemeral.to_string()),
        ];

        let resp = self
            .dispatcher
            .request(
                Method::POST,
                constants::NAMING_INSTANCE_PATH,
                &[],
                Duration::from_millis(self.profile.timeout_ms),
                &wire_params,
                RetryBudget::PerServer(constants::NAMING_MAX_RETRY_PER_SERVER),
            )
            .await;

        match resp {
            Ok(r) if r.is_success() => {
                let registered = LocallyRegistered {
                    key: key.clone(),
                    instance,
                };
                self.locally_registered.insert(key, registered.clone());
                self.heartbeat.arm(registered);
                self.metrics.increment_success_request("register_instance");
                Ok(())
            }
            Ok(r) => {
                self.metrics.increment_failed_request("register_instance", "rejected");
                Err(ClientError::ServerRejected {
                    status: r.status,
                    body: r.body,
                })
            }
            Err(e) => {
                self.metrics.increment_failed_request("register_instance", "transport");
                Err(e)
            }
        }
    }

    /// Deregister: DELETE, then on success disarm the heartbeat and drop
    /// the locally-registered record.
    pub async fn deregister_instance(&self, params: DeregisterInstanceParams) -> Result<()> {
        let key = params.to_instance_key();

        let wire_params = vec![
            ("namespaceId", key.namespace_id.clone()),
            ("serviceName", key.grouped_service_name()),
            ("groupName", key.group_name.clone()),
            ("clusterName", key.cluster_name.clone()),
            ("ip", key.ip.clone()),
            ("port", key.port.to_string()),
        ];

        let resp = self
            .dispatcher
            .request(
                Method::DELETE,
                constants::NAMING_INSTANCE_PATH,
                &[],
                Duration::from_millis(self.profile.timeout_ms),
                &wire_params,
                RetryBudget::PerServer(constants::NAMING_MAX_RETRY_PER_SERVER),
            )
            .await?;

        if !resp.is_success() {
            return Err(ClientError::ServerRejected {
                status: resp.status,
                body: resp.body,
            });
        }

        self.heartbeat.disarm(&key);
        self.locally_registered.remove(&key);
        self.metrics.increment_success_request("deregister_instance");
        Ok(())
    }

    /// Fetch (or serve cached) the snapshot for a service, with clusters
    /// composed as a comma-joined string per §4.H.
    pub async fn get_service(
        &self,
        service_name: &str,
        group_name: Option<&str>,
        clusters: &[String],
    ) -> Result<ServiceSnapshot> {
        let group = group_name.unwrap_or(constants::DEFAULT_GROUP);
        let clusters_str = clusters.join(",");
        self.registry.get_service(service_name, group, &clusters_str).await
    }

    pub async fn select_all_instances(
        &self,
        service_name: &str,
        group_name: Option<&str>,
        clusters: &[String],
    ) -> Result<Vec<Instance>> {
        Ok(self
            .get_service(service_name, group_name, clusters)
            .await?
            .instances)
    }

    /// Filter `enabled=false`, `healthy=false` or `weight=0` out when
    /// `healthy_only` is set; otherwise return every instance.
    pub async fn select_instances(
        &self,
        service_name: &str,
        group_name: Option<&str>,
        clusters: &[String],
        healthy_only: bool,
    ) -> Result<Vec<Instance>> {
        let instances = self.select_all_instances(service_name, group_name, clusters).await?;
        if !healthy_only {
            return Ok(instances);
        }
        Ok(instances
            .into_iter()
            .filter(|i| i.selectable() && i.weight > 0.0)
            .collect())
    }

    /// Select exactly one healthy instance via the weighted-random balancer.
    pub async fn select_one_healthy_instance(
        &self,
        service_name: &str,
        group_name: Option<&str>,
        clusters: &[String],
    ) -> Result<Instance> {
        let candidates = self.select_instances(service_name, group_name, clusters, true).await?;
        balancer::choose(&candidates, &mut rand::rng())
    }

    /// Attach a callback invoked when the registry mirror's background
    /// refresh worker observes a checksum change for this service.
    pub fn subscribe(
        &self,
        service_name: &str,
        group_name: &str,
        listener: Arc<dyn EventListener>,
    ) {
        let key = registry::service_key(service_name, group_name);
        self.subscriptions.entry(key).or_default().push(listener);
    }

    pub fn unsubscribe(&self, service_name: &str, group_name: &str) {
        let key = registry::service_key(service_name, group_name);
        self.subscriptions.remove(&key);
    }

    pub fn registry(&self) -> &Arc<RegistryMirror> {
        &self.registry
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
        self.heartbeat.shutdown();
    }

    fn ensure_refresh_worker_running(self: &Arc<Self>) {
        let mut guard = self.refresh_worker.lock().unwrap();
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let engine = Arc::clone(self);
        *guard = Some(tokio::spawn(async move { engine.run_refresh_loop().await }));
    }

    async fn run_refresh_loop(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return,
                _ = tokio::time::sleep(Duration::from_millis(constants::NAMING_REFRESH_INTERVAL_MS)) => {}
            }

            for key in self.registry.stale_keys() {
                let Some((group_name, service_name)) = RegistryMirror::split_key(&key) else {
                    continue;
                };
                let previous = self.registry.snapshot_by_key(&key);
                let previous_checksum = previous.as_ref().map(|s| s.checksum.clone());
                let clusters = previous.map(|s| s.clusters).unwrap_or_default();

                match self.registry.refresh(service_name, group_name, &clusters).await {
                    Ok(fresh) => {
                        if previous_checksum.as_deref() != Some(fresh.checksum.as_str()) {
                            self.notify_subscribers(&key, group_name, service_name, &fresh);
                        }
                    }
                    Err(e) => {
                        debug!(service = key, error = %e, "background refresh failed, will retry next tick");
                    }
                }
            }
        }
    }

    fn notify_subscribers(&self, key: &str, group_name: &str, service_name: &str, snapshot: &ServiceSnapshot) {
        let Some(listeners) = self.subscriptions.get(key) else {
            return;
        };
        let event = NamingEvent {
            service_name: service_name.to_string(),
            group_name: group_name.to_string(),
            clusters: snapshot.clusters.clone(),
            instances: snapshot.instances.clone(),
        };
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}
