//! Data model shared by the config and naming engines.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Immutable client-wide settings, built via [`ClientProfile::builder`] or
/// layered configuration loading (see [`crate::profile`]).
#[derive(Clone, Debug)]
pub struct ClientProfile {
    pub timeout_ms: u64,
    pub listen_interval_ms: u64,
    pub beat_interval_ms: u64,
    pub not_load_cache_at_start: bool,
    pub namespace_id: String,
    pub access_token: Option<String>,
    pub cache_dir: std::path::PathBuf,
    /// Minimum healthy-instance ratio below which the registry mirror keeps
    /// serving the prior snapshot rather than a near-total outage. `0.0`
    /// (the donor default) disables the behavior.
    pub protect_threshold: f32,
}

impl Default for ClientProfile {
    fn default() -> Self {
        Self {
            timeout_ms: constants::SO_TIMEOUT_MS,
            listen_interval_ms: constants::CONFIG_LONG_POLL_TIMEOUT_MS,
            beat_interval_ms: constants::DEFAULT_HEART_BEAT_INTERVAL_MS,
            not_load_cache_at_start: false,
            namespace_id: constants::DEFAULT_NAMESPACE_ID.to_string(),
            access_token: None,
            cache_dir: std::env::temp_dir().join("batata-client-cache"),
            protect_threshold: constants::DEFAULT_PROTECT_THRESHOLD,
        }
    }
}

impl ClientProfile {
    pub fn builder() -> ClientProfileBuilder {
        ClientProfileBuilder::default()
    }
}

#[derive(Default)]
pub struct ClientProfileBuilder {
    profile: ClientProfile,
}

impl ClientProfileBuilder {
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.profile.timeout_ms = timeout_ms;
        self
    }

    pub fn listen_interval_ms(mut self, listen_interval_ms: u64) -> Self {
        self.profile.listen_interval_ms =
            listen_interval_ms.max(constants::MIN_CONFIG_LONG_POLL_TIMEOUT_MS);
        self
    }

    pub fn beat_interval_ms(mut self, beat_interval_ms: u64) -> Self {
        self.profile.beat_interval_ms = beat_interval_ms;
        self
    }

    pub fn not_load_cache_at_start(mut self, value: bool) -> Self {
        self.profile.not_load_cache_at_start = value;
        self
    }

    pub fn namespace_id(mut self, namespace_id: impl Into<String>) -> Self {
        self.profile.namespace_id = namespace_id.into();
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.profile.access_token = Some(token.into());
        self
    }

    pub fn cache_dir(mut self, cache_dir: impl Into<std::path::PathBuf>) -> Self {
        self.profile.cache_dir = cache_dir.into();
        self
    }

    pub fn protect_threshold(mut self, protect_threshold: f32) -> Self {
        self.profile.protect_threshold = protect_threshold;
        self
    }

    pub fn build(self) -> ClientProfile {
        self.profile
    }
}

/// One control-plane server a request may be routed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
    pub context_path: String,
}

impl ServerEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            context_path: "/nacos".to_string(),
        }
    }

    pub fn with_context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = context_path.into();
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.context_path)
    }
}

/// Identifies a configuration entry. Absent tenant is distinct from an
/// empty-string tenant.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    pub data_id: String,
    pub group: String,
    pub tenant: Option<String>,
}

impl ConfigKey {
    pub fn new(data_id: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            data_id: data_id.into(),
            group: group.into(),
            tenant: None,
        }
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn tenant_str(&self) -> &str {
        self.tenant.as_deref().unwrap_or("")
    }

    /// `dataId_group[_tenant]` as used for the on-disk cache file name.
    pub fn cache_file_name(&self) -> String {
        match &self.tenant {
            Some(tenant) if !tenant.is_empty() => {
                format!("{}_{}_{}", self.data_id, self.group, tenant)
            }
            _ => format!("{}_{}", self.data_id, self.group),
        }
    }
}

/// A watched config entry tracked by the Fingerprint Table.
#[derive(Clone)]
pub struct WatchedConfig {
    pub key: ConfigKey,
    pub content: String,
    pub md5: String,
}

impl WatchedConfig {
    pub fn new(key: ConfigKey, content: String) -> Self {
        let md5 = crate::config::fingerprint::compute_md5(&content);
        Self { key, content, md5 }
    }

    pub fn set_content(&mut self, content: String) {
        self.md5 = crate::config::fingerprint::compute_md5(&content);
        self.content = content;
    }
}

/// Identifies a service instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub namespace_id: String,
    pub service_name: String,
    pub group_name: String,
    pub cluster_name: String,
    pub ip: String,
    pub port: u16,
}

impl InstanceKey {
    /// `group@@name`, as presented on the wire.
    pub fn grouped_service_name(&self) -> String {
        format!("{}@@{}", self.group_name, self.service_name)
    }
}

/// A service instance, as held in a [`ServiceSnapshot`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub instance_id: Option<String>,
    pub ip: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub healthy: bool,
    #[serde(default = "default_true")]
    pub ephemeral: bool,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for Instance {
    fn default() -> Self {
        Self {
            instance_id: None,
            ip: String::new(),
            port: 0,
            weight: 1.0,
            enabled: true,
            healthy: true,
            ephemeral: true,
            cluster_name: constants::DEFAULT_CLUSTER_NAME.to_string(),
            service_name: String::new(),
            metadata: HashMap::new(),
        }
    }
}

impl Instance {
    /// Whether this instance may be handed out by the load balancer.
    pub fn selectable(&self) -> bool {
        self.enabled && self.healthy
    }
}

/// Raw wire response for `GET {contextPath}/v1/ns/instance/list`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfoWire {
    pub name: String,
    #[serde(default)]
    pub cache_millis: i64,
    #[serde(default)]
    pub use_specified_url: bool,
    #[serde(default)]
    pub hosts: Vec<Instance>,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub last_ref_time: i64,
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub clusters: String,
}

/// A point-in-time, immutable view of a service's instance list.
#[derive(Clone, Debug)]
pub struct ServiceSnapshot {
    pub service_name: String,
    pub cache_millis: i64,
    pub instances: Vec<Instance>,
    pub checksum: String,
    pub last_refresh: std::time::Instant,
    pub clusters: String,
}

impl ServiceSnapshot {
    pub fn from_wire(wire: ServiceInfoWire) -> Self {
        let cache_millis = if wire.cache_millis <= 0 {
            10_000
        } else {
            wire.cache_millis
        };
        Self {
            service_name: wire.name,
            cache_millis,
            instances: wire.hosts,
            checksum: wire.checksum,
            last_refresh: std::time::Instant::now(),
            clusters: wire.clusters,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.last_refresh.elapsed().as_millis() as i64 > self.cache_millis
    }

    /// Ratio of healthy-and-enabled instances to total instances; `1.0` for
    /// an empty snapshot so an empty service never trips protect mode.
    pub fn healthy_ratio(&self) -> f32 {
        if self.instances.is_empty() {
            return 1.0;
        }
        let healthy = self.instances.iter().filter(|i| i.selectable()).count();
        healthy as f32 / self.instances.len() as f32
    }
}

/// An instance this client registered; drives the Heartbeat Scheduler.
#[derive(Clone, Debug)]
pub struct LocallyRegistered {
    pub key: InstanceKey,
    pub instance: Instance,
}

/// Parameters for [`crate::naming::NamingEngine::register_instance`].
///
/// `groupName`/`namespaceId`/`clusterName` default per §4.H when omitted:
/// `DEFAULT_GROUP`, `public`, `DEFAULT` respectively; `ephemeral` defaults
/// to `true`.
#[derive(Clone, Debug)]
pub struct RegisterInstanceParams {
    pub service_name: String,
    pub group_name: Option<String>,
    pub namespace_id: Option<String>,
    pub cluster_name: Option<String>,
    pub ip: String,
    pub port: u16,
    pub weight: f64,
    pub enabled: bool,
    pub healthy: bool,
    pub ephemeral: bool,
    pub metadata: HashMap<String, String>,
}

impl RegisterInstanceParams {
    pub fn new(service_name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            group_name: None,
            namespace_id: None,
            cluster_name: None,
            ip: ip.into(),
            port,
            weight: 1.0,
            enabled: true,
            healthy: true,
            ephemeral: true,
            metadata: HashMap::new(),
        }
    }

    pub fn group_name(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    pub fn namespace_id(mut self, namespace_id: impl Into<String>) -> Self {
        self.namespace_id = Some(namespace_id.into());
        self
    }

    pub fn cluster_name(mut self, cluster_name: impl Into<String>) -> Self {
        self.cluster_name = Some(cluster_name.into());
        self
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    pub fn metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn resolved_group_name(&self) -> &str {
        self.group_name.as_deref().unwrap_or(constants::DEFAULT_GROUP)
    }

    pub fn resolved_namespace_id(&self) -> &str {
        self.namespace_id
            .as_deref()
            .unwrap_or(constants::DEFAULT_NAMESPACE_ID)
    }

    pub fn resolved_cluster_name(&self) -> &str {
        self.cluster_name
            .as_deref()
            .unwrap_or(constants::DEFAULT_CLUSTER_NAME)
    }

    pub fn to_instance_key(&self) -> InstanceKey {
        InstanceKey {
            namespace_id: self.resolved_namespace_id().to_string(),
            service_name: self.service_name.clone(),
            group_name: self.resolved_group_name().to_string(),
            cluster_name: self.resolved_cluster_name().to_string(),
            ip: self.ip.clone(),
            port: self.port,
        }
    }

    pub fn to_instance(&self) -> Instance {
        Instance {
            instance_id: None,
            ip: self.ip.clone(),
            port: self.port,
            weight: self.weight,
            enabled: self.enabled,
            healthy: self.healthy,
            ephemeral: self.ephemeral,
            cluster_name: self.resolved_cluster_name().to_string(),
            service_name: self.resolved_group_name().to_string() + "@@" + &self.service_name,
            metadata: self.metadata.clone(),
        }
    }
}

/// Parameters for [`crate::naming::NamingEngine::deregister_instance`].
#[derive(Clone, Debug)]
pub struct DeregisterInstanceParams {
    pub service_name: String,
    pub group_name: Option<String>,
    pub namespace_id: Option<String>,
    pub cluster_name: Option<String>,
    pub ip: String,
    pub port: u16,
}

impl DeregisterInstanceParams {
    pub fn new(service_name: impl Into<String>, ip: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            group_name: None,
            namespace_id: None,
            cluster_name: None,
            ip: ip.into(),
            port,
        }
    }

    pub fn group_name(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    pub fn namespace_id(mut self, namespace_id: impl Into<String>) -> Self {
        self.namespace_id = Some(namespace_id.into());
        self
    }

    pub fn cluster_name(mut self, cluster_name: impl Into<String>) -> Self {
        self.cluster_name = Some(cluster_name.into());
        self
    }

    pub fn resolved_group_name(&self) -> &str {
        self.group_name.as_deref().unwrap_or(constants::DEFAULT_GROUP)
    }

    pub fn resolved_namespace_id(&self) -> &str {
        self.namespace_id
            .as_deref()
            .unwrap_or(constants::DEFAULT_NAMESPACE_ID)
    }

    pub fn resolved_cluster_name(&self) -> &str {
        self.cluster_name
            .as_deref()
            .unwrap_or(constants::DEFAULT_CLUSTER_NAME)
    }

    pub fn to_instance_key(&self) -> InstanceKey {
        InstanceKey {
            namespace_id: self.resolved_namespace_id().to_string(),
            service_name: self.service_name.clone(),
            group_name: self.resolved_group_name().to_string(),
            cluster_name: self.resolved_cluster_name().to_string(),
            ip: self.ip.clone(),
            port: self.port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_key_cache_file_name() {
        let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP");
        assert_eq!(key.cache_file_name(), "app.yaml_DEFAULT_GROUP");

        let key = ConfigKey::new("app.yaml", "DEFAULT_GROUP").with_tenant("tenant1");
        assert_eq!(key.cache_file_name(), "app.yaml_DEFAULT_GROUP_tenant1");
    }

    #[test]
    fn test_config_key_tenant_absent_vs_empty() {
        let absent = ConfigKey::new("a", "g");
        let empty = ConfigKey::new("a", "g").with_tenant("");
        assert_ne!(absent, empty);
    }

    #[test]
    fn test_instance_selectable() {
        let mut instance = Instance::default();
        assert!(instance.selectable());

        instance.healthy = false;
        assert!(!instance.selectable());

        instance.healthy = true;
        instance.enabled = false;
        assert!(!instance.selectable());
    }

    #[test]
    fn test_instance_key_grouped_service_name() {
        let key = InstanceKey {
            namespace_id: "public".to_string(),
            service_name: "demo".to_string(),
            group_name: "DEFAULT_GROUP".to_string(),
            cluster_name: "DEFAULT".to_string(),
            ip: "10.0.0.1".to_string(),
            port: 8080,
        };
        assert_eq!(key.grouped_service_name(), "DEFAULT_GROUP@@demo");
    }

    #[test]
    fn test_client_profile_builder() {
        let profile = ClientProfile::builder()
            .timeout_ms(1000)
            .namespace_id("tenant-a")
            .listen_interval_ms(1000)
            .build();

        assert_eq!(profile.timeout_ms, 1000);
        assert_eq!(profile.namespace_id, "tenant-a");
        // Clamped up to the protocol minimum.
        assert_eq!(profile.listen_interval_ms, constants::MIN_CONFIG_LONG_POLL_TIMEOUT_MS);
    }

    #[test]
    fn test_register_instance_params_defaults() {
        let params = RegisterInstanceParams::new("DEMO", "10.0.0.10", 80);

        assert_eq!(params.resolved_group_name(), "DEFAULT_GROUP");
        assert_eq!(params.resolved_namespace_id(), "public");
        assert!(params.ephemeral);

        let instance = params.to_instance();
        assert_eq!(instance.service_name, "DEFAULT_GROUP@@DEMO");

        let key = params.to_instance_key();
        assert_eq!(key.grouped_service_name(), "DEFAULT_GROUP@@DEMO");
    }

    #[test]
    fn test_service_snapshot_healthy_ratio() {
        let wire = ServiceInfoWire {
            name: "demo".to_string(),
            hosts: vec![
                Instance {
                    healthy: true,
                    enabled: true,
                    ..Default::default()
                },
                Instance {
                    healthy: false,
                    enabled: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let snapshot = ServiceSnapshot::from_wire(wire);
        assert_eq!(snapshot.healthy_ratio(), 0.5);
    }
}
