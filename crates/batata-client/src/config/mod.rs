//! Config Engine: get/publish/delete configs and drive the long-poll
//! change-detection loop.

pub mod cache;
pub mod fingerprint;
pub mod listener;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::constants;
use crate::dispatcher::{HttpDispatcher, RetryBudget};
use crate::error::{ClientError, Result};
use crate::metrics::MetricsMonitor;
use crate::model::{ClientProfile, ConfigKey};

use self::cache::LocalCacheStore;
use self::fingerprint::FingerprintTable;
use self::listener::{ConfigChangeListener, ConfigResponse};

/// Config CRUD + watch engine. Owns the Fingerprint Table and Local Cache
/// Store exclusively; the long-poll worker is the table's single writer.
pub struct ConfigEngine {
    dispatcher: Arc<HttpDispatcher>,
    table: Arc<FingerprintTable>,
    cache: Arc<LocalCacheStore>,
    profile: ClientProfile,
    metrics: Arc<MetricsMonitor>,
    shutdown: Arc<Notify>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConfigEngine {
    pub fn new(dispatcher: Arc<HttpDispatcher>, profile: ClientProfile, metrics: Arc<MetricsMonitor>) -> Arc<Self> {
        let cache = Arc::new(LocalCacheStore::new(profile.cache_dir.clone()));
        Arc::new(Self {
            dispatcher,
            table: Arc::new(FingerprintTable::new()),
            cache,
            profile,
            metrics,
            shutdown: Arc::new(Notify::new()),
            worker: std::sync::Mutex::new(None),
        })
    }

    fn validate_key(key: &ConfigKey) -> Result<()> {
        if key.data_id.trim().is_empty() {
            return Err(ClientError::InvalidArgument("dataId must not be empty".to_string()));
        }
        if key.group.trim().is_empty() {
            return Err(ClientError::InvalidArgument("group must not be empty".to_string()));
        }
        Ok(())
    }

    /// GET a config. On 200, write through to the disk cache. On 404,
    /// return empty content. On any other non-2xx, fall back to the disk
    /// cache if present; otherwise the dispatcher error surfaces.
    pub async fn get_config(&self, key: &ConfigKey) -> Result<String> {
        Self::validate_key(key)?;

        let params = Self::config_params(key);
        let result = self
            .dispatcher
            .request(
                Method::GET,
                constants::CONFIG_CONTROLLER_PATH,
                &[],
                Duration::from_millis(self.profile.timeout_ms),
                &params,
                RetryBudget::Flat(constants::CONFIG_MAX_RETRY),
            )
            .await;

        match result {
            Ok(resp) if resp.status == 200 => {
                self.cache.write_config(key, &resp.body);
                self.metrics.increment_success_request("get_config");
                Ok(resp.body)
            }
            Ok(resp) if resp.status == 404 => {
                let not_found = ClientError::NotFound {
                    data_id: key.data_id.clone(),
                    group: key.group.clone(),
                };
                debug!(error = %not_found, "config not found, returning empty content");
                self.metrics.increment_success_request("get_config");
                Ok(String::new())
            }
            Ok(resp) => {
                warn!(status = resp.status, "get_config non-2xx, falling back to cache");
                self.metrics.increment_failed_request("get_config", "server_rejected");
                self.cache
                    .read_config(key)
                    .ok_or(ClientError::ServerRejected { status: resp.status, body: resp.body })
            }
            Err(e) => {
                self.metrics.increment_failed_request("get_config", "transport");
                match self.cache.read_config(key) {
                    Some(content) => Ok(content),
                    None => Err(e),
                }
            }
        }
    }

    /// Publish succeeds iff the server returns 200 with body `"true"`.
    pub async fn publish_config(&self, key: &ConfigKey, content: &str) -> Result<bool> {
        Self::validate_key(key)?;
        if content.is_empty() {
            return Err(ClientError::InvalidArgument("content must not be empty".to_string()));
        }

        let mut params = Self::config_params(key);
        params.push(("content", content.to_string()));

        let resp = self
            .dispatcher
            .request(
                Method::POST,
                constants::CONFIG_CONTROLLER_PATH,
                &[],
                Duration::from_millis(self.profile.timeout_ms),
                &params,
                RetryBudget::Flat(constants::CONFIG_MAX_RETRY),
            )
            .await?;

        let ok = resp.status == 200 && resp.body.trim() == "true";
        if ok {
            self.cache.write_config(key, content);
            self.metrics.increment_success_request("publish_config");
        } else {
            self.metrics.increment_failed_request("publish_config", "rejected");
        }
        Ok(ok)
    }

    /// Delete succeeds iff the server returns 200 with body `"true"`.
    pub async fn delete_config(&self, key: &ConfigKey) -> Result<bool> {
        Self::validate_key(key)?;

        let params = Self::config_params(key);
        let resp = self
            .dispatcher
            .request(
                Method::DELETE,
                constants::CONFIG_CONTROLLER_PATH,
                &[],
                Duration::from_millis(self.profile.timeout_ms),
                &params,
                RetryBudget::Flat(constants::CONFIG_MAX_RETRY),
            )
            .await?;

        let ok = resp.status == 200 && resp.body.trim() == "true";
        if ok {
            self.cache.remove_config(key);
            self.metrics.increment_success_request("delete_config");
        } else {
            self.metrics.increment_failed_request("delete_config", "rejected");
        }
        Ok(ok)
    }

    /// Watch `key`, invoking `listener` whenever the server reports a
    /// change. Idempotent: re-subscribing the same key swaps the listener
    /// without disturbing the cached content/hash. Starts the long-poll
    /// worker on first use.
    pub async fn subscribe(
        self: &Arc<Self>,
        key: ConfigKey,
        listener: Arc<dyn ConfigChangeListener>,
    ) -> Result<()> {
        Self::validate_key(&key)?;

        let initial = if self.table.lookup(&key).is_none() {
            let from_cache = if !self.profile.not_load_cache_at_start {
                self.cache.read_config(&key)
            } else {
                None
            };
            match from_cache {
                Some(content) => content,
                None => self.get_config(&key).await.unwrap_or_default(),
            }
        } else {
            String::new()
        };

        self.table.upsert(key, initial, Some(listener));
        self.ensure_worker_running();
        Ok(())
    }

    pub fn unsubscribe(&self, key: &ConfigKey) {
        self.table.remove(key);
    }

    /// Bulk variant of [`ConfigEngine::subscribe`] with no callback attached
    /// — useful for priming the table before wiring listeners individually.
    pub fn add_configs_to_listen(self: &Arc<Self>, keys: Vec<ConfigKey>) {
        for key in keys {
            self.table.upsert(key, String::new(), None);
        }
        self.ensure_worker_running();
    }

    fn ensure_worker_running(self: &Arc<Self>) {
        let mut guard = self.worker.lock().unwrap();
        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let engine = Arc::clone(self);
        *guard = Some(tokio::spawn(async move { engine.run_long_poll_loop().await }));
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    async fn run_long_poll_loop(self: Arc<Self>) {
        loop {
            if self.table.is_empty() {
                tokio::select! {
                    _ = self.shutdown.notified() => return,
                    _ = tokio::time::sleep(Duration::from_millis(constants::CONFIG_RETRY_TIME_MS)) => continue,
                }
            }

            let entries = self.table.snapshot();
            let payload = build_listening_payload(&entries);

            let timeout_ms = self.profile.listen_interval_ms.max(constants::MIN_CONFIG_LONG_POLL_TIMEOUT_MS);
            let slack = Duration::from_millis(1_000);

            let result = self
                .dispatcher
                .request(
                    Method::POST,
                    constants::CONFIG_LISTENER_PATH,
                    &[("Long-Pulling-Timeout", timeout_ms.to_string())],
                    Duration::from_millis(timeout_ms) + slack,
                    &[("Listening-Configs", payload)],
                    RetryBudget::Flat(1),
                )
                .await;

            match result {
                Ok(resp) if resp.status == 200 => {
                    for changed in parse_changed_triples(&resp.body) {
                        self.handle_changed(changed).await;
                    }
                }
                Ok(resp) => {
                    debug!(status = resp.status, "long-poll non-200, backing off");
                    tokio::select! {
                        _ = self.shutdown.notified() => return,
                        _ = tokio::time::sleep(Duration::from_millis(constants::CONFIG_RETRY_TIME_MS)) => {}
                    }
                }
                Err(e) => {
                    debug!(error = %e, "long-poll transport failure, backing off");
                    tokio::select! {
                        _ = self.shutdown.notified() => return,
                        _ = tokio::time::sleep(Duration::from_millis(constants::CONFIG_RETRY_TIME_MS)) => {}
                    }
                }
            }
        }
    }

    async fn handle_changed(&self, changed: ConfigKey) {
        let content = match self.get_config(&changed).await {
            Ok(content) => content,
            Err(e) => {
                error!(error = %e, "failed to re-fetch changed config");
                return;
            }
        };

        let Some(update) = self.table.update_content(&changed, content.clone()) else {
            return;
        };

        // A re-fetch that returns the same content still refreshes the
        // hash above but must not fire the callback.
        if !update.changed {
            return;
        }

        if let Some(listener) = update.listener {
            let response = ConfigResponse {
                data_id: changed.data_id.clone(),
                group: changed.group.clone(),
                tenant: changed.tenant_str().to_string(),
                content,
            };

            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.receive_config_info(response);
            }));
            if let Err(panic) = outcome {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(
                    data_id = changed.data_id,
                    group = changed.group,
                    panic = message,
                    "config change listener panicked, continuing long-poll loop"
                );
            }
        }
    }

    fn config_params(key: &ConfigKey) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("dataId", key.data_id.clone()),
            ("group", key.group.clone()),
        ];
        if let Some(tenant) = &key.tenant {
            params.push(("tenant", tenant.clone()));
        }
        params
    }
}

/// Build the `Listening-Configs` form value for the given watched entries.
///
/// Entry grammar: `dataId \x02 group \x02 md5 (\x02 tenant)? \x01`.
pub fn build_listening_payload(entries: &[crate::model::WatchedConfig]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.key.data_id);
        out.push_str(constants::WORD_SEPARATOR);
        out.push_str(&entry.key.group);
        out.push_str(constants::WORD_SEPARATOR);
        out.push_str(&entry.md5);
        if let Some(tenant) = &entry.key.tenant {
            out.push_str(constants::WORD_SEPARATOR);
            out.push_str(tenant);
        }
        out.push_str(constants::LINE_SEPARATOR);
    }
    out
}

/// Parse a long-poll 200 response body into the set of changed keys.
///
/// Entry grammar: `dataId \x02 group (\x02 tenant)? \x01`; fields are
/// URL-decoded after splitting.
fn parse_changed_triples(body: &str) -> Vec<ConfigKey> {
    if body.is_empty() {
        return Vec::new();
    }

    body.split(constants::LINE_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let fields: Vec<&str> = entry.split(constants::WORD_SEPARATOR).collect();
            let decode = |s: &str| urlencoding::decode(s).map(|c| c.into_owned()).unwrap_or_default();

            match fields.as_slice() {
                [data_id, group] => Some(ConfigKey::new(decode(data_id), decode(group))),
                [data_id, group, tenant] => {
                    Some(ConfigKey::new(decode(data_id), decode(group)).with_tenant(decode(tenant)))
                }
                _ => None,
            }
        })
        .collect()
}
