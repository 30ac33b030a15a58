//! Heartbeat Scheduler: one periodic keep-alive timer per locally
//! registered instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::constants;
use crate::dispatcher::{HttpDispatcher, RetryBudget};
use crate::error::Result;
use crate::model::{InstanceKey, LocallyRegistered};

/// Application-level envelope on a beat PUT response body. Absent fields
/// (the happy path returns a bare `"ok"`) parse to `code: 0`.
#[derive(Deserialize, Default)]
struct BeatResult {
    #[serde(default)]
    code: i32,
}

pub struct HeartbeatScheduler {
    dispatcher: Arc<HttpDispatcher>,
    timeout: Duration,
    beat_interval: Duration,
    handles: parking_lot::Mutex<HashMap<InstanceKey, JoinHandle<()>>>,
    shutdown: Arc<Notify>,
}

impl HeartbeatScheduler {
    pub fn new(dispatcher: Arc<HttpDispatcher>, timeout: Duration, beat_interval: Duration) -> Arc<Self> {
        Arc::new(Self {
            dispatcher,
            timeout,
            beat_interval,
            handles: parking_lot::Mutex::new(HashMap::new()),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Arm a per-instance beat timer. Re-arming the same key replaces its
    /// timer (the old task is aborted).
    pub fn arm(self: &Arc<Self>, registered: LocallyRegistered) {
        let key = registered.key.clone();
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move { scheduler.beat_loop(registered).await });

        if let Some(previous) = self.handles.lock().insert(key, handle) {
            previous.abort();
        }
    }

    pub fn disarm(&self, key: &InstanceKey) {
        if let Some(handle) = self.handles.lock().remove(key) {
            handle.abort();
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
        for (_, handle) in self.handles.lock().drain() {
            handle.abort();
        }
    }

    async fn beat_loop(self: Arc<Self>, registered: LocallyRegistered) {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => return,
                _ = tokio::time::sleep(self.beat_interval) => {}
            }

            match self.send_beat(&registered).await {
                Ok(true) => {
                    warn!(
                        service = registered.key.grouped_service_name(),
                        ip = registered.key.ip,
                        port = registered.key.port,
                        "server forgot this instance (20404), re-registering"
                    );
                    if let Err(e) = self.reregister(&registered).await {
                        error!(error = %e, "failed to re-register after 20404 beat response");
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "heartbeat PUT failed, will retry next interval");
                }
            }
        }
    }

    /// Send one beat. Returns `Ok(true)` when the server's application-level
    /// code is `20404` ("forgot me"), which the caller must answer with a
    /// synchronous re-register.
    async fn send_beat(&self, registered: &LocallyRegistered) -> Result<bool> {
        let beat = serde_json::json!({
            "serviceName": registered.key.grouped_service_name(),
            "ip": registered.key.ip,
            "port": registered.key.port,
            "weight": registered.instance.weight,
            "metadata": registered.instance.metadata,
        });

        let params = [
            ("serviceName", registered.key.grouped_service_name()),
            ("namespaceId", registered.key.namespace_id.clone()),
            ("beat", beat.to_string()),
        ];

        let resp = self
            .dispatcher
            .request(
                Method::PUT,
                constants::NAMING_INSTANCE_BEAT_PATH,
                &[],
                self.timeout,
                &params,
                RetryBudget::PerServer(constants::NAMING_MAX_RETRY_PER_SERVER),
            )
            .await?;

        let result: BeatResult = serde_json::from_str(&resp.body).unwrap_or_default();
        Ok(result.code == constants::BEAT_CODE_NOT_FOUND)
    }

    async fn reregister(&self, registered: &LocallyRegistered) -> Result<()> {
        let metadata_json = if registered.instance.metadata.is_empty() {
            "null".to_string()
        } else {
            serde_json::to_string(&registered.instance.metadata).unwrap_or_else(|_| "null".to_string())
        };

        let params = vec![
            ("namespaceId", registered.key.namespace_id.clone()),
            ("serviceName", registered.key.grouped_service_name()),
            ("groupName", registered.key.group_name.clone()),
            ("clusterName", registered.key.cluster_name.clone()),
            ("ip", registered.key.ip.clone()),
            ("port", registered.key.port.to_string()),
            ("weight", registered.instance.weight.to_string()),
            ("enable", registered.instance.enabled.to_string()),
            ("healthy", registered.instance.healthy.to_string()),
            ("metadata", metadata_json),
            ("ephemeral", registered.instance.ephemeral.to_string()),
        ];

        self.dispatcher
            .request(
                Method::POST,
                constants::NAMING_INSTANCE_PATH,
                &[],
                self.timeout,
                &params,
                RetryBudget::PerServer(constants::NAMING_MAX_RETRY_PER_SERVER),
            )
            .await?;

        Ok(())
    }
}
