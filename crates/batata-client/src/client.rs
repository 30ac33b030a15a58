//! Top-level facade composing the Config Engine, Naming Engine and the
//! HTTP Dispatcher they share.

use std::sync::Arc;

use crate::config::ConfigEngine;
use crate::dispatcher::HttpDispatcher;
use crate::error::Result;
use crate::metrics::MetricsMonitor;
use crate::model::{ClientProfile, ServerEndpoint};
use crate::naming::NamingEngine;

/// A running Batata client: one shared [`HttpDispatcher`] plus the two
/// stateful engines built on top of it.
///
/// The naming engine's refresh worker starts immediately; the config
/// engine's long-poll worker starts lazily on first `subscribe`. Calling
/// [`BatataClient::shutdown`] stops every running background worker
/// promptly; in-flight requests still honor their configured timeout.
pub struct BatataClient {
    dispatcher: Arc<HttpDispatcher>,
    config: Arc<ConfigEngine>,
    naming: Arc<NamingEngine>,
    metrics: Arc<MetricsMonitor>,
}

impl BatataClient {
    pub fn new(servers: Vec<ServerEndpoint>, profile: ClientProfile) -> Result<Self> {
        let dispatcher = HttpDispatcher::new(servers)?;
        let metrics = Arc::new(
            MetricsMonitor::new().map_err(|e| anyhow::anyhow!("failed to init metrics: {e}"))?,
        );

        let config = ConfigEngine::new(Arc::clone(&dispatcher), profile.clone(), Arc::clone(&metrics));
        let naming = NamingEngine::new(Arc::clone(&dispatcher), profile, Arc::clone(&metrics));

        Ok(Self {
            dispatcher,
            config,
            naming,
            metrics,
        })
    }

    pub fn config(&self) -> &Arc<ConfigEngine> {
        &self.config
    }

    pub fn naming(&self) -> &Arc<NamingEngine> {
        &self.naming
    }

    pub fn metrics(&self) -> &Arc<MetricsMonitor> {
        &self.metrics
    }

    pub fn server_count(&self) -> usize {
        self.dispatcher.server_count()
    }

    /// Terminate the long-poll, refresh and heartbeat workers.
    pub fn shutdown(&self) {
        self.config.shutdown();
        self.naming.shutdown();
    }
}
