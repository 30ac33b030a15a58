//! Batata Client - the client-side core of a Nacos-style configuration
//! and service-discovery SDK.
//!
//! This crate provides:
//! - the Config Engine: publish/get/delete/subscribe against config keys,
//!   with a disk cache and a long-poll change-detection loop
//! - the Naming Engine: register/deregister/discover service instances,
//!   with periodic heartbeats and weighted-random client-side selection
//! - the HTTP Dispatcher both engines share for server rotation and retry

pub mod client;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod model;
pub mod naming;
pub mod profile;

pub use client::BatataClient;
pub use config::ConfigEngine;
pub use config::listener::{ConfigChangeListener, ConfigResponse, FnConfigChangeListener};
pub use dispatcher::HttpDispatcher;
pub use error::{ClientError, Result};
pub use metrics::MetricsMonitor;
pub use model::*;
pub use naming::NamingEngine;
pub use naming::listener::{EventListener, FnEventListener, NamingEvent};
pub use profile::load_profile;
