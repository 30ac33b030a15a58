//! Shared constants for the config and naming engines.
//!
//! Values are carried over from the wire contract Nacos-compatible servers
//! expect; changing them changes on-the-wire behavior, not just defaults.

pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";
pub const DEFAULT_NAMESPACE_ID: &str = "public";
pub const DEFAULT_CLUSTER_NAME: &str = "DEFAULT";

pub const ONCE_TIMEOUT_MS: u64 = 2_000;
pub const SO_TIMEOUT_MS: u64 = 60_000;

pub const CONFIG_LONG_POLL_TIMEOUT_MS: u64 = 30_000;
pub const MIN_CONFIG_LONG_POLL_TIMEOUT_MS: u64 = 10_000;
pub const CONFIG_RETRY_TIME_MS: u64 = 2_000;
pub const CONFIG_MAX_RETRY: usize = 3;

pub const NAMING_MAX_RETRY_PER_SERVER: usize = 3;
pub const NAMING_REFRESH_INTERVAL_MS: u64 = 3_000;

pub const DEFAULT_HEART_BEAT_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_HEART_BEAT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_IP_DELETE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_PROTECT_THRESHOLD: f32 = 0.0;

/// Entry separator in the `Listening-Configs` payload grammar (0x01).
pub const LINE_SEPARATOR: &str = "\u{1}";
/// Field separator within one listening-configs entry (0x02).
pub const WORD_SEPARATOR: &str = "\u{2}";

pub const CONFIG_CONTROLLER_PATH: &str = "/v1/cs/configs";
pub const CONFIG_LISTENER_PATH: &str = "/v1/cs/configs/listener";
pub const NAMING_INSTANCE_PATH: &str = "/v1/ns/instance";
pub const NAMING_INSTANCE_LIST_PATH: &str = "/v1/ns/instance/list";
pub const NAMING_INSTANCE_BEAT_PATH: &str = "/v1/ns/instance/beat";

/// Application-level response code meaning "server has forgotten this
/// instance" on a heartbeat PUT; the scheduler re-registers on sight.
pub const BEAT_CODE_NOT_FOUND: i32 = 20404;
