//! Layered [`ClientProfile`] loading: struct defaults → optional TOML file
//! → environment variables → explicit builder overrides, each layer
//! winning over the one before it. Mirrors the donor server's own
//! `config`-crate-based `Configuration` loader.

use std::path::Path;

use config::{Config, Environment, File};

use crate::error::{ClientError, Result};
use crate::model::{ClientProfile, ClientProfileBuilder};

/// Environment variable naming the optional TOML config file, consulted
/// when `config_path` is `None`.
pub const CONFIG_FILE_ENV_VAR: &str = "BATATA_CLIENT_CONFIG";
const ENV_PREFIX: &str = "BATATA_CLIENT";

/// Build a [`ClientProfile`] by layering, in increasing priority:
///
/// 1. [`ClientProfile::default`]'s values,
/// 2. an optional TOML file at `config_path` (or `$BATATA_CLIENT_CONFIG`
///    if `config_path` is `None`) — missing files are silently skipped,
/// 3. environment variables prefixed `BATATA_CLIENT_` (e.g.
///    `BATATA_CLIENT_TIMEOUT_MS`),
/// 4. `overrides`, applied last directly on the resulting builder.
pub fn load_profile(
    config_path: Option<&Path>,
    overrides: impl FnOnce(ClientProfileBuilder) -> ClientProfileBuilder,
) -> Result<ClientProfile> {
    let defaults = ClientProfile::default();

    let file_path = config_path
        .map(|p| p.to_string_lossy().into_owned())
        .or_else(|| std::env::var(CONFIG_FILE_ENV_VAR).ok());

    let build = || -> std::result::Result<Config, config::ConfigError> {
        let mut builder = Config::builder()
            .set_default("timeout_ms", defaults.timeout_ms as i64)?
            .set_default("listen_interval_ms", defaults.listen_interval_ms as i64)?
            .set_default("beat_interval_ms", defaults.beat_interval_ms as i64)?
            .set_default("not_load_cache_at_start", defaults.not_load_cache_at_start)?
            .set_default("namespace_id", defaults.namespace_id.clone())?
            .set_default("protect_threshold", defaults.protect_threshold as f64)?
            .set_default(
                "cache_dir",
                defaults.cache_dir.to_string_lossy().into_owned(),
            )?;

        if let Some(path) = &file_path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        // Keys here are flat snake_case (`timeout_ms`, `namespace_id`, ...),
        // not the teacher's dotted/nested config keys, so no separator is
        // set: `with_prefix`'s default prefix_separator ("_") alone turns
        // `BATATA_CLIENT_NAMESPACE_ID` into the flat key `namespace_id`.
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX));

        builder.build()
    };

    let config = build().map_err(|e| ClientError::InvalidArgument(e.to_string()))?;
    let get = |err: config::ConfigError| ClientError::InvalidArgument(err.to_string());

    let mut profile_builder = ClientProfile::builder()
        .timeout_ms(config.get_int("timeout_ms").map_err(get)? as u64)
        .listen_interval_ms(config.get_int("listen_interval_ms").map_err(get)? as u64)
        .beat_interval_ms(config.get_int("beat_interval_ms").map_err(get)? as u64)
        .not_load_cache_at_start(config.get_bool("not_load_cache_at_start").map_err(get)?)
        .namespace_id(config.get_string("namespace_id").map_err(get)?)
        .protect_threshold(config.get_float("protect_threshold").map_err(get)? as f32)
        .cache_dir(config.get_string("cache_dir").map_err(get)?);

    if let Ok(token) = config.get_string("access_token") {
        profile_builder = profile_builder.access_token(token);
    }

    Ok(overrides(profile_builder).build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_only() {
        let profile = load_profile(None, |b| b).unwrap();
        assert_eq!(profile.namespace_id, "public");
        assert_eq!(profile.timeout_ms, crate::constants::SO_TIMEOUT_MS);
    }

    #[test]
    fn test_env_overrides_default() {
        // SAFETY: test-only; no other test in this process reads this var.
        unsafe {
            std::env::set_var("BATATA_CLIENT_NAMESPACE_ID", "tenant-from-env");
        }
        let profile = load_profile(None, |b| b).unwrap();
        assert_eq!(profile.namespace_id, "tenant-from-env");
        unsafe {
            std::env::remove_var("BATATA_CLIENT_NAMESPACE_ID");
        }
    }

    #[test]
    fn test_builder_override_wins_over_everything() {
        let profile = load_profile(None, |b| b.namespace_id("explicit")).unwrap();
        assert_eq!(profile.namespace_id, "explicit");
    }

    #[test]
    fn test_file_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "namespace_id = \"from-file\"\ntimeout_ms = 9999\n").unwrap();

        let profile = load_profile(Some(&path), |b| b).unwrap();
        assert_eq!(profile.namespace_id, "from-file");
        assert_eq!(profile.timeout_ms, 9999);
    }
}
