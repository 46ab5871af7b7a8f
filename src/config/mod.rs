//! Configuration loading: TOML file, then environment overrides, then
//! validation.

pub use vidlock_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Environment variables that override file settings.
pub const ENV_NATS_URL: &str = "NATS_URL";
pub const ENV_NATS_TOKEN: &str = "NATS_TOKEN";
pub const ENV_NATS_STREAM: &str = "NATS_STREAM";
pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";
pub const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";
pub const ENV_IPFS_API: &str = "IPFS_API";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./vidlock.toml",
        "~/.config/vidlock/config.toml",
        "/etc/vidlock/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides from `lookup`. Empty values are ignored.
pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_NATS_URL) {
        config.nats.url = url;
    }
    if let Some(token) = get(ENV_NATS_TOKEN) {
        config.nats.token = Some(token);
    }
    if let Some(stream) = get(ENV_NATS_STREAM) {
        config.nats.stream = stream;
    }
    if let Some(addr) = get(ENV_VAULT_ADDR) {
        config.vault.address = addr;
    }
    if let Some(token) = get(ENV_VAULT_TOKEN) {
        config.vault.token = token;
    }
    if let Some(api) = get(ENV_IPFS_API) {
        config.ipfs.api_url = api;
    }
}

/// Reject settings the processor cannot run with; log the merely odd ones.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.nats.url.trim().is_empty() {
        anyhow::bail!("nats.url cannot be empty");
    }
    if config.nats.stream.trim().is_empty() {
        anyhow::bail!("nats.stream cannot be empty");
    }
    if config.nats.durable.trim().is_empty() {
        anyhow::bail!("nats.durable cannot be empty");
    }
    if config.nats.max_concurrent_runs == 0 {
        anyhow::bail!("nats.max_concurrent_runs must be at least 1");
    }
    if config.fetch.batch_size == 0 {
        anyhow::bail!("fetch.batch_size must be at least 1");
    }
    if config.processing.segment_duration_secs == 0 {
        anyhow::bail!("processing.segment_duration_secs must be positive");
    }
    if config.processing.segment_concurrency == 0 {
        anyhow::bail!("processing.segment_concurrency must be at least 1");
    }
    if config.ingest.chunk_size == 0 {
        anyhow::bail!("ingest.chunk_size must be positive");
    }
    if config.ipfs.scheme.is_empty() || config.ipfs.scheme.contains("://") {
        anyhow::bail!("ipfs.scheme must be a bare scheme name such as \"ipfs\"");
    }

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    Ok(())
}
