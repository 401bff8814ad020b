//! KV gateway construction from CLI configuration.

use anyhow::{Context, Result};
use std::sync::Arc;

use gru_core::kv::Kv;
use gru_etcd::{EtcdConfig, EtcdKv};

use crate::Config;

/// Builds the KV gateway from configuration.
///
/// # Errors
///
/// Returns an error when no endpoint is configured or the HTTP client
/// cannot be constructed.
pub fn connect(config: &Config) -> Result<Arc<dyn Kv>> {
    let mut etcd = EtcdConfig::new(config.endpoints.clone()).with_timeout(config.timeout);
    if !config.username.is_empty() {
        etcd = etcd.with_basic_auth(&config.username, &config.password);
    }

    let kv = EtcdKv::connect(etcd).context("Failed to create etcd client")?;
    Ok(Arc::new(kv))
}
