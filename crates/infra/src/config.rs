//! Process configuration: environment variables and the tenant file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use invsync_core::TenantConfig;

use crate::fetch::DEFAULT_HTTP_TIMEOUT;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_TENANT_CONFIG_PATH: &str = "config/tenants.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` selects the in-memory queue.
    pub redis_url: Option<String>,
    pub queue_prefix: Option<String>,
    pub tenant_config_path: PathBuf,
    pub http_timeout: Duration,
}

impl AppConfig {
    /// Read `BIND_ADDR`, `REDIS_URL`, `QUEUE_PREFIX`, `TENANT_CONFIG_PATH`
    /// and `HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`AppConfig::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:3000")?;

        let http_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .with_context(|| format!("HTTP_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"))?,
            ),
            None => DEFAULT_HTTP_TIMEOUT,
        };

        Ok(Self {
            bind_addr,
            redis_url: var("REDIS_URL"),
            queue_prefix: var("QUEUE_PREFIX"),
            tenant_config_path: var("TENANT_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TENANT_CONFIG_PATH)),
            http_timeout,
        })
    }
}

/// Parse a JSON array of tenant configs and validate each one.
pub fn parse_tenant_configs(json: &str) -> anyhow::Result<Vec<TenantConfig>> {
    let configs: Vec<TenantConfig> = serde_json::from_str(json).context("tenant configuration is not valid JSON")?;
    for config in &configs {
        config
            .validate()
            .with_context(|| format!("invalid configuration for tenant {}", config.tenant_id))?;
    }
    Ok(configs)
}

pub fn load_tenant_configs(path: impl AsRef<Path>) -> anyhow::Result<Vec<TenantConfig>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_tenant_configs(&raw).with_context(|| format!("loading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use invsync_core::TransformSpec;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.redis_url, None);
        assert_eq!(cfg.queue_prefix, None);
        assert_eq!(cfg.tenant_config_path, PathBuf::from("config/tenants.json"));
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn variables_override_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("REDIS_URL", "redis://cache:6379"),
            ("QUEUE_PREFIX", "invsync"),
            ("TENANT_CONFIG_PATH", "/etc/invsync/tenants.json"),
            ("HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(cfg.queue_prefix.as_deref(), Some("invsync"));
        assert_eq!(cfg.tenant_config_path, PathBuf::from("/etc/invsync/tenants.json"));
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(AppConfig::from_lookup(lookup(&[("BIND_ADDR", "nowhere")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("HTTP_TIMEOUT_SECS", "soon")])).is_err());
    }

    #[test]
    fn parses_the_sample_tenants() {
        let configs = parse_tenant_configs(include_str!("../../../config/tenants.json")).unwrap();
        assert_eq!(configs.len(), 2);

        let webhook = &configs[0];
        assert_eq!(webhook.tenant_id.as_str(), "webhook-org");
        assert!(webhook.is_webhook_only());

        let polling = &configs[1];
        assert_eq!(polling.tenant_id.as_str(), "polling-org");
        assert_eq!(polling.polling().unwrap().interval, Duration::from_secs(30));
        assert_eq!(polling.transform, Some(TransformSpec::UppercaseName));
        assert_eq!(polling.queue_name(), "polling-org_products");
    }

    #[test]
    fn half_configured_polling_is_rejected() {
        let err = parse_tenant_configs(r#"[{"tenant_id": "half", "polling_interval_ms": 1000}]"#).unwrap_err();
        assert!(format!("{err:#}").contains("half"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_tenant_configs("/definitely/not/here.json").is_err());
    }
}
