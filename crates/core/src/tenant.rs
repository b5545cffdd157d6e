//! Tenant configuration.
//!
//! A [`TenantConfig`] is materialized once at process start (file, database,
//! environment; loading is not this crate's concern) and is immutable for the
//! lifetime of any scheduler built from it. Every field that selects behavior
//! (transform, adapter) is a tagged value rather than a function so the whole
//! config stays serializable.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::id::TenantId;

/// Direction a sync rule applies in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncDirection {
    OneWay,
    TwoWay,
}

/// A direction plus the set of canonical fields it governs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRule {
    pub direction: SyncDirection,
    pub fields: BTreeSet<String>,
}

impl SyncRule {
    pub fn new<I, S>(direction: SyncDirection, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            direction,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Per-record transform applied to the raw external record before adapting.
///
/// `Custom` ids are resolved against a registry of pure functions when the
/// scheduler is built; an unknown id is a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TransformSpec {
    Identity,
    UppercaseName,
    Custom { id: String },
}

/// Which adapter normalizes this tenant's records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AdapterKind {
    /// Records already use canonical field names.
    #[default]
    Identity,
    /// Rename external fields through [`TenantConfig::field_mappings`] first.
    FieldMapping,
}

/// Retry settings for a tenant's polling fetch.
///
/// `strategy` is kept as a name so an unknown strategy surfaces as a
/// construction-time error where the backoff policy is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl Default for RetrySettings {
    /// Polling defaults: 3 retries, exponential from 1s doubling.
    fn default() -> Self {
        Self {
            max_retries: 3,
            strategy: "exponential".to_string(),
            initial_delay_ms: Some(1000),
            backoff_factor: Some(2.0),
            delay_ms: None,
        }
    }
}

/// Polling settings of a tenant with polling enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingTarget<'a> {
    pub interval: Duration,
    pub endpoint: &'a str,
}

/// Configuration of one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: TenantId,
    /// External field name -> canonical field name.
    #[serde(default)]
    pub field_mappings: BTreeMap<String, String>,
    /// Ordered; the first rule governing a field wins.
    #[serde(default)]
    pub sync_rules: Vec<SyncRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformSpec>,
    #[serde(default)]
    pub adapter: AdapterKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySettings>,
}

impl TenantConfig {
    /// Webhook-only tenant with no mappings or rules.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            field_mappings: BTreeMap::new(),
            sync_rules: Vec::new(),
            queue_name: None,
            webhook_endpoint: None,
            polling_interval_ms: None,
            polling_endpoint: None,
            transform: None,
            adapter: AdapterKind::Identity,
            retry: None,
        }
    }

    pub fn with_polling(mut self, interval_ms: u64, endpoint: impl Into<String>) -> Self {
        self.polling_interval_ms = Some(interval_ms);
        self.polling_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = Some(name.into());
        self
    }

    pub fn with_webhook_endpoint(mut self, path: impl Into<String>) -> Self {
        self.webhook_endpoint = Some(path.into());
        self
    }

    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_adapter(mut self, adapter: AdapterKind) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_field_mapping(mut self, external: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.field_mappings.insert(external.into(), canonical.into());
        self
    }

    pub fn with_rule(mut self, rule: SyncRule) -> Self {
        self.sync_rules.push(rule);
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Destination queue; defaults to `<tenant>_products`.
    pub fn queue_name(&self) -> String {
        match &self.queue_name {
            Some(name) => name.clone(),
            None => self.tenant_id.scoped_queue("products"),
        }
    }

    /// Polling target, present only when both interval and endpoint are set.
    pub fn polling(&self) -> Option<PollingTarget<'_>> {
        match (self.polling_interval_ms, self.polling_endpoint.as_deref()) {
            (Some(ms), Some(endpoint)) => Some(PollingTarget {
                interval: Duration::from_millis(ms),
                endpoint,
            }),
            _ => None,
        }
    }

    pub fn is_webhook_only(&self) -> bool {
        self.polling_interval_ms.is_none() && self.polling_endpoint.is_none()
    }

    /// Retry settings for polling, falling back to the polling defaults.
    pub fn retry_settings(&self) -> RetrySettings {
        self.retry.clone().unwrap_or_default()
    }

    /// Check the structural invariants of this config.
    pub fn validate(&self) -> ConfigResult<()> {
        let tenant = self.tenant_id.as_str();

        if let Some(name) = &self.queue_name {
            if name.trim().is_empty() {
                return Err(ConfigError::missing(tenant, "queue_name"));
            }
        }

        match (self.polling_interval_ms, self.polling_endpoint.as_deref()) {
            (None, None) => {}
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::IncompletePolling {
                    tenant: tenant.to_string(),
                });
            }
            (Some(ms), Some(endpoint)) => {
                if ms == 0 {
                    return Err(ConfigError::invalid(tenant, "polling_interval_ms", "must be > 0"));
                }
                if endpoint.trim().is_empty() {
                    return Err(ConfigError::missing(tenant, "polling_endpoint"));
                }
            }
        }

        for (external, canonical) in &self.field_mappings {
            if external.is_empty() || canonical.is_empty() {
                return Err(ConfigError::invalid(
                    tenant,
                    "field_mappings",
                    "field names must not be empty",
                ));
            }
        }

        if self.sync_rules.iter().any(|rule| rule.fields.is_empty()) {
            return Err(ConfigError::invalid(tenant, "sync_rules", "rule governs no fields"));
        }

        if let Some(TransformSpec::Custom { id }) = &self.transform {
            if id.trim().is_empty() {
                return Err(ConfigError::missing(tenant, "transform.id"));
            }
        }

        Ok(())
    }
}
