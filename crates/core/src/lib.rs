//! Shared building blocks for `invsync`.
//!
//! Pure data and validation (no IO): tenant identifiers, tenant configuration
//! and the canonical record shape every adapter produces.

pub mod error;
pub mod id;
pub mod record;
pub mod tenant;

pub use error::{ConfigError, ConfigResult};
pub use id::TenantId;
pub use record::CanonicalRecord;
pub use tenant::{
    AdapterKind, PollingTarget, RetrySettings, SyncDirection, SyncRule, TenantConfig, TransformSpec,
};
