//! Pure per-record transforms applied before adapting.

use std::collections::HashMap;
use std::sync::Arc;

use invsync_core::TransformSpec;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown custom transform: {0}")]
pub struct UnknownTransform(pub String);

/// A resolved transform, cheap to clone into every tick.
#[derive(Clone)]
pub struct Transform {
    name: String,
    f: Arc<dyn Fn(JsonValue) -> JsonValue + Send + Sync>,
}

impl Transform {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(JsonValue) -> JsonValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, raw: JsonValue) -> JsonValue {
        (self.f)(raw)
    }
}

impl core::fmt::Debug for Transform {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("Transform").field(&self.name).finish()
    }
}

/// Uppercases a string `name`; anything else passes through untouched.
pub fn uppercase_name(mut raw: JsonValue) -> JsonValue {
    if let Some(JsonValue::String(name)) = raw.get_mut("name") {
        *name = name.to_uppercase();
    }
    raw
}

/// Custom transforms by id, plus the built-in ones.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    custom: HashMap<String, Transform>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: impl Into<String>, f: F)
    where
        F: Fn(JsonValue) -> JsonValue + Send + Sync + 'static,
    {
        let id = id.into();
        self.custom.insert(id.clone(), Transform::new(id, f));
    }

    pub fn with<F>(mut self, id: impl Into<String>, f: F) -> Self
    where
        F: Fn(JsonValue) -> JsonValue + Send + Sync + 'static,
    {
        self.register(id, f);
        self
    }

    /// `None` means "no transform" (identity).
    pub fn resolve(&self, spec: Option<&TransformSpec>) -> Result<Option<Transform>, UnknownTransform> {
        match spec {
            None | Some(TransformSpec::Identity) => Ok(None),
            Some(TransformSpec::UppercaseName) => Ok(Some(Transform::new("uppercase-name", uppercase_name))),
            Some(TransformSpec::Custom { id }) => self
                .custom
                .get(id)
                .cloned()
                .map(Some)
                .ok_or_else(|| UnknownTransform(id.clone())),
        }
    }
}
