//! Canonical (tenant-agnostic) record shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Tenant-agnostic representation of a synchronized inventory item.
///
/// Produced by an adapter and never mutated afterwards: there are no
/// `&mut` accessors, later stages build a new record instead.
///
/// Serializes as a flat JSON object. Known fields are omitted when absent
/// and custom fields sit next to them:
///
/// ```text
/// {"name":"foo","sku":"S1","quantity":2,"color":"red"}
/// ```
///
/// A known field whose value has the wrong type is kept verbatim as a custom
/// field under the same key, so `{"quantity":"5"}` serializes back unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Map<String, JsonValue>")]
pub struct CanonicalRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    paid: Option<bool>,
    #[serde(flatten)]
    custom_fields: BTreeMap<String, JsonValue>,
}

impl CanonicalRecord {
    pub fn new(name: impl Into<String>, sku: impl Into<String>, quantity: i64) -> Self {
        Self {
            name: Some(name.into()),
            sku: Some(sku.into()),
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    /// Split a JSON object into known and custom fields.
    pub fn from_object(mut fields: Map<String, JsonValue>) -> Self {
        let name = take_typed(&mut fields, "name", |v| v.as_str().map(str::to_owned));
        let sku = take_typed(&mut fields, "sku", |v| v.as_str().map(str::to_owned));
        let quantity = take_typed(&mut fields, "quantity", JsonValue::as_i64);
        let paid = take_typed(&mut fields, "paid", JsonValue::as_bool);

        Self {
            name,
            sku,
            quantity,
            paid,
            custom_fields: fields.into_iter().collect(),
        }
    }

    /// Flat JSON object, the same shape `serde` produces.
    pub fn to_object(&self) -> Map<String, JsonValue> {
        let mut fields: Map<String, JsonValue> = self
            .custom_fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(name) = &self.name {
            fields.insert("name".into(), name.as_str().into());
        }
        if let Some(sku) = &self.sku {
            fields.insert("sku".into(), sku.as_str().into());
        }
        if let Some(quantity) = self.quantity {
            fields.insert("quantity".into(), quantity.into());
        }
        if let Some(paid) = self.paid {
            fields.insert("paid".into(), paid.into());
        }
        fields
    }

    pub fn with_paid(mut self, paid: bool) -> Self {
        self.custom_fields.remove("paid");
        self.paid = Some(paid);
        self
    }

    /// Custom fields named like a present known field are dropped.
    pub fn with_custom_fields(mut self, mut fields: BTreeMap<String, JsonValue>) -> Self {
        fields.retain(|key, _| !self.has_known(key));
        self.custom_fields = fields;
        self
    }

    fn has_known(&self, key: &str) -> bool {
        match key {
            "name" => self.name.is_some(),
            "sku" => self.sku.is_some(),
            "quantity" => self.quantity.is_some(),
            "paid" => self.paid.is_some(),
            _ => false,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn quantity(&self) -> Option<i64> {
        self.quantity
    }

    pub fn paid(&self) -> Option<bool> {
        self.paid
    }

    pub fn custom_fields(&self) -> &BTreeMap<String, JsonValue> {
        &self.custom_fields
    }

    pub fn custom_field(&self, key: &str) -> Option<&JsonValue> {
        self.custom_fields.get(key)
    }
}

impl From<Map<String, JsonValue>> for CanonicalRecord {
    fn from(fields: Map<String, JsonValue>) -> Self {
        Self::from_object(fields)
    }
}

/// Remove `key` when `read` accepts its value; otherwise leave it in place.
fn take_typed<T>(
    fields: &mut Map<String, JsonValue>,
    key: &str,
    read: impl FnOnce(&JsonValue) -> Option<T>,
) -> Option<T> {
    let value = read(fields.get(key)?)?;
    fields.remove(key);
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn serializes_flat_without_unknown_paid() {
        let record = CanonicalRecord::new("foo", "S1", 2);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"name": "foo", "sku": "S1", "quantity": 2}));
    }

    #[test]
    fn custom_fields_are_flattened() {
        let mut extra = BTreeMap::new();
        extra.insert("color".to_string(), json!("red"));
        let record = CanonicalRecord::new("foo", "S1", 2)
            .with_paid(true)
            .with_custom_fields(extra);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({"name": "foo", "sku": "S1", "quantity": 2, "paid": true, "color": "red"})
        );

        let back: CanonicalRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.custom_field("color"), Some(&json!("red")));
        assert_eq!(back.paid(), Some(true));
    }

    #[test]
    fn missing_known_fields_stay_absent() {
        let record = CanonicalRecord::from_object(object(json!({"sku": "S2"})));

        assert_eq!(record.sku(), Some("S2"));
        assert_eq!(record.name(), None);
        assert_eq!(record.quantity(), None);
        assert_eq!(serde_json::to_value(&record).unwrap(), json!({"sku": "S2"}));
    }

    #[test]
    fn ill_typed_known_fields_are_kept_as_custom() {
        let raw = json!({"name": 7, "sku": "S1", "quantity": "5", "paid": "yes"});
        let record = CanonicalRecord::from_object(object(raw.clone()));

        assert_eq!(record.sku(), Some("S1"));
        assert_eq!(record.quantity(), None);
        assert_eq!(record.paid(), None);
        assert_eq!(record.custom_field("quantity"), Some(&json!("5")));
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
        assert_eq!(JsonValue::Object(record.to_object()), raw);

        let back: CanonicalRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn known_field_shadows_a_same_named_custom_field() {
        let extra = BTreeMap::from([("sku".to_string(), json!(9)), ("bin".to_string(), json!("A3"))]);
        let record = CanonicalRecord::new("foo", "S1", 2).with_custom_fields(extra);

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"name": "foo", "sku": "S1", "quantity": 2, "bin": "A3"})
        );
    }
}
