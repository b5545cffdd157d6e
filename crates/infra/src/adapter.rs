//! Per-tenant normalization between external records and [`CanonicalRecord`].

use std::collections::BTreeMap;

use invsync_core::{AdapterKind, CanonicalRecord, TenantConfig};
use serde_json::{Map, Value as JsonValue};

/// Converts records between a tenant's shape and the canonical one.
///
/// Both directions are total and lossless for objects: missing known fields
/// stay absent, ill-typed ones travel as custom fields under their own key.
/// A non-object input is treated as an empty object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Adapter {
    /// External records already use canonical field names.
    #[default]
    Identity,
    /// External field name -> canonical field name.
    FieldMapping(BTreeMap<String, String>),
}

impl Adapter {
    pub fn for_tenant(config: &TenantConfig) -> Self {
        match config.adapter {
            AdapterKind::Identity => Self::Identity,
            AdapterKind::FieldMapping => Self::FieldMapping(config.field_mappings.clone()),
        }
    }

    pub fn normalize(&self, raw: &JsonValue) -> CanonicalRecord {
        let mut fields = match raw {
            JsonValue::Object(map) => map.clone(),
            _ => Map::new(),
        };

        if let Self::FieldMapping(mappings) = self {
            fields = rename_keys(fields, mappings.iter().map(|(ext, canon)| (ext.as_str(), canon.as_str())));
        }

        CanonicalRecord::from_object(fields)
    }

    pub fn transform_to_target(&self, record: &CanonicalRecord) -> JsonValue {
        let mut fields = record.to_object();

        if let Self::FieldMapping(mappings) = self {
            fields = rename_keys(fields, mappings.iter().map(|(ext, canon)| (canon.as_str(), ext.as_str())));
        }

        JsonValue::Object(fields)
    }
}

fn rename_keys<'a>(
    mut fields: Map<String, JsonValue>,
    renames: impl Iterator<Item = (&'a str, &'a str)>,
) -> Map<String, JsonValue> {
    // Remove first, insert after: swapped names must not clobber each other.
    let moved: Vec<(&str, JsonValue)> = renames
        .filter_map(|(from, to)| fields.remove(from).map(|value| (to, value)))
        .collect();
    for (to, value) in moved {
        fields.insert(to.to_string(), value);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use invsync_core::TenantId;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn identity_reads_known_fields_and_keeps_the_rest() {
        let record = Adapter::Identity.normalize(&json!({
            "name": "foo", "sku": "S1", "quantity": 2, "paid": true, "color": "red"
        }));

        assert_eq!(record.name(), Some("foo"));
        assert_eq!(record.sku(), Some("S1"));
        assert_eq!(record.quantity(), Some(2));
        assert_eq!(record.paid(), Some(true));
        assert_eq!(record.custom_field("color"), Some(&json!("red")));
        assert_eq!(record.custom_fields().len(), 1);
    }

    #[test]
    fn identity_passes_ill_typed_and_missing_fields_through() {
        let raw = json!({"sku": "S1", "quantity": "5", "paid": "yes"});
        let record = Adapter::Identity.normalize(&raw);
        assert_eq!(record.quantity(), None);
        assert_eq!(record.name(), None);
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);

        let raw = json!({"sku": "S2"});
        let record = Adapter::Identity.normalize(&raw);
        assert_eq!(record.quantity(), None);
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn non_object_input_is_an_empty_record() {
        let record = Adapter::Identity.normalize(&json!("not an object"));
        assert_eq!(record, CanonicalRecord::default());
        assert_eq!(serde_json::to_value(&record).unwrap(), json!({}));
    }

    #[test]
    fn fractional_quantities_are_not_rounded() {
        let record = Adapter::Identity.normalize(&json!({"quantity": 3.9}));
        assert_eq!(record.quantity(), None);
        assert_eq!(record.custom_field("quantity"), Some(&json!(3.9)));
    }

    #[test]
    fn identity_target_shape_matches_input() {
        let raw = json!({"name": "foo", "sku": "S1", "quantity": 2, "color": "red"});
        let record = Adapter::Identity.normalize(&raw);
        assert_eq!(Adapter::Identity.transform_to_target(&record), raw);
    }

    #[test]
    fn field_mapping_renames_both_ways() {
        let adapter = Adapter::FieldMapping(BTreeMap::from([
            ("title".to_string(), "name".to_string()),
            ("stock".to_string(), "quantity".to_string()),
        ]));

        let raw = json!({"title": "Widget", "sku": "W-1", "stock": 5, "bin": "A3"});
        let record = adapter.normalize(&raw);

        assert_eq!(record.name(), Some("Widget"));
        assert_eq!(record.quantity(), Some(5));
        assert_eq!(record.custom_field("bin"), Some(&json!("A3")));
        assert_eq!(adapter.transform_to_target(&record), raw);
    }

    #[test]
    fn built_from_tenant_config() {
        let cfg = TenantConfig::new(TenantId::new("acme").unwrap())
            .with_adapter(AdapterKind::FieldMapping)
            .with_field_mapping("title", "name");

        assert_eq!(
            Adapter::for_tenant(&cfg),
            Adapter::FieldMapping(BTreeMap::from([("title".to_string(), "name".to_string())]))
        );
        assert_eq!(
            Adapter::for_tenant(&TenantConfig::new(TenantId::new("plain").unwrap())),
            Adapter::Identity
        );
    }

    fn any_scalar() -> impl Strategy<Value = JsonValue> {
        prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::from),
            any::<i64>().prop_map(JsonValue::from),
            "[a-z0-9 ]{0,8}".prop_map(JsonValue::from),
        ]
    }

    proptest! {
        #[test]
        fn identity_round_trips_any_object(
            fields in proptest::collection::btree_map(
                prop_oneof![Just("name"), Just("sku"), Just("quantity"), Just("paid"), Just("color")],
                any_scalar(),
                0..5,
            )
        ) {
            let raw = JsonValue::Object(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect());
            let record = Adapter::Identity.normalize(&raw);
            prop_assert_eq!(serde_json::to_value(&record).unwrap(), raw.clone());
            prop_assert_eq!(Adapter::Identity.transform_to_target(&record), raw);
        }
    }
}
